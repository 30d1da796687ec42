use crate::group::HrefError;
use crate::policy::AuthzError;
use crate::provider::ProviderError;

/// How a failed request should be reported back to its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request itself was malformed or violates a group invariant
    BadRequest,
    /// The acting user lacks the role for the request
    Unauthorized,
    /// Server-side invariant violation or collaborator failure
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum GroupError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("group not found: {0}")]
    GroupNotFound(String),
    #[error("invalid resource href: {0}")]
    Href(#[from] HrefError),
    #[error("unauthorized: {0}")]
    Unauthorized(AuthzError),
    /// A record that must exist (device ACL, owner, ACE) could not be resolved
    #[error("internal error: {0}")]
    Internal(String),
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
}

impl GroupError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GroupError::BadRequest(_) | GroupError::GroupNotFound(_) | GroupError::Href(_) => {
                ErrorKind::BadRequest
            }
            GroupError::Unauthorized(_) => ErrorKind::Unauthorized,
            GroupError::Internal(_) | GroupError::Provider(_) => ErrorKind::Internal,
        }
    }

    /// Message safe to hand back to the requesting user.
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Internal => "internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl From<AuthzError> for GroupError {
    fn from(e: AuthzError) -> Self {
        match e {
            AuthzError::GroupNotFound(gid) => GroupError::GroupNotFound(gid),
            AuthzError::Provider(e) => GroupError::Provider(e),
            e => GroupError::Unauthorized(e),
        }
    }
}
