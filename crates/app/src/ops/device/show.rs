use clap::Args;
use common::provider::{DeviceAclService, ProviderError};

use crate::op::ContextError;

#[derive(Args, Debug, Clone)]
pub struct Show {
    /// Device id
    #[arg(long)]
    pub di: String,
}

#[derive(Debug, thiserror::Error)]
pub enum DeviceShowError {
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error("device {0} is not registered")]
    UnknownDevice(String),
    #[error("failed to read acl: {0}")]
    Provider(#[from] ProviderError),
    #[error("failed to render acl: {0}")]
    Json(#[from] serde_json::Error),
}

#[async_trait::async_trait]
impl crate::op::Op for Show {
    type Error = DeviceShowError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let store = ctx.store().await?;
        let aclid = store
            .acl_id(&self.di)
            .await?
            .ok_or_else(|| DeviceShowError::UnknownDevice(self.di.clone()))?;
        let acl = store.acl(&aclid).await?;
        Ok(serde_json::to_string_pretty(&acl)?)
    }
}
