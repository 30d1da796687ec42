use clap::Args;
use common::error::GroupError;

use crate::op::ContextError;

#[derive(Args, Debug, Clone)]
pub struct Create {
    /// User creating (and owning) the group
    #[arg(long)]
    pub uid: String,

    /// Group name
    #[arg(long)]
    pub name: String,

    /// Create as a subgroup of this group
    #[arg(long)]
    pub parent: Option<String>,

    /// Use this group id instead of a generated one
    #[arg(long)]
    pub gid: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum GroupCreateError {
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error("{}", .0.public_message())]
    Group(#[from] GroupError),
    #[error("failed to render group: {0}")]
    Json(#[from] serde_json::Error),
}

#[async_trait::async_trait]
impl crate::op::Op for Create {
    type Error = GroupCreateError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let manager = ctx.manager().await?;
        let group = manager
            .create_group(
                &self.uid,
                &self.name,
                self.parent.as_deref(),
                self.gid.clone(),
            )
            .await?;
        Ok(serde_json::to_string_pretty(&group)?)
    }
}
