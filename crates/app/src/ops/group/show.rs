use clap::Args;
use common::error::GroupError;

use crate::op::ContextError;

#[derive(Args, Debug, Clone)]
pub struct Show {
    /// Requesting user, must be a member
    #[arg(long)]
    pub uid: String,

    /// Group id
    #[arg(long)]
    pub gid: String,
}

#[derive(Debug, thiserror::Error)]
pub enum GroupShowError {
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error("{}", .0.public_message())]
    Group(#[from] GroupError),
    #[error("failed to render group: {0}")]
    Json(#[from] serde_json::Error),
}

#[async_trait::async_trait]
impl crate::op::Op for Show {
    type Error = GroupShowError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let manager = ctx.manager().await?;
        let group = manager.get_group(&self.gid, &self.uid).await?;
        Ok(serde_json::to_string_pretty(&group)?)
    }
}
