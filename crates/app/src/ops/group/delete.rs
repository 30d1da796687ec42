use clap::Args;
use common::error::GroupError;

use crate::op::ContextError;

/// Delete a group together with its subgroups (owner only).
#[derive(Args, Debug, Clone)]
pub struct Delete {
    /// Requesting user
    #[arg(long)]
    pub uid: String,

    /// Group id
    #[arg(long)]
    pub gid: String,
}

#[derive(Debug, thiserror::Error)]
pub enum GroupDeleteError {
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error("{}", .0.public_message())]
    Group(#[from] GroupError),
}

#[async_trait::async_trait]
impl crate::op::Op for Delete {
    type Error = GroupDeleteError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let manager = ctx.manager().await?;
        manager.remove_group(&self.gid, &self.uid).await?;
        Ok(format!("Deleted group {}", self.gid))
    }
}
