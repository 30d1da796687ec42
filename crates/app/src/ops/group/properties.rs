//! Property requests against a group. `--properties` takes a JSON object,
//! for example `{"members": ["u2"], "devices": ["d1"]}`.

use clap::Args;
use common::error::GroupError;
use common::group::PropertyUpdate;

use crate::op::{ContextError, Manager, OpContext};

#[derive(Args, Debug, Clone)]
pub struct PropertyArgs {
    /// Requesting user
    #[arg(long)]
    pub uid: String,

    /// Group id
    #[arg(long)]
    pub gid: String,

    /// JSON object of property names to values
    #[arg(long)]
    pub properties: String,
}

impl PropertyArgs {
    async fn prepare(&self, ctx: &OpContext) -> Result<(Manager, PropertyUpdate), PropertiesError> {
        // reject a malformed payload before touching the store
        let update = PropertyUpdate::from_json_str(&self.properties)?;
        let manager = ctx.manager().await?;
        Ok((manager, update))
    }
}

fn key_list(update: &PropertyUpdate) -> String {
    update
        .keys()
        .iter()
        .map(|key| key.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, thiserror::Error)]
pub enum PropertiesError {
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error("{}", .0.public_message())]
    Group(#[from] GroupError),
}

/// Add list values to a group.
#[derive(Args, Debug, Clone)]
pub struct Add {
    #[command(flatten)]
    pub args: PropertyArgs,
}

/// Remove list values from a group, cascading into subgroups.
#[derive(Args, Debug, Clone)]
pub struct Remove {
    #[command(flatten)]
    pub args: PropertyArgs,
}

/// Replace the name or owner, or swap lists wholesale.
#[derive(Args, Debug, Clone)]
pub struct Update {
    #[command(flatten)]
    pub args: PropertyArgs,
}

#[async_trait::async_trait]
impl crate::op::Op for Add {
    type Error = PropertiesError;
    type Output = String;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let (manager, update) = self.args.prepare(ctx).await?;
        manager
            .add_properties(&self.args.gid, &self.args.uid, &update)
            .await?;
        Ok(format!("Added {} to group {}", key_list(&update), self.args.gid))
    }
}

#[async_trait::async_trait]
impl crate::op::Op for Remove {
    type Error = PropertiesError;
    type Output = String;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let (manager, update) = self.args.prepare(ctx).await?;
        manager
            .delete_properties(&self.args.gid, &self.args.uid, &update)
            .await?;
        Ok(format!(
            "Removed {} from group {}",
            key_list(&update),
            self.args.gid
        ))
    }
}

#[async_trait::async_trait]
impl crate::op::Op for Update {
    type Error = PropertiesError;
    type Output = String;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let (manager, update) = self.args.prepare(ctx).await?;
        manager
            .update_properties(&self.args.gid, &self.args.uid, &update)
            .await?;
        Ok(format!("Updated {} on group {}", key_list(&update), self.args.gid))
    }
}
