use clap::Args;
use common::error::GroupError;
use store::StoreError;

use crate::op::ContextError;

/// Withdraw a device from every group, then drop its acl.
#[derive(Args, Debug, Clone)]
pub struct Forget {
    /// Device id
    #[arg(long)]
    pub di: String,
}

#[derive(Debug, thiserror::Error)]
pub enum DeviceForgetError {
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error("{}", .0.public_message())]
    Group(#[from] GroupError),
    #[error("failed to drop acl: {0}")]
    Store(#[from] StoreError),
    #[error("device {0} is not registered")]
    UnknownDevice(String),
}

#[async_trait::async_trait]
impl crate::op::Op for Forget {
    type Error = DeviceForgetError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let manager = ctx.manager().await?;
        if manager.store().device_acl_id(&self.di).await?.is_none() {
            return Err(DeviceForgetError::UnknownDevice(self.di.clone()));
        }

        manager.delete_devices_from_all_groups(&self.di).await?;
        manager.store().forget_device(&self.di).await?;
        Ok(format!("Device {} removed from all groups and forgotten", self.di))
    }
}
