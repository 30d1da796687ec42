use clap::Args;
use store::StoreError;

use crate::op::ContextError;

#[derive(Args, Debug, Clone)]
pub struct Register {
    /// Device id
    #[arg(long)]
    pub di: String,

    /// User owning the device
    #[arg(long)]
    pub owner: String,
}

#[derive(Debug, thiserror::Error)]
pub enum DeviceRegisterError {
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error("failed to register device: {0}")]
    Store(#[from] StoreError),
}

#[async_trait::async_trait]
impl crate::op::Op for Register {
    type Error = DeviceRegisterError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let store = ctx.store().await?;
        let aclid = store.register_device(&self.di, &self.owner).await?;
        Ok(format!("Device {} registered with acl {}", self.di, aclid))
    }
}
