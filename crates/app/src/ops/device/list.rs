use clap::Args;
use store::StoreError;

use crate::op::ContextError;

#[derive(Args, Debug, Clone)]
pub struct List;

#[derive(Debug, thiserror::Error)]
pub enum DeviceListError {
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error("failed to list devices: {0}")]
    Store(#[from] StoreError),
}

#[async_trait::async_trait]
impl crate::op::Op for List {
    type Error = DeviceListError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let store = ctx.store().await?;
        let devices = store.devices().await?;

        if devices.is_empty() {
            return Ok("No devices registered".to_string());
        }

        let lines: Vec<String> = devices
            .iter()
            .map(|device| format!("{}  owner={}  acl={}", device.di, device.owner, device.aclid))
            .collect();
        Ok(lines.join("\n"))
    }
}
