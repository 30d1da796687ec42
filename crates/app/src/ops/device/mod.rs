use clap::{Args, Subcommand};

pub mod forget;
pub mod list;
pub mod register;
pub mod show;

use crate::op::Op;

crate::command_enum! {
    (Register, register::Register),
    (Show, show::Show),
    (List, list::List),
    (Forget, forget::Forget),
}

pub type DeviceCommand = Command;

#[derive(Args, Debug, Clone)]
pub struct Device {
    #[command(subcommand)]
    pub command: DeviceCommand,
}

#[async_trait::async_trait]
impl Op for Device {
    type Error = OpError;
    type Output = OpOutput;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        self.command.execute(ctx).await
    }
}
