use clap::{Args, Subcommand};

pub mod create;
pub mod delete;
pub mod properties;
pub mod show;

use crate::op::Op;

crate::command_enum! {
    (Create, create::Create),
    (Show, show::Show),
    (Add, properties::Add),
    (Remove, properties::Remove),
    (Update, properties::Update),
    (Delete, delete::Delete),
}

pub type GroupCommand = Command;

#[derive(Args, Debug, Clone)]
pub struct Group {
    #[command(subcommand)]
    pub command: GroupCommand,
}

#[async_trait::async_trait]
impl Op for Group {
    type Error = OpError;
    type Output = OpOutput;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        self.command.execute(ctx).await
    }
}
