//! # Help Command
//!
//! Handles the `.help` command.
//! Displays the main help menu to the user.

use anyhow::Result;
use async_trait::async_trait;

use crate::application::router::Command;
use crate::application::supervisor::CommandContext;

pub struct HelpCommand;

#[async_trait]
impl Command for HelpCommand {
    fn name(&self) -> &'static str {
        "help"
    }

    fn module(&self) -> &'static str {
        "general"
    }

    async fn execute(&self, ctx: CommandContext) -> Result<()> {
        ctx.reply(crate::strings::help::MAIN).await;
        Ok(())
    }
}
