//! # Miscellaneous Commands
//!
//! Handles `.ping` and `.echo`.
//! Small probes for checking that delivery works end to end.

use anyhow::Result;
use async_trait::async_trait;

use crate::application::router::Command;
use crate::application::supervisor::CommandContext;
use crate::domain::types::UserError;
use crate::strings::messages;

pub struct PingCommand;

#[async_trait]
impl Command for PingCommand {
    fn name(&self) -> &'static str {
        "ping"
    }

    fn module(&self) -> &'static str {
        "misc"
    }

    async fn execute(&self, ctx: CommandContext) -> Result<()> {
        ctx.reply(messages::PONG).await;
        Ok(())
    }
}

pub struct EchoCommand;

#[async_trait]
impl Command for EchoCommand {
    fn name(&self) -> &'static str {
        "echo"
    }

    fn module(&self) -> &'static str {
        "misc"
    }

    async fn execute(&self, ctx: CommandContext) -> Result<()> {
        if ctx.args.is_empty() {
            return Err(UserError::new(messages::ECHO_USAGE).into());
        }
        ctx.reply(&messages::echo(&ctx.args.join(" "))).await;
        Ok(())
    }
}
