//! # Command Router
//!
//! Routes incoming messages to the registered command handlers (in `interface/commands`).
//! It parses the command string (e.g., `.ping`) and runs the handler under the `Supervisor`.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::application::supervisor::{CommandContext, Supervisor};
use crate::domain::config::SystemConfig;
use crate::domain::traits::Connection;
use crate::domain::types::{CommandInvocation, InboundMessage};
use crate::strings::messages;

/// A chat command handler.
#[async_trait]
pub trait Command: Send + Sync {
    fn name(&self) -> &'static str;

    /// Group the command belongs to, used in logs.
    fn module(&self) -> &'static str;

    async fn execute(&self, ctx: CommandContext) -> anyhow::Result<()>;
}

/// What happened to an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routed {
    /// Not a command.
    Ignored,
    Unknown,
    Completed,
    /// The handler failed or timed out; a report was attempted.
    Failed,
}

pub struct CommandRouter {
    system: SystemConfig,
    supervisor: Supervisor,
    commands: BTreeMap<String, Arc<dyn Command>>,
}

impl CommandRouter {
    pub fn new(system: SystemConfig, supervisor: Supervisor) -> Self {
        Self {
            system,
            supervisor,
            commands: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, command: Arc<dyn Command>) {
        if self
            .commands
            .insert(command.name().to_string(), command.clone())
            .is_some()
        {
            tracing::warn!("Command `{}` registered twice; keeping the latest", command.name());
        }
    }

    pub fn command_names(&self) -> impl Iterator<Item = &str> {
        self.commands.keys().map(String::as_str)
    }

    /// Split `body` into a lowercase command name and whitespace-separated arguments.
    pub fn parse(&self, body: &str) -> Option<(String, Vec<String>)> {
        let rest = body.trim().strip_prefix(self.system.command_prefix.as_str())?;
        let mut parts = rest.split_whitespace();
        let name = parts.next()?.to_lowercase();
        Some((name, parts.map(str::to_string).collect()))
    }

    pub async fn route(&self, connection: Arc<dyn Connection>, message: InboundMessage) -> Routed {
        let Some((name, args)) = self.parse(&message.body) else {
            return Routed::Ignored;
        };

        tracing::info!(
            "Router dispatching cmd='{}' args='{}' sender='{}'",
            name,
            args.join(" "),
            message.sender
        );

        let Some(command) = self.commands.get(&name).cloned() else {
            let dispatcher = self.supervisor.dispatcher();
            dispatcher
                .send_reply(connection.as_ref(), &message, messages::UNKNOWN_COMMAND, dispatcher.defaults())
                .await;
            return Routed::Unknown;
        };

        let detailed = self.system.is_admin(&message.sender);
        let invocation = CommandInvocation::new(name, command.module(), message, args).detailed(detailed);

        match self
            .supervisor
            .supervise(
                move |ctx| async move { command.execute(ctx).await },
                connection,
                invocation,
            )
            .await
        {
            Some(()) => Routed::Completed,
            None => Routed::Failed,
        }
    }
}
