//! # Statistics Command
//!
//! Handles `.stats` (show delivery counters) and `.stats reset` (admins only).

use anyhow::Result;
use async_trait::async_trait;

use crate::application::router::Command;
use crate::application::supervisor::CommandContext;
use crate::domain::types::UserError;
use crate::strings::messages;

pub struct StatsCommand;

#[async_trait]
impl Command for StatsCommand {
    fn name(&self) -> &'static str {
        "stats"
    }

    fn module(&self) -> &'static str {
        "admin"
    }

    async fn execute(&self, ctx: CommandContext) -> Result<()> {
        let stats = ctx.dispatcher.stats().clone();

        match ctx.args.first().map(String::as_str) {
            Some("reset") => {
                if !ctx.is_admin {
                    return Err(UserError::new(messages::ADMIN_ONLY).into());
                }
                stats.reset();
                tracing::info!("Delivery statistics reset by {}", ctx.message.sender);
                ctx.reply(messages::STATS_RESET).await;
            }
            Some(other) => {
                return Err(UserError::new(format!("Unknown option `{other}`. Usage: `.stats [reset]`")).into());
            }
            None => {
                // Snapshot before replying so the reply's own attempt isn't counted.
                let snap = stats.snapshot();
                tracing::info!("Delivery statistics: {}", snap);
                let text = messages::stats_summary(
                    snap.sent,
                    snap.errors,
                    snap.retries,
                    snap.successful_retries,
                    snap.success_rate,
                    snap.retry_success_rate,
                );
                ctx.reply(&text).await;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::dispatcher::Dispatcher;
    use crate::application::policy::SendOptions;
    use crate::application::router::{CommandRouter, Routed};
    use crate::application::stats::StatsTracker;
    use crate::application::supervisor::{Supervisor, SupervisorSettings};
    use crate::application::test_support::MockConnection;
    use crate::domain::config::SystemConfig;
    use crate::domain::types::{InboundMessage, OutboundContent};
    use crate::interface::commands::register_builtin;
    use std::sync::Arc;

    fn router(stats: Arc<StatsTracker>) -> CommandRouter {
        let dispatcher = Dispatcher::new(stats, SendOptions::default());
        let supervisor = Supervisor::new(dispatcher, SupervisorSettings::default());
        let system = SystemConfig {
            command_prefix: ".".to_string(),
            admin: vec!["@admin:example.org".to_string()],
        };
        let mut router = CommandRouter::new(system, supervisor);
        register_builtin(&mut router);
        router
    }

    fn message(sender: &str, body: &str) -> InboundMessage {
        InboundMessage::new("!room:example.org", sender, body).with_message_id("$trigger")
    }

    fn body(content: &OutboundContent) -> &str {
        match content {
            OutboundContent::Text(b) | OutboundContent::Reply { body: b, .. } => b,
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats_shows_counters() {
        let stats = Arc::new(StatsTracker::new());
        let r = router(stats.clone());
        let conn = Arc::new(MockConnection::new());

        r.route(conn.clone(), message("@alice:example.org", ".ping")).await;
        r.route(conn.clone(), message("@alice:example.org", ".stats")).await;

        let sent = conn.sent();
        assert_eq!(body(&sent[0].content), messages::PONG);
        assert!(body(&sent[1].content).contains("Attempts: 1"));
        assert_eq!(stats.snapshot().sent, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_requires_admin() {
        let stats = Arc::new(StatsTracker::new());
        let r = router(stats.clone());
        let conn = Arc::new(MockConnection::new());

        r.route(conn.clone(), message("@alice:example.org", ".ping")).await;
        let routed = r.route(conn.clone(), message("@alice:example.org", ".stats reset")).await;
        assert_eq!(routed, Routed::Failed);
        assert_eq!(body(&conn.sent()[1].content), format!("❌ {}", messages::ADMIN_ONLY));
        assert!(stats.snapshot().sent > 0);

        let routed = r.route(conn.clone(), message("@admin:example.org", ".stats reset")).await;
        assert_eq!(routed, Routed::Completed);
        // only the confirmation reply remains
        assert_eq!(stats.snapshot().sent, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_echo_requires_text() {
        let r = router(Arc::new(StatsTracker::new()));
        let conn = Arc::new(MockConnection::new());

        assert_eq!(r.route(conn.clone(), message("@alice:example.org", ".echo")).await, Routed::Failed);
        assert_eq!(body(&conn.sent()[0].content), format!("❌ {}", messages::ECHO_USAGE));

        assert_eq!(
            r.route(conn.clone(), message("@alice:example.org", ".echo hi  there")).await,
            Routed::Completed
        );
        assert_eq!(body(&conn.sent()[1].content), messages::echo("hi there"));
    }
}
