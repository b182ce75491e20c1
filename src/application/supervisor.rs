//! # Command Supervisor
//!
//! Runs command handlers under a wall-clock timeout and turns every failure into a
//! best-effort report to the originating chat. Handler errors never escape: a failed
//! or timed-out command resolves to `None` after the report has been attempted.

use std::any::Any;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::application::classifier::categorize;
use crate::application::composer::compose_report;
use crate::application::dispatcher::{DeliveryOutcome, Dispatcher};
use crate::application::policy::{RetryPolicy, SendOptions};
use crate::domain::config::{SupervisorConfig, TimeoutAction};
use crate::domain::traits::Connection;
use crate::domain::types::{
    CommandInvocation, ErrorCategory, ErrorRecord, InboundMessage, OutboundContent, UNKNOWN_RECIPIENT,
};

/// Lifecycle of one supervised call. No state is revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Reported,
    ReportFailed,
}

#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    pub timeout: Duration,
    pub long_timeout: Duration,
    pub long_commands: HashSet<String>,
    pub on_timeout: TimeoutAction,
    /// Delivery options for error reports.
    pub report: SendOptions,
}

impl SupervisorSettings {
    pub fn timeout_for(&self, command: &str) -> Duration {
        if self.long_commands.contains(command) {
            self.long_timeout
        } else {
            self.timeout
        }
    }
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        SupervisorSettings::from(&SupervisorConfig::default())
    }
}

impl From<&SupervisorConfig> for SupervisorSettings {
    fn from(config: &SupervisorConfig) -> Self {
        Self {
            timeout: Duration::from_millis(config.timeout_ms),
            long_timeout: Duration::from_millis(config.long_timeout_ms),
            long_commands: config.long_commands.iter().cloned().collect(),
            on_timeout: config.on_timeout,
            report: SendOptions::new(RetryPolicy::from(&config.report)),
        }
    }
}

/// What a handler receives: the connection, a dispatcher to emit output, and its input.
#[derive(Clone)]
pub struct CommandContext {
    pub connection: Arc<dyn Connection>,
    pub dispatcher: Dispatcher,
    pub message: InboundMessage,
    pub args: Vec<String>,
    pub command: String,
    /// The sender is a configured administrator.
    pub is_admin: bool,
}

impl CommandContext {
    /// Reply to the triggering message with the dispatcher's default options.
    pub async fn reply(&self, text: &str) -> DeliveryOutcome {
        self.dispatcher
            .send_reply(self.connection.as_ref(), &self.message, text, self.dispatcher.defaults())
            .await
    }

    /// Send arbitrary content to the chat the command came from.
    pub async fn send(&self, content: &OutboundContent) -> DeliveryOutcome {
        self.dispatcher
            .send_message(
                self.connection.as_ref(),
                &self.message.recipient,
                content,
                self.dispatcher.defaults(),
            )
            .await
    }
}

/// Where to report a failure: the message's chat, else the connection's own
/// identity, else `UNKNOWN_RECIPIENT`.
pub fn resolve_recipient(message: &InboundMessage, connection: &dyn Connection) -> String {
    if !message.recipient.trim().is_empty() {
        return message.recipient.clone();
    }
    match connection.identity() {
        Some(identity) if !identity.trim().is_empty() => identity,
        _ => UNKNOWN_RECIPIENT.to_string(),
    }
}

#[derive(Clone)]
pub struct Supervisor {
    dispatcher: Dispatcher,
    settings: Arc<SupervisorSettings>,
}

impl Supervisor {
    pub fn new(dispatcher: Dispatcher, settings: SupervisorSettings) -> Self {
        Self {
            dispatcher,
            settings: Arc::new(settings),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn settings(&self) -> &SupervisorSettings {
        &self.settings
    }

    /// Run `handler` for `invocation`, returning its value on success.
    ///
    /// The handler runs as its own task and races the command's timeout. On timeout
    /// the task is aborted (`TimeoutAction::Abort`, effective at its next await point)
    /// or left running with its result discarded (`TimeoutAction::Detach`); in
    /// neither case is work the handler already started on other tasks reclaimed.
    ///
    /// Any failure (error, panic, timeout) is classified, composed into a user message
    /// and delivered once to the resolved recipient. Reporting problems are logged only.
    pub async fn supervise<T, F, Fut>(
        &self,
        handler: F,
        connection: Arc<dyn Connection>,
        invocation: CommandInvocation,
    ) -> Option<T>
    where
        F: FnOnce(CommandContext) -> Fut,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let mut state = InvocationState::Pending;
        let timeout = self.settings.timeout_for(&invocation.command);

        let ctx = CommandContext {
            connection: connection.clone(),
            dispatcher: self.dispatcher.clone(),
            message: invocation.message.clone(),
            args: invocation.args.clone(),
            command: invocation.command.clone(),
            is_admin: invocation.detailed,
        };

        let mut task = tokio::spawn(handler(ctx));
        transition(&invocation, &mut state, InvocationState::Running);

        let outcome = tokio::time::timeout(timeout, &mut task).await;
        let failure = match outcome {
            Ok(Ok(Ok(value))) => {
                transition(&invocation, &mut state, InvocationState::Succeeded);
                return Some(value);
            }
            Ok(Ok(Err(err))) => ErrorRecord::from(&err),
            Ok(Err(join_err)) => {
                let detail = if join_err.is_panic() {
                    panic_message(join_err.into_panic())
                } else {
                    join_err.to_string()
                };
                ErrorRecord::new(format!("handler panicked: {detail}"))
                    .with_trace(format!("Command `{}` panicked: {}", invocation.command, detail))
            }
            Err(_) => {
                match self.settings.on_timeout {
                    TimeoutAction::Abort => task.abort(),
                    TimeoutAction::Detach => drop(task),
                }
                let elapsed = timeout.as_millis();
                ErrorRecord::new(format!("timed out after {elapsed} ms"))
                    .with_trace(format!("Command `{}` timed out after {} ms", invocation.command, elapsed))
            }
        };

        transition(&invocation, &mut state, InvocationState::Failed);
        let reported = self.report(connection.as_ref(), &invocation, &failure).await;
        transition(&invocation, &mut state, reported);
        None
    }

    async fn report(
        &self,
        connection: &dyn Connection,
        invocation: &CommandInvocation,
        failure: &ErrorRecord,
    ) -> InvocationState {
        let category = categorize(failure);
        if category == ErrorCategory::Input {
            tracing::info!(
                "Command `{}` ({}) rejected input from {}: {}",
                invocation.command,
                invocation.module,
                invocation.message.sender,
                failure.message
            );
        } else {
            tracing::error!(
                "Command `{}` ({}) failed [{}]: {}",
                invocation.command,
                invocation.module,
                category,
                failure.trace.as_deref().unwrap_or(&failure.message)
            );
        }

        let recipient = resolve_recipient(&invocation.message, connection);
        if recipient == UNKNOWN_RECIPIENT {
            tracing::warn!(
                "No recipient for error report of `{}`; skipping",
                invocation.command
            );
            return InvocationState::ReportFailed;
        }

        let text = compose_report(failure, category, &invocation.command, invocation.detailed);
        match self
            .dispatcher
            .send_text(connection, &recipient, &text, &self.settings.report)
            .await
        {
            DeliveryOutcome::Delivered(_) => InvocationState::Reported,
            DeliveryOutcome::Failed(e) => {
                tracing::error!(
                    "Failed to report error of `{}` to {} ({} attempts): {}",
                    invocation.command,
                    recipient,
                    e.attempts(),
                    e
                );
                InvocationState::ReportFailed
            }
        }
    }
}

fn transition(invocation: &CommandInvocation, state: &mut InvocationState, next: InvocationState) {
    tracing::debug!(
        "Command `{}` ({}): {:?} -> {:?}",
        invocation.command,
        invocation.module,
        state,
        next
    );
    *state = next;
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::stats::StatsTracker;
    use crate::application::test_support::MockConnection;
    use crate::domain::types::UserError;
    use crate::strings::messages;
    use anyhow::Context;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn supervisor(settings: SupervisorSettings) -> Supervisor {
        let dispatcher = Dispatcher::new(Arc::new(StatsTracker::new()), SendOptions::default());
        Supervisor::new(dispatcher, settings)
    }

    fn settings(timeout_ms: u64) -> SupervisorSettings {
        SupervisorSettings {
            timeout: Duration::from_millis(timeout_ms),
            report: SendOptions::new(RetryPolicy::exponential(2, Duration::from_millis(100))),
            ..SupervisorSettings::default()
        }
    }

    fn invocation(command: &str, recipient: &str) -> CommandInvocation {
        let message = InboundMessage::new(recipient, "@alice:example.org", format!(".{command}"))
            .with_message_id("$trigger");
        CommandInvocation::new(command, "test", message, Vec::new())
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_returns_value() {
        let sup = supervisor(settings(1000));
        let conn = Arc::new(MockConnection::new());

        let result = sup
            .supervise(
                |ctx| async move { Ok::<_, anyhow::Error>(ctx.command.len()) },
                conn.clone(),
                invocation("ping", "!room:example.org"),
            )
            .await;

        assert_eq!(result, Some(4));
        assert_eq!(conn.send_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_user_error_reported_verbatim() {
        let sup = supervisor(settings(1000));
        let conn = Arc::new(MockConnection::new());

        let result: Option<()> = sup
            .supervise(
                |_ctx| async move { Err::<(), anyhow::Error>(UserError::new("Please provide a city").into()) },
                conn.clone(),
                invocation("weather", "!room:example.org"),
            )
            .await;

        assert_eq!(result, None);
        let sent = conn.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, "!room:example.org");
        assert_eq!(sent[0].content, OutboundContent::text("❌ Please provide a city"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_reports_once() {
        let sup = supervisor(settings(10_000));
        let conn = Arc::new(MockConnection::new());

        let result: Option<()> = sup
            .supervise(
                |_ctx| futures::future::pending(),
                conn.clone(),
                invocation("weather", "!room:example.org"),
            )
            .await;

        assert_eq!(result, None);
        let sent = conn.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].content, OutboundContent::text(messages::connection_failed("weather")));
    }

    async fn run_slow_handler(action: TimeoutAction) -> bool {
        let sup = supervisor(SupervisorSettings {
            on_timeout: action,
            ..settings(100)
        });
        let conn = Arc::new(MockConnection::new());
        let finished = Arc::new(AtomicBool::new(false));
        let flag = finished.clone();

        let result: Option<()> = sup
            .supervise(
                move |_ctx| async move {
                    tokio::time::sleep(Duration::from_secs(20)).await;
                    flag.store(true, Ordering::SeqCst);
                    Ok::<(), anyhow::Error>(())
                },
                conn.clone(),
                invocation("slow", "!room:example.org"),
            )
            .await;
        assert_eq!(result, None);

        tokio::time::sleep(Duration::from_secs(30)).await;
        finished.load(Ordering::SeqCst)
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_abort_stops_handler() {
        assert!(!run_slow_handler(TimeoutAction::Abort).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_detach_lets_handler_finish() {
        assert!(run_slow_handler(TimeoutAction::Detach).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_long_command_timeout() {
        let sup = supervisor(SupervisorSettings {
            long_timeout: Duration::from_secs(60),
            long_commands: ["build".to_string()].into_iter().collect(),
            ..settings(100)
        });
        assert_eq!(sup.settings().timeout_for("build"), Duration::from_secs(60));
        assert_eq!(sup.settings().timeout_for("ping"), Duration::from_millis(100));

        let conn = Arc::new(MockConnection::new());
        let result = sup
            .supervise(
                |_ctx| async move {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok::<_, anyhow::Error>("built")
                },
                conn.clone(),
                invocation("build", "!room:example.org"),
            )
            .await;
        assert_eq!(result, Some("built"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_handler_output_then_failure() {
        let sup = supervisor(settings(1000));
        let conn = Arc::new(MockConnection::new());

        let result: Option<()> = sup
            .supervise(
                |ctx| async move {
                    ctx.reply("working on it").await;
                    Err::<(), _>(anyhow::anyhow!("Connection timeout while trying to reach servers"))
                },
                conn.clone(),
                invocation("weather", "!room:example.org"),
            )
            .await;

        assert_eq!(result, None);
        let sent = conn.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].content.is_reply());
        match &sent[1].content {
            OutboundContent::Text(text) => {
                assert!(text.contains("weather"));
                assert!(!text.contains("Connection timeout"));
            }
            other => panic!("unexpected content {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_wrapped_error_classified_by_root_cause() {
        let sup = supervisor(settings(1000));
        let conn = Arc::new(MockConnection::new());

        let result: Option<()> = sup
            .supervise(
                |_ctx| async move {
                    Err::<(), _>(anyhow::anyhow!("Connection timeout while trying to reach servers"))
                        .context("fetching forecast")
                },
                conn.clone(),
                invocation("weather", "!room:example.org"),
            )
            .await;

        assert_eq!(result, None);
        assert_eq!(
            conn.sent()[0].content,
            OutboundContent::text(messages::connection_failed("weather"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_wrapped_user_error_shown_verbatim() {
        let sup = supervisor(settings(1000));
        let conn = Arc::new(MockConnection::new());

        let _: Option<()> = sup
            .supervise(
                |_ctx| async move {
                    Err::<(), anyhow::Error>(UserError::new("Please provide a city").into())
                        .context("parsing weather arguments")
                },
                conn.clone(),
                invocation("weather", "!room:example.org"),
            )
            .await;

        assert_eq!(conn.sent()[0].content, OutboundContent::text("❌ Please provide a city"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_context_send_targets_origin_chat() {
        let sup = supervisor(settings(1000));
        let conn = Arc::new(MockConnection::new());

        let result = sup
            .supervise(
                |ctx| async move {
                    let outcome = ctx.send(&OutboundContent::Notice("done".to_string())).await;
                    Ok::<_, anyhow::Error>(outcome.is_delivered())
                },
                conn.clone(),
                invocation("ping", "!room:example.org"),
            )
            .await;

        assert_eq!(result, Some(true));
        let sent = conn.sent();
        assert_eq!(sent[0].recipient, "!room:example.org");
        assert_eq!(sent[0].content, OutboundContent::Notice("done".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recipient_falls_back_to_identity() {
        let sup = supervisor(settings(1000));
        let conn = Arc::new(MockConnection::new().with_identity(Some("@bot:example.org")));

        let _: Option<()> = sup
            .supervise(
                |_ctx| async move { Err::<(), _>(anyhow::anyhow!("boom")) },
                conn.clone(),
                invocation("ping", ""),
            )
            .await;

        let sent = conn.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, "@bot:example.org");
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_recipient_skips_report() {
        let sup = supervisor(settings(1000));
        let conn = Arc::new(MockConnection::new().with_identity(None));

        let result: Option<()> = sup
            .supervise(
                |_ctx| async move { Err::<(), _>(anyhow::anyhow!("boom")) },
                conn.clone(),
                invocation("ping", ""),
            )
            .await;

        assert_eq!(result, None);
        assert_eq!(conn.send_count(), 0);
        assert_eq!(resolve_recipient(&invocation("ping", "").message, conn.as_ref()), UNKNOWN_RECIPIENT);
    }

    #[tokio::test(start_paused = true)]
    async fn test_broken_report_path_is_swallowed() {
        let sup = supervisor(settings(1000));
        let conn = Arc::new(MockConnection::failing("socket closed"));

        let result: Option<()> = sup
            .supervise(
                |_ctx| async move { Err::<(), _>(anyhow::anyhow!("boom")) },
                conn.clone(),
                invocation("ping", "!room:example.org"),
            )
            .await;

        assert_eq!(result, None);
        // report policy allows two retries
        assert_eq!(conn.send_count(), 3);
        let sent = conn.sent();
        assert_eq!((sent[1].at - sent[0].at).as_millis(), 100);
        assert_eq!((sent[2].at - sent[1].at).as_millis(), 200);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panic_is_reported() {
        let sup = supervisor(settings(1000));
        let conn = Arc::new(MockConnection::new());

        let result: Option<u32> = sup
            .supervise(
                |_ctx| async move {
                    let empty: Vec<u32> = Vec::new();
                    Ok::<_, anyhow::Error>(empty[3])
                },
                conn.clone(),
                invocation("ping", "!room:example.org"),
            )
            .await;

        assert_eq!(result, None);
        assert_eq!(
            conn.sent()[0].content,
            OutboundContent::text(messages::unknown_failure("ping"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_panic_ignores_keywords_in_command_name() {
        let sup = supervisor(settings(1000));

        for command in ["sticker", "upload", "login", "image", "file"] {
            let conn = Arc::new(MockConnection::new());
            let result: Option<u32> = sup
                .supervise(
                    |_ctx| async move {
                        let empty: Vec<u32> = Vec::new();
                        Ok::<_, anyhow::Error>(empty[3])
                    },
                    conn.clone(),
                    invocation(command, "!room:example.org"),
                )
                .await;

            assert_eq!(result, None);
            assert_eq!(
                conn.sent()[0].content,
                OutboundContent::text(messages::unknown_failure(command)),
                "{command}"
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_ignores_keywords_in_command_name() {
        let sup = supervisor(settings(100));
        let conn = Arc::new(MockConnection::new());

        let _: Option<()> = sup
            .supervise(
                |_ctx| futures::future::pending(),
                conn.clone(),
                invocation("upload", "!room:example.org"),
            )
            .await;

        assert_eq!(
            conn.sent()[0].content,
            OutboundContent::text(messages::connection_failed("upload"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_detailed_report_includes_trace() {
        let sup = supervisor(settings(1000));
        let conn = Arc::new(MockConnection::new());

        let _: Option<()> = sup
            .supervise(
                |_ctx| async move { Err::<(), _>(anyhow::anyhow!("disk quota exhausted")) },
                conn.clone(),
                invocation("ping", "!room:example.org").detailed(true),
            )
            .await;

        match &conn.sent()[0].content {
            OutboundContent::Text(text) => assert!(text.contains("disk quota exhausted")),
            other => panic!("unexpected content {other:?}"),
        }
    }
}
