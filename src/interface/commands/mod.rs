//! # Command Handlers
//!
//! Contains the built-in command handlers (e.g., .help, .ping, .stats).
//! These handlers are registered with the Router and run under the Supervisor.

pub mod help;
pub mod misc;
pub mod stats;

use std::sync::Arc;

use crate::application::router::CommandRouter;

/// Register every built-in command with `router`.
pub fn register_builtin(router: &mut CommandRouter) {
    router.register(Arc::new(help::HelpCommand));
    router.register(Arc::new(misc::PingCommand));
    router.register(Arc::new(misc::EchoCommand));
    router.register(Arc::new(stats::StatsCommand));
}
