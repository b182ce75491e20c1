//! # Relay
//!
//! Resilient delivery and command supervision for a chat bot:
//! - Domain: configuration, the `Connection` seam, message and error types
//! - Application: classifier, composer, dispatcher, statistics, supervisor, router
//! - Infrastructure: the Matrix `Connection` adapter
//! - Interface: built-in command handlers
//!

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod interface;
pub mod strings;
