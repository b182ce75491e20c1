//! # Application Layer
//!
//! Contains the delivery and supervision logic of the bot.
//! Classification, user messaging, retrying dispatch, statistics, supervision and routing.

pub mod classifier;
pub mod composer;
pub mod dispatcher;
pub mod policy;
pub mod router;
pub mod stats;
pub mod supervisor;

#[cfg(test)]
pub(crate) mod test_support;
