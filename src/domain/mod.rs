//! # Domain Layer
//!
//! Core definitions, types, and traits shared by the delivery and supervision layer.
//! Independent of the Matrix SDK, serving as the contract for the other layers.

pub mod config;
pub mod traits;
pub mod types;
