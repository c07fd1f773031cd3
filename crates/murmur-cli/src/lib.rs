//! Terminal chat client for Murmur.
//!
//! A thin shell over [`murmur_client::ChatClient`]: stdin lines become
//! commands, the websocket transport executes client actions, and store
//! subscriptions render the conversation to stdout.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod command;
pub mod render;
pub mod runtime;

pub use command::{Command, CommandError};
pub use runtime::{Runtime, RuntimeConfig, RuntimeError};
