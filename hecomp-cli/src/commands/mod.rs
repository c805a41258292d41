//! Command implementations for the hecomp CLI.

pub mod info;
pub mod transcode;

pub use info::cmd_info;
pub use transcode::{Operation, cmd_transcode};
