//! Command handlers.

pub mod init;
pub mod misc;
pub mod passfiles;
