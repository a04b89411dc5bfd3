//! I/O helpers for setup commands.

pub mod config;
pub mod init;
pub mod layout;
pub mod process;
pub mod run_log;
pub mod shell;
