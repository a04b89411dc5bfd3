//! Idempotent project environment setup.
//!
//! The crate prepares a working environment for a Python project that
//! depends on a compiled toolkit: it resolves a package manager, creates and
//! populates a virtual environment, activates it, builds the toolkit and sources
//! its environment scripts. Every step is idempotent and threads an explicit
//! [`core::env_state::EnvironmentState`] instead of mutating the process
//! environment.
//!
//! - **[`core`]**: Pure logic (environment state, step outcomes, env dumps,
//!   export scripts). No I/O.
//! - **[`io`]**: Side effects (configuration, layout, process execution,
//!   shell sourcing, run logs).
//!
//! [`steps`] implements the individual setup steps, [`pipeline`] runs them in
//! order, [`plan`] assembles the concrete pipelines from configuration and
//! [`session`] runs one of them and records the run.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod pipeline;
pub mod plan;
pub mod session;
pub mod steps;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
