//! Built-in models, driving sessions and the command line front end of
//! SimHub.
//!
//! The simulation machinery itself lives in [`simhub_core`]. This crate adds
//! what a running process needs on top of it:
//!
//! - [`models`]: the models every process registers at startup
//! - [`session`]: client-side scheduling loops that drive simulators to
//!   completion, one at a time or concurrently
//! - [`simulations`]: prebuilt scenarios
//! - [`cli`]: argument parsing and logging setup for the binary

pub mod cli;
pub mod models;
pub mod session;
pub mod simulations;
