//! Process launch utilities for the procpipe core library
//!
//! This module provides platform-specific launchers that create a child
//! process with its standard input, output, and error streams redirected
//! through pipes owned by the caller.
//!
//! ## Platform Support
//!
//! - **Unix**: full pipe and spawn lifecycle (the canonical contract)
//! - **Windows**: pending (Job Object-based lifecycle)
//!
//! ## Safety
//!
//! The implementations prioritize leak-free handle management by:
//! - Creating all six pipe endpoints before the process exists
//! - Closing child-side endpoints in the parent as soon as the child owns
//!   its copies
//! - Tying every retained endpoint to the `ProcessHandle` so no exit path
//!   leaves a descriptor open

#[cfg(unix)]
pub mod unix;

#[cfg(unix)]
pub use unix::*;
