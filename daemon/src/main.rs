//! procpipe daemon binary
//!
//! Runs the event loop until an interrupt requests a clean shutdown.

#![allow(unused_crate_dependencies)]

use std::process::ExitCode;

use procpipe_core::reactor::Reactor;
use tracing::{error, info};

fn main() -> ExitCode {
    // Initialize logging
    if let Err(e) = procpipe_core::utils::init_tracing("info") {
        eprintln!("Unable to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    // Setup interrupt handler.
    let reactor = Reactor::global();
    if let Err(e) = reactor.register_interrupt(|| {
        info!("Interrupted - shutting down");
        Reactor::global().loopexit();
    }) {
        error!("Unable to setup interrupt handler: {}", e);
        return ExitCode::FAILURE;
    }

    // Dispatch our main loop.
    info!("Entering main loop");
    reactor.dispatch();

    ExitCode::SUCCESS
}
