//! Event reactor singleton and interrupt registration
//!
//! One process-wide event loop, lazily created on first access and never
//! torn down. The model is single-threaded and cooperative: `dispatch`
//! parks the calling thread on the backing runtime, registered callbacks
//! run on that same thread, and a callback must not block indefinitely or
//! it starves every other registered event.
//!
//! The loop is backed by a current-thread tokio runtime with the I/O
//! driver enabled, which is what delivers signal events while `dispatch`
//! is parked.

use std::sync::OnceLock;

use tokio::runtime::{Builder, Runtime};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;
use tracing::debug;

use crate::{Error, Result};

static REACTOR: OnceLock<Reactor> = OnceLock::new();

/// Process-wide event loop instance.
///
/// All interrupt (and future pipe-readiness) registrations attach to this
/// one instance. Initialization is guarded by `OnceLock`, so concurrent
/// first accesses still produce a single instance; dispatching is meant to
/// happen from one thread.
#[derive(Debug)]
pub struct Reactor {
    runtime: Runtime,
    exit: Notify,
}

impl Reactor {
    /// Get the process-wide reactor, creating it on first access.
    ///
    /// The instance lives for the rest of the process. Two calls always
    /// return the same reference.
    pub fn global() -> &'static Reactor {
        REACTOR.get_or_init(|| {
            let runtime = Builder::new_current_thread()
                .enable_io()
                .build()
                .expect("Unable to create event loop runtime");
            Reactor {
                runtime,
                exit: Notify::new(),
            }
        })
    }

    /// Arm an interrupt (SIGINT) subscription.
    ///
    /// While `dispatch` is driving the loop, each delivered interrupt
    /// invokes `callback` on the reactor thread, strictly after this call
    /// returns and strictly before `dispatch` returns. The callback
    /// requests shutdown via [`Reactor::loopexit`].
    ///
    /// ## Errors
    ///
    /// Returns `Error::InterruptSetup` when the OS signal handler cannot
    /// be installed. Callers treat this as fatal to startup; there is no
    /// retry.
    pub fn register_interrupt<F>(&self, mut callback: F) -> Result<()>
    where
        F: FnMut() + Send + 'static,
    {
        let _guard = self.runtime.enter();
        let mut interrupts = signal(SignalKind::interrupt())
            .map_err(|e| Error::InterruptSetup(format!("Unable to install SIGINT handler: {e}")))?;

        self.runtime.spawn(async move {
            while interrupts.recv().await.is_some() {
                callback();
            }
        });

        debug!("Interrupt handler registered");
        Ok(())
    }

    /// Block the calling thread dispatching events until loop exit is
    /// requested.
    ///
    /// An in-flight callback finishes before the exit request is observed,
    /// so the loop stops after the current dispatch pass.
    pub fn dispatch(&self) {
        debug!("Dispatch loop running");
        self.runtime.block_on(self.exit.notified());
        debug!("Dispatch loop exited");
    }

    /// Request that the dispatch loop stop after the current pass.
    ///
    /// Called exactly once per shutdown. A request made before `dispatch`
    /// starts is remembered and ends the next dispatch immediately. No
    /// reactor API is called after the loop has exited.
    pub fn loopexit(&self) {
        self.exit.notify_one();
    }
}
