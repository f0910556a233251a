//! Core functionality for the procpipe project
//!
//! Child-process spawning with piped standard streams, plus the
//! event-driven main loop the daemon runs: pipe triple allocation, process
//! launch and handle lifecycle, and the reactor singleton with interrupt
//! registration.

pub mod error;
#[cfg(unix)]
pub mod pipes;
#[cfg(unix)]
pub mod process;
#[cfg(unix)]
pub mod reactor;


pub use error::{Error, Result};
#[cfg(unix)]
pub use pipes::{allocate_pipes, Pipe, PipeReader, PipeTriple, PipeWriter};
#[cfg(unix)]
pub use process::unix::{spawn, ProcessHandle};
#[cfg(unix)]
pub use reactor::Reactor;

/// Core utilities and helper functions
pub mod utils {
    use tracing::info;

    /// Initialize tracing for the application
    pub fn init_tracing(level: &str) -> crate::Result<()> {
        use tracing_subscriber::{fmt, EnvFilter};

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

        fmt()
            .with_env_filter(filter)
            .try_init()
            .map_err(|e| crate::Error::Initialization(e.to_string()))?;

        info!("Tracing initialized with level: {}", level);
        Ok(())
    }
}
