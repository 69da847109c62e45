// Signal handling module
//
// Only the interrupt signal (Ctrl+C / SIGINT) is handled; it starts the
// ordered shutdown. Registration happens before startup so a failure is fatal.

use crate::logger;

pub struct InterruptSignal {
    #[cfg(unix)]
    inner: tokio::signal::unix::Signal,
}

impl InterruptSignal {
    #[cfg(unix)]
    pub fn register() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            inner: signal(SignalKind::interrupt())?,
        })
    }

    #[cfg(not(unix))]
    pub fn register() -> std::io::Result<Self> {
        Ok(Self {})
    }

    /// Block until the interrupt arrives
    #[cfg(unix)]
    pub async fn recv(&mut self) {
        self.inner.recv().await;
        logger::log_info("[SIGNAL] Interrupt received, stopping the server...");
    }

    #[cfg(not(unix))]
    pub async fn recv(&mut self) {
        match tokio::signal::ctrl_c().await {
            Ok(()) => logger::log_info("[SIGNAL] Ctrl+C received, stopping the server..."),
            Err(e) => logger::log_error(&format!("[SIGNAL] Failed to wait for Ctrl+C: {e}")),
        }
    }
}
