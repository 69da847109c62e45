// Server module entry point
// Listener setup, TLS, the two background servers and their supervisor

mod https;
mod listener;
mod rpc;
mod signal;
mod supervisor;
#[cfg(test)]
mod testing;
mod tls;

pub use supervisor::run;
pub use supervisor::StartupError;
