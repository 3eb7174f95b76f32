//! Floop activation server
//!
//! Serves the behavior graph's spreading-activation snapshots over HTTP
//! to the electric-mode visualization. The library surface exists so
//! integration tests can drive the router directly; the `floop-server`
//! binary wires it to a store and a ctrl-c cancellation signal.

pub mod page;
pub mod server;

pub use server::{build_router, start, AppState, ServerHandle};
