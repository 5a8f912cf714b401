//! `hammer_client`
//!
//! Runtime around the core game:
//! - Session ownership and the per-frame tick
//! - Console commands standing in for the throw button
//! - Simulated camera and face detector for headless play

pub mod input;
pub mod session;
pub mod simulated;

pub use session::GameSession;
