//! # stride
//!
//! The Stride application: HTTP API and CLI over `stride-core`.
//!
//! This is the only async, network-aware part of the workspace. The engine
//! itself stays synchronous; this crate adds the tokio timer that fires
//! deferred unlocks, the per-profile session registry, and configuration.

pub mod api;
pub mod cli;
pub mod config;
pub mod timer;
