//! Download queue orchestrator for a music library backend.
//!
//! Tracks are enqueued into a shared store; a scheduler admits them FIFO under
//! a concurrency bound and drives each one against the backend (submit plus a
//! server-sent-event progress stream), with one quality-tier fallback.

pub mod api;
pub mod auth;
pub mod config;
pub mod control;
pub mod driver;
pub mod error;
pub mod logging;
pub mod notify;
pub mod orchestrator;
pub mod quality;
pub mod scheduler;
pub mod store;
pub mod track;

pub use orchestrator::{Orchestrator, Settings};
