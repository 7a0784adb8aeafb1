//! Shared types and configuration for the quarry analytics runtime.
//!
//! - **Values**: the transport-neutral row value union (`value`).
//! - **Models**: wire request/response types for every API operation
//!   (`models`).
//! - **Configuration**: engine DSN parsing (`config`).
//! - **Telemetry**: tracing setup (`telemetry`).
pub mod config;
pub mod models;
pub mod telemetry;
pub mod value;

pub use value::{Interval, Value};
