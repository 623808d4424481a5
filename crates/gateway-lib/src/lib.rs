//! Core library for the prediction gateway
//!
//! This crate provides the gateway between the financial chat service
//! and its prediction backends:
//! - Request fingerprinting and coalescing
//! - Tiered result caching (local LRU + external L2/L3 tiers)
//! - Backend routing with per-backend circuit breakers
//! - Result validation (bounds, history cross-reference, budget)
//! - Audit recording, health checks, and observability

pub mod audit;
pub mod backend;
pub mod cache;
pub mod coalesce;
pub mod error;
pub mod fingerprint;
pub mod gateway;
pub mod health;
pub mod models;
pub mod observability;
pub mod router;
pub mod validator;

pub use error::{BackendError, GatewayError};
pub use fingerprint::{Fingerprint, Fingerprinter};
pub use gateway::PredictionGateway;
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{GatewayMetrics, StructuredLogger};
