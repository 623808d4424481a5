//! Prediction Gateway - prediction-serving gateway service
//!
//! Sits between the financial chat service and its prediction backends,
//! coalescing duplicate requests, serving the tiered cache, routing to
//! the right backend, and validating results before returning them.

use anyhow::Result;
use gateway_lib::{
    audit::LogSink,
    backend::BackendRegistry,
    cache::{CacheConfig, CacheManager, MemoryTier},
    health::{components, HealthRegistry},
    router::{BackendRouter, BreakerConfig, RouteTable},
    validator::{ResultValidator, ValidatorConfig},
    GatewayMetrics, PredictionGateway, StructuredLogger,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod adapters;
mod api;
mod config;

const GATEWAY_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting prediction-gateway");

    // Load configuration
    let config = config::GatewayConfig::load()?;
    info!(instance = %config.instance_name, "Gateway configured");

    // Initialize health registry
    let health_registry = HealthRegistry::new();
    health_registry.register(components::CACHE).await;
    health_registry.register(components::ROUTER).await;
    health_registry.register(components::BACKENDS).await;
    health_registry.register(components::VALIDATOR).await;
    health_registry.register(components::AUDIT).await;

    // Initialize metrics
    let metrics = GatewayMetrics::new();

    // Initialize structured logger
    let logger = StructuredLogger::new(&config.instance_name);
    logger.log_startup(GATEWAY_VERSION);

    // Tiered cache. The in-memory tiers stand in for the deployment's
    // Redis (L2) and durable store (L3) TierClient implementations.
    let cache = Arc::new(CacheManager::new(
        CacheConfig {
            l1_capacity: config.l1_capacity,
            l1_ttl: Duration::from_secs(config.l1_ttl_secs),
            l2_ttl: Duration::from_secs(config.l2_ttl_secs),
            l3_ttl: Duration::from_secs(config.l3_ttl_secs),
        },
        Some(Arc::new(MemoryTier::new())),
        Some(Arc::new(MemoryTier::new())),
    ));

    // Router with per-backend circuit breakers
    let router = Arc::new(BackendRouter::new(
        RouteTable::standard(),
        BreakerConfig {
            failure_threshold: config.breaker_failure_threshold,
            cooldown: Duration::from_secs(config.breaker_cooldown_secs),
        },
    ));

    // Backend adapters
    let backend_timeout = Duration::from_secs(config.backend_timeout_secs);
    let mut registry = BackendRegistry::new();
    for (id, endpoint) in config.backend_endpoints() {
        match adapters::HttpBackend::new(id, endpoint, backend_timeout) {
            Ok(adapter) => {
                registry.register_with(Arc::new(adapter), backend_timeout, config.backend_concurrency);
                info!(backend = %id, endpoint = %endpoint, "Backend registered");
            }
            Err(e) => {
                warn!(backend = %id, error = %e, "Skipping backend, adapter construction failed");
            }
        }
    }
    if registry.ids().is_empty() {
        health_registry
            .set_unhealthy(components::BACKENDS, "No backends registered")
            .await;
    }

    // Result validator
    let validator = Arc::new(ResultValidator::new(ValidatorConfig {
        daily_budget: config.validation_daily_budget,
        history_window: Duration::from_secs(24 * 60 * 60),
    }));

    // Gateway orchestrator with the structured-log audit sink
    let gateway = PredictionGateway::new(
        cache,
        router,
        Arc::new(registry),
        validator,
        Arc::new(LogSink),
        logger.clone(),
    );

    // Create shared application state
    let app_state = Arc::new(api::AppState::new(
        gateway,
        health_registry.clone(),
        metrics.clone(),
    ));

    // Mark gateway as ready after initialization
    health_registry.set_ready(true).await;

    // Start the API server
    let _api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");
    info!("Shutting down");

    Ok(())
}
