//! # Application State Management
//!
//! This module holds everything the HTTP request handlers share. Most of it is
//! built once at startup and never changes: the configuration, the call-step resolver
//! (question bank + participant store) and the voice API client. The only mutable
//! part is the request metrics map, updated by middleware on every request.
//!
//! Note that no survey progress lives here. Each webhook invocation reads and writes
//! the participant store, so any worker thread (or any server process) can handle
//! any step of any call.
//!
//! ## Key Rust Concepts:
//!
//! ### Arc (Atomically Reference Counted)
//! - **Purpose**: Allows multiple parts of the program to safely share ownership of data
//! - **Why needed**: Every actix worker gets its own clone of `AppState`
//!
//! ### Arc<T> vs Arc<RwLock<T>>
//! - **Arc<T>**: Shared and read-only, used for config, resolver and API client
//! - **Arc<RwLock<T>>**: Shared and mutable, only needed for the metrics

use crate::config::AppConfig;
use crate::resolver::CallStepResolver;
use crate::voice_api::VoiceApiClient;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

/// The main application state that's shared across all HTTP request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration, fixed for the lifetime of the process
    pub config: Arc<AppConfig>,

    /// Survey state machine; owns the question bank and the participant store
    pub resolver: Arc<CallStepResolver>,

    /// Client for proxying recordings from the voice platform
    pub voice_api: Arc<VoiceApiClient>,

    /// Request metrics (updated by middleware on every request)
    pub metrics: Arc<RwLock<AppMetrics>>,

    /// When the server started
    pub start_time: Instant,
}

/// Request metrics collected across all HTTP requests.
///
/// ## Why these metrics matter:
/// - **request_count**: Total requests processed (for load monitoring)
/// - **error_count**: Total errors (for reliability monitoring)
/// - **endpoint_metrics**: Per-endpoint statistics (for spotting slow store queries)
#[derive(Debug, Default, Clone)]
pub struct AppMetrics {
    /// Total number of HTTP requests processed since server start
    pub request_count: u64,

    /// Total number of 4xx/5xx responses since server start
    pub error_count: u64,

    /// Key: endpoint name (e.g., "POST /callStep")
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

/// Detailed performance metrics for a specific API endpoint.
#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    /// Number of requests to this specific endpoint
    pub request_count: u64,

    /// Total time spent processing all requests to this endpoint (milliseconds)
    pub total_duration_ms: u64,

    /// Number of errors that occurred for this endpoint
    pub error_count: u64,
}

impl AppState {
    /// Create a new AppState from the startup-built components.
    pub fn new(config: AppConfig, resolver: CallStepResolver, voice_api: VoiceApiClient) -> Self {
        Self {
            config: Arc::new(config),
            resolver: Arc::new(resolver),
            voice_api: Arc::new(voice_api),
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            start_time: Instant::now(),
        }
    }

    /// Increment the total request counter (called by middleware for every request).
    ///
    /// ## Thread Safety:
    /// A poisoned lock only means another thread panicked mid-update; the counters
    /// are still usable, so we recover the guard instead of propagating the panic.
    pub fn increment_request_count(&self) {
        let mut metrics = self.metrics.write().unwrap_or_else(|e| e.into_inner());
        metrics.request_count += 1;
    }

    /// Increment the total error counter (called when any request fails).
    pub fn increment_error_count(&self) {
        let mut metrics = self.metrics.write().unwrap_or_else(|e| e.into_inner());
        metrics.error_count += 1;
    }

    /// Record detailed metrics for a specific endpoint.
    ///
    /// ## HashMap operations:
    /// The first time we see an endpoint, we create a new EndpointMetric with default values.
    /// Subsequent requests update the existing metrics for that endpoint.
    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        let mut metrics = self.metrics.write().unwrap_or_else(|e| e.into_inner());

        let endpoint_metric = metrics.endpoint_metrics.entry(endpoint.to_string()).or_default();
        endpoint_metric.request_count += 1;
        endpoint_metric.total_duration_ms += duration_ms;

        if is_error {
            endpoint_metric.error_count += 1;
        }
    }

    /// Get a snapshot of current metrics (used for the /metrics endpoint).
    ///
    /// ## Why a snapshot:
    /// Cloning releases the lock immediately, so we don't hold it while the
    /// HTTP response is serialized.
    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        self.metrics.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl EndpointMetric {
    /// Average response time for this endpoint (0.0 before the first request).
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0
        }
    }

    /// Error rate for this endpoint, from 0.0 (no errors) to 1.0 (every request failed).
    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}
