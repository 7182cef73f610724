//! Server metrics for observability
//!
//! Transport-level counters; matchmaking counters come from the engine's
//! [`EngineStats`] and are folded into the snapshot by the handlers.

use pair_engine::EngineStats;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Server-wide metrics
#[derive(Debug, Default)]
pub struct ServerMetrics {
    // Connection metrics
    /// Currently open WebSocket connections
    pub active_connections: AtomicU64,
    /// Total connections since server start
    pub total_connections: AtomicU64,

    // Frame metrics
    /// Text frames received from clients
    pub frames_received: AtomicU64,
    /// Frames sent to clients
    pub frames_sent: AtomicU64,
    /// Frames that did not decode into a known event
    pub invalid_frames: AtomicU64,

    // Error metrics
    /// WebSocket transport errors
    pub websocket_errors: AtomicU64,
    /// Engine requests that failed (engine gone or duplicate id)
    pub engine_errors: AtomicU64,

    start_time: Option<Instant>,
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    pub fn connection_opened(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        self.total_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn frame_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frame_sent(&self) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn invalid_frame(&self) {
        self.invalid_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn websocket_error(&self) {
        self.websocket_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn engine_error(&self) {
        self.engine_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0)
    }

    /// Create a snapshot of all metrics, together with the engine's counters
    pub fn snapshot(&self, engine: EngineStats) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.uptime_secs(),
            connections: ConnectionMetrics {
                active: self.active_connections.load(Ordering::Relaxed),
                total: self.total_connections.load(Ordering::Relaxed),
            },
            frames: FrameMetrics {
                received: self.frames_received.load(Ordering::Relaxed),
                sent: self.frames_sent.load(Ordering::Relaxed),
                invalid: self.invalid_frames.load(Ordering::Relaxed),
            },
            errors: ErrorMetrics {
                websocket: self.websocket_errors.load(Ordering::Relaxed),
                engine: self.engine_errors.load(Ordering::Relaxed),
            },
            engine,
        }
    }
}

/// Serializable snapshot of metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub connections: ConnectionMetrics,
    pub frames: FrameMetrics,
    pub errors: ErrorMetrics,
    pub engine: EngineStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionMetrics {
    pub active: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameMetrics {
    pub received: u64,
    pub sent: u64,
    pub invalid: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorMetrics {
    pub websocket: u64,
    pub engine: u64,
}

/// Health status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub connections: u64,
    pub waiting: u64,
    pub active_pairs: u64,
    pub uptime_secs: u64,
}
