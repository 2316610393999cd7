//! Gymwatch Library
//!
//! Live gym-floor dashboard fed by edge sensors over MQTT
//!
//! ## Architecture
//!
//! 1. Transport - Broker connection (rumqttc over WebSocket/TLS/TCP)
//! 2. ReconnectSupervisor - Bounded fixed-delay reconnect policy
//! 3. IngestService - Connection loop, liveness sweep, operator commands
//! 4. Classifier - Topic routing and payload decoding
//! 5. Aggregates - Occupancy, zone activity, presence, alarms, layout, sensors
//! 6. DashboardController - Applies events, persists snapshots, fans out
//! 7. SnapshotStore - Warm-start cache for aggregates
//! 8. ActivityStore / Forwarder - Deduplicated activity persistence
//! 9. RealtimeHub - WebSocket distribution
//! 10. AuditLog - Client event log and deployment history
//! 11. WebAPI - REST API endpoints
//!
//! ## Data flow
//!
//! Transport → IngestService → Classifier → DashboardController
//! → (Aggregates, SnapshotStore, Forwarder, RealtimeHub)

pub mod activity_store;
pub mod aggregates;
pub mod audit_log;
pub mod classifier;
pub mod controller;
pub mod error;
pub mod forwarder;
pub mod ingest_service;
pub mod models;
pub mod realtime_hub;
pub mod reconnect_supervisor;
pub mod snapshot_store;
pub mod state;
pub mod transport;
pub mod web_api;

pub use error::{Error, Result};
pub use state::AppState;
