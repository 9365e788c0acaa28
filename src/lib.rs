//! longshot-ingest: Kalshi market and trade ingestion into Parquet
//!
//! This library provides the core components for:
//! - RSA-PSS request signing and an authenticated, rate-limited API client
//! - Cursor pagination that never holds more than one page
//! - Bounded per-market fan-out with per-market failure isolation
//! - Page-at-a-time Parquet writing and batch-wise re-reading
//! - Point-in-time snapshots of the markets open at an instant
//! - Logging and Prometheus metrics

pub mod api;
pub mod cli;
pub mod config;
pub mod ingest;
pub mod storage;
pub mod telemetry;
