//! Integration Tests Module
//!
//! End-to-end tests for the review engine: orchestrator execution across
//! both run modes, cache/staleness behavior, retry bounds, and the gating
//! decision matrix.

// Shared harness, mock provider, and recording transport
mod common;

// Orchestrator execution, caching, and retry tests
mod orchestrator_test;
