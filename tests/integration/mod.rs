//! Integration tests module
//!
//! This module organizes all integration tests for the ytmd-bridge application.

// Import individual test modules
pub mod config_test;
pub mod pipeline_test;
pub mod scrobble_flow_test;
