//! Integration test utilities for the gateway client
//!
//! This crate provides an in-process mock gateway: an HTTP endpoint-index
//! route and a WebSocket route whose connections are driven by the test.

pub mod mock_gateway;

pub use mock_gateway::*;
