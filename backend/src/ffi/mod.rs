//! Python bindings for order-issuing collaborators
//!
//! Enabled with the `pyo3` feature. The bindings are a thin layer over
//! [`crate::gateway::OrderGateway`]; all validation happens in Rust.

pub mod gateway;
