//! Marshalling Integration Tests
//!
//! Tests for the shared conversion path:
//! - Transcoder lookup cache coherence under registration churn
//! - Id-keyed encoders and wrappers
//! - Typed marshalling of bean entries
//! - Time value normalization

#[path = "../common/mod.rs"]
mod common;

mod coherence;
mod encoders;
mod marshaller;
