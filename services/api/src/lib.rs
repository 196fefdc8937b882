//! services/api/src/lib.rs
//!
//! The stories service: configuration, adapters for the core ports and the
//! HTTP/WebSocket surface.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
