//! Blood pressure prediction gateway: HTTP API and configuration

pub mod api;
pub mod config;
