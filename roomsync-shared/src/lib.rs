#![cfg_attr(not(test), forbid(unsafe_code))]

//! Shared data model and configuration for the roomsync core.
//!
//! Everything here is plain data: the message log entry and its payload sum
//! type, the derived room summary, the pure SLA classifier, and the layered
//! configuration loader. The live machinery (store adapter, aggregator,
//! dispatcher) lives in the `engine` crate.

pub mod config;
pub mod models;
