//! Core types and trait definitions for the Velo bike-share warehouse.
//!
//! This crate has no HTTP, database, or logging dependencies. Every other
//! crate depends on it: the feed adapters map raw snapshots into the
//! canonical types defined here, the store backends implement the traits in
//! [`store`], and the pipeline drives both.

pub mod city;
pub mod error;
pub mod resolver;
pub mod source;
pub mod station;
pub mod store;
pub mod warehouse;

pub use error::{Error, MappingError, ResolutionWarning, Result};
