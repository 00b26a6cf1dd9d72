//! Common types and utilities for the vesper JavaScript engine front end.
//!
//! This crate provides foundational types used across the front-end crates:
//! - String interning (`Atom`, `Interner`)
//! - Centralized limits and thresholds

// String interning for identifier deduplication
pub mod interner;
pub use interner::{Atom, Interner};

// Centralized limits and thresholds
pub mod limits;
