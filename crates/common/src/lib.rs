//! Common utilities and types shared across the chat gateway crates.

#![warn(clippy::pedantic)]

/// Module for JWT structural helpers (size limits, unverified header parsing)
pub mod jwt;
