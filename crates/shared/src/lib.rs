//! ChatDesk Shared Types and Utilities
//!
//! This crate contains the domain types and database utilities shared
//! across the ChatDesk live-chat platform.

pub mod db;
pub mod types;

pub use db::*;
pub use types::*;
