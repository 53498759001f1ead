//! ragline-core
//!
//! Shared domain types, traits and configuration for the ragline workspace,
//! plus the two pieces of logic every retrieval mode relies on:
//! chunking (`chunker`) and result fusion (`fusion`).

pub mod chunker;
pub mod config;
pub mod error;
pub mod fusion;
pub mod traits;
pub mod types;
