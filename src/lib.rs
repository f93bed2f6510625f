//! RelayChain - A small proof-of-work ledger replicated across a fixed cluster
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Core Blockchain
//! - [`blockchain`] - Blocks, proof-of-work, validation and the chain itself
//! - [`transaction`] - Opaque sender/recipient/data records
//! - [`merkle`] - Hash tree used as the aggregator for blocks and the chain
//!
//! ## Networking
//! - [`network`] - RPC messages, frame codec and outbound peer connections
//! - [`sync`] - Broadcast of blocks and transactions to every peer
//!
//! ## Node
//! - [`node`] - Ledger ownership, RPC handlers and the integrity sweep
//!
//! ## Configuration & Utilities
//! - [`config`] - Tunables and cluster membership
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Core Blockchain
// ============================================================================
pub mod blockchain;
pub mod merkle;
pub mod transaction;

// ============================================================================
// Networking
// ============================================================================
pub mod network;
pub mod sync;

// ============================================================================
// Node
// ============================================================================
pub mod node;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;
