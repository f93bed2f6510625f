// Thin re-export module: implementation is in `blockchain/core.rs`, split into
// proof-of-work, block, chain and validation submodules.

pub mod core;
pub use core::*;
