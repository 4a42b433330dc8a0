//! Core utilities for the NR MAC scheduler
//!
//! This crate provides fundamental types used across the scheduler crates:
//! - SlotPoint for NR slot timing
//! - DuplexConfig and the duplex oracle for TDD/FDD slot queries
//! - Direction for DL/UL selection
//! - Logging setup and debug macros

pub mod debug;
pub mod direction;
pub mod duplex;
pub mod slot_point;

// Re-export commonly used items
pub use direction::Direction;
pub use duplex::{DuplexConfig, SymbolKind, TddPattern};
pub use slot_point::SlotPoint;

/// Radio Network Temporary Identifier, the per-UE MAC address
pub type Rnti = u16;

/// Processing pipeline depth of the gNB, in slots. The PDCCH slot being scheduled
/// lies this many slots ahead of the slot currently being received.
pub const TX_ENB_DELAY: u32 = 4;

/// Number of component carriers a UE may be configured with
pub const MAX_CARRIERS: usize = 4;

/// Upper bound on HARQ processes per direction and carrier
pub const MAX_HARQ: usize = 16;

/// Number of OFDM symbols in a slot (normal cyclic prefix)
pub const NOF_SYMBOLS_PER_SLOT: u32 = 14;
