use nr_core::MAX_CARRIERS;
use thiserror::Error;

/// Reasons a scheduler or UE configuration is rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CfgErr {
    #[error("no cells configured")]
    NoCells,

    #[error("cell at position {idx} carries cc index {cc}")]
    CcMismatch { idx: usize, cc: usize },

    #[error("cc {0} exceeds the maximum of {MAX_CARRIERS} carriers")]
    CcOutOfRange(usize),

    #[error("cell {cc}: invalid number of PRBs {nof_prb}")]
    InvalidNofPrb { cc: usize, nof_prb: u32 },

    #[error("cell {cc}: numerology {mu} not supported")]
    InvalidNumerology { cc: usize, mu: u8 },

    #[error("cell {cc}: invalid duplex configuration: {reason}")]
    InvalidDuplex { cc: usize, reason: &'static str },

    #[error("cell {cc}: no bandwidth part configured")]
    NoBwp { cc: usize },

    #[error("cell {cc} bwp {bwp_id}: {reason}")]
    InvalidBwp { cc: usize, bwp_id: u32, reason: &'static str },

    #[error("invalid scheduler arguments: {0}")]
    InvalidSchedArgs(&'static str),

    #[error("empty dl-DataToUL-ACK (k1) table")]
    EmptyK1Table,

    #[error("k1 table holds {0} entries, at most 8 allowed")]
    K1TableTooLong(usize),

    #[error("k1 value {0} exceeds 15 slots")]
    InvalidK1(u32),

    #[error("empty PUSCH time-domain allocation (k2) list")]
    EmptyK2Table,

    #[error("k2 value {0} exceeds 32 slots")]
    InvalidK2(u32),

    #[error("carrier {0} configured more than once")]
    DuplicateCarrier(usize),

    #[error("no active carrier configured")]
    NoActiveCarrier,

    #[error("carrier {0} has no matching cell")]
    UnknownCell(usize),
}
