use nr_core::Direction;
use thiserror::Error;

/// Errors of the grant commit and HARQ feedback paths. Candidacy queries never fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SchedErr {
    #[error("carrier {0} is not active for this UE")]
    InactiveCarrier(usize),

    #[error("{dir} HARQ pid {pid} does not exist")]
    InvalidPid { dir: Direction, pid: usize },

    #[error("{ticket} ticket committed as {expected}")]
    DirectionMismatch { expected: Direction, ticket: Direction },

    #[error("reservation from generation {ticket} used at generation {current}")]
    StaleReservation { ticket: u32, current: u32 },

    #[error("{dir} HARQ pid {pid} is busy")]
    HarqBusy { dir: Direction, pid: usize },

    #[error("{dir} HARQ pid {pid} is empty")]
    HarqEmpty { dir: Direction, pid: usize },

    #[error("{dir} HARQ pid {pid} has no pending retransmission")]
    NoPendingRetx { dir: Direction, pid: usize },

    #[error("PRB grant {start}+{len} exceeds {nof_prb} PRBs")]
    PrbOutOfRange { start: u32, len: u32, nof_prb: u32 },
}
