use core::fmt;

use crate::DuplexConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Downlink, PDSCH
    Dl,
    /// Uplink, PUSCH
    Ul,
}

impl Direction {
    /// Whether the duplex pattern allows this direction in the slot with index `slot_idx`
    #[inline]
    pub fn enabled_in(self, duplex: &DuplexConfig, slot_idx: u32) -> bool {
        match self {
            Direction::Dl => duplex.is_dl(slot_idx),
            Direction::Ul => duplex.is_ul(slot_idx),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Dl => write!(f, "DL"),
            Direction::Ul => write!(f, "UL"),
        }
    }
}
