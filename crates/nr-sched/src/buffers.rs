use std::sync::atomic::{AtomicU32, Ordering};

/// Number of logical channel IDs for DL data (LCID 0..=32)
pub const MAX_NOF_LCIDS: usize = 33;

/// Number of UL logical channel groups
pub const MAX_NOF_LCGS: usize = 8;

/// Byte counters maintained by the RLC/MAC layers.
///
/// Producers write from other threads; each counter must be updated atomically at
/// word level. The scheduler reads one snapshot per slot.
pub trait BufferAccessor: Send + Sync {
    /// Total DL bytes queued for transmission, new and retransmission data combined
    fn dl_tx_total(&self) -> u32;
    /// Total UL bytes reported through the latest Buffer Status Reports
    fn bsr(&self) -> u32;
}

/// Lock-free per-LCID / per-LCG buffer state of one UE
#[derive(Debug)]
pub struct UeBufferManager {
    dl_newtx: [AtomicU32; MAX_NOF_LCIDS],
    dl_prio_tx: [AtomicU32; MAX_NOF_LCIDS],
    ul_bsr: [AtomicU32; MAX_NOF_LCGS],
}

impl Default for UeBufferManager {
    fn default() -> Self {
        Self::new()
    }
}

impl UeBufferManager {
    pub fn new() -> Self {
        Self {
            dl_newtx: std::array::from_fn(|_| AtomicU32::new(0)),
            dl_prio_tx: std::array::from_fn(|_| AtomicU32::new(0)),
            ul_bsr: std::array::from_fn(|_| AtomicU32::new(0)),
        }
    }

    /// RLC buffer state update for one DL logical channel
    pub fn dl_buffer_state(&self, lcid: usize, newtx: u32, prio_tx: u32) {
        let (Some(new), Some(prio)) = (self.dl_newtx.get(lcid), self.dl_prio_tx.get(lcid)) else {
            tracing::warn!("dl_buffer_state: invalid lcid {}", lcid);
            return;
        };
        new.store(newtx, Ordering::Relaxed);
        prio.store(prio_tx, Ordering::Relaxed);
    }

    /// Buffer Status Report for one logical channel group
    pub fn ul_bsr(&self, lcg: usize, bytes: u32) {
        let Some(bsr) = self.ul_bsr.get(lcg) else {
            tracing::warn!("ul_bsr: invalid lcg {}", lcg);
            return;
        };
        bsr.store(bytes, Ordering::Relaxed);
    }
}

impl BufferAccessor for UeBufferManager {
    fn dl_tx_total(&self) -> u32 {
        self.dl_newtx
            .iter()
            .chain(self.dl_prio_tx.iter())
            .fold(0u32, |acc, b| acc.saturating_add(b.load(Ordering::Relaxed)))
    }

    fn bsr(&self) -> u32 {
        self.ul_bsr
            .iter()
            .fold(0u32, |acc, b| acc.saturating_add(b.load(Ordering::Relaxed)))
    }
}
