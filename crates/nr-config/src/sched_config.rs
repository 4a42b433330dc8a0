use std::sync::Arc;

use nr_core::slot_point::MAX_NUMEROLOGY;
use nr_core::{DuplexConfig, MAX_CARRIERS, MAX_HARQ, NOF_SYMBOLS_PER_SLOT};

use crate::CfgErr;

/// Largest carrier bandwidth in PRBs (TS 38.101, 275 PRBs)
pub const MAX_NOF_PRB: u32 = 275;

/// Largest PUSCH slot offset k2 (TS 38.331 PUSCH-TimeDomainResourceAllocation)
pub const MAX_K2: u32 = 32;

/// Scheduler-wide arguments
#[derive(Debug, Clone)]
pub struct SchedArgs {
    /// Saturation mode for load testing: every UE reports 1_000_000 pending bytes
    /// in both directions, regardless of its buffers. Not meant for production.
    pub auto_refill_buffer: bool,
    /// Retransmissions (first transmission excluded) a HARQ process gets before it is given up
    pub max_harq_retx: u32,
    pub nof_dl_harqs: usize,
    pub nof_ul_harqs: usize,
    /// Slots past the ACK slot a process waits for feedback before it is considered NACKed
    pub harq_ack_timeout_slots: u32,
    /// UL bytes assumed pending when an SR is outstanding and the BSR accounts for nothing
    pub sr_grant_bytes: u32,
}

impl Default for SchedArgs {
    fn default() -> Self {
        Self {
            auto_refill_buffer: false,
            max_harq_retx: 4,
            nof_dl_harqs: MAX_HARQ,
            nof_ul_harqs: MAX_HARQ,
            harq_ack_timeout_slots: 0,
            sr_grant_bytes: 512,
        }
    }
}

impl SchedArgs {
    pub fn validate(&self) -> Result<(), CfgErr> {
        if self.max_harq_retx == 0 {
            return Err(CfgErr::InvalidSchedArgs("max_harq_retx must be at least 1"));
        }
        if !(1..=MAX_HARQ).contains(&self.nof_dl_harqs) {
            return Err(CfgErr::InvalidSchedArgs("nof_dl_harqs must lie in 1..=16"));
        }
        if !(1..=MAX_HARQ).contains(&self.nof_ul_harqs) {
            return Err(CfgErr::InvalidSchedArgs("nof_ul_harqs must lie in 1..=16"));
        }
        Ok(())
    }
}

/// One entry of the PUSCH time-domain resource allocation list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PuschTimeRa {
    /// Slot offset between PDCCH and PUSCH
    pub k2: u32,
    pub start_symbol: u32,
    pub nof_symbols: u32,
}

impl PuschTimeRa {
    /// Full-slot PUSCH allocation with the given k2
    pub fn full_slot(k2: u32) -> Self {
        Self { k2, start_symbol: 0, nof_symbols: NOF_SYMBOLS_PER_SLOT }
    }
}

/// Cell-wide bandwidth part descriptor
#[derive(Debug, Clone)]
pub struct BwpParams {
    pub bwp_id: u32,
    pub start_rb: u32,
    pub nof_rb: u32,
    pub pusch_ra_list: Vec<PuschTimeRa>,
}

impl BwpParams {
    /// Initial BWP covering the whole carrier
    pub fn initial(nof_prb: u32, k2: u32) -> Self {
        Self {
            bwp_id: 0,
            start_rb: 0,
            nof_rb: nof_prb,
            pusch_ra_list: vec![PuschTimeRa::full_slot(k2)],
        }
    }

    fn validate(&self, cc: usize, nof_prb: u32) -> Result<(), CfgErr> {
        let bwp_err = |reason| CfgErr::InvalidBwp { cc, bwp_id: self.bwp_id, reason };
        if self.nof_rb == 0 || self.start_rb + self.nof_rb > nof_prb {
            return Err(bwp_err("BWP does not fit in the carrier"));
        }
        if self.pusch_ra_list.is_empty() {
            return Err(bwp_err("empty PUSCH time-domain allocation list"));
        }
        for ra in &self.pusch_ra_list {
            if ra.k2 > MAX_K2 {
                return Err(bwp_err("k2 exceeds 32 slots"));
            }
            if ra.nof_symbols == 0 || ra.start_symbol + ra.nof_symbols > NOF_SYMBOLS_PER_SLOT {
                return Err(bwp_err("PUSCH symbols exceed the slot"));
            }
        }
        Ok(())
    }
}

/// Static parameters of one cell (component carrier). Immutable after bring-up.
#[derive(Debug, Clone)]
pub struct CellParams {
    pub cc: usize,
    pub nof_prb: u32,
    /// Numerology (subcarrier spacing 15 kHz << mu)
    pub mu: u8,
    pub duplex: DuplexConfig,
    pub bwps: Vec<Arc<BwpParams>>,
}

impl CellParams {
    /// Single-BWP cell with a full-bandwidth initial BWP
    pub fn new(cc: usize, nof_prb: u32, duplex: DuplexConfig, k2: u32) -> Self {
        Self {
            cc,
            nof_prb,
            mu: 0,
            duplex,
            bwps: vec![Arc::new(BwpParams::initial(nof_prb, k2))],
        }
    }

    #[inline]
    pub fn nof_prb(&self) -> u32 {
        self.nof_prb
    }

    pub fn validate(&self) -> Result<(), CfgErr> {
        let cc = self.cc;
        if cc >= MAX_CARRIERS {
            return Err(CfgErr::CcOutOfRange(cc));
        }
        if self.nof_prb == 0 || self.nof_prb > MAX_NOF_PRB {
            return Err(CfgErr::InvalidNofPrb { cc, nof_prb: self.nof_prb });
        }
        if self.mu > MAX_NUMEROLOGY {
            return Err(CfgErr::InvalidNumerology { cc, mu: self.mu });
        }
        self.duplex.validate().map_err(|reason| CfgErr::InvalidDuplex { cc, reason })?;
        if self.bwps.is_empty() {
            return Err(CfgErr::NoBwp { cc });
        }
        for bwp in &self.bwps {
            bwp.validate(cc, self.nof_prb)?;
        }
        Ok(())
    }
}

/// Everything the scheduler knows statically: scheduler arguments plus all cells,
/// indexed by cc.
#[derive(Debug, Clone)]
pub struct SchedParams {
    pub sched_cfg: SchedArgs,
    pub cells: Vec<CellParams>,
}

impl SchedParams {
    /// Validates and wraps the parameters for sharing between UEs
    pub fn new(sched_cfg: SchedArgs, cells: Vec<CellParams>) -> Result<Arc<Self>, CfgErr> {
        let params = Self { sched_cfg, cells };
        params.validate()?;
        Ok(Arc::new(params))
    }

    pub fn validate(&self) -> Result<(), CfgErr> {
        self.sched_cfg.validate()?;
        if self.cells.is_empty() {
            return Err(CfgErr::NoCells);
        }
        for (idx, cell) in self.cells.iter().enumerate() {
            if cell.cc != idx {
                return Err(CfgErr::CcMismatch { idx, cc: cell.cc });
            }
            cell.validate()?;
        }
        Ok(())
    }

    pub fn cell(&self, cc: usize) -> Option<&CellParams> {
        self.cells.get(cc)
    }
}
