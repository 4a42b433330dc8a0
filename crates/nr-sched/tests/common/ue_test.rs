use std::sync::Arc;

use nr_config::{CellParams, SchedArgs, SchedParams, UeCfg};
use nr_core::{DuplexConfig, SlotPoint, TddPattern};
use nr_sched::{Ue, UeBufferManager};

pub const TEST_RNTI: u16 = 0x4601;

/// Slots 0-6 DL, 7-9 UL
pub fn tdd_dl7_ul3() -> DuplexConfig {
    DuplexConfig::Tdd(TddPattern { period_slots: 10, nof_dl_slots: 7, nof_dl_symbols: 0, nof_ul_slots: 3, nof_ul_symbols: 0 })
}

pub fn slot(count: u32) -> SlotPoint {
    SlotPoint::new(0, count)
}

/// One 52-PRB TDD cell with k2 = 4. The args can still be modified by the caller.
pub fn default_test_params_with(args: SchedArgs) -> Arc<SchedParams> {
    SchedParams::new(args, vec![CellParams::new(0, 52, tdd_dl7_ul3(), 4)]).unwrap()
}

pub fn default_test_params() -> Arc<SchedParams> {
    default_test_params_with(SchedArgs::default())
}

/// Single active carrier on cc 0 with k1 table [4, 5, 6, 7]
pub fn default_test_ue_cfg() -> UeCfg {
    UeCfg::new(0, vec![4, 5, 6, 7])
}

/// A UE together with the buffer state feeding it
pub struct UeTest {
    pub ue: Ue,
    pub buffers: Arc<UeBufferManager>,
}

impl UeTest {
    pub fn new(params: Arc<SchedParams>, cfg: UeCfg) -> Self {
        let buffers = Arc::new(UeBufferManager::new());
        let ue = Ue::new(TEST_RNTI, cfg, params, buffers.clone()).unwrap();
        Self { ue, buffers }
    }

    pub fn with_defaults() -> Self {
        Self::new(default_test_params(), default_test_ue_cfg())
    }

    pub fn set_dl_buffer(&self, bytes: u32) {
        self.buffers.dl_buffer_state(4, bytes, 0);
    }

    pub fn set_bsr(&self, bytes: u32) {
        self.buffers.ul_bsr(0, bytes);
    }
}
