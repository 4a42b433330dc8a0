use std::sync::Arc;

use nr_config::{CellParams, CfgErr, SchedParams, UeCfg};
use nr_core::{Direction, Rnti, SlotPoint, TX_ENB_DELAY};

use crate::bwp_ue_cfg::BwpUeConfig;
use crate::harq::HarqEntity;
use crate::ue::slot_ue::SlotUe;

/// PDCCH-to-PDSCH offset. PDSCH is always scheduled in the PDCCH slot.
const K0: u32 = 0;

/// Highest CQI index (TS 38.214 table 5.2.2.1)
pub const MAX_CQI: u8 = 15;

/// Binding of one UE to one component carrier
#[derive(Debug)]
pub struct UeCarrier {
    rnti: Rnti,
    cc: usize,
    params: Arc<SchedParams>,
    dl_cqi: u8,
    ul_cqi: u8,
    bwp_cfg: BwpUeConfig,
    pub(crate) harq_ent: HarqEntity,
}

impl UeCarrier {
    pub fn new(rnti: Rnti, ue_cfg: &Arc<UeCfg>, params: Arc<SchedParams>, cc: usize) -> Result<Self, CfgErr> {
        let cell = params.cell(cc).ok_or(CfgErr::UnknownCell(cc))?;
        let bwp_cfg = BwpUeConfig::new(rnti, Arc::clone(&cell.bwps[0]), Arc::clone(ue_cfg))?;
        let args = &params.sched_cfg;
        let harq_ent = HarqEntity::new(
            rnti,
            cc,
            cell.nof_prb(),
            args.nof_dl_harqs,
            args.nof_ul_harqs,
            args.harq_ack_timeout_slots,
        );
        Ok(Self { rnti, cc, dl_cqi: 0, ul_cqi: 0, bwp_cfg, harq_ent, params })
    }

    pub fn rnti(&self) -> Rnti {
        self.rnti
    }

    pub fn cc(&self) -> usize {
        self.cc
    }

    pub fn cell_params(&self) -> &CellParams {
        &self.params.cells[self.cc]
    }

    pub fn bwp_cfg(&self) -> &BwpUeConfig {
        &self.bwp_cfg
    }

    pub fn harq_ent(&self) -> &HarqEntity {
        &self.harq_ent
    }

    pub fn dl_cqi(&self) -> u8 {
        self.dl_cqi
    }

    pub fn ul_cqi(&self) -> u8 {
        self.ul_cqi
    }

    pub fn set_dl_cqi(&mut self, cqi: u8) {
        self.dl_cqi = cqi.min(MAX_CQI);
    }

    pub fn set_ul_cqi(&mut self, cqi: u8) {
        self.ul_cqi = cqi.min(MAX_CQI);
    }

    /// Build the reservation candidate of this carrier for `pdcch_slot`.
    ///
    /// Never fails: whether the UE is a candidate shows in `h_dl` / `h_ul`. A
    /// direction the duplex pattern excludes is not probed, pending bytes wait for
    /// the next eligible slot. Selection does not touch HARQ state.
    pub fn try_reserve(
        &mut self,
        pdcch_slot: SlotPoint,
        ue_cfg: &Arc<UeCfg>,
        dl_pending_bytes: u32,
        ul_pending_bytes: u32,
    ) -> SlotUe<'_> {
        let slot_rx = pdcch_slot - TX_ENB_DELAY;

        // The UE was reconfigured since the last reservation
        if !self.bwp_cfg.is_built_from(ue_cfg) {
            let bwp = Arc::clone(&self.cell_params().bwps[0]);
            self.bwp_cfg = match BwpUeConfig::new(self.rnti, bwp, Arc::clone(ue_cfg)) {
                Ok(cfg) => cfg,
                // Configurations are validated in Ue::new/set_cfg, reaching this is a bug
                Err(e) => panic!("rnti=0x{:x} cc={}: unusable UE configuration on slot path: {}", self.rnti, self.cc, e),
            };
            tracing::debug!(slot = ?slot_rx, "rnti=0x{:x} cc={} rebuilt BWP config", self.rnti, self.cc);
        }

        let this = &*self;
        let cfg = &this.bwp_cfg;
        let mut sfu = SlotUe::new(this.rnti, slot_rx, this.cc, cfg, &this.harq_ent);
        sfu.pdcch_slot = pdcch_slot;
        sfu.pdsch_slot = pdcch_slot + K0;
        sfu.uci_slot = sfu.pdsch_slot + cfg.k1(sfu.pdsch_slot);
        sfu.pusch_slot = pdcch_slot + cfg.k2();
        sfu.dl_cqi = this.dl_cqi;
        sfu.ul_cqi = this.ul_cqi;
        sfu.dl_pending_bytes = dl_pending_bytes;
        sfu.ul_pending_bytes = ul_pending_bytes;

        let duplex = &this.cell_params().duplex;
        let harq_ent = &this.harq_ent;
        if Direction::Dl.enabled_in(duplex, sfu.pdsch_slot.slot_idx()) {
            sfu.h_dl = harq_ent.find_pending_dl_retx();
            if sfu.h_dl.is_none() && dl_pending_bytes > 0 {
                sfu.h_dl = harq_ent.find_empty_dl_harq();
            }
        }
        if Direction::Ul.enabled_in(duplex, sfu.pusch_slot.slot_idx()) {
            sfu.h_ul = harq_ent.find_pending_ul_retx();
            if sfu.h_ul.is_none() && ul_pending_bytes > 0 {
                sfu.h_ul = harq_ent.find_empty_ul_harq();
            }
        }

        tracing::trace!(
            slot = ?slot_rx,
            "rnti=0x{:x} cc={} pdcch={} pdsch={} uci={} pusch={} h_dl={:?} h_ul={:?}",
            this.rnti,
            this.cc,
            sfu.pdcch_slot,
            sfu.pdsch_slot,
            sfu.uci_slot,
            sfu.pusch_slot,
            sfu.h_dl.map(|h| h.pid()),
            sfu.h_ul.map(|h| h.pid())
        );
        sfu
    }
}
