use std::sync::Arc;

use nr_config::{BwpParams, CfgErr, UeCfg, UePhyCfg};
use nr_core::{Rnti, SlotPoint};

/// Per-UE view of the active bandwidth part: the cell BWP descriptor combined with
/// the UE's HARQ-ACK timing. Keyed by the identity of the UE configuration it was
/// built from, so a reconfiguration is detected by pointer comparison.
#[derive(Debug, Clone)]
pub struct BwpUeConfig {
    rnti: Rnti,
    bwp: Arc<BwpParams>,
    ue_cfg: Arc<UeCfg>,
}

impl BwpUeConfig {
    pub fn new(rnti: Rnti, bwp: Arc<BwpParams>, ue_cfg: Arc<UeCfg>) -> Result<Self, CfgErr> {
        ue_cfg.validate_harq_ack()?;
        if bwp.pusch_ra_list.is_empty() {
            return Err(CfgErr::EmptyK2Table);
        }
        if let Some(ra) = bwp.pusch_ra_list.iter().find(|ra| ra.k2 > nr_config::MAX_K2) {
            return Err(CfgErr::InvalidK2(ra.k2));
        }
        Ok(Self { rnti, bwp, ue_cfg })
    }

    pub fn rnti(&self) -> Rnti {
        self.rnti
    }

    /// True if this view was built from exactly this configuration object
    #[inline]
    pub fn is_built_from(&self, ue_cfg: &Arc<UeCfg>) -> bool {
        Arc::ptr_eq(&self.ue_cfg, ue_cfg)
    }

    pub fn ue_cfg(&self) -> &Arc<UeCfg> {
        &self.ue_cfg
    }

    pub fn phy(&self) -> &UePhyCfg {
        &self.ue_cfg.phy
    }

    pub fn active_bwp(&self) -> &BwpParams {
        &self.bwp
    }

    /// PDSCH-to-HARQ-ACK offset for a PDSCH in `pdsch_slot`
    pub fn k1(&self, pdsch_slot: SlotPoint) -> u32 {
        let k1_table = &self.phy().harq_ack.dl_data_to_ul_ack;
        k1_table[pdsch_slot.slot_idx() as usize % k1_table.len()]
    }

    /// PDCCH-to-PUSCH offset, from the first PUSCH time-domain allocation
    pub fn k2(&self) -> u32 {
        self.bwp.pusch_ra_list[0].k2
    }
}
