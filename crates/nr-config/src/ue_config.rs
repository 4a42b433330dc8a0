use nr_core::MAX_CARRIERS;

use crate::{CfgErr, SchedParams};

/// Maximum number of entries in dl-DataToUL-ACK (TS 38.331 PUCCH-Config)
pub const MAX_NOF_K1: usize = 8;

/// Largest dl-DataToUL-ACK value
pub const MAX_K1: u32 = 15;

/// Per-UE configuration of one component carrier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UeCarrierCfg {
    pub cc: usize,
    pub active: bool,
}

/// HARQ-ACK timing. The k1 used for a PDSCH in slot `s` is
/// `dl_data_to_ul_ack[s.slot_idx() % dl_data_to_ul_ack.len()]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarqAckCfg {
    pub dl_data_to_ul_ack: Vec<u32>,
}

impl HarqAckCfg {
    #[inline]
    pub fn nof_dl_data_to_ul_ack(&self) -> usize {
        self.dl_data_to_ul_ack.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UePhyCfg {
    pub harq_ack: HarqAckCfg,
}

/// Dedicated configuration of one UE, as signalled by RRC
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UeCfg {
    pub carriers: Vec<UeCarrierCfg>,
    pub phy: UePhyCfg,
}

impl UeCfg {
    /// UE with a single active carrier on `cc`
    pub fn new(cc: usize, k1_table: Vec<u32>) -> Self {
        Self {
            carriers: vec![UeCarrierCfg { cc, active: true }],
            phy: UePhyCfg { harq_ack: HarqAckCfg { dl_data_to_ul_ack: k1_table } },
        }
    }

    /// True if `cc` is listed and marked active
    pub fn is_active(&self, cc: usize) -> bool {
        self.carriers.iter().any(|c| c.cc == cc && c.active)
    }

    pub fn has_active_carrier(&self) -> bool {
        self.carriers.iter().any(|c| c.active)
    }

    /// Checks the k1 table on its own. Also run whenever the per-BWP view is rebuilt.
    pub fn validate_harq_ack(&self) -> Result<(), CfgErr> {
        let k1_table = &self.phy.harq_ack.dl_data_to_ul_ack;
        if k1_table.is_empty() {
            return Err(CfgErr::EmptyK1Table);
        }
        if k1_table.len() > MAX_NOF_K1 {
            return Err(CfgErr::K1TableTooLong(k1_table.len()));
        }
        if let Some(&k1) = k1_table.iter().find(|&&k1| k1 > MAX_K1) {
            return Err(CfgErr::InvalidK1(k1));
        }
        Ok(())
    }

    /// Validate the configuration on its own and against the configured cells
    pub fn validate(&self, params: &SchedParams) -> Result<(), CfgErr> {
        self.validate_harq_ack()?;

        let mut seen = [false; MAX_CARRIERS];
        for carrier in &self.carriers {
            if carrier.cc >= MAX_CARRIERS {
                return Err(CfgErr::CcOutOfRange(carrier.cc));
            }
            if seen[carrier.cc] {
                return Err(CfgErr::DuplicateCarrier(carrier.cc));
            }
            seen[carrier.cc] = true;
            if params.cell(carrier.cc).is_none() {
                return Err(CfgErr::UnknownCell(carrier.cc));
            }
        }
        Ok(())
    }
}
