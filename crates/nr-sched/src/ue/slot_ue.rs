use nr_core::{Direction, Rnti, SlotPoint};

use crate::bwp_ue_cfg::BwpUeConfig;
use crate::harq::{HarqEntity, HarqProc};

/// Reservation candidate of one UE on one carrier for one PDCCH slot.
///
/// Borrows the UE, so it cannot outlive the slot: `new_slot` and `set_cfg` need the
/// UE mutably. To commit a grant after dropping it, take a [`HarqTicket`].
#[derive(Debug, Clone, Copy)]
pub struct SlotUe<'a> {
    pub rnti: Rnti,
    pub cc: usize,
    pub slot_rx: SlotPoint,
    pub pdcch_slot: SlotPoint,
    pub pdsch_slot: SlotPoint,
    pub pusch_slot: SlotPoint,
    pub uci_slot: SlotPoint,
    pub dl_pending_bytes: u32,
    pub ul_pending_bytes: u32,
    pub dl_cqi: u8,
    pub ul_cqi: u8,
    pub cfg: Option<&'a BwpUeConfig>,
    pub harq_ent: Option<&'a HarqEntity>,
    /// DL process eligible in this slot, retransmissions first
    pub h_dl: Option<&'a HarqProc>,
    /// UL process eligible in this slot, retransmissions first
    pub h_ul: Option<&'a HarqProc>,
    valid: bool,
}

impl<'a> SlotUe<'a> {
    /// Result of reserving on a carrier the UE does not use
    pub fn invalid() -> Self {
        Self {
            rnti: 0,
            cc: 0,
            slot_rx: SlotPoint::invalid(),
            pdcch_slot: SlotPoint::invalid(),
            pdsch_slot: SlotPoint::invalid(),
            pusch_slot: SlotPoint::invalid(),
            uci_slot: SlotPoint::invalid(),
            dl_pending_bytes: 0,
            ul_pending_bytes: 0,
            dl_cqi: 0,
            ul_cqi: 0,
            cfg: None,
            harq_ent: None,
            h_dl: None,
            h_ul: None,
            valid: false,
        }
    }

    pub(crate) fn new(rnti: Rnti, slot_rx: SlotPoint, cc: usize, cfg: &'a BwpUeConfig, harq_ent: &'a HarqEntity) -> Self {
        Self {
            rnti,
            cc,
            slot_rx,
            cfg: Some(cfg),
            harq_ent: Some(harq_ent),
            valid: true,
            ..Self::invalid()
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// True if the UE is a candidate in at least one direction
    pub fn has_candidate(&self) -> bool {
        self.h_dl.is_some() || self.h_ul.is_some()
    }

    /// Detached handle to the selected DL process
    pub fn dl_ticket(&self) -> Option<HarqTicket> {
        let (h, harq_ent) = (self.h_dl?, self.harq_ent?);
        Some(HarqTicket {
            cc: self.cc,
            dir: Direction::Dl,
            pid: h.pid(),
            retx: h.has_pending_retx(),
            generation: harq_ent.generation(),
            slot_tx: self.pdsch_slot,
            slot_ack: self.uci_slot,
        })
    }

    /// Detached handle to the selected UL process. The CRC is known once the PUSCH is received.
    pub fn ul_ticket(&self) -> Option<HarqTicket> {
        let (h, harq_ent) = (self.h_ul?, self.harq_ent?);
        Some(HarqTicket {
            cc: self.cc,
            dir: Direction::Ul,
            pid: h.pid(),
            retx: h.has_pending_retx(),
            generation: harq_ent.generation(),
            slot_tx: self.pusch_slot,
            slot_ack: self.pusch_slot,
        })
    }
}

/// A HARQ selection detached from the [`SlotUe`] borrow, used to commit a grant.
/// Only valid within the slot it was taken in; the generation catches stale use.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HarqTicket {
    pub cc: usize,
    pub dir: Direction,
    pub pid: usize,
    /// Selected as a retransmission rather than a new transmission
    pub retx: bool,
    pub generation: u32,
    pub slot_tx: SlotPoint,
    pub slot_ack: SlotPoint,
}
