use core::fmt;
use std::sync::Arc;

use nr_config::{CfgErr, SchedParams, UeCfg};
use nr_core::{Direction, MAX_CARRIERS, Rnti, SlotPoint, TX_ENB_DELAY};

use crate::SchedErr;
use crate::buffers::BufferAccessor;
use crate::harq::PrbGrant;
use crate::ue::slot_ue::{HarqTicket, SlotUe};
use crate::ue::ue_carrier::UeCarrier;

/// Pending bytes reported in both directions when `auto_refill_buffer` is set.
/// Load-testing knob, never reached with the default arguments.
pub const AUTO_REFILL_BYTES: u32 = 1_000_000;

/// Grant details the allocator decided on for a reserved HARQ process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HarqGrant {
    pub prbs: PrbGrant,
    pub mcs: u32,
    /// Ignored for retransmissions, which resend the original transport block
    pub tbs: u32,
}

/// Scheduler-side state of one UE across all its carriers
pub struct Ue {
    rnti: Rnti,
    sched_params: Arc<SchedParams>,
    ue_cfg: Arc<UeCfg>,
    buffers: Arc<dyn BufferAccessor>,
    carriers: [Option<UeCarrier>; MAX_CARRIERS],
    dl_pending_bytes: u32,
    ul_pending_bytes: u32,
    last_sr_slot: SlotPoint,
    last_pdcch_slot: SlotPoint,
}

impl fmt::Debug for Ue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ue")
            .field("rnti", &format_args!("0x{:x}", self.rnti))
            .field("ue_cfg", &self.ue_cfg)
            .field("carriers", &self.carriers)
            .field("dl_pending_bytes", &self.dl_pending_bytes)
            .field("ul_pending_bytes", &self.ul_pending_bytes)
            .field("last_sr_slot", &self.last_sr_slot)
            .finish_non_exhaustive()
    }
}

impl Ue {
    /// Create a UE. Unlike a reconfiguration, the initial configuration needs an active carrier.
    pub fn new(rnti: Rnti, cfg: UeCfg, sched_params: Arc<SchedParams>, buffers: Arc<dyn BufferAccessor>) -> Result<Self, CfgErr> {
        cfg.validate(&sched_params)?;
        if !cfg.has_active_carrier() {
            return Err(CfgErr::NoActiveCarrier);
        }
        let ue_cfg = Arc::new(cfg);
        let mut ue = Self {
            rnti,
            sched_params,
            ue_cfg: Arc::clone(&ue_cfg),
            buffers,
            carriers: Default::default(),
            dl_pending_bytes: 0,
            ul_pending_bytes: 0,
            last_sr_slot: SlotPoint::invalid(),
            last_pdcch_slot: SlotPoint::invalid(),
        };
        for carrier in ue.build_new_carriers(&ue_cfg)? {
            ue.install_carrier(carrier);
        }
        Ok(ue)
    }

    /// Replace the UE configuration.
    ///
    /// Newly active carriers get a UeCarrier; existing carriers are kept even when
    /// the new configuration deactivates them, they are just skipped from then on.
    /// Reservations taken before the call are invalidated. On error nothing changes.
    pub fn set_cfg(&mut self, cfg: UeCfg) -> Result<(), CfgErr> {
        cfg.validate(&self.sched_params)?;
        let ue_cfg = Arc::new(cfg);
        let new_carriers = self.build_new_carriers(&ue_cfg)?;

        self.ue_cfg = ue_cfg;
        for carrier in self.carriers.iter_mut().flatten() {
            carrier.harq_ent.bump_generation();
        }
        for carrier in new_carriers {
            self.install_carrier(carrier);
        }
        tracing::debug!(slot = ?self.last_pdcch_slot, "rnti=0x{:x} reconfigured: {:?}", self.rnti, self.ue_cfg.carriers);
        Ok(())
    }

    fn build_new_carriers(&self, ue_cfg: &Arc<UeCfg>) -> Result<Vec<UeCarrier>, CfgErr> {
        ue_cfg
            .carriers
            .iter()
            .filter(|c| c.active && self.carriers[c.cc].is_none())
            .map(|c| UeCarrier::new(self.rnti, ue_cfg, Arc::clone(&self.sched_params), c.cc))
            .collect()
    }

    fn install_carrier(&mut self, carrier: UeCarrier) {
        let cc = carrier.cc();
        tracing::info!("rnti=0x{:x} carrier cc={} added", self.rnti, cc);
        self.carriers[cc] = Some(carrier);
    }

    /// Advance the UE to `pdcch_slot`: age the HARQ processes of every active
    /// carrier and take this slot's snapshot of the pending bytes.
    pub fn new_slot(&mut self, pdcch_slot: SlotPoint) {
        nr_core::assert_warn!(
            !self.last_pdcch_slot.valid() || pdcch_slot >= self.last_pdcch_slot,
            "rnti=0x{:x} slot {} after {}",
            self.rnti,
            pdcch_slot,
            self.last_pdcch_slot
        );
        if pdcch_slot == self.last_pdcch_slot {
            tracing::trace!(slot = ?pdcch_slot, "rnti=0x{:x} new_slot repeated", self.rnti);
        }
        self.last_pdcch_slot = pdcch_slot;
        let slot_rx = pdcch_slot - TX_ENB_DELAY;

        let ue_cfg = &self.ue_cfg;
        for carrier in self.carriers.iter_mut().flatten().filter(|c| ue_cfg.is_active(c.cc())) {
            carrier.harq_ent.new_slot(slot_rx);
        }

        let args = &self.sched_params.sched_cfg;
        if args.auto_refill_buffer {
            self.dl_pending_bytes = AUTO_REFILL_BYTES;
            self.ul_pending_bytes = AUTO_REFILL_BYTES;
            return;
        }

        self.dl_pending_bytes = self.buffers.dl_tx_total();

        // Bytes already granted on UL HARQs in flight are not pending anymore, on
        // deactivated carriers too. The pid range follows the DL pool size; pids
        // past the UL pool are skipped.
        let mut ul_pending = i64::from(self.buffers.bsr());
        let mut sr_served = false;
        for carrier in self.carriers.iter().flatten() {
            let harq_ent = carrier.harq_ent();
            for pid in 0..harq_ent.nof_dl_harqs() {
                let Some(h) = harq_ent.ul_harq(pid) else {
                    continue;
                };
                ul_pending -= i64::from(h.tbs());
                if self.last_sr_slot.valid() && h.harq_slot_tx() > self.last_sr_slot {
                    sr_served = true;
                }
            }
        }
        if sr_served {
            tracing::debug!(slot = ?slot_rx, "rnti=0x{:x} SR from {} served", self.rnti, self.last_sr_slot);
            self.last_sr_slot.clear();
        }

        let mut ul_pending = u32::try_from(ul_pending.max(0)).unwrap_or(u32::MAX);
        if ul_pending == 0 && self.last_sr_slot.valid() {
            tracing::debug!(slot = ?slot_rx, "rnti=0x{:x} pending SR, assuming {} UL bytes", self.rnti, args.sr_grant_bytes);
            ul_pending = args.sr_grant_bytes;
        }
        self.ul_pending_bytes = ul_pending;
    }

    /// Reservation candidate on carrier `cc`. Invalid if the UE has no active carrier there.
    pub fn try_reserve(&mut self, pdcch_slot: SlotPoint, cc: usize) -> SlotUe<'_> {
        if !self.ue_cfg.is_active(cc) {
            return SlotUe::invalid();
        }
        let Some(carrier) = self.carriers.get_mut(cc).and_then(Option::as_mut) else {
            return SlotUe::invalid();
        };
        carrier.try_reserve(pdcch_slot, &self.ue_cfg, self.dl_pending_bytes, self.ul_pending_bytes)
    }

    /// Commit a DL grant on the process reserved by `ticket`
    pub fn commit_dl(&mut self, ticket: &HarqTicket, grant: HarqGrant) -> Result<(), SchedErr> {
        self.commit(Direction::Dl, ticket, grant)
    }

    /// Commit a UL grant on the process reserved by `ticket`
    pub fn commit_ul(&mut self, ticket: &HarqTicket, grant: HarqGrant) -> Result<(), SchedErr> {
        self.commit(Direction::Ul, ticket, grant)
    }

    fn commit(&mut self, dir: Direction, ticket: &HarqTicket, grant: HarqGrant) -> Result<(), SchedErr> {
        if ticket.dir != dir {
            return Err(SchedErr::DirectionMismatch { expected: dir, ticket: ticket.dir });
        }
        if !self.ue_cfg.is_active(ticket.cc) {
            return Err(SchedErr::InactiveCarrier(ticket.cc));
        }
        let rnti = self.rnti;
        let max_retx = self.sched_params.sched_cfg.max_harq_retx;
        let harq_ent = &mut self.carrier_mut(ticket.cc)?.harq_ent;

        let current = harq_ent.generation();
        if ticket.generation != current {
            tracing::warn!("rnti=0x{:x} refused stale {} reservation on pid={}", rnti, dir, ticket.pid);
            return Err(SchedErr::StaleReservation { ticket: ticket.generation, current });
        }

        if ticket.retx {
            harq_ent.new_retx(dir, ticket.pid, ticket.slot_tx, ticket.slot_ack, grant.prbs)
        } else {
            harq_ent.new_tx(dir, ticket.pid, ticket.slot_tx, ticket.slot_ack, grant.prbs, grant.mcs, grant.tbs, max_retx)
        }
    }

    fn carrier_mut(&mut self, cc: usize) -> Result<&mut UeCarrier, SchedErr> {
        self.carriers.get_mut(cc).and_then(Option::as_mut).ok_or(SchedErr::InactiveCarrier(cc))
    }

    /// HARQ-ACK for a DL process. Returns the acknowledged bytes.
    pub fn dl_ack_info(&mut self, cc: usize, pid: usize, ack: bool) -> Result<u32, SchedErr> {
        self.carrier_mut(cc)?.harq_ent.dl_ack_info(pid, ack)
    }

    /// PUSCH CRC for a UL process. Returns the correctly received bytes.
    pub fn ul_crc_info(&mut self, cc: usize, pid: usize, crc: bool) -> Result<u32, SchedErr> {
        self.carrier_mut(cc)?.harq_ent.ul_crc_info(pid, crc)
    }

    /// Scheduling request received in `slot_rx`
    pub fn ul_sr_info(&mut self, slot_rx: SlotPoint) {
        tracing::debug!(slot = ?slot_rx, "rnti=0x{:x} SR received", self.rnti);
        self.last_sr_slot = slot_rx;
    }

    pub fn dl_cqi_info(&mut self, cc: usize, cqi: u8) -> Result<(), SchedErr> {
        self.carrier_mut(cc)?.set_dl_cqi(cqi);
        Ok(())
    }

    pub fn ul_cqi_info(&mut self, cc: usize, cqi: u8) -> Result<(), SchedErr> {
        self.carrier_mut(cc)?.set_ul_cqi(cqi);
        Ok(())
    }

    pub fn rnti(&self) -> Rnti {
        self.rnti
    }

    pub fn cfg(&self) -> &Arc<UeCfg> {
        &self.ue_cfg
    }

    pub fn carrier(&self, cc: usize) -> Option<&UeCarrier> {
        self.carriers.get(cc)?.as_ref()
    }

    /// Primary cell: the first carrier of the configuration
    pub fn pcell_cc(&self) -> usize {
        self.ue_cfg.carriers.first().map_or(0, |c| c.cc)
    }

    /// Carrier aggregation is in use when more than one carrier is active
    pub fn has_ca(&self) -> bool {
        self.ue_cfg.carriers.iter().filter(|c| c.active).count() > 1
    }

    pub fn dl_pending_bytes(&self) -> u32 {
        self.dl_pending_bytes
    }

    pub fn ul_pending_bytes(&self) -> u32 {
        self.ul_pending_bytes
    }

    /// Slot of the outstanding scheduling request, invalid once it was served
    pub fn last_sr_slot(&self) -> SlotPoint {
        self.last_sr_slot
    }
}
