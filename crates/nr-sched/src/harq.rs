use core::cmp::Ordering;

use nr_core::{Direction, Rnti, SlotPoint};

use crate::SchedErr;

/// Redundancy version sequence applied on consecutive (re)transmissions
const RV_SEQUENCE: [u8; 4] = [0, 2, 3, 1];

/// Contiguous PRB interval of a grant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PrbGrant {
    pub start: u32,
    pub len: u32,
}

impl PrbGrant {
    pub fn new(start: u32, len: u32) -> Self {
        Self { start, len }
    }

    fn fits(&self, nof_prb: u32) -> bool {
        self.len > 0 && self.start + self.len <= nof_prb
    }
}

/// Mutually exclusive states of a HARQ process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarqState {
    Empty,
    /// A new transmission was committed but is not on air yet
    PendingNewTx,
    /// Transmitted, feedback (ACK/NACK or CRC) not yet received
    AwaitingAck,
    /// NACKed or timed out, waiting to be rescheduled
    PendingRetx,
}

/// Outcome of missing or negative feedback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NackOutcome {
    Retx,
    /// Retransmission budget exhausted, process released
    Dropped,
}

/// One stop-and-wait HARQ process
#[derive(Debug, Clone)]
pub struct HarqProc {
    pid: usize,
    dir: Direction,
    busy: bool,
    ack_pending: bool,
    retx_pending: bool,
    ndi: bool,
    nof_retx: u32,
    max_retx: u32,
    mcs: u32,
    tbs: u32,
    slot_tx: SlotPoint,
    slot_ack: SlotPoint,
    slot_rx: SlotPoint,
    prbs: PrbGrant,
}

impl HarqProc {
    fn new(pid: usize, dir: Direction) -> Self {
        Self {
            pid,
            dir,
            busy: false,
            ack_pending: false,
            retx_pending: false,
            ndi: false,
            nof_retx: 0,
            max_retx: 1,
            mcs: 0,
            tbs: 0,
            slot_tx: SlotPoint::invalid(),
            slot_ack: SlotPoint::invalid(),
            slot_rx: SlotPoint::invalid(),
            prbs: PrbGrant::default(),
        }
    }

    #[inline]
    pub fn pid(&self) -> usize {
        self.pid
    }

    #[inline]
    pub fn direction(&self) -> Direction {
        self.dir
    }

    #[inline]
    pub fn empty(&self) -> bool {
        !self.busy
    }

    #[inline]
    pub fn has_pending_retx(&self) -> bool {
        self.busy && self.retx_pending
    }

    pub fn state(&self) -> HarqState {
        if !self.busy {
            HarqState::Empty
        } else if self.retx_pending {
            HarqState::PendingRetx
        } else if self.nof_retx == 0 && !matches!(self.slot_tx.partial_cmp(&self.slot_rx), Some(Ordering::Less | Ordering::Equal)) {
            HarqState::PendingNewTx
        } else {
            HarqState::AwaitingAck
        }
    }

    /// Size of the transport block in flight, 0 once the process is released
    #[inline]
    pub fn tbs(&self) -> u32 {
        self.tbs
    }

    pub fn ndi(&self) -> bool {
        self.ndi
    }

    /// Redundancy version of the most recent transmission
    pub fn rv(&self) -> u8 {
        RV_SEQUENCE[self.nof_retx as usize % RV_SEQUENCE.len()]
    }

    pub fn mcs(&self) -> u32 {
        self.mcs
    }

    pub fn nof_retx(&self) -> u32 {
        self.nof_retx
    }

    pub fn max_nof_retx(&self) -> u32 {
        self.max_retx
    }

    pub fn prbs(&self) -> PrbGrant {
        self.prbs
    }

    pub fn harq_slot_tx(&self) -> SlotPoint {
        self.slot_tx
    }

    pub fn harq_slot_ack(&self) -> SlotPoint {
        self.slot_ack
    }

    pub fn ack_pending(&self) -> bool {
        self.busy && self.ack_pending
    }

    fn reset(&mut self) {
        self.busy = false;
        self.ack_pending = false;
        self.retx_pending = false;
        self.nof_retx = 0;
        self.tbs = 0;
        self.mcs = 0;
        self.slot_tx = SlotPoint::invalid();
        self.slot_ack = SlotPoint::invalid();
        self.prbs = PrbGrant::default();
    }

    /// Feedback is missing or negative
    fn nack(&mut self) -> NackOutcome {
        self.ack_pending = false;
        if self.nof_retx >= self.max_retx {
            self.reset();
            NackOutcome::Dropped
        } else {
            self.retx_pending = true;
            NackOutcome::Retx
        }
    }

    /// Feedback for the transmission was due `ack_timeout` slots ago and never arrived
    fn new_slot(&mut self, slot_rx: SlotPoint, ack_timeout: u32) -> Option<NackOutcome> {
        self.slot_rx = slot_rx;
        if !self.ack_pending() {
            return None;
        }
        let deadline = self.slot_ack + ack_timeout;
        if deadline <= slot_rx {
            return Some(self.nack());
        }
        None
    }

    fn ack_info(&mut self, ack: bool) -> Result<(u32, Option<NackOutcome>), SchedErr> {
        if self.empty() {
            return Err(SchedErr::HarqEmpty { dir: self.dir, pid: self.pid });
        }
        if ack {
            let tbs = self.tbs;
            self.reset();
            Ok((tbs, None))
        } else {
            Ok((0, Some(self.nack())))
        }
    }

    fn new_tx(
        &mut self,
        slot_tx: SlotPoint,
        slot_ack: SlotPoint,
        prbs: PrbGrant,
        mcs: u32,
        tbs: u32,
        max_retx: u32,
    ) -> Result<(), SchedErr> {
        if !self.empty() {
            return Err(SchedErr::HarqBusy { dir: self.dir, pid: self.pid });
        }
        self.reset();
        self.busy = true;
        self.ack_pending = true;
        self.ndi = !self.ndi;
        self.max_retx = max_retx;
        self.mcs = mcs;
        self.tbs = tbs;
        self.slot_tx = slot_tx;
        self.slot_ack = slot_ack;
        self.prbs = prbs;
        Ok(())
    }

    fn new_retx(&mut self, slot_tx: SlotPoint, slot_ack: SlotPoint, prbs: PrbGrant) -> Result<(), SchedErr> {
        if self.empty() {
            return Err(SchedErr::HarqEmpty { dir: self.dir, pid: self.pid });
        }
        if !self.retx_pending {
            return Err(SchedErr::NoPendingRetx { dir: self.dir, pid: self.pid });
        }
        self.retx_pending = false;
        self.ack_pending = true;
        self.nof_retx += 1;
        self.slot_tx = slot_tx;
        self.slot_ack = slot_ack;
        self.prbs = prbs;
        Ok(())
    }
}

/// Oldest transmission first, lowest pid on ties
fn oldest_first(a: &&HarqProc, b: &&HarqProc) -> Ordering {
    a.slot_tx.partial_cmp(&b.slot_tx).unwrap_or(Ordering::Equal)
}

/// The DL and UL HARQ pools of one UE on one carrier.
///
/// Selection (`find_*`) never mutates. State only changes through `new_slot`,
/// feedback and the commit calls. Every `new_slot` for a new slot bumps the
/// generation, which invalidates reservations taken in the previous slot.
#[derive(Debug)]
pub struct HarqEntity {
    rnti: Rnti,
    cc: usize,
    nof_prb: u32,
    ack_timeout: u32,
    slot_rx: SlotPoint,
    generation: u32,
    dl_harqs: Vec<HarqProc>,
    ul_harqs: Vec<HarqProc>,
}

impl HarqEntity {
    pub fn new(rnti: Rnti, cc: usize, nof_prb: u32, nof_dl_harqs: usize, nof_ul_harqs: usize, ack_timeout: u32) -> Self {
        Self {
            rnti,
            cc,
            nof_prb,
            ack_timeout,
            slot_rx: SlotPoint::invalid(),
            generation: 0,
            dl_harqs: (0..nof_dl_harqs).map(|pid| HarqProc::new(pid, Direction::Dl)).collect(),
            ul_harqs: (0..nof_ul_harqs).map(|pid| HarqProc::new(pid, Direction::Ul)).collect(),
        }
    }

    /// Advance to a new receive slot. Processes whose feedback is overdue become
    /// retx-pending, or are released once their retransmission budget is spent.
    /// Calling twice with the same slot has no further effect.
    pub fn new_slot(&mut self, slot_rx: SlotPoint) {
        if self.slot_rx == slot_rx {
            return;
        }
        self.slot_rx = slot_rx;
        self.bump_generation();

        let (rnti, cc, ack_timeout) = (self.rnti, self.cc, self.ack_timeout);
        for h in self.dl_harqs.iter_mut().chain(self.ul_harqs.iter_mut()) {
            let max_retx = h.max_retx;
            match h.new_slot(slot_rx, ack_timeout) {
                Some(NackOutcome::Dropped) => log_dropped(rnti, cc, h.dir, h.pid, max_retx, slot_rx),
                Some(NackOutcome::Retx) => {
                    tracing::debug!(slot = ?slot_rx, "rnti=0x{:x} cc={} {} pid={} feedback timeout", rnti, cc, h.dir, h.pid)
                }
                None => {}
            }
        }
    }

    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub(crate) fn bump_generation(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    pub fn slot_rx(&self) -> SlotPoint {
        self.slot_rx
    }

    pub fn nof_prb(&self) -> u32 {
        self.nof_prb
    }

    pub fn nof_dl_harqs(&self) -> usize {
        self.dl_harqs.len()
    }

    pub fn nof_ul_harqs(&self) -> usize {
        self.ul_harqs.len()
    }

    pub fn harqs(&self, dir: Direction) -> &[HarqProc] {
        match dir {
            Direction::Dl => &self.dl_harqs,
            Direction::Ul => &self.ul_harqs,
        }
    }

    fn harq_mut(&mut self, dir: Direction, pid: usize) -> Result<&mut HarqProc, SchedErr> {
        let harqs = match dir {
            Direction::Dl => &mut self.dl_harqs,
            Direction::Ul => &mut self.ul_harqs,
        };
        harqs.get_mut(pid).ok_or(SchedErr::InvalidPid { dir, pid })
    }

    pub fn dl_harq(&self, pid: usize) -> Option<&HarqProc> {
        self.dl_harqs.get(pid)
    }

    pub fn ul_harq(&self, pid: usize) -> Option<&HarqProc> {
        self.ul_harqs.get(pid)
    }

    /// The retx-pending process with the oldest transmission, lowest pid on ties
    pub fn find_pending_retx(&self, dir: Direction) -> Option<&HarqProc> {
        self.harqs(dir).iter().filter(|h| h.has_pending_retx()).min_by(oldest_first)
    }

    /// The lowest-pid empty process
    pub fn find_empty(&self, dir: Direction) -> Option<&HarqProc> {
        self.harqs(dir).iter().find(|h| h.empty())
    }

    pub fn find_pending_dl_retx(&self) -> Option<&HarqProc> {
        self.find_pending_retx(Direction::Dl)
    }

    pub fn find_empty_dl_harq(&self) -> Option<&HarqProc> {
        self.find_empty(Direction::Dl)
    }

    pub fn find_pending_ul_retx(&self) -> Option<&HarqProc> {
        self.find_pending_retx(Direction::Ul)
    }

    pub fn find_empty_ul_harq(&self) -> Option<&HarqProc> {
        self.find_empty(Direction::Ul)
    }

    /// Commit a new transmission on an empty process
    #[allow(clippy::too_many_arguments)]
    pub fn new_tx(
        &mut self,
        dir: Direction,
        pid: usize,
        slot_tx: SlotPoint,
        slot_ack: SlotPoint,
        prbs: PrbGrant,
        mcs: u32,
        tbs: u32,
        max_retx: u32,
    ) -> Result<(), SchedErr> {
        self.check_prbs(prbs)?;
        self.harq_mut(dir, pid)?.new_tx(slot_tx, slot_ack, prbs, mcs, tbs, max_retx)
    }

    /// Commit a retransmission of a retx-pending process
    pub fn new_retx(
        &mut self,
        dir: Direction,
        pid: usize,
        slot_tx: SlotPoint,
        slot_ack: SlotPoint,
        prbs: PrbGrant,
    ) -> Result<(), SchedErr> {
        self.check_prbs(prbs)?;
        self.harq_mut(dir, pid)?.new_retx(slot_tx, slot_ack, prbs)
    }

    fn check_prbs(&self, prbs: PrbGrant) -> Result<(), SchedErr> {
        if prbs.fits(self.nof_prb) {
            Ok(())
        } else {
            Err(SchedErr::PrbOutOfRange { start: prbs.start, len: prbs.len, nof_prb: self.nof_prb })
        }
    }

    /// HARQ-ACK feedback for a DL process. Returns the number of acknowledged bytes.
    pub fn dl_ack_info(&mut self, pid: usize, ack: bool) -> Result<u32, SchedErr> {
        self.feedback(Direction::Dl, pid, ack)
    }

    /// PUSCH CRC result for a UL process. Returns the number of correctly received bytes.
    pub fn ul_crc_info(&mut self, pid: usize, crc: bool) -> Result<u32, SchedErr> {
        self.feedback(Direction::Ul, pid, crc)
    }

    fn feedback(&mut self, dir: Direction, pid: usize, ok: bool) -> Result<u32, SchedErr> {
        let (rnti, cc, slot_rx) = (self.rnti, self.cc, self.slot_rx);
        let h = self.harq_mut(dir, pid)?;
        let max_retx = h.max_retx;
        let (bytes, outcome) = h.ack_info(ok)?;
        match outcome {
            Some(NackOutcome::Dropped) => log_dropped(rnti, cc, dir, pid, max_retx, slot_rx),
            Some(NackOutcome::Retx) => {
                tracing::debug!(slot = ?slot_rx, "rnti=0x{:x} cc={} {} pid={} NACK, retx pending", rnti, cc, dir, pid)
            }
            None => {}
        }
        Ok(bytes)
    }
}

fn log_dropped(rnti: Rnti, cc: usize, dir: Direction, pid: usize, max_retx: u32, slot_rx: SlotPoint) {
    tracing::warn!(
        slot = ?slot_rx,
        "rnti=0x{:x} cc={} {} HARQ pid={} dropped after {} retransmissions",
        rnti,
        cc,
        dir,
        pid,
        max_retx
    );
}
