use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use nr_config::{LoadedConfig, SchedParams};
use nr_core::{Direction, SlotPoint, TX_ENB_DELAY};
use nr_sched::{HarqGrant, HarqTicket, PrbGrant, Ue, UeBufferManager};

/// LCID / LCG the simulated traffic is queued on
const DATA_LCID: usize = 4;
const DATA_LCG: usize = 0;

const SIM_MCS: u32 = 16;

/// Simulation knobs taken from the command line
#[derive(Debug, Clone)]
pub struct SimParams {
    pub nof_slots: u32,
    pub start_slot: u32,
    pub tbs: u32,
    pub dl_bytes: u32,
    pub ul_bytes: u32,
    /// Every n-th HARQ feedback is negative, 0 disables
    pub nack_every: u32,
}

#[derive(Debug, Default, Clone)]
pub struct UeStats {
    pub dl_newtx: u32,
    pub dl_retx: u32,
    pub dl_acked_bytes: u64,
    pub ul_newtx: u32,
    pub ul_retx: u32,
    pub ul_crc_ok_bytes: u64,
    pub refused: u32,
}

/// Feedback the simulated UE will deliver once `slot_ack` is received
#[derive(Debug, Clone, Copy)]
struct PendingFeedback {
    slot_ack: SlotPoint,
    cc: usize,
    dir: Direction,
    pid: usize,
}

struct SimUe {
    ue: Ue,
    buffers: Arc<UeBufferManager>,
    dl_left: u32,
    ul_left: u32,
    feedback: Vec<PendingFeedback>,
    stats: UeStats,
}

impl SimUe {
    /// Deliver the feedback due in `slot_rx`, before the HARQ timeout would fire
    fn deliver_feedback(&mut self, slot_rx: SlotPoint, feedback_ctr: &mut u32, nack_every: u32) {
        let (due, later): (Vec<_>, Vec<_>) = self.feedback.drain(..).partition(|f| f.slot_ack == slot_rx);
        self.feedback = later;

        for f in due {
            *feedback_ctr += 1;
            let ok = nack_every == 0 || *feedback_ctr % nack_every != 0;
            let res = match f.dir {
                Direction::Dl => self.ue.dl_ack_info(f.cc, f.pid, ok),
                Direction::Ul => self.ue.ul_crc_info(f.cc, f.pid, ok),
            };
            match (res, f.dir) {
                (Ok(bytes), Direction::Dl) => {
                    self.stats.dl_acked_bytes += u64::from(bytes);
                    self.dl_left = self.dl_left.saturating_sub(bytes);
                    self.buffers.dl_buffer_state(DATA_LCID, self.dl_left, 0);
                }
                (Ok(bytes), Direction::Ul) => {
                    self.stats.ul_crc_ok_bytes += u64::from(bytes);
                    self.ul_left = self.ul_left.saturating_sub(bytes);
                    self.buffers.ul_bsr(DATA_LCG, self.ul_left);
                }
                (Err(e), _) => tracing::warn!(slot = ?slot_rx, "rnti=0x{:x} feedback rejected: {}", self.ue.rnti(), e),
            }
        }
    }

    fn commit(&mut self, ticket: HarqTicket, prbs: PrbGrant, tbs: u32) {
        let grant = HarqGrant { prbs, mcs: SIM_MCS, tbs };
        let res = match ticket.dir {
            Direction::Dl => self.ue.commit_dl(&ticket, grant),
            Direction::Ul => self.ue.commit_ul(&ticket, grant),
        };
        if let Err(e) = res {
            tracing::warn!(slot = ?ticket.slot_tx, "rnti=0x{:x} commit refused: {}", self.ue.rnti(), e);
            self.stats.refused += 1;
            return;
        }
        let counter = match (ticket.dir, ticket.retx) {
            (Direction::Dl, false) => &mut self.stats.dl_newtx,
            (Direction::Dl, true) => &mut self.stats.dl_retx,
            (Direction::Ul, false) => &mut self.stats.ul_newtx,
            (Direction::Ul, true) => &mut self.stats.ul_retx,
        };
        *counter += 1;
        self.feedback.push(PendingFeedback { slot_ack: ticket.slot_ack, cc: ticket.cc, dir: ticket.dir, pid: ticket.pid });
    }
}

/// Drives the UEs slot by slot. Each candidate gets an equal PRB share of the carrier,
/// first come first served.
pub struct Simulator {
    params: Arc<SchedParams>,
    ues: Vec<SimUe>,
    sim: SimParams,
    feedback_ctr: u32,
}

impl Simulator {
    /// All cells must share one numerology, the UEs advance on a single slot clock
    pub fn new(cfg: LoadedConfig, sim: SimParams) -> Result<Self, nr_config::CfgErr> {
        let mu = cfg.params.cells[0].mu;
        if let Some(cell) = cfg.params.cells.iter().find(|c| c.mu != mu) {
            return Err(nr_config::CfgErr::InvalidNumerology { cc: cell.cc, mu: cell.mu });
        }

        let mut ues = Vec::with_capacity(cfg.ues.len());
        for profile in cfg.ues {
            let buffers = Arc::new(UeBufferManager::new());
            buffers.dl_buffer_state(DATA_LCID, sim.dl_bytes, 0);
            buffers.ul_bsr(DATA_LCG, sim.ul_bytes);
            let ue = Ue::new(profile.rnti, profile.cfg, Arc::clone(&cfg.params), buffers.clone())?;
            ues.push(SimUe {
                ue,
                buffers,
                dl_left: sim.dl_bytes,
                ul_left: sim.ul_bytes,
                feedback: Vec::new(),
                stats: UeStats::default(),
            });
        }
        Ok(Self { params: cfg.params, ues, sim, feedback_ctr: 0 })
    }

    /// Run until the slot budget is spent or `running` is cleared. Returns the number of slots run.
    pub fn run(&mut self, running: &AtomicBool) -> u32 {
        let mu = self.params.cells[0].mu;
        let nof_ues = self.ues.len().max(1) as u32;

        for n in 0..self.sim.nof_slots {
            if !running.load(Ordering::SeqCst) {
                tracing::info!("interrupted after {} slots", n);
                return n;
            }
            let pdcch_slot = SlotPoint::new(mu, self.sim.start_slot.wrapping_add(n));
            let slot_rx = pdcch_slot - TX_ENB_DELAY;

            for sim_ue in &mut self.ues {
                sim_ue.deliver_feedback(slot_rx, &mut self.feedback_ctr, self.sim.nack_every);
                sim_ue.ue.new_slot(pdcch_slot);
            }

            for cell in &self.params.cells {
                let share = (cell.nof_prb() / nof_ues).max(1);
                let (mut dl_start, mut ul_start) = (0u32, 0u32);
                for sim_ue in &mut self.ues {
                    let sfu = sim_ue.ue.try_reserve(pdcch_slot, cell.cc);
                    if !sfu.is_valid() {
                        continue;
                    }
                    let (dl_ticket, ul_ticket) = (sfu.dl_ticket(), sfu.ul_ticket());

                    if let Some(ticket) = dl_ticket {
                        if dl_start + share <= cell.nof_prb() {
                            sim_ue.commit(ticket, PrbGrant::new(dl_start, share), self.sim.tbs);
                            dl_start += share;
                        }
                    }
                    if let Some(ticket) = ul_ticket {
                        if ul_start + share <= cell.nof_prb() {
                            sim_ue.commit(ticket, PrbGrant::new(ul_start, share), self.sim.tbs);
                            ul_start += share;
                        }
                    }
                }
            }
        }
        self.sim.nof_slots
    }

    pub fn log_summary(&self) {
        for sim_ue in &self.ues {
            let s = &sim_ue.stats;
            tracing::info!(
                "rnti=0x{:x} DL: {} newtx {} retx {} bytes acked | UL: {} newtx {} retx {} bytes ok | {} refused",
                sim_ue.ue.rnti(),
                s.dl_newtx,
                s.dl_retx,
                s.dl_acked_bytes,
                s.ul_newtx,
                s.ul_retx,
                s.ul_crc_ok_bytes,
                s.refused
            );
        }
    }
}
