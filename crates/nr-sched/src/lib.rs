//! Per-UE slot reservation for the NR MAC scheduler
//!
//! For every PDCCH slot the scheduler advances each UE with [`Ue::new_slot`], then
//! asks [`Ue::try_reserve`] on each carrier for a [`SlotUe`]: the slot timing the UE
//! would use and the HARQ processes eligible in DL and UL. Selection never mutates;
//! the allocator commits what it picked through a [`HarqTicket`].

pub mod buffers;
pub mod bwp_ue_cfg;
pub mod harq;
pub mod sched_err;
pub mod ue;

pub use buffers::{BufferAccessor, UeBufferManager};
pub use bwp_ue_cfg::BwpUeConfig;
pub use harq::{HarqEntity, HarqProc, HarqState, PrbGrant};
pub use sched_err::SchedErr;
pub use ue::{AUTO_REFILL_BYTES, HarqGrant, HarqTicket, MAX_CQI, SlotUe, Ue, UeCarrier};
