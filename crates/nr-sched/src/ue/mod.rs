pub mod sched_ue;
pub mod slot_ue;
pub mod ue_carrier;

pub use sched_ue::{AUTO_REFILL_BYTES, HarqGrant, Ue};
pub use slot_ue::{HarqTicket, SlotUe};
pub use ue_carrier::{MAX_CQI, UeCarrier};
