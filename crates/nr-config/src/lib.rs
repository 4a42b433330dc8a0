//! NR scheduler configuration
//!
//! This crate provides the static configuration consumed by the scheduler:
//! - Scheduler-wide arguments and per-cell parameters
//! - Per-UE configuration (carriers, HARQ-ACK timing)
//! - Validation and TOML configuration file parsing

pub mod cfg_err;
pub mod sched_config;
pub mod toml_config;
pub mod ue_config;

pub use cfg_err::CfgErr;
pub use sched_config::*;
pub use toml_config::*;
pub use ue_config::*;
