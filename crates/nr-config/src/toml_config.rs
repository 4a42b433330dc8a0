use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::Arc;

use nr_core::{DuplexConfig, Rnti, TddPattern};
use serde::Deserialize;
use toml::Value;

use super::sched_config::{BwpParams, CellParams, PuschTimeRa, SchedArgs, SchedParams};
use super::ue_config::{HarqAckCfg, UeCarrierCfg, UeCfg, UePhyCfg};

const EXPECTED_CONFIG_VERSION: &str = "0.1";

/// A UE declared in the configuration file
#[derive(Debug, Clone)]
pub struct UeProfile {
    pub rnti: Rnti,
    pub cfg: UeCfg,
}

/// Result of loading a configuration file: validated scheduler parameters
/// plus the UEs to instantiate
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub params: Arc<SchedParams>,
    pub debug_log: Option<String>,
    pub ues: Vec<UeProfile>,
}

/// Build `LoadedConfig` from a TOML configuration string
pub fn from_toml_str(toml_str: &str) -> Result<LoadedConfig, Box<dyn std::error::Error>> {
    let root: TomlConfigRoot = toml::from_str(toml_str)?;

    if root.config_version != EXPECTED_CONFIG_VERSION {
        return Err(format!(
            "Unrecognized config_version: {}, expect {}",
            root.config_version, EXPECTED_CONFIG_VERSION
        )
        .into());
    }
    if !root.extra.is_empty() {
        return Err(format!("Unrecognized top-level fields: {:?}", sorted_keys(&root.extra)).into());
    }
    if let Some(ref sched) = root.sched {
        if !sched.extra.is_empty() {
            return Err(format!("Unrecognized fields in sched: {:?}", sorted_keys(&sched.extra)).into());
        }
    }
    for (idx, cell) in root.cell.iter().enumerate() {
        if !cell.extra.is_empty() {
            return Err(format!("Unrecognized fields in cell[{}]: {:?}", idx, sorted_keys(&cell.extra)).into());
        }
        if let Some(ref tdd) = cell.tdd {
            if !tdd.extra.is_empty() {
                return Err(format!("Unrecognized fields in cell[{}].tdd: {:?}", idx, sorted_keys(&tdd.extra)).into());
            }
        }
        for (bwp_idx, bwp) in cell.bwp.iter().enumerate() {
            if !bwp.extra.is_empty() {
                return Err(format!(
                    "Unrecognized fields in cell[{}].bwp[{}]: {:?}",
                    idx,
                    bwp_idx,
                    sorted_keys(&bwp.extra)
                )
                .into());
            }
        }
    }
    for (idx, ue) in root.ue.iter().enumerate() {
        if !ue.extra.is_empty() {
            return Err(format!("Unrecognized fields in ue[{}]: {:?}", idx, sorted_keys(&ue.extra)).into());
        }
    }

    let mut sched_cfg = SchedArgs::default();
    if let Some(sched) = root.sched {
        apply_sched_patch(&mut sched_cfg, sched);
    }

    let cells = root
        .cell
        .into_iter()
        .enumerate()
        .map(|(cc, dto)| build_cell(cc, dto))
        .collect();
    let params = SchedParams::new(sched_cfg, cells)?;

    let mut ues = Vec::with_capacity(root.ue.len());
    for dto in root.ue {
        let profile = build_ue(dto);
        profile.cfg.validate(&params)?;
        ues.push(profile);
    }

    Ok(LoadedConfig { params, debug_log: root.debug_log, ues })
}

/// Build `LoadedConfig` from any reader.
pub fn from_reader<R: Read>(reader: R) -> Result<LoadedConfig, Box<dyn std::error::Error>> {
    let mut contents = String::new();
    let mut reader = BufReader::new(reader);
    reader.read_to_string(&mut contents)?;
    from_toml_str(&contents)
}

/// Build `LoadedConfig` from a file path.
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<LoadedConfig, Box<dyn std::error::Error>> {
    let f = File::open(path)?;
    from_reader(f)
}

fn apply_sched_patch(dst: &mut SchedArgs, src: SchedArgsDto) {
    if let Some(v) = src.auto_refill_buffer {
        dst.auto_refill_buffer = v;
    }
    if let Some(v) = src.max_harq_retx {
        dst.max_harq_retx = v;
    }
    if let Some(v) = src.nof_dl_harqs {
        dst.nof_dl_harqs = v;
    }
    if let Some(v) = src.nof_ul_harqs {
        dst.nof_ul_harqs = v;
    }
    if let Some(v) = src.harq_ack_timeout_slots {
        dst.harq_ack_timeout_slots = v;
    }
    if let Some(v) = src.sr_grant_bytes {
        dst.sr_grant_bytes = v;
    }
}

fn build_cell(cc: usize, src: CellDto) -> CellParams {
    let duplex = match src.tdd {
        Some(tdd) => DuplexConfig::Tdd(tdd.pattern),
        None => DuplexConfig::Fdd,
    };

    let bwps = if src.bwp.is_empty() {
        vec![Arc::new(BwpParams::initial(src.nof_prb, default_k2()))]
    } else {
        src.bwp
            .into_iter()
            .enumerate()
            .map(|(bwp_id, bwp)| {
                Arc::new(BwpParams {
                    bwp_id: bwp_id as u32,
                    start_rb: bwp.start_rb,
                    nof_rb: bwp.nof_rb.unwrap_or(src.nof_prb - bwp.start_rb.min(src.nof_prb)),
                    pusch_ra_list: bwp.k2.into_iter().map(PuschTimeRa::full_slot).collect(),
                })
            })
            .collect()
    };

    CellParams { cc, nof_prb: src.nof_prb, mu: src.numerology, duplex, bwps }
}

fn build_ue(src: UeDto) -> UeProfile {
    let carriers = src.carriers.into_iter().map(|cc| UeCarrierCfg { cc, active: true }).collect();
    UeProfile {
        rnti: src.rnti,
        cfg: UeCfg {
            carriers,
            phy: UePhyCfg { harq_ack: HarqAckCfg { dl_data_to_ul_ack: src.k1 } },
        },
    }
}

fn sorted_keys(map: &HashMap<String, Value>) -> Vec<&str> {
    let mut v: Vec<&str> = map.keys().map(|s| s.as_str()).collect();
    v.sort_unstable();
    v
}

#[inline]
fn default_k2() -> u32 {
    4
}

#[inline]
fn default_k2_list() -> Vec<u32> {
    vec![default_k2()]
}

#[inline]
fn default_k1_table() -> Vec<u32> {
    vec![4, 5, 6, 7]
}

#[inline]
fn default_ue_carriers() -> Vec<usize> {
    vec![0]
}

/// ----------------------- DTOs for input shape -----------------------

#[derive(Deserialize)]
struct TomlConfigRoot {
    config_version: String,
    debug_log: Option<String>,

    #[serde(default)]
    sched: Option<SchedArgsDto>,

    #[serde(default)]
    cell: Vec<CellDto>,

    #[serde(default)]
    ue: Vec<UeDto>,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Default, Deserialize)]
struct SchedArgsDto {
    pub auto_refill_buffer: Option<bool>,
    pub max_harq_retx: Option<u32>,
    pub nof_dl_harqs: Option<usize>,
    pub nof_ul_harqs: Option<usize>,
    pub harq_ack_timeout_slots: Option<u32>,
    pub sr_grant_bytes: Option<u32>,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Deserialize)]
struct CellDto {
    pub nof_prb: u32,
    #[serde(default)]
    pub numerology: u8,

    /// Absent for FDD cells
    #[serde(default)]
    pub tdd: Option<TddDto>,

    #[serde(default)]
    pub bwp: Vec<BwpDto>,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Deserialize)]
struct TddDto {
    #[serde(flatten)]
    pub pattern: TddPattern,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Deserialize)]
struct BwpDto {
    #[serde(default)]
    pub start_rb: u32,
    pub nof_rb: Option<u32>,
    #[serde(default = "default_k2_list")]
    pub k2: Vec<u32>,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Deserialize)]
struct UeDto {
    pub rnti: Rnti,
    #[serde(default = "default_ue_carriers")]
    pub carriers: Vec<usize>,
    #[serde(default = "default_k1_table")]
    pub k1: Vec<u32>,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}
