use clap::Parser;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use nr_config::{LoadedConfig, toml_config};
use nr_core::debug;

mod sim;
use sim::{SimParams, Simulator};

/// Load configuration file
fn load_config_from_toml(cfg_path: &str) -> LoadedConfig {
    match toml_config::from_file(cfg_path) {
        Ok(c) => c,
        Err(e) => {
            println!("Failed to load configuration from {}: {}", cfg_path, e);
            std::process::exit(1);
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "NR MAC slot reservation simulator",
    long_about = "Drives the per-UE slot reservation core over a number of slots, committing every candidate and acknowledging at the HARQ-ACK slot"
)]
struct Args {
    /// Config file (required)
    #[arg(help = "TOML config with scheduler, cell and UE parameters")]
    config: String,

    #[arg(short = 'n', long = "slots", default_value_t = 1000, help = "Number of PDCCH slots to simulate")]
    slots: u32,

    #[arg(long = "start-slot", default_value_t = 0, help = "Slot count of the first PDCCH slot")]
    start_slot: u32,

    #[arg(long = "tbs", default_value_t = 1500, help = "Transport block size of every new transmission, in bytes")]
    tbs: u32,

    #[arg(long = "dl-bytes", default_value_t = 1_000_000, help = "DL bytes initially queued per UE")]
    dl_bytes: u32,

    #[arg(long = "ul-bytes", default_value_t = 1_000_000, help = "UL bytes initially reported per UE")]
    ul_bytes: u32,

    #[arg(long = "nack-every", default_value_t = 0, help = "Make every n-th HARQ feedback negative (0: never)")]
    nack_every: u32,
}

fn main() {
    eprintln!("[+] NR MAC slot reservation simulator");

    let args = Args::parse();
    let cfg = load_config_from_toml(&args.config);
    let _log_guard = debug::setup_logging_default(cfg.debug_log.clone());

    let sim_params = SimParams {
        nof_slots: args.slots,
        start_slot: args.start_slot,
        tbs: args.tbs,
        dl_bytes: args.dl_bytes,
        ul_bytes: args.ul_bytes,
        nack_every: args.nack_every,
    };
    tracing::info!("{} cells, {} UEs, {:?}", cfg.params.cells.len(), cfg.ues.len(), sim_params);

    let mut simulator = match Simulator::new(cfg, sim_params) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("failed to create UEs: {}", e);
            std::process::exit(1);
        }
    };

    // Set up Ctrl+C handler for graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .expect("failed to set Ctrl+C handler");

    let nof_slots = simulator.run(&running);
    tracing::info!("simulated {} slots", nof_slots);
    simulator.log_summary();
}
