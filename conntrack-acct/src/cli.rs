use std::path::PathBuf;

use clap::Parser;

use crate::config::CurveStep;

/// Loads the conntrack-acct probes and prints decoded flow events.
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Args {
    /// Path to the compiled eBPF object (the `conntrack-acct-ebpf` bin,
    /// built for the `bpfel-unknown-none`/`bpfeb-unknown-none` target).
    #[arg(long, default_value = "target/bpfel-unknown-none/release/conntrack-acct")]
    pub object: PathBuf,

    /// First curve step, AGE:INTERVAL (e.g. `0s:1s`).
    #[arg(long, env = "CONNTRACK_ACCT_CURVE0")]
    pub curve0: Option<CurveStep>,
    /// Second curve step, AGE:INTERVAL (e.g. `10s:5s`).
    #[arg(long, env = "CONNTRACK_ACCT_CURVE1")]
    pub curve1: Option<CurveStep>,
    /// Third curve step, AGE:INTERVAL (e.g. `60s:30s`).
    #[arg(long, env = "CONNTRACK_ACCT_CURVE2")]
    pub curve2: Option<CurveStep>,

    /// Emit one JSON object per line instead of the human-readable format.
    #[arg(long)]
    pub json: bool,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
    /// Decrease log verbosity.
    #[arg(short, long)]
    pub quiet: bool,
}
