//! Userspace loader/reader shim for the conntrack-acct eBPF probes.
//!
//! Loads the compiled probe object, configures the rate curve, and prints
//! decoded UPDATE/END events. This intentionally stays thin: the full
//! collector/aggregator is the external, out-of-scope collaborator
//! spec.md §1 names separately.

mod cli;
mod config;
mod error;
mod loader;
mod reader;

use std::array;

use anyhow::{Context, Result};
use clap::Parser;
use conntrack_acct_common::{AcctEvent, AcctEventOwned};
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::cli::Args;
use crate::reader::{Decoded, Kind};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    let curve_steps = array::from_fn(|i| {
        [args.curve0, args.curve1, args.curve2][i].unwrap_or(config::default_curve()[i])
    });
    let curve = config::resolve(curve_steps).context("invalid rate curve")?;

    let mut ebpf = loader::load(&args.object)
        .with_context(|| format!("loading {}", args.object.display()))?;
    loader::configure(&mut ebpf, curve).context("writing rate curve / ready flag")?;

    let (tx, mut rx) = mpsc::channel::<Decoded>(4096);
    reader::spawn(&mut ebpf, "PERF_ACCT_UPDATE", Kind::Update, tx.clone())
        .context("opening PERF_ACCT_UPDATE")?;
    reader::spawn(&mut ebpf, "PERF_ACCT_END", Kind::End, tx).context("opening PERF_ACCT_END")?;

    info!("conntrack-acct running, press ctrl-c to stop");

    loop {
        tokio::select! {
            Some(decoded) = rx.recv() => print_event(decoded, args.json),
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
        }
    }

    Ok(())
}

fn init_logging(verbose: u8, quiet: bool) {
    let default_level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .init();
}

fn print_event(decoded: Decoded, json: bool) {
    if json {
        let owned = AcctEventOwned::from(&decoded.event);
        match serde_json::to_string(&owned) {
            Ok(line) => println!("{line}"),
            Err(e) => error!("failed to serialize event: {e}"),
        }
        return;
    }

    let kind = match decoded.kind {
        Kind::Update => "UPDATE",
        Kind::End => "END",
    };
    println!("{kind} {}", format_event(&decoded.event));
}

fn format_event(event: &AcctEvent) -> String {
    let proto = event.proto;
    let src_port = event.src_port;
    let dst_port = event.dst_port;
    let netns = event.netns;
    let connmark = event.connmark;
    let packets_orig = event.packets_orig;
    let bytes_orig = event.bytes_orig;
    let packets_ret = event.packets_ret;
    let bytes_ret = event.bytes_ret;
    let cptr = event.cptr;

    format!(
        "flow={cptr:#x} proto={proto} port={src_port}->{dst_port} netns={netns} \
         mark={connmark} orig={packets_orig}pkt/{bytes_orig}B ret={packets_ret}pkt/{bytes_ret}B"
    )
}
