//! The four probe handlers attached by the userspace loader.
//!
//! Each handler starts with the `Ready` gate (SPEC_FULL.md §5) and always
//! returns `0`/success to the kernel (SPEC_FULL.md §4.6) regardless of
//! what happened inside.

use aya_ebpf::helpers::{bpf_get_current_pid_tgid, bpf_ktime_get_ns};
use aya_ebpf::macros::{kprobe, kretprobe};
use aya_ebpf::programs::{ProbeContext, RetProbeContext};
use conntrack_acct_common::{AcctEvent, FlowKey};

use crate::{extract, maps, sampler};

/// Samples the first event of a flow, right after the kernel commits it
/// to the conntrack table (`__nf_conntrack_hash_insert`).
#[kprobe]
pub fn first_confirm(ctx: ProbeContext) -> u32 {
    if !maps::probe_ready() {
        return 0;
    }

    let Some(flow) = flow_arg(&ctx) else {
        return 0;
    };
    let now = unsafe { bpf_ktime_get_ns() };

    sampler::sample_update(&ctx, flow, now);
    0
}

/// Top half of the update sampler (`__nf_ct_refresh_acct` entry). Stashes
/// the flow handle for the paired return probe to process after the
/// kernel has updated the flow's counters.
#[kprobe]
pub fn refresh_entry(ctx: ProbeContext) -> u32 {
    if !maps::probe_ready() {
        return 0;
    }

    let Some(flow) = flow_arg(&ctx) else {
        return 0;
    };
    let tid = current_tid();
    maps::stash_flow(tid, flow);
    0
}

/// Bottom half of the update sampler. Reads the stashed flow handle and
/// produces an UPDATE from the now-refreshed counters.
#[kretprobe]
pub fn refresh_return(ctx: RetProbeContext) -> u32 {
    if !maps::probe_ready() {
        return 0;
    }

    let tid = current_tid();
    let Some(flow) = maps::take_stashed_flow(tid) else {
        // Entry probe missed or raced; nothing to process.
        return 0;
    };
    let now = unsafe { bpf_ktime_get_ns() };

    sampler::sample_update(&ctx, flow, now);
    0
}

/// Emits the END event and tears down per-flow bookkeeping
/// (`destroy_conntrack`).
#[kprobe]
pub fn destroy(ctx: ProbeContext) -> u32 {
    if !maps::probe_ready() {
        return 0;
    }

    let Some(flow) = flow_arg(&ctx) else {
        return 0;
    };

    // Cleanup runs unconditionally, even for flows that never passed the
    // status check below.
    maps::flow_cleanup(flow);

    let ct = flow as *const u8;
    if !extract::status_valid(ct) {
        return 0;
    }

    let mut event = AcctEvent::zeroed();
    event.ts_ns = unsafe { bpf_ktime_get_ns() };
    event.cptr = flow;

    if extract::extract_counters(&mut event, ct).is_err() {
        return 0;
    }

    extract::extract_tuple(&mut event, ct);
    extract::extract_netns(&mut event, ct);
    extract::extract_tstamp(&mut event, ct);
    extract::extract_connmark(&mut event, ct);

    maps::submit_end(&ctx, &event);
    0
}

#[inline(always)]
fn flow_arg(ctx: &ProbeContext) -> Option<FlowKey> {
    ctx.arg::<u64>(0)
}

#[inline(always)]
fn current_tid() -> u32 {
    bpf_get_current_pid_tgid() as u32
}
