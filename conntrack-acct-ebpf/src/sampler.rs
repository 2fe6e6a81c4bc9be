//! The shared decision+emit routine used by all three sampling probes.
//!
//! Step order follows SPEC_FULL.md §4.4 exactly: counters are read before
//! the cooldown check (the packet-count snapshot is the cooldown input),
//! and origin is written before the cooldown/interval lookup so that a
//! failed curve lookup still leaves a valid birth time recorded.

use aya_ebpf::EbpfContext;
use conntrack_acct_common::{
    cooldown_expired, flow_age, init_origin, select_interval, AcctEvent, FlowKey,
};

use crate::{extract, maps};

/// Samples one UPDATE event for `flow` at time `now`. A no-op at any step
/// leaves no trace other than whatever map state earlier steps already
/// committed (origin, if step 5 ran).
///
/// Generic over the probe context so the same routine serves both the
/// first-confirm kprobe and the refresh-return kretprobe.
pub fn sample_update<C: EbpfContext>(ctx: &C, flow: FlowKey, now: u64) {
    let ct = flow as *const u8;

    // 1. Flows that haven't passed policy yet must not be sampled.
    if !extract::status_valid(ct) {
        return;
    }

    // 2. Build the event skeleton.
    let mut event = AcctEvent::zeroed();
    event.ts_ns = now;
    event.cptr = flow;

    // 3. Counters are the one mandatory read; without them there's
    // nothing to report.
    if extract::extract_counters(&mut event, ct).is_err() {
        return;
    }

    // 4. Cooldown check against the packet-count snapshot just read.
    let pkts_total = event.pkts_total();
    let deadline = maps::cooldown_deadline(flow);
    if pkts_total > 1 && !cooldown_expired(now, deadline) {
        return;
    }

    let curve = maps::read_curve();

    // 5. Write-once origin init, using the restart back-dating rule.
    let origin = init_origin(now, pkts_total, &curve);
    maps::init_flow_origin(flow, origin);

    // 6. Interval selection + cooldown write. A curve miss drops the
    // event but leaves the origin written above untouched.
    let age = flow_age(now, maps::flow_origin(flow));
    let Some(interval) = select_interval(&curve, age) else {
        return;
    };
    maps::set_cooldown(flow, now + interval);

    // 7. Remaining fields.
    extract::extract_tuple(&mut event, ct);
    extract::extract_netns(&mut event, ct);
    extract::extract_tstamp(&mut event, ct);
    extract::extract_connmark(&mut event, ct);

    // 8. Submit.
    maps::submit_update(ctx, &event);
}
