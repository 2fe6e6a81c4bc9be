//! Map declarations shared by every probe in this object.
//!
//! Names match the surface documented in SPEC_FULL.md §6 so the userspace
//! loader can look them up by name after `aya::Ebpf::load`.

use aya_ebpf::macros::map;
use aya_ebpf::maps::{Array, HashMap, PerCpuHashMap, PerfEventArray};
use conntrack_acct_common::{AcctEvent, FlowKey, CONFIG_MAX, CURVE_MAX};

/// UPDATE events, one per allowed sample while a flow is alive.
#[map(name = "PERF_ACCT_UPDATE")]
static PERF_ACCT_UPDATE: PerfEventArray<AcctEvent> = PerfEventArray::new(0);

/// END events, exactly one per flow over its lifetime (ring drops aside).
#[map(name = "PERF_ACCT_END")]
static PERF_ACCT_END: PerfEventArray<AcctEvent> = PerfEventArray::new(0);

/// flow key -> next-allowed-emission deadline (monotonic ns).
#[map(name = "FLOW_COOLDOWN")]
static FLOW_COOLDOWN: HashMap<FlowKey, u64> = HashMap::with_max_entries(65535, 0);

/// flow key -> first-observed timestamp (monotonic ns). Write-once.
#[map(name = "FLOW_ORIGIN")]
static FLOW_ORIGIN: HashMap<FlowKey, u64> = HashMap::with_max_entries(65535, 0);

/// (cpu, thread id) -> flow key, alive only across a refresh entry/return
/// pair. Per-CPU to keep cross-CPU contention out of the hot path.
#[map(name = "CURRCT")]
static CURRCT: PerCpuHashMap<u32, FlowKey> = PerCpuHashMap::with_max_entries(2048, 0);

/// Single `Ready` flag. Array index 0.
#[map(name = "CONFIG")]
static CONFIG: Array<u64> = Array::with_max_entries(CONFIG_MAX, 0);

/// Three `(age_ns, interval_ns)` pairs, flattened. See `conntrack_acct_common::CurveKey`.
#[map(name = "CONFIG_RATECURVE")]
static CONFIG_RATECURVE: Array<u64> = Array::with_max_entries(CURVE_MAX, 0);

/// Reads the `Ready` flag. Probes no-op entirely until this is `READY_MAGIC`.
#[inline(always)]
pub fn probe_ready() -> bool {
    unsafe { CONFIG.get(conntrack_acct_common::ConfigKey::Ready as u32) }
        .is_some_and(|v| *v == conntrack_acct_common::READY_MAGIC)
}

/// Reads the full rate curve out of `CONFIG_RATECURVE`. Any missing slot
/// leaves the corresponding curve point as `None`, which `select_interval`
/// treats as fail-closed.
#[inline(always)]
pub fn read_curve() -> conntrack_acct_common::RateCurve {
    use conntrack_acct_common::{CurveKey, CurvePoint, RateCurve};

    let get = |key: CurveKey| unsafe { CONFIG_RATECURVE.get(key as u32) }.copied();

    let point = |age_key: CurveKey, interval_key: CurveKey| {
        match (get(age_key), get(interval_key)) {
            (Some(age_ns), Some(interval_ns)) => Some(CurvePoint { age_ns, interval_ns }),
            _ => None,
        }
    };

    RateCurve {
        c0: point(CurveKey::Curve0Age, CurveKey::Curve0Interval),
        c1: point(CurveKey::Curve1Age, CurveKey::Curve1Interval),
        c2: point(CurveKey::Curve2Age, CurveKey::Curve2Interval),
    }
}

/// Looks up a flow's cooldown deadline. Absent means "never emitted".
#[inline(always)]
pub fn cooldown_deadline(flow: FlowKey) -> Option<u64> {
    unsafe { FLOW_COOLDOWN.get(&flow) }.copied()
}

/// Sets a flow's cooldown deadline (last writer wins across racing CPUs).
#[inline(always)]
pub fn set_cooldown(flow: FlowKey, deadline: u64) {
    let _ = FLOW_COOLDOWN.insert(&flow, &deadline, 0);
}

/// Looks up a flow's recorded origin.
#[inline(always)]
pub fn flow_origin(flow: FlowKey) -> Option<u64> {
    unsafe { FLOW_ORIGIN.get(&flow) }.copied()
}

/// Write-once insert of a flow's origin (`BPF_NOEXIST`): only the first
/// call for a given flow key actually stores a value.
#[inline(always)]
pub fn init_flow_origin(flow: FlowKey, origin: u64) {
    let _ = FLOW_ORIGIN.insert(&flow, &origin, aya_ebpf::bindings::BPF_NOEXIST as u64);
}

/// Removes both bookkeeping entries for a flow. Called unconditionally by
/// the destroy probe, even for flows that never passed the status check.
#[inline(always)]
pub fn flow_cleanup(flow: FlowKey) {
    let _ = FLOW_COOLDOWN.remove(&flow);
    let _ = FLOW_ORIGIN.remove(&flow);
}

/// Stashes the current flow key under the current thread id, for the
/// paired return probe to pick up.
#[inline(always)]
pub fn stash_flow(tid: u32, flow: FlowKey) {
    let _ = CURRCT.insert(&tid, &flow, 0);
}

/// Reads and drains the stashed flow key for the current thread id.
#[inline(always)]
pub fn take_stashed_flow(tid: u32) -> Option<FlowKey> {
    let flow = unsafe { CURRCT.get(&tid) }.copied();
    if flow.is_some() {
        let _ = CURRCT.remove(&tid);
    }
    flow
}

#[inline(always)]
pub fn submit_update<C: aya_ebpf::EbpfContext>(ctx: &C, event: &AcctEvent) {
    PERF_ACCT_UPDATE.output(ctx, event, 0);
}

#[inline(always)]
pub fn submit_end<C: aya_ebpf::EbpfContext>(ctx: &C, event: &AcctEvent) {
    PERF_ACCT_END.output(ctx, event, 0);
}
