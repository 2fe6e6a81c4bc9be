//! In-crate simulation of the sampler's map-facing decision logic.
//!
//! `sampler::sample_update` in `conntrack-acct-ebpf` can't run under
//! `cargo test`: it touches real BPF maps. This harness models
//! `FlowCooldown`/`FlowOrigin` as plain `HashMap`s and replays the same
//! decision steps (cooldown check, write-once origin, interval select,
//! cooldown write) so the multi-call scenarios and invariants in
//! SPEC_FULL.md §8 can be exercised on the host.

use std::collections::HashMap;

use crate::{cooldown_expired, flow_age, init_origin, select_interval, FlowKey, RateCurve};

/// Host-side stand-in for the `FlowCooldown`/`FlowOrigin` BPF maps.
#[derive(Default)]
pub struct FlowTable {
    cooldown: HashMap<FlowKey, u64>,
    origin: HashMap<FlowKey, u64>,
}

impl FlowTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mirrors steps 4-6 of `sampler::sample_update`: cooldown check,
    /// write-once origin init, interval selection, cooldown write.
    /// Returns the interval just armed, or `None` if the event was
    /// suppressed or dropped.
    pub fn sample(&mut self, flow: FlowKey, now: u64, pkts_total: u64, curve: &RateCurve) -> Option<u64> {
        let deadline = self.cooldown.get(&flow).copied();
        if pkts_total > 1 && !cooldown_expired(now, deadline) {
            return None;
        }

        let origin = *self
            .origin
            .entry(flow)
            .or_insert_with(|| init_origin(now, pkts_total, curve));

        let age = flow_age(now, Some(origin));
        let interval = select_interval(curve, age)?;
        self.cooldown.insert(flow, now + interval);
        Some(interval)
    }

    /// Mirrors `maps::flow_cleanup`: unconditional removal from both maps.
    pub fn destroy(&mut self, flow: FlowKey) {
        self.cooldown.remove(&flow);
        self.origin.remove(&flow);
    }

    pub fn has_origin(&self, flow: FlowKey) -> bool {
        self.origin.contains_key(&flow)
    }

    pub fn has_cooldown(&self, flow: FlowKey) -> bool {
        self.cooldown.contains_key(&flow)
    }

    pub fn cooldown_deadline(&self, flow: FlowKey) -> Option<u64> {
        self.cooldown.get(&flow).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEC: u64 = 1_000_000_000;

    fn s1_curve() -> RateCurve {
        RateCurve::new(
            crate::CurvePoint {
                age_ns: 0,
                interval_ns: SEC,
            },
            crate::CurvePoint {
                age_ns: 10 * SEC,
                interval_ns: 5 * SEC,
            },
            crate::CurvePoint {
                age_ns: 60 * SEC,
                interval_ns: 30 * SEC,
            },
        )
    }

    // S2 (cooldown suppression) across two separate sampler calls.
    #[test]
    fn s2_cooldown_suppression_multi_call() {
        let curve = s1_curve();
        let mut flows = FlowTable::new();

        let flow = 1;
        let interval = flows.sample(flow, 0, 1, &curve);
        assert_eq!(interval, Some(SEC));
        assert_eq!(flows.cooldown_deadline(flow), Some(SEC));

        // Refresh fires at t=500ms with pkts_total=10; cooldown (1s) not
        // yet expired: no event, deadline unchanged.
        let result = flows.sample(flow, 500_000_000, 10, &curve);
        assert_eq!(result, None);
        assert_eq!(flows.cooldown_deadline(flow), Some(SEC));
    }

    // S3 (curve progression): once a flow ages past 10s, the next emission
    // uses the second bucket's interval.
    #[test]
    fn s3_curve_progression_multi_call() {
        let curve = s1_curve();
        let mut flows = FlowTable::new();
        let flow = 1;

        flows.sample(flow, 0, 1, &curve);

        let now = 10_100_000_000; // 10.1s
        let interval = flows.sample(flow, now, 12, &curve);
        assert_eq!(interval, Some(5 * SEC));
        assert_eq!(flows.cooldown_deadline(flow), Some(now + 5 * SEC));
    }

    // S4 (restart back-dating): a flow with pre-existing traffic is
    // observed for the first time by a freshly (re)loaded probe.
    #[test]
    fn s4_restart_backdating_multi_call() {
        let curve = s1_curve();
        let mut flows = FlowTable::new();
        let flow = 1;
        let now = 1_000_000_000_000;

        flows.sample(flow, now, 42, &curve);
        assert_eq!(flows.origin.get(&flow).copied(), Some(now - 10 * SEC));

        // Next emission lands in the C1 bucket (5s interval), not C0 (1s).
        let next_now = now + 1;
        let interval = flows.sample(flow, next_now, 43, &curve);
        assert_eq!(interval, Some(5 * SEC));
    }

    // S5 (destroy cleans up both maps unconditionally).
    #[test]
    fn s5_destroy_cleans_up() {
        let curve = s1_curve();
        let mut flows = FlowTable::new();
        let flow = 1;

        flows.sample(flow, 0, 1, &curve);
        assert!(flows.has_origin(flow));
        assert!(flows.has_cooldown(flow));

        flows.destroy(flow);
        assert!(!flows.has_origin(flow));
        assert!(!flows.has_cooldown(flow));
    }

    // Invariant 4: destroying a flow that was never sampled is a no-op,
    // not an error.
    #[test]
    fn destroy_never_sampled_flow_is_noop() {
        let mut flows = FlowTable::new();
        flows.destroy(42);
        assert!(!flows.has_origin(42));
        assert!(!flows.has_cooldown(42));
    }

    // Invariant 2: UPDATE events for a flow are separated by at least the
    // interval that applied at the earlier event, except for the flow's
    // very first emission.
    #[test]
    fn invariant2_spacing_holds_across_repeated_refreshes() {
        let curve = s1_curve();
        let mut flows = FlowTable::new();
        let flow = 1;

        let mut last_emit: Option<u64> = None;
        let mut last_interval: Option<u64> = None;

        for step in 0..20u64 {
            let now = step * 300_000_000; // every 300ms
            let pkts = step + 1;
            if let Some(interval) = flows.sample(flow, now, pkts, &curve) {
                if let (Some(prev), Some(prev_interval)) = (last_emit, last_interval) {
                    assert!(now - prev >= prev_interval);
                }
                last_emit = Some(now);
                last_interval = Some(interval);
            }
        }
        assert!(last_emit.is_some(), "curve with c0.age == 0 must emit eventually");
    }
}

#[cfg(test)]
mod proptests {
    use proptest::collection::vec as prop_vec;
    use proptest::prelude::*;

    use super::*;
    use crate::CurvePoint;

    proptest! {
        // For any monotonic curve and any schedule of increasing sample
        // times, two consecutive non-suppressed UPDATEs for the same flow
        // are never closer together than the interval armed at the first
        // of the pair (invariant 2), and destroying the flow always
        // leaves both maps empty (invariant 4).
        #[test]
        fn spacing_and_cleanup_hold_over_random_schedules(
            c1_age in 1u64..20_000_000_000,
            c2_extra in 0u64..20_000_000_000,
            interval0 in 1u64..2_000_000_000,
            interval1 in 1u64..10_000_000_000,
            interval2 in 1u64..30_000_000_000,
            deltas in prop_vec(0u64..2_000_000_000, 1..30),
        ) {
            let curve = RateCurve::new(
                CurvePoint { age_ns: 0, interval_ns: interval0 },
                CurvePoint { age_ns: c1_age, interval_ns: interval1 },
                CurvePoint { age_ns: c1_age + c2_extra, interval_ns: interval2 },
            );

            let mut flows = FlowTable::new();
            let flow = 7;
            let mut now = 0u64;
            let mut last_emit: Option<u64> = None;
            let mut last_interval: Option<u64> = None;

            for (i, delta) in deltas.iter().enumerate() {
                now += delta;
                let pkts = i as u64 + 1;
                if let Some(interval) = flows.sample(flow, now, pkts, &curve) {
                    if let (Some(prev), Some(prev_interval)) = (last_emit, last_interval) {
                        prop_assert!(now - prev >= prev_interval);
                    }
                    last_emit = Some(now);
                    last_interval = Some(interval);
                }
            }

            flows.destroy(flow);
            prop_assert!(!flows.has_origin(flow));
            prop_assert!(!flows.has_cooldown(flow));
        }
    }
}
