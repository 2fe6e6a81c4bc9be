//! Curve-based rate limiter decision logic.
//!
//! These functions hold no map access and no eBPF helper calls, so they
//! run identically under `cargo test` on the host and inside the kernel
//! probe. The probe is responsible for doing the map lookups/writes and
//! handing the resulting values to these functions.

/// Magic value userspace writes into `Config[Ready]` once the rate curve
/// has been configured. Probes no-op until this is observed.
pub const READY_MAGIC: u64 = 0x90;

/// Index into the `Config` array map.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigKey {
    Ready = 0,
}

/// Number of slots in the `Config` array map.
pub const CONFIG_MAX: u32 = 1;

/// Index into the `RateCurve` array map, mirroring `enum o_config_ratecurve`
/// in the original C implementation.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CurveKey {
    Curve0Age = 0,
    Curve0Interval = 1,
    Curve1Age = 2,
    Curve1Interval = 3,
    Curve2Age = 4,
    Curve2Interval = 5,
}

/// Number of slots in the `RateCurve` array map.
pub const CURVE_MAX: u32 = 6;

/// One `(age_threshold_ns, interval_ns)` step of the rate curve.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CurvePoint {
    pub age_ns: u64,
    pub interval_ns: u64,
}

/// The three-step monotonic rate curve, already read out of the
/// `RateCurve` map. `None` in any slot means that slot's map lookup
/// failed (map not yet configured, or corrupted), which is always
/// treated as fail-closed.
#[derive(Clone, Copy, Debug, Default)]
pub struct RateCurve {
    pub c0: Option<CurvePoint>,
    pub c1: Option<CurvePoint>,
    pub c2: Option<CurvePoint>,
}

impl RateCurve {
    pub fn new(c0: CurvePoint, c1: CurvePoint, c2: CurvePoint) -> Self {
        Self {
            c0: Some(c0),
            c1: Some(c1),
            c2: Some(c2),
        }
    }
}

/// Selects the cooldown interval for a flow of the given age, per the
/// monotonic step function:
///
/// | condition | result |
/// |---|---|
/// | any curve lookup failed | `None` (drop) |
/// | `age < C0.age` | `None` (flow too young) |
/// | `C0.age <= age < C1.age` | `C0.interval` |
/// | `C1.age <= age < C2.age` | `C1.interval` |
/// | `age >= C2.age` | `C2.interval` |
pub fn select_interval(curve: &RateCurve, age_ns: u64) -> Option<u64> {
    let c0 = curve.c0?;
    let c1 = curve.c1?;
    let c2 = curve.c2?;

    if age_ns < c0.age_ns {
        return None;
    }
    if age_ns < c1.age_ns {
        return Some(c0.interval_ns);
    }
    if age_ns < c2.age_ns {
        return Some(c1.interval_ns);
    }
    Some(c2.interval_ns)
}

/// Computes the origin (first-observed timestamp) to record for a flow on
/// its first emission.
///
/// If the flow has seen at most one cumulative packet so far, it is
/// genuinely new: origin is `now`. Otherwise the probe has just been
/// (re)loaded onto a flow that already existed, so origin is back-dated
/// by `C1.age` to treat it as immediately middle-aged and avoid an event
/// storm across every pre-existing flow. Clamped to zero to avoid
/// underflow. If `C1.age` is unavailable, falls back to `now` (a missing
/// curve config degrades to "treat it as new" here; the *emission*
/// itself is still fail-closed through [`select_interval`]).
///
/// This is pure computation only: the caller is responsible for the
/// insert-if-absent (write-once) map semantics.
pub fn init_origin(now_ns: u64, pkts_total: u64, curve: &RateCurve) -> u64 {
    if pkts_total <= 1 {
        return now_ns;
    }
    match curve.c1 {
        Some(c1) => now_ns.saturating_sub(c1.age_ns),
        None => now_ns,
    }
}

/// Returns `true` if a flow with the given cooldown deadline may emit now.
/// A missing deadline (flow never emitted before) is always expired.
pub fn cooldown_expired(now_ns: u64, deadline: Option<u64>) -> bool {
    match deadline {
        Some(deadline) => now_ns >= deadline,
        None => true,
    }
}

/// Age of a flow given its recorded origin. A missing origin (flow never
/// observed before) yields age 0, matching the original's "lookup miss ⇒
/// 0ns age" behavior.
pub fn flow_age(now_ns: u64, origin_ns: Option<u64>) -> u64 {
    match origin_ns {
        Some(origin) => now_ns.saturating_sub(origin),
        None => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s1_curve() -> RateCurve {
        // S1/S2/S3 in SPEC_FULL.md §8: [(0, 1s), (10s, 5s), (60s, 30s)]
        const SEC: u64 = 1_000_000_000;
        RateCurve::new(
            CurvePoint {
                age_ns: 0,
                interval_ns: SEC,
            },
            CurvePoint {
                age_ns: 10 * SEC,
                interval_ns: 5 * SEC,
            },
            CurvePoint {
                age_ns: 60 * SEC,
                interval_ns: 30 * SEC,
            },
        )
    }

    #[test]
    fn missing_curve_entry_drops() {
        let curve = RateCurve::default();
        assert_eq!(select_interval(&curve, 1_000_000_000), None);
    }

    #[test]
    fn age_below_c0_drops() {
        let mut curve = s1_curve();
        curve.c0 = Some(CurvePoint {
            age_ns: 5_000_000_000,
            interval_ns: 1_000_000_000,
        });
        assert_eq!(select_interval(&curve, 1_000_000_000), None);
    }

    // S1 (first packet always emits): age 0 with curve c0.age == 0 selects
    // the first-bucket interval.
    #[test]
    fn s1_first_packet_selects_c0_interval() {
        let curve = s1_curve();
        assert_eq!(select_interval(&curve, 0), Some(1_000_000_000));
    }

    // S3 (curve progression): a flow aged past 10s selects the second
    // bucket's interval.
    #[test]
    fn s3_curve_progression_selects_c1_interval() {
        let curve = s1_curve();
        let age = 10_100_000_000; // 10.1s
        assert_eq!(select_interval(&curve, age), Some(5_000_000_000));
    }

    #[test]
    fn age_past_c2_selects_c2_interval() {
        let curve = s1_curve();
        assert_eq!(select_interval(&curve, 120_000_000_000), Some(30_000_000_000));
    }

    #[test]
    fn age_exactly_on_boundary_selects_upper_bucket() {
        let curve = s1_curve();
        assert_eq!(select_interval(&curve, 10_000_000_000), Some(5_000_000_000));
        assert_eq!(select_interval(&curve, 60_000_000_000), Some(30_000_000_000));
    }

    // S4 (restart back-dating).
    #[test]
    fn s4_restart_backdates_origin_by_c1_age() {
        let curve = s1_curve();
        let now = 1_000_000_000_000;
        let origin = init_origin(now, 42, &curve);
        assert_eq!(origin, now - 10_000_000_000);

        // Next emission should see an age >= C0.age and < C1.age is false
        // (it's exactly C1.age after back-dating), landing in the C1
        // bucket, i.e. interval 5s not 1s.
        let age = flow_age(now, Some(origin));
        assert_eq!(select_interval(&curve, age), Some(5_000_000_000));
    }

    #[test]
    fn first_emission_with_one_or_zero_packets_origin_is_now() {
        let curve = s1_curve();
        assert_eq!(init_origin(5_000, 0, &curve), 5_000);
        assert_eq!(init_origin(5_000, 1, &curve), 5_000);
    }

    #[test]
    fn origin_backdate_clamps_to_zero() {
        let curve = s1_curve();
        // now (5s) is less than C1.age (10s): underflow must clamp to 0.
        assert_eq!(init_origin(5_000_000_000, 2, &curve), 0);
    }

    // S2 (cooldown suppression).
    #[test]
    fn s2_cooldown_not_yet_expired_suppresses() {
        let deadline = Some(1_000_000_000u64);
        assert!(!cooldown_expired(500_000_000, deadline));
    }

    #[test]
    fn cooldown_expired_at_or_after_deadline() {
        let deadline = Some(1_000_000_000u64);
        assert!(cooldown_expired(1_000_000_000, deadline));
        assert!(cooldown_expired(1_000_000_001, deadline));
    }

    #[test]
    fn missing_cooldown_is_always_expired() {
        assert!(cooldown_expired(0, None));
    }

    #[test]
    fn missing_origin_yields_zero_age() {
        assert_eq!(flow_age(123, None), 0);
    }
}

#[cfg(test)]
mod proptests {
    use proptest::prelude::*;

    use super::*;

    proptest! {
        // Interval selection is monotonic non-decreasing in age for a
        // well-formed (monotonic) curve, never panics, and always
        // respects fail-closed semantics below c0.age.
        #[test]
        fn interval_selection_is_monotonic_and_total(
            c0_age in 0u64..1_000_000_000,
            c1_extra in 0u64..1_000_000_000,
            c2_extra in 0u64..1_000_000_000,
            i0 in 0u64..=u32::MAX as u64,
            i1 in 0u64..=u32::MAX as u64,
            i2 in 0u64..=u32::MAX as u64,
            age in 0u64..5_000_000_000,
        ) {
            let c1_age = c0_age + c1_extra;
            let c2_age = c1_age + c2_extra;
            let curve = RateCurve::new(
                CurvePoint { age_ns: c0_age, interval_ns: i0 },
                CurvePoint { age_ns: c1_age, interval_ns: i1 },
                CurvePoint { age_ns: c2_age, interval_ns: i2 },
            );

            let result = select_interval(&curve, age);
            if age < c0_age {
                prop_assert_eq!(result, None);
            } else {
                prop_assert!(result.is_some());
            }
        }

        // Back-dated origin is never in the future and never underflows.
        #[test]
        fn init_origin_never_exceeds_now(
            now in 0u64..10_000_000_000_000,
            pkts_total in 0u64..10_000,
            c1_age in 0u64..20_000_000_000,
        ) {
            let curve = RateCurve::new(
                CurvePoint { age_ns: 0, interval_ns: 0 },
                CurvePoint { age_ns: c1_age, interval_ns: 0 },
                CurvePoint { age_ns: c1_age * 2, interval_ns: 0 },
            );
            let origin = init_origin(now, pkts_total, &curve);
            prop_assert!(origin <= now);
        }
    }
}
