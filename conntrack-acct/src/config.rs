//! Rate curve configuration.
//!
//! This only covers what the loader itself needs before it can flip
//! `Ready` (SPEC_FULL.md §9). A full on-disk configuration format is the
//! out-of-scope external collaborator spec.md §1 names separately.

use std::time::Duration;

use conntrack_acct_common::CurvePoint;

use crate::error::Error;

/// One `AGE:INTERVAL` curve step, e.g. `10s:5s`.
#[derive(Clone, Copy, Debug)]
pub struct CurveStep {
    pub age: Duration,
    pub interval: Duration,
}

impl std::str::FromStr for CurveStep {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (age, interval) = s
            .split_once(':')
            .ok_or_else(|| Error::ConfigInvalid(format!("expected AGE:INTERVAL, got {s:?}")))?;

        let age = humantime::parse_duration(age)
            .map_err(|e| Error::ConfigInvalid(format!("bad age {age:?}: {e}")))?;
        let interval = humantime::parse_duration(interval)
            .map_err(|e| Error::ConfigInvalid(format!("bad interval {interval:?}: {e}")))?;

        Ok(CurveStep { age, interval })
    }
}

/// The default curve from SPEC_FULL.md §9 / spec.md's S1-S4 scenarios:
/// `[(0s, 1s), (10s, 5s), (60s, 30s)]`.
pub fn default_curve() -> [CurveStep; 3] {
    [
        CurveStep {
            age: Duration::from_secs(0),
            interval: Duration::from_secs(1),
        },
        CurveStep {
            age: Duration::from_secs(10),
            interval: Duration::from_secs(5),
        },
        CurveStep {
            age: Duration::from_secs(60),
            interval: Duration::from_secs(30),
        },
    ]
}

/// Validates the curve is monotonic in age (SPEC_FULL.md §3 invariant:
/// `C0.age <= C1.age <= C2.age`) and converts it to the wire-ready
/// nanosecond points.
pub fn resolve(steps: [CurveStep; 3]) -> Result<[CurvePoint; 3], Error> {
    if !(steps[0].age <= steps[1].age && steps[1].age <= steps[2].age) {
        return Err(Error::ConfigInvalid(
            "curve ages must be non-decreasing: C0.age <= C1.age <= C2.age".into(),
        ));
    }

    Ok(steps.map(|s| CurvePoint {
        age_ns: s.age.as_nanos() as u64,
        interval_ns: s.interval.as_nanos() as u64,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_age_interval_pair() {
        let step: CurveStep = "10s:5s".parse().unwrap();
        assert_eq!(step.age, Duration::from_secs(10));
        assert_eq!(step.interval, Duration::from_secs(5));
    }

    #[test]
    fn rejects_missing_separator() {
        assert!("10s".parse::<CurveStep>().is_err());
    }

    #[test]
    fn default_curve_is_monotonic() {
        assert!(resolve(default_curve()).is_ok());
    }

    #[test]
    fn rejects_non_monotonic_curve() {
        let mut steps = default_curve();
        steps[0].age = Duration::from_secs(100);
        assert!(resolve(steps).is_err());
    }
}
