//! Loads the compiled `conntrack-acct-ebpf` object, attaches its four
//! probes, and configures the rate curve.
//!
//! Readiness ordering matters (SPEC_FULL.md §5): the curve must be
//! written in full *before* the `Ready` flag, so there is never a window
//! where a probe is active with an unconfigured curve.

use std::path::Path;

use aya::maps::Array;
use aya::programs::KProbe;
use aya::Ebpf;
use conntrack_acct_common::{ConfigKey, CurveKey, CurvePoint, READY_MAGIC};
use tracing::info;

use crate::error::Error;

const PROGRAMS: &[(&str, &str)] = &[
    ("first_confirm", "__nf_conntrack_hash_insert"),
    ("refresh_entry", "__nf_ct_refresh_acct"),
    ("refresh_return", "__nf_ct_refresh_acct"),
    ("destroy", "destroy_conntrack"),
];

/// Loads the eBPF object at `path` and attaches all four probes. Returns
/// the live [`Ebpf`] handle; dropping it detaches everything.
pub fn load(path: &Path) -> Result<Ebpf, Error> {
    let mut ebpf = Ebpf::load_file(path).map_err(|source| Error::Load {
        path: path.display().to_string(),
        source,
    })?;

    if let Err(e) = aya_log::EbpfLogger::init(&mut ebpf) {
        // Kernel-side logging is a diagnostic nicety, not load-bearing.
        tracing::warn!("failed to initialize eBPF logger: {e}");
    }

    for &(prog_name, kernel_symbol) in PROGRAMS {
        let program: &mut KProbe = ebpf
            .program_mut(prog_name)
            .ok_or(Error::MissingMap { name: prog_name })?
            .try_into()
            .map_err(|source| Error::ResolveProgram {
                name: prog_name,
                source,
            })?;

        program.load().map_err(|source| Error::Attach {
            name: prog_name,
            source,
        })?;
        program
            .attach(kernel_symbol, 0)
            .map_err(|source| Error::Attach {
                name: prog_name,
                source,
            })?;

        info!(program = prog_name, symbol = kernel_symbol, "attached");
    }

    Ok(ebpf)
}

/// Writes the rate curve and flips `Ready`. Must run after [`load`] and
/// before any caller expects events to start flowing.
pub fn configure(ebpf: &mut Ebpf, curve: [CurvePoint; 3]) -> Result<(), Error> {
    let mut curve_map: Array<_, u64> = Array::try_from(
        ebpf.map_mut("CONFIG_RATECURVE")
            .ok_or(Error::MissingMap {
                name: "CONFIG_RATECURVE",
            })?,
    )
    .map_err(|source| Error::MapIo {
        name: "CONFIG_RATECURVE",
        source,
    })?;

    let entries = [
        (CurveKey::Curve0Age, curve[0].age_ns),
        (CurveKey::Curve0Interval, curve[0].interval_ns),
        (CurveKey::Curve1Age, curve[1].age_ns),
        (CurveKey::Curve1Interval, curve[1].interval_ns),
        (CurveKey::Curve2Age, curve[2].age_ns),
        (CurveKey::Curve2Interval, curve[2].interval_ns),
    ];
    for (key, value) in entries {
        curve_map
            .set(key as u32, value, 0)
            .map_err(|source| Error::MapIo {
                name: "CONFIG_RATECURVE",
                source,
            })?;
    }

    let mut config_map: Array<_, u64> = Array::try_from(
        ebpf.map_mut("CONFIG")
            .ok_or(Error::MissingMap { name: "CONFIG" })?,
    )
    .map_err(|source| Error::MapIo {
        name: "CONFIG",
        source,
    })?;
    config_map
        .set(ConfigKey::Ready as u32, READY_MAGIC, 0)
        .map_err(|source| Error::MapIo {
            name: "CONFIG",
            source,
        })?;

    info!("rate curve configured, probes are now ready");
    Ok(())
}
