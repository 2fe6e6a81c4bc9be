//! Typed errors for the loader shim. `main` wraps these (and everything
//! else) in `anyhow::Context` at each call site; this enum exists so
//! library-style callers of [`crate::loader`] get something matchable.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to load eBPF object from {path}: {source}")]
    Load {
        path: String,
        #[source]
        source: aya::EbpfError,
    },

    #[error("failed to resolve program {name}: {source}")]
    ResolveProgram {
        name: &'static str,
        #[source]
        source: aya::programs::ProgramError,
    },

    #[error("failed to attach program {name}: {source}")]
    Attach {
        name: &'static str,
        #[source]
        source: aya::programs::ProgramError,
    },

    #[error("failed to resolve map {name}")]
    MissingMap { name: &'static str },

    #[error("map i/o error on {name}: {source}")]
    MapIo {
        name: &'static str,
        #[source]
        source: aya::maps::MapError,
    },

    #[error("invalid rate curve: {0}")]
    ConfigInvalid(String),

    #[error("failed to enumerate online CPUs ({0}): {1}")]
    OnlineCpus(&'static str, std::io::Error),
}
