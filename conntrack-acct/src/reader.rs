//! Reads decoded `AcctEvent`s off both perf arrays.
//!
//! One reader task per online CPU per array (SPEC_FULL.md §6.1), matching
//! how perf event arrays are inherently per-CPU ring buffers. Decoded
//! events and a running lost-event tally are forwarded over a single
//! channel so the caller doesn't need to know how many CPUs are online.

use std::mem::size_of;

use aya::maps::perf::AsyncPerfEventArray;
use aya::util::online_cpus;
use aya::Ebpf;
use bytes::BytesMut;
use conntrack_acct_common::AcctEvent;
use tokio::sync::mpsc;
use tracing::warn;

use crate::error::Error;

/// Which perf array a decoded event came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
    Update,
    End,
}

#[derive(Clone, Copy, Debug)]
pub struct Decoded {
    pub kind: Kind,
    pub event: AcctEvent,
}

/// Number of perf-ring buffers to hand to `read_events` per poll; plain
/// double buffering is enough since the consumer drains every iteration.
const BUFFERS_PER_CPU: usize = 10;

/// Opens `map_name` on every online CPU and spawns a reader task per CPU
/// that forwards decoded events (tagged `kind`) onto `tx`.
pub fn spawn(ebpf: &mut Ebpf, map_name: &'static str, kind: Kind, tx: mpsc::Sender<Decoded>) -> Result<(), Error> {
    let map = ebpf.take_map(map_name).ok_or(Error::MissingMap { name: map_name })?;
    let mut perf_array: AsyncPerfEventArray<_> =
        AsyncPerfEventArray::try_from(map).map_err(|source| Error::MapIo {
            name: map_name,
            source,
        })?;

    for cpu_id in online_cpus().map_err(|(msg, source)| Error::OnlineCpus(msg, source))? {
        let mut buf = perf_array
            .open(cpu_id, None)
            .map_err(|source| Error::MapIo {
                name: map_name,
                source,
            })?;
        let tx = tx.clone();

        tokio::spawn(async move {
            let mut buffers: Vec<BytesMut> = (0..BUFFERS_PER_CPU)
                .map(|_| BytesMut::with_capacity(size_of::<AcctEvent>()))
                .collect();

            loop {
                let events = match buf.read_events(&mut buffers).await {
                    Ok(events) => events,
                    Err(e) => {
                        warn!(cpu = cpu_id, error = %e, "perf read failed, stopping reader");
                        return;
                    }
                };

                if events.lost > 0 {
                    warn!(cpu = cpu_id, lost = events.lost, "perf ring dropped events");
                }

                for buf in buffers.iter().take(events.read) {
                    let Some(bytes) = buf.get(..size_of::<AcctEvent>()) else {
                        continue;
                    };
                    let event: AcctEvent = *bytemuck::from_bytes(bytes);
                    if tx.send(Decoded { kind, event }).await.is_err() {
                        return;
                    }
                }
            }
        });
    }

    Ok(())
}
