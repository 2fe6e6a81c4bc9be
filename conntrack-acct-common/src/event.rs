//! Wire layout shared between the eBPF probes and the userspace reader.
//!
//! `AcctEvent` is emitted, byte for byte, on both `PERF_ACCT_UPDATE` and
//! `PERF_ACCT_END`. The field order and packing here are load-bearing: the
//! userspace side decodes raw perf-ring bytes straight into this type.

/// A single UPDATE or END record for one flow.
///
/// IPv4 addresses are stored in the low 32 bits of `src_addr`/`dst_addr`
/// with the remaining bits zeroed; IPv6 addresses occupy the full 128 bits.
#[repr(C, packed)]
#[derive(Clone, Copy)]
pub struct AcctEvent {
    /// Flow's first-seen timestamp (kernel-monotonic ns), 0 if unavailable.
    pub start_ns: u64,
    /// Timestamp of this event (kernel-monotonic ns).
    pub ts_ns: u64,
    /// Opaque flow key (kernel conntrack pointer, never dereferenced here).
    pub cptr: u64,
    pub src_addr: u128,
    pub dst_addr: u128,
    pub packets_orig: u64,
    pub bytes_orig: u64,
    pub packets_ret: u64,
    pub bytes_ret: u64,
    pub connmark: u32,
    /// Network namespace inode.
    pub netns: u32,
    /// Network byte order.
    pub src_port: u16,
    /// Network byte order.
    pub dst_port: u16,
    pub proto: u8,
}

/// Size of the on-wire record, per the layout table in SPEC_FULL.md §6.
pub const ACCT_EVENT_SIZE: usize = 101;

impl AcctEvent {
    pub const fn zeroed() -> Self {
        Self {
            start_ns: 0,
            ts_ns: 0,
            cptr: 0,
            src_addr: 0,
            dst_addr: 0,
            packets_orig: 0,
            bytes_orig: 0,
            packets_ret: 0,
            bytes_ret: 0,
            connmark: 0,
            netns: 0,
            src_port: 0,
            dst_port: 0,
            proto: 0,
        }
    }

    /// Total packets seen across both directions.
    ///
    /// Copies the packed fields to locals first: taking a reference to a
    /// field of a `repr(packed)` struct is unaligned and not allowed in
    /// safe code.
    pub fn pkts_total(&self) -> u64 {
        let orig = self.packets_orig;
        let ret = self.packets_ret;
        orig + ret
    }
}

// SAFETY: `AcctEvent` is `repr(C, packed)`, contains only integer fields,
// and has no padding, so every bit pattern is valid and it may be freely
// copied as bytes.
unsafe impl bytemuck::Zeroable for AcctEvent {}
unsafe impl bytemuck::Pod for AcctEvent {}

/// Unpacked, serializable copy of [`AcctEvent`].
///
/// `AcctEvent` itself can't derive `Serialize`/`Deserialize`: the derive
/// expands to code that borrows individual fields, and borrowing a field of
/// a `repr(packed)` struct wider than a byte is unaligned and rejected by
/// the compiler. This type exists solely so the userspace side has
/// something to hand to `serde_json`.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AcctEventOwned {
    pub start_ns: u64,
    pub ts_ns: u64,
    pub cptr: u64,
    pub src_addr: u128,
    pub dst_addr: u128,
    pub packets_orig: u64,
    pub bytes_orig: u64,
    pub packets_ret: u64,
    pub bytes_ret: u64,
    pub connmark: u32,
    pub netns: u32,
    pub src_port: u16,
    pub dst_port: u16,
    pub proto: u8,
}

impl From<&AcctEvent> for AcctEventOwned {
    fn from(ev: &AcctEvent) -> Self {
        Self {
            start_ns: ev.start_ns,
            ts_ns: ev.ts_ns,
            cptr: ev.cptr,
            src_addr: ev.src_addr,
            dst_addr: ev.dst_addr,
            packets_orig: ev.packets_orig,
            bytes_orig: ev.bytes_orig,
            packets_ret: ev.packets_ret,
            bytes_ret: ev.bytes_ret,
            connmark: ev.connmark,
            netns: ev.netns,
            src_port: ev.src_port,
            dst_port: ev.dst_port,
            proto: ev.proto,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_matches_wire_layout() {
        assert_eq!(core::mem::size_of::<AcctEvent>(), ACCT_EVENT_SIZE);
    }

    #[test]
    fn pkts_total_sums_both_directions() {
        let mut ev = AcctEvent::zeroed();
        ev.packets_orig = 3;
        ev.packets_ret = 4;
        assert_eq!(ev.pkts_total(), 7);
    }

    #[test]
    fn owned_conversion_preserves_fields() {
        let mut ev = AcctEvent::zeroed();
        ev.cptr = 0xdead_beef;
        ev.src_addr = 0x7f00_0001;
        ev.dst_port = 443;
        ev.proto = 6;

        let owned = AcctEventOwned::from(&ev);
        assert_eq!(owned.cptr, 0xdead_beef);
        assert_eq!(owned.src_addr, 0x7f00_0001);
        assert_eq!(owned.dst_port, 443);
        assert_eq!(owned.proto, 6);
    }
}
