//! Per-field readers of a `struct nf_conn *`.
//!
//! Every read here is a `bpf_probe_read_kernel`, which the verifier
//! accepts as fallible: a failed read is "field unavailable" (SPEC_FULL.md
//! §4.1/§4.6), never a reason to abort the whole event.

use aya_ebpf::helpers::bpf_probe_read_kernel;
use conntrack_acct_common::AcctEvent;

use crate::layout::*;

#[inline(always)]
unsafe fn read_at<T: Copy>(base: *const u8, offset: usize) -> Option<T> {
    bpf_probe_read_kernel(base.add(offset) as *const T).ok()
}

/// Reads `ct->status`. Zero means the flow hasn't passed policy yet and
/// must not be sampled.
#[inline(always)]
pub fn status_valid(ct: *const u8) -> bool {
    let status: u64 = unsafe { read_at(ct, NF_CONN_STATUS_OFFSET) }.unwrap_or(0);
    status != 0
}

/// Locates a connection extension's byte offset within `ct->ext`, per the
/// two-step indirection described in SPEC_FULL.md §4.2: the connection has
/// an extension block pointer, and the block has a per-kind offset table.
/// Returns `None` if the extension block is absent or the extension isn't
/// enabled for this connection.
#[inline(always)]
unsafe fn find_extension(ct: *const u8, ext_id: usize) -> Option<*const u8> {
    let ext_ptr: u64 = read_at(ct, NF_CONN_EXT_OFFSET)?;
    if ext_ptr == 0 {
        return None;
    }
    let ext_ptr = ext_ptr as *const u8;

    let ext_offset: u8 = read_at(ext_ptr, NF_CT_EXT_OFFSET_TABLE_OFFSET + ext_id)?;
    if ext_offset == 0 {
        return None;
    }

    Some(ext_ptr.add(ext_offset as usize))
}

/// Extracts per-direction packet/byte counters from the accounting
/// extension. Returns `Err(())` if the extension isn't present, which the
/// sampler treats as "nothing to report" and suppresses the event.
#[inline(always)]
pub fn extract_counters(event: &mut AcctEvent, ct: *const u8) -> Result<(), ()> {
    let acct_ext = unsafe { find_extension(ct, NF_CT_EXT_ACCT) }.ok_or(())?;

    let counter_at = |dir: usize| -> Option<(u64, u64)> {
        let base = NF_CONN_ACCT_COUNTER_OFFSET + dir * NF_CONN_COUNTER_ENTRY_SIZE;
        let packets: u64 = unsafe { read_at(acct_ext, base) }?;
        let bytes: u64 = unsafe { read_at(acct_ext, base + 8) }?;
        Some((packets, bytes))
    };

    let (packets_orig, bytes_orig) = counter_at(IP_CT_DIR_ORIGINAL).ok_or(())?;
    let (packets_ret, bytes_ret) = counter_at(1 - IP_CT_DIR_ORIGINAL).ok_or(())?;

    event.packets_orig = packets_orig;
    event.bytes_orig = bytes_orig;
    event.packets_ret = packets_ret;
    event.bytes_ret = bytes_ret;

    Ok(())
}

/// Extracts the flow's start timestamp from the optional timestamp
/// extension. A missing extension leaves `start_ns = 0` and is not an
/// error: SPEC_FULL.md §4.2 only requires counters to be mandatory.
#[inline(always)]
pub fn extract_tstamp(event: &mut AcctEvent, ct: *const u8) {
    if let Some(ts_ext) = unsafe { find_extension(ct, NF_CT_EXT_TSTAMP) } {
        if let Some(start) = unsafe { read_at::<u64>(ts_ext, NF_CONN_TSTAMP_START_OFFSET) } {
            event.start_ns = start;
        }
    }
}

/// Extracts proto, source/destination address and ports from the
/// original-direction tuple. Never fails outright: a read failure just
/// leaves the already-zeroed field at zero.
#[inline(always)]
pub fn extract_tuple(event: &mut AcctEvent, ct: *const u8) {
    let tuple_base = NF_CONN_TUPLEHASH_OFFSET
        + IP_CT_DIR_ORIGINAL * TUPLEHASH_ENTRY_SIZE
        + HLIST_NULLS_NODE_SIZE;

    if let Some(proto) = unsafe { read_at::<u8>(ct, tuple_base + TUPLE_PROTONUM_OFFSET) } {
        event.proto = proto;
    }
    if let Some(src) = unsafe { read_at::<u128>(ct, tuple_base + TUPLE_SRC_ADDR_OFFSET) } {
        event.src_addr = src;
    }
    if let Some(dst) = unsafe { read_at::<u128>(ct, tuple_base + TUPLE_DST_ADDR_OFFSET) } {
        event.dst_addr = dst;
    }
    if let Some(sport) = unsafe { read_at::<u16>(ct, tuple_base + TUPLE_SRC_PORT_OFFSET) } {
        event.src_port = sport;
    }
    if let Some(dport) = unsafe { read_at::<u16>(ct, tuple_base + TUPLE_DST_PORT_OFFSET) } {
        event.dst_port = dport;
    }
}

/// Walks `ct->ct_net` to the network namespace's inode number. Any read
/// failure along the way leaves `netns = 0`.
#[inline(always)]
pub fn extract_netns(event: &mut AcctEvent, ct: *const u8) {
    let net_ptr: Option<u64> = unsafe { read_at(ct, NF_CONN_CT_NET_OFFSET) };
    let Some(net_ptr) = net_ptr.filter(|p| *p != 0) else {
        return;
    };

    if let Some(inum) = unsafe { read_at::<u32>(net_ptr as *const u8, NET_NS_INUM_OFFSET) } {
        event.netns = inum;
    }
}

/// Extracts the connection mark.
#[inline(always)]
pub fn extract_connmark(event: &mut AcctEvent, ct: *const u8) {
    if let Some(mark) = unsafe { read_at::<u32>(ct, NF_CONN_MARK_OFFSET) } {
        event.connmark = mark;
    }
}
