//! Byte offsets into the kernel's `struct nf_conn` and its extensions.
//!
//! These mirror the field order of `net/netfilter/nf_conntrack.h` /
//! `nf_conntrack_extend.h` upstream, but several of the struct members
//! they sit after (`zone`, `nat_bysource`, `mark`, `secmark`) only exist
//! when the corresponding `CONFIG_NF_CONNTRACK_*` option is built in, so
//! the true offsets are specific to the target kernel's build. Treat the
//! constants below the way `bellistech-labs`'s `tcp_connect` probe treats
//! its `struct sock` offsets: a starting point good for the common
//! configuration, not a portable guarantee. A production build of this
//! probe should resolve these via BTF CO-RE relocations instead of the
//! fixed constants used here.

/// Offset of `tuplehash[IP_CT_DIR_MAX]` within `struct nf_conn`.
pub const NF_CONN_TUPLEHASH_OFFSET: usize = 16;
/// Size of `struct hlist_nulls_node` (two pointers on 64-bit), which
/// precedes `tuple` within `struct nf_conntrack_tuple_hash`.
pub const HLIST_NULLS_NODE_SIZE: usize = 16;
/// Size of `struct nf_conntrack_tuple` alone, not counting the
/// `hlist_nulls_node` header that comes before it.
pub const TUPLE_SIZE: usize = 40;
/// Size of one full `struct nf_conntrack_tuple_hash` (`hnnode` + `tuple`).
pub const TUPLEHASH_ENTRY_SIZE: usize = HLIST_NULLS_NODE_SIZE + TUPLE_SIZE;
/// `IP_CT_DIR_ORIGINAL` / `IP_CT_DIR_REPLY` indices into `tuplehash[]`.
pub const IP_CT_DIR_ORIGINAL: usize = 0;

/// Offset of the original-direction tuple's `dst.protonum` (u8), relative
/// to the start of `struct nf_conntrack_tuple` itself (i.e. after the
/// `hlist_nulls_node` header; see [`HLIST_NULLS_NODE_SIZE`]).
pub const TUPLE_PROTONUM_OFFSET: usize = 28;
/// Offset of `src.u3` (the `union nf_inet_addr`, 16 bytes), relative to
/// the tuple's own start.
pub const TUPLE_SRC_ADDR_OFFSET: usize = 0;
/// Offset of `dst.u3`, relative to the tuple's own start.
pub const TUPLE_DST_ADDR_OFFSET: usize = 16;
/// Offset of `src.u.all` (port, network order), relative to the tuple's
/// own start.
pub const TUPLE_SRC_PORT_OFFSET: usize = 16 + 16;
/// Offset of `dst.u.all`, relative to the tuple's own start.
pub const TUPLE_DST_PORT_OFFSET: usize = 16 + 16 + 16 + 4;

/// Offset of `unsigned long status` within `struct nf_conn`.
pub const NF_CONN_STATUS_OFFSET: usize =
    NF_CONN_TUPLEHASH_OFFSET + 2 * TUPLEHASH_ENTRY_SIZE;
/// Offset of `possible_net_t ct_net` (one pointer) within `struct nf_conn`.
pub const NF_CONN_CT_NET_OFFSET: usize = NF_CONN_STATUS_OFFSET + 8;
/// Offset of `u32 mark` within `struct nf_conn` (requires
/// `CONFIG_NF_CONNTRACK_MARK`; 0 is read back if the kernel wasn't built
/// with it, which is indistinguishable from a real zero mark here).
pub const NF_CONN_MARK_OFFSET: usize = NF_CONN_CT_NET_OFFSET + 16;
/// Offset of `struct nf_ct_ext *ext` within `struct nf_conn`.
pub const NF_CONN_EXT_OFFSET: usize = NF_CONN_MARK_OFFSET + 8;

/// Offset of `struct net_generic *gen` is irrelevant; we only need
/// `struct net.ns.inum`, which sits at this offset inside `struct net`.
pub const NET_NS_INUM_OFFSET: usize = 120;

/// `enum nf_ct_ext_id` indices used by this probe.
pub const NF_CT_EXT_ACCT: usize = 1;
pub const NF_CT_EXT_TSTAMP: usize = 2;

/// `struct nf_ct_ext` starts with a per-extension byte-offset table,
/// one `u8` per extension id; a zero entry means that extension is not
/// attached to this connection.
pub const NF_CT_EXT_OFFSET_TABLE_OFFSET: usize = 0;

/// Offset of `struct nf_conn_counter counter[IP_CT_DIR_MAX]` within
/// `struct nf_conn_acct`.
pub const NF_CONN_ACCT_COUNTER_OFFSET: usize = 0;
/// Size of one `struct nf_conn_counter` (packets: atomic64_t, bytes: atomic64_t).
pub const NF_CONN_COUNTER_ENTRY_SIZE: usize = 16;

/// Offset of `u64 start` within `struct nf_conn_tstamp`.
pub const NF_CONN_TSTAMP_START_OFFSET: usize = 0;
