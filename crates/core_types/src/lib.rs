/// Opaque handle for a node owned by a host tree.
///
/// Hosts hand these out from their node factory; the reconciler never
/// dereferences them itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostId(pub u32);

impl HostId {
    /// Reserved sentinel for "unassigned/invalid" identity.
    pub const INVALID: HostId = HostId(0);

    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

/// Logical access time for cache entries.
///
/// Monotonic per cache instance; ordering is the only meaningful property.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CacheStamp(pub u64);

impl CacheStamp {
    pub const INITIAL: CacheStamp = CacheStamp(0);

    pub fn next(self) -> Self {
        CacheStamp(self.0.wrapping_add(1))
    }
}
