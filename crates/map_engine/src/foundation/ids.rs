//! Process-unique identifiers for drawables, textures and component objects

use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};

/// Opaque 64-bit identifier
///
/// Identifiers carry no meaning beyond uniqueness and sort order. Zero is
/// reserved as [`Identifier::EMPTY`] and never handed out by an allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(u64);

/// Ordered set of identifiers (deterministic iteration)
pub type IdentifierSet = BTreeSet<Identifier>;

static GLOBAL_ALLOCATOR: OnceLock<Arc<IdentifierAllocator>> = OnceLock::new();

impl Identifier {
    /// The reserved "no object" identifier
    pub const EMPTY: Self = Self(0);

    /// Allocate from the process-wide allocator
    pub fn next() -> Self {
        IdentifierAllocator::process().next()
    }

    /// Wrap a raw value (tests and wire formats)
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw value
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Check for the reserved empty identifier
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Thread-safe monotonic identifier source
///
/// Everything that hands identifiers to a render scene shares the single
/// process-wide instance from [`IdentifierAllocator::global`]; separate
/// instances exist only for deterministic unit tests.
#[derive(Debug)]
pub struct IdentifierAllocator {
    next: AtomicU64,
}

impl IdentifierAllocator {
    /// Create an allocator whose first identifier is 1
    pub(crate) const fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// The process-wide allocator
    pub fn global() -> Arc<Self> {
        Arc::clone(Self::process())
    }

    fn process() -> &'static Arc<Self> {
        GLOBAL_ALLOCATOR.get_or_init(|| Arc::new(Self::new()))
    }

    /// Hand out a fresh identifier
    pub fn next(&self) -> Identifier {
        Identifier(self.next.fetch_add(1, Ordering::Relaxed))
    }
}
