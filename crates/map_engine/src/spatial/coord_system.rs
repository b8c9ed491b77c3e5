//! Coordinate system identity
//!
//! Coordinate systems are told apart by registration order, never by
//! address or structure. Two systems are the same only after
//! [`CoordSystemRegistry::mark_equivalent`]; the class is then represented by
//! its smallest member, so sort keys stay stable from run to run.

use std::sync::RwLock;

use super::SpatialError;
use crate::foundation::math::Mbr;
use crate::foundation::sync::{read, write};

/// Registration index of a coordinate system
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CoordSystemId(u32);

impl CoordSystemId {
    /// Raw registration index
    pub const fn index(self) -> u32 {
        self.0
    }
}

#[derive(Debug)]
struct CoordSystemInfo {
    name: String,
    bounds: Mbr,
    canonical: CoordSystemId,
}

/// Registry of known coordinate systems
#[derive(Debug, Default)]
pub struct CoordSystemRegistry {
    systems: RwLock<Vec<CoordSystemInfo>>,
}

impl CoordSystemRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a system whose tile pyramid covers `bounds`
    pub fn register(&self, name: impl Into<String>, bounds: Mbr) -> CoordSystemId {
        let mut systems = write(&self.systems);
        let id = CoordSystemId(u32::try_from(systems.len()).unwrap_or(u32::MAX));
        let name = name.into();
        log::debug!("Registered coordinate system {name} as {id:?}");
        systems.push(CoordSystemInfo {
            name,
            bounds,
            canonical: id,
        });
        id
    }

    /// Declare two systems identical
    ///
    /// Returns the canonical member of the merged class.
    pub fn mark_equivalent(&self, a: CoordSystemId, b: CoordSystemId) -> Result<CoordSystemId, SpatialError> {
        let mut systems = write(&self.systems);
        let ca = Self::canonical_in(&systems, a)?;
        let cb = Self::canonical_in(&systems, b)?;
        let (keep, fold) = if ca <= cb { (ca, cb) } else { (cb, ca) };
        for info in systems.iter_mut().filter(|info| info.canonical == fold) {
            info.canonical = keep;
        }
        Ok(keep)
    }

    /// Representative of the system's equivalence class
    pub fn canonical(&self, id: CoordSystemId) -> Result<CoordSystemId, SpatialError> {
        Self::canonical_in(&read(&self.systems), id)
    }

    /// Extent of the system's tile pyramid
    pub fn bounds(&self, id: CoordSystemId) -> Result<Mbr, SpatialError> {
        read(&self.systems)
            .get(id.0 as usize)
            .map(|info| info.bounds)
            .ok_or(SpatialError::UnknownCoordSystem(id))
    }

    /// Name given at registration
    pub fn name(&self, id: CoordSystemId) -> Option<String> {
        read(&self.systems).get(id.0 as usize).map(|info| info.name.clone())
    }

    /// Number of registered systems
    pub fn len(&self) -> usize {
        read(&self.systems).len()
    }

    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn canonical_in(systems: &[CoordSystemInfo], id: CoordSystemId) -> Result<CoordSystemId, SpatialError> {
        systems
            .get(id.0 as usize)
            .map(|info| info.canonical)
            .ok_or(SpatialError::UnknownCoordSystem(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Point2;

    fn unit() -> Mbr {
        Mbr::new(Point2::new(0.0, 0.0), Point2::new(1.0, 1.0))
    }

    #[test]
    fn test_ids_follow_registration_order() {
        let registry = CoordSystemRegistry::new();
        let a = registry.register("spherical mercator", unit());
        let b = registry.register("plate carree", unit());
        assert!(a < b);
        assert_eq!(registry.canonical(b).unwrap(), b);
        assert_eq!(registry.name(a).as_deref(), Some("spherical mercator"));
    }

    #[test]
    fn test_equivalence_uses_smallest_member() {
        let registry = CoordSystemRegistry::new();
        let a = registry.register("a", unit());
        let b = registry.register("b", unit());
        let c = registry.register("c", unit());

        assert_eq!(registry.mark_equivalent(c, b).unwrap(), b);
        assert_eq!(registry.mark_equivalent(b, a).unwrap(), a);
        assert_eq!(registry.canonical(c).unwrap(), a);
    }

    #[test]
    fn test_unknown_system() {
        let registry = CoordSystemRegistry::new();
        let a = registry.register("a", unit());
        let other = CoordSystemRegistry::new();
        assert!(matches!(other.canonical(a), Err(SpatialError::UnknownCoordSystem(_))));
        assert!(registry.bounds(a).is_ok());
    }
}
