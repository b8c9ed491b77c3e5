//! Record of what one add operation produced for one feature type

use crate::changes::ChangeSet;
use crate::foundation::ids::{Identifier, IdentifierSet};

/// Drawables, textures and selection IDs created by one add
#[derive(Debug, Clone, PartialEq)]
pub struct SceneRep {
    /// Identifier returned to the caller of `add`
    pub id: Identifier,
    /// Drawables handed to the render thread
    pub drawables: IdentifierSet,
    /// Cached textures acquired for the drawables
    pub textures: Vec<Identifier>,
    /// Selection IDs registered in the selectable table
    pub selection_ids: IdentifierSet,
    /// Fade time in seconds
    pub fade: f32,
    /// Current visibility
    pub enabled: bool,
}

impl SceneRep {
    /// An empty, enabled record
    pub fn new(id: Identifier) -> Self {
        Self {
            id,
            drawables: IdentifierSet::new(),
            textures: Vec::new(),
            selection_ids: IdentifierSet::new(),
            fade: 0.0,
            enabled: true,
        }
    }

    /// Queue a visibility change for every drawable
    pub fn enable_contents(&mut self, enabled: bool, changes: &mut ChangeSet) {
        self.enabled = enabled;
        for &id in &self.drawables {
            changes.set_enable(id, enabled);
        }
    }

    /// Queue removal of every drawable
    ///
    /// Textures and selection IDs are left for the owner to release, since
    /// they live in shared tables.
    pub fn clear_contents(&self, changes: &mut ChangeSet) {
        for &id in &self.drawables {
            changes.remove_drawable(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes::ChangeCommand;

    #[test]
    fn test_enable_and_clear() {
        let mut rep = SceneRep::new(Identifier::from_raw(1));
        rep.drawables.insert(Identifier::from_raw(3));
        rep.drawables.insert(Identifier::from_raw(2));

        let mut changes = ChangeSet::new();
        rep.enable_contents(false, &mut changes);
        rep.clear_contents(&mut changes);

        assert!(!rep.enabled);
        assert_eq!(
            changes.commands(),
            &[
                ChangeCommand::SetEnable { id: Identifier::from_raw(2), enabled: false },
                ChangeCommand::SetEnable { id: Identifier::from_raw(3), enabled: false },
                ChangeCommand::RemoveDrawable { id: Identifier::from_raw(2) },
                ChangeCommand::RemoveDrawable { id: Identifier::from_raw(3) },
            ]
        );
    }
}
