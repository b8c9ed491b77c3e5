//! Owner of every shared resource table

use std::sync::Arc;

use image::RgbaImage;

use super::{
    AcquiredTexture, ContextPool, ResourceError, SelectableObject, SelectableTable, SubTexture, TextureAtlasGroup,
    TextureCache, TextureKey, TransientContext,
};
use crate::changes::{ChangeQueue, ChangeSet, TextureFormat, TextureUpload, WrapFlags};
use crate::core::config::ResourceConfig;
use crate::foundation::ids::{Identifier, IdentifierAllocator};

/// Shared resource state used by every caller thread
///
/// Each table keeps its own lock; the registry only routes calls.
#[derive(Debug)]
pub struct ResourceRegistry {
    ids: Arc<IdentifierAllocator>,
    queue: Arc<ChangeQueue>,
    selectables: SelectableTable,
    textures: TextureCache,
    atlas: TextureAtlasGroup,
    contexts: ContextPool,
}

impl ResourceRegistry {
    /// Create a registry that emits render work into `queue`
    pub fn new(config: &ResourceConfig, ids: Arc<IdentifierAllocator>, queue: Arc<ChangeQueue>) -> Self {
        Self {
            selectables: SelectableTable::new(),
            textures: TextureCache::new(Arc::clone(&ids), Arc::clone(&queue)),
            atlas: TextureAtlasGroup::new(config, Arc::clone(&ids), Arc::clone(&queue)),
            contexts: ContextPool::new(config.max_transient_contexts),
            ids,
            queue,
        }
    }

    /// Identifier source shared with the scene managers
    pub fn ids(&self) -> &Arc<IdentifierAllocator> {
        &self.ids
    }

    /// Queue the registry uploads through
    pub fn queue(&self) -> &Arc<ChangeQueue> {
        &self.queue
    }

    /// Associate a caller object with a selection ID
    pub fn register_selectable(&self, id: Identifier, object: SelectableObject) {
        self.selectables.register(id, object);
    }

    /// Caller object for a selection ID, if still registered
    pub fn lookup_selectable(&self, id: Identifier) -> Option<SelectableObject> {
        self.selectables.lookup(id)
    }

    /// Forget a batch of selection IDs
    pub fn unregister_selectables(&self, ids: impl IntoIterator<Item = Identifier>) -> usize {
        self.selectables.unregister(ids)
    }

    /// See [`TextureCache::acquire`]
    pub fn acquire_texture(
        &self,
        key: TextureKey,
        factory: impl FnOnce(Identifier) -> Result<TextureUpload, ResourceError>,
    ) -> Result<AcquiredTexture, ResourceError> {
        self.textures.acquire(key, factory)
    }

    /// Acquire the cached texture for a decoded image
    pub fn acquire_image(
        &self,
        image: &RgbaImage,
        format: TextureFormat,
        wrap: WrapFlags,
    ) -> Result<AcquiredTexture, ResourceError> {
        let key = TextureKey::from_image(image, format, wrap);
        self.textures
            .acquire(key, |id| Ok(TextureUpload::from_image(id, image, format, wrap)))
    }

    /// See [`TextureCache::release`]
    pub fn release_texture(&self, texture: Identifier, changes: &mut ChangeSet) -> Result<(), ResourceError> {
        self.textures.release(texture, changes)
    }

    /// Reference count of a cached texture
    pub fn texture_ref_count(&self, texture: Identifier) -> Option<usize> {
        self.textures.ref_count(texture)
    }

    /// Number of distinct cached textures
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Pack an image into the atlas
    pub fn add_to_atlas(&self, image: &RgbaImage, format: TextureFormat) -> Result<SubTexture, ResourceError> {
        self.atlas.add(image, format)
    }

    /// Free an atlas placement
    pub fn remove_from_atlas(&self, sub: Identifier, changes: &mut ChangeSet) -> Result<(), ResourceError> {
        self.atlas.remove(sub, changes)
    }

    /// True when `sub` is a live atlas placement
    pub fn atlas_contains(&self, sub: Identifier) -> bool {
        self.atlas.contains(sub)
    }

    /// Borrow a transient rendering context
    pub fn borrow_transient_context(&self) -> Result<TransientContext, ResourceError> {
        self.contexts.borrow()
    }

    /// Return a borrowed context
    pub fn return_transient_context(&self, context: TransientContext) -> Result<(), ResourceError> {
        self.contexts.give_back(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes::ChangeCommand;

    fn registry() -> ResourceRegistry {
        ResourceRegistry::new(
            &ResourceConfig::default().with_atlas(64, 16),
            Arc::new(IdentifierAllocator::new()),
            Arc::new(ChangeQueue::new()),
        )
    }

    #[test]
    fn test_same_image_is_uploaded_once() {
        let registry = registry();
        let image = RgbaImage::from_pixel(4, 4, image::Rgba([9, 9, 9, 255]));

        let a = registry
            .acquire_image(&image, TextureFormat::Rgba8888, WrapFlags::empty())
            .unwrap();
        let b = registry
            .acquire_image(&image, TextureFormat::Rgba8888, WrapFlags::empty())
            .unwrap();

        assert_eq!(a.texture, b.texture);
        assert!(a.created && !b.created);
        let a = a.texture;
        assert_eq!(registry.queue().pending_len(), 1);
        assert_eq!(registry.texture_ref_count(a), Some(2));
    }

    #[test]
    fn test_release_goes_into_change_set() {
        let registry = registry();
        let image = RgbaImage::new(2, 2);
        let texture = registry
            .acquire_image(&image, TextureFormat::A8, WrapFlags::empty())
            .unwrap()
            .texture;

        let mut changes = ChangeSet::new();
        registry.release_texture(texture, &mut changes).unwrap();
        assert_eq!(changes.commands(), &[ChangeCommand::ReleaseTexture { id: texture }]);
        assert_eq!(registry.texture_count(), 0);
    }

    #[test]
    fn test_tables_are_independent() {
        let registry = registry();
        let id = registry.ids().next();
        registry.register_selectable(id, Arc::new(42_u32));
        let ctx = registry.borrow_transient_context().unwrap();

        assert!(registry.lookup_selectable(id).is_some());
        registry.return_transient_context(ctx).unwrap();
        assert_eq!(registry.unregister_selectables([id]), 1);
        assert!(registry.lookup_selectable(id).is_none());
    }
}
