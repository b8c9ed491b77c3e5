//! Content-keyed texture cache with reference counting
//!
//! The first acquirer of a key uploads the texture; later acquirers share it.
//! The upload command goes straight to the change queue while the cache lock
//! is held, so it is queued ahead of any drawable that can reference it.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};

use image::RgbaImage;

use super::ResourceError;
use crate::changes::{ChangeCommand, ChangeQueue, ChangeSet, DrainTicket, TextureFormat, TextureUpload, WrapFlags};
use crate::foundation::ids::{Identifier, IdentifierAllocator};
use crate::foundation::sync::lock;

/// Identity of a texture's source content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureKey(u64);

impl TextureKey {
    /// Key derived from raw pixel content and how it will be uploaded
    pub fn from_pixels(width: u32, height: u32, pixels: &[u8], format: TextureFormat, wrap: WrapFlags) -> Self {
        let mut hasher = DefaultHasher::new();
        width.hash(&mut hasher);
        height.hash(&mut hasher);
        format.hash(&mut hasher);
        wrap.bits().hash(&mut hasher);
        pixels.hash(&mut hasher);
        Self(hasher.finish())
    }

    /// Key for a decoded image
    pub fn from_image(image: &RgbaImage, format: TextureFormat, wrap: WrapFlags) -> Self {
        Self::from_pixels(image.width(), image.height(), image.as_raw(), format, wrap)
    }

    /// Key for caller-managed content (e.g. a named asset)
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

/// Outcome of [`TextureCache::acquire`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquiredTexture {
    /// The shared texture
    pub texture: Identifier,
    /// True when this call created the texture and queued its upload
    pub created: bool,
    /// Drain cycle that carries the upload
    pub upload: DrainTicket,
}

#[derive(Debug)]
struct CacheEntry {
    texture: Identifier,
    refs: usize,
    upload: DrainTicket,
}

#[derive(Debug, Default)]
struct Entries {
    by_key: HashMap<TextureKey, CacheEntry>,
    by_id: HashMap<Identifier, TextureKey>,
}

/// Reference-counted texture cache
#[derive(Debug)]
pub struct TextureCache {
    entries: Mutex<Entries>,
    ids: Arc<IdentifierAllocator>,
    queue: Arc<ChangeQueue>,
}

impl TextureCache {
    /// Create a cache that uploads through `queue`
    pub fn new(ids: Arc<IdentifierAllocator>, queue: Arc<ChangeQueue>) -> Self {
        Self {
            entries: Mutex::new(Entries::default()),
            ids,
            queue,
        }
    }

    /// Get the texture for `key`, creating it with `factory` on a miss
    ///
    /// The lookup, factory call, upload and insert are one critical section,
    /// so concurrent acquirers of one key trigger exactly one upload. Every
    /// acquirer gets the ticket of that upload to wait on.
    pub fn acquire(
        &self,
        key: TextureKey,
        factory: impl FnOnce(Identifier) -> Result<TextureUpload, ResourceError>,
    ) -> Result<AcquiredTexture, ResourceError> {
        let mut entries = lock(&self.entries);

        if let Some(entry) = entries.by_key.get_mut(&key) {
            entry.refs += 1;
            return Ok(AcquiredTexture {
                texture: entry.texture,
                created: false,
                upload: entry.upload,
            });
        }

        let texture = self.ids.next();
        let mut upload = factory(texture)?;
        upload.id = texture;
        let ticket = self.queue.enqueue(ChangeCommand::UploadTexture(upload));

        entries.by_key.insert(
            key,
            CacheEntry {
                texture,
                refs: 1,
                upload: ticket,
            },
        );
        entries.by_id.insert(texture, key);
        log::debug!("Texture {texture} created for {key:?}");
        Ok(AcquiredTexture {
            texture,
            created: true,
            upload: ticket,
        })
    }

    /// Drop one reference; at zero the release is appended to `changes`
    ///
    /// The release travels with the caller's other changes so it lands after
    /// the removal of the drawables that used the texture.
    pub fn release(&self, texture: Identifier, changes: &mut ChangeSet) -> Result<(), ResourceError> {
        let mut entries = lock(&self.entries);

        let Some(key) = entries.by_id.get(&texture).copied() else {
            log::error!("Texture {texture} released more times than acquired");
            return Err(ResourceError::TextureOverRelease(texture));
        };

        let remaining = match entries.by_key.get_mut(&key) {
            Some(entry) => {
                entry.refs -= 1;
                entry.refs
            }
            None => 0,
        };

        if remaining == 0 {
            entries.by_key.remove(&key);
            entries.by_id.remove(&texture);
            changes.release_texture(texture);
            log::debug!("Texture {texture} released");
        }
        Ok(())
    }

    /// Current reference count of a texture
    pub fn ref_count(&self, texture: Identifier) -> Option<usize> {
        let entries = lock(&self.entries);
        let key = entries.by_id.get(&texture)?;
        entries.by_key.get(key).map(|entry| entry.refs)
    }

    /// Number of distinct cached textures
    pub fn len(&self) -> usize {
        lock(&self.entries).by_key.len()
    }

    /// True when no texture is cached
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    fn cache() -> (TextureCache, Arc<ChangeQueue>) {
        let queue = Arc::new(ChangeQueue::new());
        let cache = TextureCache::new(Arc::new(IdentifierAllocator::new()), Arc::clone(&queue));
        (cache, queue)
    }

    fn blank(id: Identifier) -> Result<TextureUpload, ResourceError> {
        Ok(TextureUpload::blank(id, 8, 8, TextureFormat::Rgba8888))
    }

    #[test]
    fn test_hit_shares_texture() {
        let (cache, queue) = cache();
        let key = TextureKey::from_raw(1);

        let first = cache.acquire(key, blank).unwrap();
        assert!(first.created);
        let second = cache.acquire(key, blank).unwrap();
        assert!(!second.created);

        assert_eq!(first.texture, second.texture);
        assert_eq!(first.upload, second.upload);
        let first = first.texture;
        assert_eq!(cache.ref_count(first), Some(2));
        assert_eq!(queue.pending_len(), 1);
    }

    #[test]
    fn test_hit_after_drain_reports_the_original_upload() {
        let (cache, queue) = cache();
        let key = TextureKey::from_raw(6);
        let first = cache.acquire(key, blank).unwrap();
        queue.drain_and_apply(|_| {});

        let second = cache.acquire(key, blank).unwrap();
        assert_eq!(second.upload, first.upload);
        assert!(queue.wait_for(second.upload, Some(Duration::ZERO)));
    }

    #[test]
    fn test_release_at_zero_emits_command() {
        let (cache, _queue) = cache();
        let key = TextureKey::from_raw(2);
        let texture = cache.acquire(key, blank).unwrap().texture;
        cache.acquire(key, blank).unwrap();

        let mut changes = ChangeSet::new();
        cache.release(texture, &mut changes).unwrap();
        assert!(changes.is_empty());
        cache.release(texture, &mut changes).unwrap();

        assert_eq!(changes.commands(), &[ChangeCommand::ReleaseTexture { id: texture }]);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_over_release_is_reported() {
        let (cache, _queue) = cache();
        let texture = cache.acquire(TextureKey::from_raw(3), blank).unwrap().texture;
        let mut changes = ChangeSet::new();
        cache.release(texture, &mut changes).unwrap();

        let result = cache.release(texture, &mut changes);
        assert!(matches!(result, Err(ResourceError::TextureOverRelease(id)) if id == texture));
        assert_eq!(changes.len(), 1);
    }

    #[test]
    fn test_failed_factory_leaves_no_entry() {
        let (cache, queue) = cache();
        let result = cache.acquire(TextureKey::from_raw(4), |_| {
            Err(ResourceError::TextureCreation("decode failed".into()))
        });
        assert!(result.is_err());
        assert!(cache.is_empty());
        assert_eq!(queue.pending_len(), 0);
    }

    #[test]
    fn test_concurrent_acquire_uploads_once() {
        let (cache, queue) = cache();
        let key = TextureKey::from_raw(5);
        let factory_calls = AtomicUsize::new(0);
        let threads = 8;
        let per_thread = 25;

        let ids: Vec<Identifier> = thread::scope(|scope| {
            let handles: Vec<_> = (0..threads)
                .map(|_| {
                    scope.spawn(|| {
                        (0..per_thread)
                            .map(|_| {
                                cache
                                    .acquire(key, |id| {
                                        factory_calls.fetch_add(1, Ordering::SeqCst);
                                        blank(id)
                                    })
                                    .unwrap()
                                    .texture
                            })
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles.into_iter().flat_map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(factory_calls.load(Ordering::SeqCst), 1);
        assert_eq!(queue.pending_len(), 1);
        assert!(ids.windows(2).all(|w| w[0] == w[1]));

        let texture = ids[0];
        let mut changes = ChangeSet::new();
        for _ in 0..10 {
            cache.release(texture, &mut changes).unwrap();
        }
        assert_eq!(cache.ref_count(texture), Some(threads * per_thread - 10));
    }

    #[test]
    fn test_image_key_depends_on_content() {
        let a = RgbaImage::from_pixel(2, 2, image::Rgba([0, 0, 0, 255]));
        let b = RgbaImage::from_pixel(2, 2, image::Rgba([255, 0, 0, 255]));
        let fmt = TextureFormat::Rgba8888;
        assert_eq!(
            TextureKey::from_image(&a, fmt, WrapFlags::empty()),
            TextureKey::from_image(&a.clone(), fmt, WrapFlags::empty())
        );
        assert_ne!(
            TextureKey::from_image(&a, fmt, WrapFlags::empty()),
            TextureKey::from_image(&b, fmt, WrapFlags::empty())
        );
    }
}
