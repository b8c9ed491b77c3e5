//! Texture atlas: many small images packed into shared pages
//!
//! Pages are divided into square cells; an image occupies the smallest block
//! of cells that covers it. A new page is uploaded blank and each placement
//! writes its pixels with a sub-texture update.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use image::RgbaImage;

use super::ResourceError;
use crate::changes::{ChangeCommand, ChangeQueue, ChangeSet, DrainTicket, TextureFormat, TextureRegion, TextureUpload};
use crate::core::config::ResourceConfig;
use crate::foundation::collections::CellGrid;
use crate::foundation::ids::{Identifier, IdentifierAllocator};
use crate::foundation::sync::lock;

/// An image placed in an atlas page
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubTexture {
    /// Identifier of this placement
    pub id: Identifier,
    /// The page texture holding the pixels
    pub texture: Identifier,
    /// Pixel rectangle inside the page
    pub region: TextureRegion,
    /// Normalized texture coordinates `[u0, v0, u1, v1]`
    pub uv: [f32; 4],
    /// Drain cycle that carries the pixel write
    pub upload: DrainTicket,
}

#[derive(Debug)]
struct AtlasPage {
    texture: Identifier,
    format: TextureFormat,
    cells: CellGrid,
}

#[derive(Debug, Clone, Copy)]
struct Placement {
    texture: Identifier,
    col: u32,
    row: u32,
    cols: u32,
    rows: u32,
}

#[derive(Debug, Default)]
struct AtlasState {
    pages: Vec<AtlasPage>,
    placements: HashMap<Identifier, Placement>,
}

/// Group of atlas pages, one set per texture format
#[derive(Debug)]
pub struct TextureAtlasGroup {
    page_size: u32,
    cell_size: u32,
    state: Mutex<AtlasState>,
    ids: Arc<IdentifierAllocator>,
    queue: Arc<ChangeQueue>,
}

impl TextureAtlasGroup {
    /// Create an atlas group sized by `config`
    pub fn new(config: &ResourceConfig, ids: Arc<IdentifierAllocator>, queue: Arc<ChangeQueue>) -> Self {
        Self {
            page_size: config.atlas_page_size,
            cell_size: config.atlas_cell_size.max(1),
            state: Mutex::new(AtlasState::default()),
            ids,
            queue,
        }
    }

    /// Place an image, creating a page if none has room
    pub fn add(&self, image: &RgbaImage, format: TextureFormat) -> Result<SubTexture, ResourceError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 || width > self.page_size || height > self.page_size {
            return Err(ResourceError::AtlasImageTooLarge {
                width,
                height,
                page_size: self.page_size,
            });
        }
        let cols = width.div_ceil(self.cell_size);
        let rows = height.div_ceil(self.cell_size);

        let mut state = lock(&self.state);

        let found = state
            .pages
            .iter_mut()
            .filter(|page| page.format == format)
            .find_map(|page| page.cells.allocate(cols, rows).map(|(c, r)| (page.texture, c, r)));

        let (texture, col, row) = match found {
            Some(found) => found,
            None => {
                let texture = self.ids.next();
                let per_side = self.page_size / self.cell_size;
                let mut cells = CellGrid::new(per_side, per_side);
                let Some((c, r)) = cells.allocate(cols, rows) else {
                    return Err(ResourceError::AtlasImageTooLarge {
                        width,
                        height,
                        page_size: self.page_size,
                    });
                };
                self.queue.enqueue(ChangeCommand::UploadTexture(TextureUpload::blank(
                    texture,
                    self.page_size,
                    self.page_size,
                    format,
                )));
                state.pages.push(AtlasPage { texture, format, cells });
                log::debug!("Atlas page {texture} created ({format:?})");
                (texture, c, r)
            }
        };

        let region = TextureRegion {
            x: col * self.cell_size,
            y: row * self.cell_size,
            width,
            height,
        };
        let upload = self.queue.enqueue(ChangeCommand::UpdateSubTexture {
            texture,
            region,
            pixels: format.convert_rgba(image.as_raw()),
        });

        let id = self.ids.next();
        state.placements.insert(
            id,
            Placement {
                texture,
                col,
                row,
                cols,
                rows,
            },
        );

        #[allow(clippy::cast_precision_loss)]
        let page = self.page_size as f32;
        #[allow(clippy::cast_precision_loss)]
        let uv = [
            region.x as f32 / page,
            region.y as f32 / page,
            (region.x + width) as f32 / page,
            (region.y + height) as f32 / page,
        ];
        Ok(SubTexture {
            id,
            texture,
            region,
            uv,
            upload,
        })
    }

    /// Free a placement; an emptied page is released through `changes`
    pub fn remove(&self, sub: Identifier, changes: &mut ChangeSet) -> Result<(), ResourceError> {
        let mut state = lock(&self.state);
        let placement = state
            .placements
            .remove(&sub)
            .ok_or(ResourceError::UnknownSubTexture(sub))?;

        if let Some(index) = state.pages.iter().position(|p| p.texture == placement.texture) {
            let page = &mut state.pages[index];
            page.cells
                .release(placement.col, placement.row, placement.cols, placement.rows);
            if page.cells.is_empty() {
                let page = state.pages.swap_remove(index);
                changes.release_texture(page.texture);
                log::debug!("Atlas page {} released", page.texture);
            }
        }
        Ok(())
    }

    /// True when `texture` is one of this group's pages
    pub fn owns_page(&self, texture: Identifier) -> bool {
        lock(&self.state).pages.iter().any(|p| p.texture == texture)
    }

    /// True when `sub` is a live placement
    pub fn contains(&self, sub: Identifier) -> bool {
        lock(&self.state).placements.contains_key(&sub)
    }

    /// Number of live pages
    pub fn page_count(&self) -> usize {
        lock(&self.state).pages.len()
    }
}
