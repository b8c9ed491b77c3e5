//! Scene mutation commands and the payloads they carry

use bitflags::bitflags;
use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::foundation::ids::Identifier;
use crate::foundation::math::{Point2, Vec2};

bitflags! {
    /// Texture wrapping behavior per axis
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct WrapFlags: u8 {
        /// Repeat horizontally
        const WRAP_X = 0b01;
        /// Repeat vertically
        const WRAP_Y = 0b10;
    }
}

bitflags! {
    /// Rendering hints attached to a drawable
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DrawableFlags: u8 {
        /// Vertices are offsets in screen pixels around an anchor
        const SCREEN_SPACE = 0b0001;
        /// The geometry must not be depth tested
        const NO_DEPTH = 0b0010;
        /// Line width is applied on the GPU from per-vertex normals
        const GPU_WIDENED = 0b0100;
    }
}

/// Pixel layout of an uploaded texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TextureFormat {
    /// 8 bits per channel RGBA
    #[default]
    Rgba8888,
    /// 16-bit packed RGB
    Rgb565,
    /// 8-bit alpha only
    A8,
}

impl TextureFormat {
    /// Bytes per pixel
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgba8888 => 4,
            Self::Rgb565 => 2,
            Self::A8 => 1,
        }
    }

    /// Convert tightly packed RGBA pixels into this format
    pub fn convert_rgba(self, rgba: &[u8]) -> Vec<u8> {
        match self {
            Self::Rgba8888 => rgba.to_vec(),
            Self::Rgb565 => rgba
                .chunks_exact(4)
                .flat_map(|px| {
                    let r = u16::from(px[0] >> 3);
                    let g = u16::from(px[1] >> 2);
                    let b = u16::from(px[2] >> 3);
                    ((r << 11) | (g << 5) | b).to_le_bytes()
                })
                .collect(),
            Self::A8 => rgba.chunks_exact(4).map(|px| px[3]).collect(),
        }
    }
}

/// Everything the render thread needs to create a texture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureUpload {
    /// Identifier the texture will be known by
    pub id: Identifier,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Pixel layout of `pixels`
    pub format: TextureFormat,
    /// Wrap behavior
    pub wrap: WrapFlags,
    /// Pixel data; empty for a texture that is filled later by sub-updates
    pub pixels: Vec<u8>,
}

impl TextureUpload {
    /// Build upload parameters from a decoded image
    pub fn from_image(id: Identifier, image: &RgbaImage, format: TextureFormat, wrap: WrapFlags) -> Self {
        Self {
            id,
            width: image.width(),
            height: image.height(),
            format,
            wrap,
            pixels: format.convert_rgba(image.as_raw()),
        }
    }

    /// An empty texture of the given size (atlas pages)
    pub const fn blank(id: Identifier, width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            id,
            width,
            height,
            format,
            wrap: WrapFlags::empty(),
            pixels: Vec::new(),
        }
    }
}

/// Pixel rectangle inside a texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureRegion {
    /// Left edge in pixels
    pub x: u32,
    /// Top edge in pixels
    pub y: u32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

/// Feature type that produced a drawable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DrawableKind {
    /// Widened line features
    WideVector,
    /// Plain line and polygon features
    Vector,
    /// Screen-space markers
    ScreenMarker,
    /// Textures draped on the map
    Sticker,
}

/// Primitive topology of a drawable's geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    /// Independent triangles from `indices`
    Triangles,
    /// Independent line segments from `indices`
    Lines,
}

/// Vertex data of a drawable
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Geometry {
    /// Positions in the local frame (or screen offsets for screen-space drawables)
    pub vertices: Vec<Point2>,
    /// Per-vertex extrusion directions for GPU-widened lines
    pub normals: Vec<Vec2>,
    /// Per-vertex texture coordinates
    pub tex_coords: Vec<[f32; 2]>,
    /// Anchor point per vertex for screen-space drawables
    pub anchors: Vec<Point2>,
    /// Vertex indices
    pub indices: Vec<u32>,
}

impl Geometry {
    /// Number of vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// True when there is nothing to draw
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.indices.is_empty()
    }

    /// Append a vertex and return its index
    pub fn push_vertex(&mut self, pt: Point2) -> u32 {
        let index = u32::try_from(self.vertices.len()).unwrap_or(u32::MAX);
        self.vertices.push(pt);
        index
    }
}

/// A renderable unit created on the render thread
#[derive(Debug, Clone, PartialEq)]
pub struct Drawable {
    /// Identifier of the drawable
    pub id: Identifier,
    /// Producing feature type
    pub kind: DrawableKind,
    /// Primitive topology
    pub primitive: Primitive,
    /// Vertex data
    pub geometry: Geometry,
    /// RGBA color
    pub color: [u8; 4],
    /// Line width (pixels for screen/GPU widened, local units otherwise)
    pub line_width: f32,
    /// Sort order; higher draws later
    pub draw_priority: i32,
    /// Fade-in time in seconds
    pub fade: f32,
    /// Initial visibility
    pub enabled: bool,
    /// Bound texture, if any
    pub texture: Option<Identifier>,
    /// Rendering hints
    pub flags: DrawableFlags,
}

impl Drawable {
    /// Create an enabled, untextured drawable
    pub fn new(id: Identifier, kind: DrawableKind, primitive: Primitive) -> Self {
        Self {
            id,
            kind,
            primitive,
            geometry: Geometry::default(),
            color: [255, 255, 255, 255],
            line_width: 1.0,
            draw_priority: 0,
            fade: 0.0,
            enabled: true,
            texture: None,
            flags: DrawableFlags::empty(),
        }
    }
}

/// A queued scene mutation
///
/// Commands are immutable once queued and only ever applied by the render
/// thread.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeCommand {
    /// Add a drawable to the scene
    CreateDrawable(Box<Drawable>),
    /// Remove a drawable (which may not have been created yet)
    RemoveDrawable {
        /// Drawable to remove
        id: Identifier,
    },
    /// Show or hide a drawable
    SetEnable {
        /// Drawable to change
        id: Identifier,
        /// New visibility
        enabled: bool,
    },
    /// Create a texture
    UploadTexture(TextureUpload),
    /// Overwrite part of an existing texture
    UpdateSubTexture {
        /// Texture to write into
        texture: Identifier,
        /// Destination rectangle
        region: TextureRegion,
        /// Pixels in the texture's format
        pixels: Vec<u8>,
    },
    /// Destroy a texture
    ReleaseTexture {
        /// Texture to destroy
        id: Identifier,
    },
}

impl ChangeCommand {
    /// Identifier of the drawable or texture this command targets
    pub fn target(&self) -> Identifier {
        match self {
            Self::CreateDrawable(drawable) => drawable.id,
            Self::RemoveDrawable { id } | Self::SetEnable { id, .. } | Self::ReleaseTexture { id } => *id,
            Self::UploadTexture(upload) => upload.id,
            Self::UpdateSubTexture { texture, .. } => *texture,
        }
    }
}

/// Ordered batch of commands built by one producer
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ChangeSet {
    commands: Vec<ChangeCommand>,
}

impl ChangeSet {
    /// Create an empty change set
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a command
    pub fn push(&mut self, command: ChangeCommand) {
        self.commands.push(command);
    }

    /// Queue creation of a drawable
    pub fn create_drawable(&mut self, drawable: Drawable) {
        self.push(ChangeCommand::CreateDrawable(Box::new(drawable)));
    }

    /// Queue removal of a drawable
    pub fn remove_drawable(&mut self, id: Identifier) {
        self.push(ChangeCommand::RemoveDrawable { id });
    }

    /// Queue a visibility change
    pub fn set_enable(&mut self, id: Identifier, enabled: bool) {
        self.push(ChangeCommand::SetEnable { id, enabled });
    }

    /// Queue destruction of a texture
    pub fn release_texture(&mut self, id: Identifier) {
        self.push(ChangeCommand::ReleaseTexture { id });
    }

    /// Move every command of `other` to the end of this set
    pub fn append(&mut self, other: &mut Self) {
        self.commands.append(&mut other.commands);
    }

    /// Number of commands
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// True when no command has been added
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Commands in submission order
    pub fn commands(&self) -> &[ChangeCommand] {
        &self.commands
    }

    /// Take the commands out
    pub fn into_commands(self) -> Vec<ChangeCommand> {
        self.commands
    }
}

impl Extend<ChangeCommand> for ChangeSet {
    fn extend<T: IntoIterator<Item = ChangeCommand>>(&mut self, iter: T) {
        self.commands.extend(iter);
    }
}
