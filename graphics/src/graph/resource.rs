//! Render target handles and the transient/persistent texture allocator.
//!
//! Features never touch GPU textures directly; they hold [`ResourceHandle`]s
//! handed out by the [`RtHandleAllocator`]. Handles carry a generation so a
//! handle kept past the lifetime of its resource is detected instead of
//! silently pointing at whatever reused the slot.
//!
//! Transient resources live for a single frame and may share physical memory
//! with other transients whose pass lifetimes do not overlap (assignment
//! happens at graph compile). Persistent resources survive across frames
//! until their owner releases them, with a configurable grace period for
//! in-flight GPU work.

use glam::UVec2;

use crate::error::GraphError;

// ============================================================================
// Handles
// ============================================================================

/// Opaque handle to a graph-managed texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceHandle {
    index: u32,
    generation: u32,
}

impl ResourceHandle {
    /// Slot index, for diagnostics only.
    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }
}

// ============================================================================
// Descriptors
// ============================================================================

/// Texture formats the pipeline allocates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgba8Unorm,
    Rgba8Srgb,
    /// Packed HDR color target format.
    B10G11R11UFloat,
    Rgba16Float,
    /// Two-channel normalized, used for precomputed lookup tables.
    Rg16Unorm,
    /// Depth + stencil.
    D32FloatS8,
}

impl TextureFormat {
    /// Whether the format carries depth/stencil rather than color.
    #[inline]
    pub fn is_depth_stencil(&self) -> bool {
        matches!(self, Self::D32FloatS8)
    }
}

/// Texture dimensionality. Stereo targets are 2D arrays with one layer per
/// eye.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureDimension {
    Tex2d,
    Tex2dArray,
}

/// How a texture's extent is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SizePolicy {
    /// Fixed extent in pixels.
    Exact(UVec2),
    /// Matches the current screen size at allocation time.
    Screen,
    /// Screen size divided by `2^shift`, clamped to at least 1x1.
    ScreenFraction(u32),
}

/// What value an attachment is cleared to when its load action is `Clear`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearPolicy {
    None,
    Color([f32; 4]),
    DepthStencil { depth: f32, stencil: u32 },
}

/// Descriptor for a graph-managed texture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureDesc {
    pub format: TextureFormat,
    pub dimension: TextureDimension,
    pub layers: u32,
    pub size: SizePolicy,
    pub clear: ClearPolicy,
}

impl TextureDesc {
    /// New 2D screen-sized descriptor with the given format.
    pub fn new(format: TextureFormat) -> Self {
        Self {
            format,
            dimension: TextureDimension::Tex2d,
            layers: 1,
            size: SizePolicy::Screen,
            clear: ClearPolicy::None,
        }
    }

    pub fn with_size(mut self, size: SizePolicy) -> Self {
        self.size = size;
        self
    }

    pub fn with_exact_size(self, width: u32, height: u32) -> Self {
        self.with_size(SizePolicy::Exact(UVec2::new(width, height)))
    }

    /// Set the layer count; more than one layer implies a 2D array.
    pub fn with_layers(mut self, layers: u32) -> Self {
        self.layers = layers;
        self.dimension = if layers > 1 {
            TextureDimension::Tex2dArray
        } else {
            TextureDimension::Tex2d
        };
        self
    }

    pub fn with_clear(mut self, clear: ClearPolicy) -> Self {
        self.clear = clear;
        self
    }
}

/// Lifetime class of a graph resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceLifetime {
    /// Dies at end of frame; may alias other transients.
    Transient,
    /// Survives frames until released by its owner; never aliased.
    Persistent,
}

/// Key under which transient resources may share a physical slot: equal
/// resolved extent, format, dimension and layer count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AliasSignature {
    pub size: UVec2,
    pub format: TextureFormat,
    pub dimension: TextureDimension,
    pub layers: u32,
}

// ============================================================================
// Allocator
// ============================================================================

#[derive(Debug)]
struct ResourceSlot {
    desc: TextureDesc,
    lifetime: ResourceLifetime,
    generation: u32,
    alive: bool,
    /// Extent resolved against the screen size at allocation time.
    resolved_size: UVec2,
}

/// Hands out texture handles and tracks their lifetimes.
///
/// Screen-relative sizes resolve against the screen size current at
/// allocation time, so the size must be set before any view-level
/// allocation. Persistent releases are deferred by a frame delay and applied
/// at end of frame.
#[derive(Debug, Default)]
pub struct RtHandleAllocator {
    slots: Vec<ResourceSlot>,
    free: Vec<u32>,
    screen_size: UVec2,
    /// (slot, frame at which the slot may actually be freed)
    pending_releases: Vec<(u32, u64)>,
    frame_index: u64,
}

impl RtHandleAllocator {
    pub fn new() -> Self {
        Self {
            screen_size: UVec2::new(1, 1),
            ..Default::default()
        }
    }

    /// Set the reference size for screen-relative allocations.
    pub fn set_screen_size(&mut self, size: UVec2) {
        self.screen_size = size.max(UVec2::ONE);
    }

    #[inline]
    pub fn screen_size(&self) -> UVec2 {
        self.screen_size
    }

    /// Allocate a transient texture, valid until end of frame.
    pub fn texture(&mut self, desc: TextureDesc) -> ResourceHandle {
        self.allocate(desc, ResourceLifetime::Transient)
    }

    /// Allocate a persistent texture, valid until released.
    pub fn persistent_texture(&mut self, desc: TextureDesc) -> ResourceHandle {
        self.allocate(desc, ResourceLifetime::Persistent)
    }

    fn allocate(&mut self, desc: TextureDesc, lifetime: ResourceLifetime) -> ResourceHandle {
        let resolved_size = self.resolve_policy(desc.size);
        let index = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.desc = desc;
                slot.lifetime = lifetime;
                slot.alive = true;
                slot.resolved_size = resolved_size;
                index
            }
            None => {
                self.slots.push(ResourceSlot {
                    desc,
                    lifetime,
                    generation: 0,
                    alive: true,
                    resolved_size,
                });
                (self.slots.len() - 1) as u32
            }
        };
        let generation = self.slots[index as usize].generation;
        log::trace!(
            "allocated {:?} texture slot {} ({}x{}, {:?})",
            lifetime,
            index,
            resolved_size.x,
            resolved_size.y,
            desc.format
        );
        ResourceHandle { index, generation }
    }

    /// Schedule a persistent resource for destruction.
    ///
    /// The slot is freed at the end of the frame `frame_delay` frames from
    /// now (0 means the current frame's end), leaving a grace period for GPU
    /// work still reading the texture.
    pub fn release(&mut self, handle: ResourceHandle, frame_delay: u32) -> Result<(), GraphError> {
        let slot = self.slot(handle)?;
        if slot.lifetime != ResourceLifetime::Persistent {
            return Err(GraphError::NotPersistent { index: handle.index });
        }
        self.pending_releases
            .push((handle.index, self.frame_index + u64::from(frame_delay)));
        Ok(())
    }

    /// Whether the handle still refers to a live resource.
    pub fn is_valid(&self, handle: ResourceHandle) -> bool {
        self.slot(handle).is_ok()
    }

    pub fn desc(&self, handle: ResourceHandle) -> Result<&TextureDesc, GraphError> {
        Ok(&self.slot(handle)?.desc)
    }

    pub fn lifetime(&self, handle: ResourceHandle) -> Result<ResourceLifetime, GraphError> {
        Ok(self.slot(handle)?.lifetime)
    }

    /// Extent the resource was allocated with.
    pub fn resolve_size(&self, handle: ResourceHandle) -> Result<UVec2, GraphError> {
        Ok(self.slot(handle)?.resolved_size)
    }

    /// Aliasing key of the resource (see [`AliasSignature`]).
    pub fn alias_signature(&self, handle: ResourceHandle) -> Result<AliasSignature, GraphError> {
        let slot = self.slot(handle)?;
        Ok(AliasSignature {
            size: slot.resolved_size,
            format: slot.desc.format,
            dimension: slot.desc.dimension,
            layers: slot.desc.layers,
        })
    }

    /// End-of-frame housekeeping: frees every transient slot and applies
    /// pending persistent releases whose grace period has elapsed.
    pub fn end_frame(&mut self) {
        for index in 0..self.slots.len() {
            let slot = &mut self.slots[index];
            if slot.alive && slot.lifetime == ResourceLifetime::Transient {
                slot.alive = false;
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index as u32);
            }
        }
        let frame = self.frame_index;
        let mut freed = Vec::new();
        self.pending_releases.retain(|&(index, due)| {
            if frame >= due {
                freed.push(index);
                false
            } else {
                true
            }
        });
        for index in freed {
            let slot = &mut self.slots[index as usize];
            if slot.alive {
                log::trace!("released persistent texture slot {index}");
                slot.alive = false;
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index);
            }
        }
        self.frame_index += 1;
    }

    fn resolve_policy(&self, size: SizePolicy) -> UVec2 {
        match size {
            SizePolicy::Exact(size) => size.max(UVec2::ONE),
            SizePolicy::Screen => self.screen_size,
            SizePolicy::ScreenFraction(shift) => {
                UVec2::new(self.screen_size.x >> shift, self.screen_size.y >> shift)
                    .max(UVec2::ONE)
            }
        }
    }

    fn slot(&self, handle: ResourceHandle) -> Result<&ResourceSlot, GraphError> {
        let stale = GraphError::StaleHandle {
            index: handle.index,
            generation: handle.generation,
        };
        let slot = self.slots.get(handle.index as usize).ok_or(stale.clone())?;
        if !slot.alive || slot.generation != handle.generation {
            return Err(stale);
        }
        Ok(slot)
    }
}
