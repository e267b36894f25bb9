//! Frame graph compilation.
//!
//! Compilation turns the frame's declared pass list into an execution plan:
//!
//! | Step | Result |
//! |------|--------|
//! | Validation | empty-pass and stale-handle detection |
//! | Lifetimes  | first/last pass index per resource |
//! | Aliasing   | transient resources packed into physical slots |
//! | Load/store | declared actions resolved against frame-global usage |
//! | Fusion     | adjacent compatible passes merged into native passes |
//!
//! Passes are considered strictly in declaration order; declaration order is
//! execution order.

use std::collections::HashMap;

use glam::UVec2;

use crate::error::GraphError;
use crate::graph::pass::{LoadAction, RenderPass, StoreAction};
use crate::graph::resource::{
    AliasSignature, ClearPolicy, ResourceHandle, ResourceLifetime, RtHandleAllocator,
};

/// Color attachment limit for a native render pass.
pub const MAX_COLOR_ATTACHMENTS: usize = 8;
/// Subpass limit for a fused native render pass.
pub const MAX_FUSED_SUBPASSES: usize = 8;

// ============================================================================
// Compiled output
// ============================================================================

/// One attachment of a pass with fully resolved actions and its physical
/// slot assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentBinding {
    pub handle: ResourceHandle,
    /// Physical slot the resource was aliased into.
    pub physical: u32,
    pub load: LoadAction,
    pub store: StoreAction,
    pub clear: ClearPolicy,
    pub is_depth: bool,
    pub read_only: bool,
}

/// A native render pass: one or more fused subpasses over a shared
/// attachment set, or a single pass without attachments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassGroup {
    /// Indices into the frame's pass list, in execution order.
    pub passes: Vec<usize>,
    pub width: u32,
    pub height: u32,
    pub layers: u32,
}

/// Execution plan produced by [`compile`].
#[derive(Debug, Default)]
pub struct CompiledGraph {
    pub(crate) groups: Vec<PassGroup>,
    /// Resolved attachment bindings, indexed by pass.
    pub(crate) bindings: Vec<Vec<AttachmentBinding>>,
    /// Physical slot per resource slot index.
    pub(crate) physical: HashMap<u32, u32>,
    pub(crate) physical_count: u32,
}

impl CompiledGraph {
    #[inline]
    pub fn pass_count(&self) -> usize {
        self.bindings.len()
    }

    #[inline]
    pub fn groups(&self) -> &[PassGroup] {
        &self.groups
    }

    #[inline]
    pub fn bindings(&self, pass: usize) -> &[AttachmentBinding] {
        &self.bindings[pass]
    }

    /// Physical slot a resource was aliased into, if it is used this frame.
    pub fn physical_of(&self, handle: ResourceHandle) -> Option<u32> {
        self.physical.get(&handle.index()).copied()
    }

    /// Number of distinct physical textures backing the frame.
    #[inline]
    pub fn physical_count(&self) -> u32 {
        self.physical_count
    }
}

// ============================================================================
// Compilation
// ============================================================================

#[derive(Default)]
struct ResourceUsage {
    writers: Vec<usize>,
    readers: Vec<usize>,
}

impl ResourceUsage {
    fn first_use(&self) -> usize {
        self.writers
            .iter()
            .chain(self.readers.iter())
            .copied()
            .min()
            .unwrap_or(usize::MAX)
    }

    fn last_use(&self) -> usize {
        self.writers
            .iter()
            .chain(self.readers.iter())
            .copied()
            .max()
            .unwrap_or(0)
    }

    fn last_writer_before(&self, pass: usize) -> Option<usize> {
        self.writers.iter().copied().filter(|&w| w < pass).max()
    }
}

pub(crate) fn compile(
    passes: &[RenderPass],
    allocator: &RtHandleAllocator,
    fuse: bool,
) -> Result<CompiledGraph, GraphError> {
    // Step 1: per-pass validation.
    for pass in passes {
        if pass.is_empty_declaration() {
            return Err(GraphError::EmptyPass {
                pass: pass.name.clone(),
            });
        }
        for write in pass.attachment_writes() {
            allocator.desc(write.handle)?;
        }
        for &(_, handle) in &pass.reads {
            allocator.desc(handle)?;
        }
    }

    // Step 2: usage table. Read-only depth bindings count as reads.
    let mut usage: HashMap<u32, ResourceUsage> = HashMap::new();
    for (i, pass) in passes.iter().enumerate() {
        for write in pass.attachment_writes() {
            let entry = usage.entry(write.handle.index()).or_default();
            if write.flags.is_read_only() {
                entry.readers.push(i);
            } else {
                entry.writers.push(i);
            }
        }
        for &(_, handle) in &pass.reads {
            usage.entry(handle.index()).or_default().readers.push(i);
        }
    }

    // Step 3: transient aliasing over non-overlapping lifetimes.
    let (physical, physical_count) = assign_physical(passes, allocator, &usage)?;

    // Step 4: load/store resolution and per-pass binding lists.
    let mut bindings = Vec::with_capacity(passes.len());
    let mut pass_dims: Vec<Option<(UVec2, u32)>> = Vec::with_capacity(passes.len());
    for (i, pass) in passes.iter().enumerate() {
        let mut list = Vec::new();
        let mut dims: Option<(UVec2, u32)> = None;
        for write in pass.attachment_writes() {
            let used = &usage[&write.handle.index()];
            let desc = allocator.desc(write.handle)?;
            let size = allocator.resolve_size(write.handle)?;

            match dims {
                None => dims = Some((size, desc.layers)),
                Some(existing) if existing != (size, desc.layers) => {
                    return Err(GraphError::AttachmentMismatch {
                        pass: pass.name.clone(),
                    });
                }
                Some(_) => {}
            }

            // Only the frame's first writer keeps its declared Clear or
            // DontCare; later writers must preserve earlier results.
            let load = if used.writers.iter().any(|&w| w < i) {
                LoadAction::Load
            } else {
                write.load
            };

            let later_use = used
                .writers
                .iter()
                .chain(used.readers.iter())
                .any(|&j| j > i);
            let persistent =
                allocator.lifetime(write.handle)? == ResourceLifetime::Persistent;
            let store = if persistent || later_use {
                write.store
            } else {
                StoreAction::Discard
            };

            list.push(AttachmentBinding {
                handle: write.handle,
                physical: physical.get(&write.handle.index()).copied().unwrap_or(0),
                load,
                store,
                clear: desc.clear,
                is_depth: desc.format.is_depth_stencil(),
                read_only: write.flags.is_read_only(),
            });
        }
        bindings.push(list);
        pass_dims.push(dims);
    }

    // Step 5: greedy fusion in declaration order.
    let groups = build_groups(passes, &usage, &pass_dims, fuse);

    let compiled = CompiledGraph {
        groups,
        bindings,
        physical,
        physical_count,
    };
    verify_aliasing(passes, allocator, &usage, &compiled)?;
    Ok(compiled)
}

/// Pack transient resources into physical slots; lifetimes sharing a slot
/// must not overlap. Persistent resources always get a dedicated slot.
fn assign_physical(
    passes: &[RenderPass],
    allocator: &RtHandleAllocator,
    usage: &HashMap<u32, ResourceUsage>,
) -> Result<(HashMap<u32, u32>, u32), GraphError> {
    struct Physical {
        signature: AliasSignature,
        shareable: bool,
        intervals: Vec<(usize, usize)>,
    }

    // Deterministic order: by first use, then slot index.
    let mut order: Vec<(&u32, &ResourceUsage)> = usage.iter().collect();
    order.sort_by_key(|(index, used)| (used.first_use(), **index));

    let mut physicals: Vec<Physical> = Vec::new();
    let mut assignment = HashMap::new();

    for (&slot, used) in order {
        let handle = handle_for_slot(passes, slot);
        let Some(handle) = handle else { continue };
        let signature = allocator.alias_signature(handle)?;
        let transient = allocator.lifetime(handle)? == ResourceLifetime::Transient;
        let interval = (used.first_use(), used.last_use());

        let existing = transient
            .then(|| {
                physicals.iter().position(|p| {
                    p.shareable
                        && p.signature == signature
                        && p.intervals
                            .iter()
                            .all(|&(first, last)| interval.1 < first || last < interval.0)
                })
            })
            .flatten();

        let index = match existing {
            Some(index) => index,
            None => {
                physicals.push(Physical {
                    signature,
                    shareable: transient,
                    intervals: Vec::new(),
                });
                physicals.len() - 1
            }
        };
        physicals[index].intervals.push(interval);
        assignment.insert(slot, index as u32);
    }

    Ok((assignment, physicals.len() as u32))
}

fn handle_for_slot(passes: &[RenderPass], slot: u32) -> Option<ResourceHandle> {
    for pass in passes {
        for write in pass.attachment_writes() {
            if write.handle.index() == slot {
                return Some(write.handle);
            }
        }
        for &(_, handle) in &pass.reads {
            if handle.index() == slot {
                return Some(handle);
            }
        }
    }
    None
}

/// Sanity check over the finished assignment: two resources sharing a
/// physical slot must have disjoint pass lifetimes.
fn verify_aliasing(
    passes: &[RenderPass],
    allocator: &RtHandleAllocator,
    usage: &HashMap<u32, ResourceUsage>,
    compiled: &CompiledGraph,
) -> Result<(), GraphError> {
    let mut by_physical: HashMap<u32, Vec<(usize, usize)>> = HashMap::new();
    for (&slot, used) in usage {
        let Some(&physical) = compiled.physical.get(&slot) else { continue };
        let Some(handle) = handle_for_slot(passes, slot) else { continue };
        if allocator.lifetime(handle)? != ResourceLifetime::Transient {
            continue;
        }
        let interval = (used.first_use(), used.last_use());
        for &(first, last) in by_physical.entry(physical).or_default().iter() {
            if !(interval.1 < first || last < interval.0) {
                return Err(GraphError::AliasingViolation {
                    physical,
                    first: passes[first].name.clone(),
                    second: passes[interval.0].name.clone(),
                });
            }
        }
        by_physical.entry(physical).or_default().push(interval);
    }
    Ok(())
}

/// Attachment-set signature used for fusion: sorted color slots, depth slot,
/// extent, layer count. `None` for passes without graph attachments.
type FusionSignature = (Vec<u32>, Option<u32>, UVec2, u32);

fn fusion_signature(pass: &RenderPass, dims: Option<(UVec2, u32)>) -> Option<FusionSignature> {
    let (size, layers) = dims?;
    let mut colors: Vec<u32> = pass.color_writes.iter().map(|w| w.handle.index()).collect();
    colors.sort_unstable();
    let depth = pass.depth_write.as_ref().map(|w| w.handle.index());
    Some((colors, depth, size, layers))
}

fn build_groups(
    passes: &[RenderPass],
    usage: &HashMap<u32, ResourceUsage>,
    pass_dims: &[Option<(UVec2, u32)>],
    fuse: bool,
) -> Vec<PassGroup> {
    let mut groups: Vec<PassGroup> = Vec::new();
    let mut current: Vec<usize> = Vec::new();
    let mut current_signature: Option<FusionSignature> = None;
    let mut group_start = 0usize;

    let flush = |groups: &mut Vec<PassGroup>, current: &mut Vec<usize>, dims: Option<(UVec2, u32)>| {
        if current.is_empty() {
            return;
        }
        let (size, layers) = dims.unwrap_or((UVec2::ZERO, 1));
        groups.push(PassGroup {
            passes: std::mem::take(current),
            width: size.x,
            height: size.y,
            layers,
        });
    };

    for i in 0..passes.len() {
        let signature = fusion_signature(&passes[i], pass_dims[i]);

        let fusable = fuse
            && !current.is_empty()
            && signature.is_some()
            && signature == current_signature
            && current.len() < MAX_FUSED_SUBPASSES
            && passes[i].external_writes.is_empty()
            && current.iter().all(|&p| passes[p].external_writes.is_empty())
            // A read of something produced before the group began needs a
            // store + barrier, which ends the native pass.
            && passes[i].reads.iter().all(|&(_, handle)| {
                usage
                    .get(&handle.index())
                    .and_then(|u| u.last_writer_before(i))
                    .map_or(true, |writer| writer >= group_start)
            });

        if !fusable {
            let prev_dims = current.first().and_then(|&p| pass_dims[p]);
            flush(&mut groups, &mut current, prev_dims);
            group_start = i;
            current_signature = signature;
        }
        current.push(i);
    }
    let prev_dims = current.first().and_then(|&p| pass_dims[p]);
    flush(&mut groups, &mut current, prev_dims);
    groups
}

/// Check the plan against native pass limits. The attachment limit applies
/// to every pass, fused or standalone; the subpass limit is already enforced
/// during grouping. A violation does not abort the frame; the caller falls
/// back to unfused execution.
pub(crate) fn validate_native(compiled: &CompiledGraph, passes: &[RenderPass]) -> Result<(), String> {
    for group in &compiled.groups {
        for &index in &group.passes {
            let colors = compiled.bindings[index]
                .iter()
                .filter(|b| !b.is_depth)
                .count();
            if colors > MAX_COLOR_ATTACHMENTS {
                return Err(format!(
                    "pass '{}' uses {} color attachments (limit {})",
                    passes[index].name, colors, MAX_COLOR_ATTACHMENTS
                ));
            }
        }
    }
    Ok(())
}
