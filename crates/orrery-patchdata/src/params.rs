//! Per-patch heightmap parameter blocks read by the surface mesh shader.

use bytemuck::{Pod, Zeroable};
use orrery_lod::PatchId;
use rustc_hash::FxHashMap;

/// One 32-byte parameter block.
///
/// `u_scale`/`v_scale` shrink the sampling window so texture coordinates
/// land on texel centers; `tex_offset`/`tex_scale` select the window of a
/// possibly inherited ancestor texture.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct HeightmapPatchParams {
    pub height_scale: f32,
    pub u_scale: f32,
    pub v_scale: f32,
    pub _pad: f32,
    pub tex_offset: [f32; 2],
    pub tex_scale: [f32; 2],
}

static_assertions::assert_eq_size!(HeightmapPatchParams, [u8; 32]);

/// Parameter blocks packed in a 1-D texel table, one slot per patch.
#[derive(Debug, Default)]
pub struct ParamBlockTable {
    blocks: Vec<HeightmapPatchParams>,
    free: Vec<u32>,
    slots: FxHashMap<PatchId, u32>,
}

impl ParamBlockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write the block of `id`, claiming a slot on first use.
    pub fn write(&mut self, id: PatchId, params: HeightmapPatchParams) -> u32 {
        let slot = match self.slots.get(&id) {
            Some(&slot) => slot,
            None => {
                let slot = match self.free.pop() {
                    Some(slot) => slot,
                    None => {
                        self.blocks.push(HeightmapPatchParams::zeroed());
                        self.blocks.len() as u32 - 1
                    }
                };
                self.slots.insert(id, slot);
                slot
            }
        };
        self.blocks[slot as usize] = params;
        slot
    }

    /// Return the slot of `id` to the free list.
    pub fn release(&mut self, id: PatchId) -> Option<u32> {
        let slot = self.slots.remove(&id)?;
        self.blocks[slot as usize] = HeightmapPatchParams::zeroed();
        self.free.push(slot);
        Some(slot)
    }

    pub fn slot(&self, id: PatchId) -> Option<u32> {
        self.slots.get(&id).copied()
    }

    pub fn get(&self, id: PatchId) -> Option<&HeightmapPatchParams> {
        self.slot(id).map(|s| &self.blocks[s as usize])
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Width of the table in slots, including free ones.
    pub fn capacity(&self) -> usize {
        self.blocks.len()
    }

    /// Raw table contents for upload.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.blocks)
    }
}
