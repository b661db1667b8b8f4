//! Uniform block layout, lookup table and CPU staging.
//!
//! The fragment shader reads one std140-compatible uniform block. On the CPU
//! that block is described once by a [`UniformLayout`] (name, kind, byte
//! offset per field), resolved once into a [`UniformTable`], and staged in a
//! [`UniformValues`] byte buffer that is uploaded with a single
//! `queue.write_buffer` per frame.
//!
//! Resolution is the expensive conceptual step and happens exactly once per
//! program lifetime; after that, effect callbacks look handles up from the
//! table (a plain map read) and write through them. A lookup for a name the
//! block does not carry yields `None`, and every write treats a `None`
//! handle as a silent no-op, so effects never need to care whether the
//! active shader actually uses their parameters.

use std::collections::HashMap;

/// Scalar/vector kinds supported by the block. Offsets follow std140-style
/// rules: scalars align 4, vec2 aligns 8, vec4 and array elements align 16.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformKind {
    F32,
    U32,
    Vec2,
    Vec4,
    /// Array of vec4 with the given element count, stride 16.
    Vec4Array(u32),
}

impl UniformKind {
    fn alignment(self) -> u32 {
        match self {
            UniformKind::F32 | UniformKind::U32 => 4,
            UniformKind::Vec2 => 8,
            UniformKind::Vec4 | UniformKind::Vec4Array(_) => 16,
        }
    }

    fn size(self) -> u32 {
        match self {
            UniformKind::F32 | UniformKind::U32 => 4,
            UniformKind::Vec2 => 8,
            UniformKind::Vec4 => 16,
            UniformKind::Vec4Array(count) => 16 * count,
        }
    }
}

/// Resolved location of one uniform inside the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformHandle {
    offset: u32,
    kind: UniformKind,
}

/// Ordered field list for the uniform block. The WGSL struct must declare
/// the same fields in the same order; `tests` pin the resulting offsets.
#[derive(Debug, Clone, Default)]
pub struct UniformLayout {
    fields: Vec<(String, UniformHandle)>,
    size: u32,
}

impl UniformLayout {
    pub fn builder() -> UniformLayoutBuilder {
        UniformLayoutBuilder {
            fields: Vec::new(),
            cursor: 0,
        }
    }

    /// Padded block size in bytes.
    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn fields(&self) -> &[(String, UniformHandle)] {
        &self.fields
    }
}

pub struct UniformLayoutBuilder {
    fields: Vec<(String, UniformHandle)>,
    cursor: u32,
}

impl UniformLayoutBuilder {
    pub fn field(mut self, name: &str, kind: UniformKind) -> Self {
        let offset = align_up(self.cursor, kind.alignment());
        self.fields.push((
            name.to_owned(),
            UniformHandle { offset, kind },
        ));
        self.cursor = offset + kind.size();
        self
    }

    pub fn finish(self) -> UniformLayout {
        UniformLayout {
            fields: self.fields,
            size: align_up(self.cursor, 16),
        }
    }
}

fn align_up(value: u32, alignment: u32) -> u32 {
    let mask = alignment - 1;
    (value + mask) & !mask
}

/// Name → handle table, resolved once from a layout.
pub struct UniformTable {
    handles: HashMap<String, UniformHandle>,
    resolutions: u32,
}

impl UniformTable {
    /// Walk the layout and resolve every field. This is the only place
    /// offsets are computed into handles; `resolution_count` exposes the
    /// count so tests can prove it stays constant across frames.
    pub fn resolve(layout: &UniformLayout) -> Self {
        let mut handles = HashMap::with_capacity(layout.fields().len());
        let mut resolutions = 0;
        for (name, handle) in layout.fields() {
            handles.insert(name.clone(), *handle);
            resolutions += 1;
        }
        Self {
            handles,
            resolutions,
        }
    }

    /// Cheap per-frame lookup. `None` for unknown names; callers pass the
    /// result straight into [`UniformValues`] writes, which tolerate it.
    pub fn get(&self, name: &str) -> Option<UniformHandle> {
        self.handles.get(name).copied()
    }

    pub fn resolution_count(&self) -> u32 {
        self.resolutions
    }
}

/// CPU staging for the uniform block. All writes are kind-checked; a write
/// through a `None` handle or a mismatched kind is dropped (debug-asserted
/// in development builds).
pub struct UniformValues {
    bytes: Vec<u8>,
}

impl UniformValues {
    pub fn new(layout: &UniformLayout) -> Self {
        Self {
            bytes: vec![0_u8; layout.size() as usize],
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn set_f32(&mut self, handle: Option<UniformHandle>, value: f32) {
        self.write_scalar(handle, UniformKind::F32, bytemuck::bytes_of(&value));
    }

    pub fn set_u32(&mut self, handle: Option<UniformHandle>, value: u32) {
        self.write_scalar(handle, UniformKind::U32, bytemuck::bytes_of(&value));
    }

    pub fn set_vec2(&mut self, handle: Option<UniformHandle>, value: [f32; 2]) {
        let Some(handle) = handle else { return };
        if handle.kind != UniformKind::Vec2 {
            debug_assert!(false, "vec2 write against {:?}", handle.kind);
            return;
        }
        self.copy_floats(handle.offset, &value);
    }

    pub fn set_vec4(&mut self, handle: Option<UniformHandle>, value: [f32; 4]) {
        let Some(handle) = handle else { return };
        if handle.kind != UniformKind::Vec4 {
            debug_assert!(false, "vec4 write against {:?}", handle.kind);
            return;
        }
        self.copy_floats(handle.offset, &value);
    }

    /// Write one element of a vec4 array. Out-of-range indices are dropped;
    /// the shader-side array is fixed-capacity and the CPU side must never
    /// write past it.
    pub fn set_vec4_element(
        &mut self,
        handle: Option<UniformHandle>,
        index: u32,
        value: [f32; 4],
    ) {
        let Some(handle) = handle else { return };
        let UniformKind::Vec4Array(count) = handle.kind else {
            debug_assert!(false, "array write against {:?}", handle.kind);
            return;
        };
        if index >= count {
            return;
        }
        self.copy_floats(handle.offset + index * 16, &value);
    }

    fn write_scalar(&mut self, handle: Option<UniformHandle>, kind: UniformKind, bytes: &[u8]) {
        let Some(handle) = handle else { return };
        if handle.kind != kind {
            debug_assert!(false, "{:?} write against {:?}", kind, handle.kind);
            return;
        }
        let offset = handle.offset as usize;
        self.bytes[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    fn copy_floats(&mut self, offset: u32, values: &[f32]) {
        let offset = offset as usize;
        let bytes = bytemuck::cast_slice(values);
        self.bytes[offset..offset + bytes.len()].copy_from_slice(bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::ascii_uniform_layout;

    #[test]
    fn std140_offsets_match_the_wgsl_struct() {
        // These offsets pin the field order declared in
        // shaders/wgsl/ascii_fragment.wgsl. If this test moves, the shader
        // struct moved too.
        let layout = ascii_uniform_layout();
        let table = UniformTable::resolve(&layout);

        let offset = |name: &str| table.get(name).unwrap().offset;
        assert_eq!(offset("u_grid_size"), 0);
        assert_eq!(offset("u_cursor_pos"), 8);
        assert_eq!(offset("u_glyph_count"), 16);
        assert_eq!(offset("u_brightness"), 20);
        assert_eq!(offset("u_color_mode"), 24);
        assert_eq!(offset("u_blend"), 28);
        assert_eq!(offset("u_highlight"), 32);
        assert_eq!(offset("u_audio_level"), 36);
        assert_eq!(offset("u_audio_reactivity"), 40);
        assert_eq!(offset("u_cursor_strength"), 44);
        assert_eq!(offset("u_ripple_count"), 48);
        assert_eq!(offset("u_time"), 52);
        assert_eq!(offset("u_ripples"), 64);
        assert_eq!(layout.size(), 192);
    }

    #[test]
    fn resolution_happens_once_per_table_lifetime() {
        let layout = ascii_uniform_layout();
        let table = UniformTable::resolve(&layout);
        let unique_names = layout.fields().len() as u32;
        assert_eq!(table.resolution_count(), unique_names);

        // Simulated frames: lookups must not add resolutions.
        for _ in 0..100 {
            let _ = table.get("u_time");
            let _ = table.get("u_cursor_pos");
            let _ = table.get("u_not_a_uniform");
        }
        assert_eq!(table.resolution_count(), unique_names);
    }

    #[test]
    fn unknown_uniform_writes_are_silent_no_ops() {
        let layout = ascii_uniform_layout();
        let table = UniformTable::resolve(&layout);
        let mut values = UniformValues::new(&layout);

        let before = values.as_bytes().to_vec();
        values.set_f32(table.get("u_optimized_out"), 7.0);
        values.set_vec2(table.get("u_missing_vec"), [1.0, 2.0]);
        assert_eq!(values.as_bytes(), &before[..]);
    }

    #[test]
    fn scalar_and_vector_writes_land_at_their_offsets() {
        let layout = ascii_uniform_layout();
        let table = UniformTable::resolve(&layout);
        let mut values = UniformValues::new(&layout);

        values.set_f32(table.get("u_time"), 1.5);
        values.set_vec2(table.get("u_cursor_pos"), [3.0, 4.0]);
        values.set_u32(table.get("u_ripple_count"), 5);

        let bytes = values.as_bytes();
        assert_eq!(bytemuck::pod_read_unaligned::<f32>(&bytes[52..56]), 1.5);
        assert_eq!(bytemuck::pod_read_unaligned::<f32>(&bytes[8..12]), 3.0);
        assert_eq!(bytemuck::pod_read_unaligned::<f32>(&bytes[12..16]), 4.0);
        assert_eq!(bytemuck::pod_read_unaligned::<u32>(&bytes[48..52]), 5);
    }

    #[test]
    fn array_element_writes_respect_capacity() {
        let layout = ascii_uniform_layout();
        let table = UniformTable::resolve(&layout);
        let mut values = UniformValues::new(&layout);
        let ripples = table.get("u_ripples");

        values.set_vec4_element(ripples, 0, [1.0, 2.0, 3.0, 4.0]);
        values.set_vec4_element(ripples, 7, [5.0, 6.0, 7.0, 8.0]);
        // One past the end: dropped, not a panic and not a stray write.
        values.set_vec4_element(ripples, 8, [9.0, 9.0, 9.0, 9.0]);

        let bytes = values.as_bytes();
        assert_eq!(bytemuck::pod_read_unaligned::<f32>(&bytes[64..68]), 1.0);
        let last = 64 + 7 * 16;
        assert_eq!(bytemuck::pod_read_unaligned::<f32>(&bytes[last..last + 4]), 5.0);
        assert_eq!(bytes.len(), 192);
    }
}
