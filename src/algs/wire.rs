//! Fixed, versioned, little-endian wire types for the DOF-manager exchanges.

use bytemuck::{Pod, Zeroable};
use static_assertions::const_assert_eq;
use std::mem::{align_of, size_of};

use crate::topology::entity::EntityCategory;

pub fn cast_slice<T: Pod>(v: &[T]) -> &[u8] {
    bytemuck::cast_slice(v)
}

pub fn cast_slice_mut<T: Pod>(v: &mut [T]) -> &mut [u8] {
    bytemuck::cast_slice_mut(v)
}

/// Bump when the layout or semantics change in incompatible ways.
pub const WIRE_VERSION: u16 = 1;

/// All multi-byte integers in these structs are **little-endian** on the wire.
/// We store them pre-LE with `.to_le()` and decode with `.from_le()`.

// ===== Common records ======================================================

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireCount {
    pub n_le: u32, // count of following records
}
impl WireCount {
    pub fn new(n: usize) -> Self {
        Self {
            n_le: (n as u32).to_le(),
        }
    }
    pub fn get(&self) -> usize {
        u32::from_le(self.n_le) as usize
    }
}

/// A pattern coordinate `(row, col)` in global free/fixed indices.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireAdj {
    pub src_le: u64,
    pub dst_le: u64,
}
impl WireAdj {
    pub fn new(src: u64, dst: u64) -> Self {
        Self {
            src_le: src.to_le(),
            dst_le: dst.to_le(),
        }
    }
    pub fn src(&self) -> u64 {
        u64::from_le(self.src_le)
    }
    pub fn dst(&self) -> u64 {
        u64::from_le(self.dst_le)
    }
}

// ===== Field values ========================================================

/// Value `k` of a field on entity `entity`.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireEntityValue {
    pub entity_le: u64,
    pub value_bits_le: u64,
    pub k_le: u32,
    pub _pad: u32,
}
impl WireEntityValue {
    pub fn new(entity: u64, k: usize, value: f64) -> Self {
        Self {
            entity_le: entity.to_le(),
            value_bits_le: value.to_bits().to_le(),
            k_le: (k as u32).to_le(),
            _pad: 0,
        }
    }
    pub fn entity(&self) -> u64 {
        u64::from_le(self.entity_le)
    }
    pub fn k(&self) -> usize {
        u32::from_le(self.k_le) as usize
    }
    pub fn value(&self) -> f64 {
        f64::from_bits(u64::from_le(self.value_bits_le))
    }
}

// ===== DOF discovery =======================================================

/// One discovered DOF `(id, entity, category, slot)` addressed to a rank.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireDof {
    pub id_le: u64,
    pub entity_le: u64,
    pub category_le: u32,
    pub slot_le: u32,
}
impl WireDof {
    pub const SIZE: usize = 24;
    pub fn new(id: u64, entity: u64, category: EntityCategory, slot: usize) -> Self {
        Self {
            id_le: id.to_le(),
            entity_le: entity.to_le(),
            category_le: (category as u32).to_le(),
            slot_le: (slot as u32).to_le(),
        }
    }
    pub fn id(&self) -> u64 {
        u64::from_le(self.id_le)
    }
    pub fn entity(&self) -> u64 {
        u64::from_le(self.entity_le)
    }
    pub fn category(&self) -> Option<EntityCategory> {
        EntityCategory::from_index(u32::from_le(self.category_le) as usize)
    }
    pub fn slot(&self) -> usize {
        u32::from_le(self.slot_le) as usize
    }
}

/// Fixed/free state of one DOF: reported to the coordinator with `index = 0`,
/// returned with the assigned free or fixed index.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireDofState {
    pub id_le: u64,
    pub value_bits_le: u64,
    pub index_le: u64,
    pub fixed_le: u32,
    pub _pad: u32,
}
impl WireDofState {
    pub const SIZE: usize = 32;
    pub fn new(id: u64, fixed: bool, value: f64, index: usize) -> Self {
        Self {
            id_le: id.to_le(),
            value_bits_le: value.to_bits().to_le(),
            index_le: (index as u64).to_le(),
            fixed_le: u32::from(fixed).to_le(),
            _pad: 0,
        }
    }
    pub fn id(&self) -> u64 {
        u64::from_le(self.id_le)
    }
    pub fn value(&self) -> f64 {
        f64::from_bits(u64::from_le(self.value_bits_le))
    }
    pub fn index(&self) -> usize {
        u64::from_le(self.index_le) as usize
    }
    pub fn fixed(&self) -> bool {
        u32::from_le(self.fixed_le) != 0
    }
}

// ===== Solve status ========================================================

/// Outcome of a coordinator-side phase broadcast to every rank.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireStatus {
    pub code_le: u32,
    pub version_le: u16,
    pub _pad: u16,
    pub value_bits_le: u64,
}
impl WireStatus {
    pub fn ok(value: f64) -> Self {
        Self::new(0, value)
    }
    pub fn failed(code: u32) -> Self {
        Self::new(code, f64::NAN)
    }
    fn new(code: u32, value: f64) -> Self {
        Self {
            code_le: code.to_le(),
            version_le: WIRE_VERSION.to_le(),
            _pad: 0,
            value_bits_le: value.to_bits().to_le(),
        }
    }
    pub fn code(&self) -> u32 {
        u32::from_le(self.code_le)
    }
    pub fn version(&self) -> u16 {
        u16::from_le(self.version_le)
    }
    pub fn value(&self) -> f64 {
        f64::from_bits(u64::from_le(self.value_bits_le))
    }
}

// ===== Compile-time sanity checks =========================================

const_assert_eq!(size_of::<WireCount>(), 4);
const_assert_eq!(size_of::<WireAdj>(), 16);
const_assert_eq!(size_of::<WireDof>(), WireDof::SIZE);
const_assert_eq!(size_of::<WireDofState>(), WireDofState::SIZE);
const_assert_eq!(size_of::<WireStatus>(), 16);
const_assert_eq!(size_of::<WireEntityValue>(), 24);
const_assert_eq!(align_of::<WireDofState>(), 8);

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::{cast_slice, cast_slice_mut};

    #[test]
    fn dof_record_survives_bytes() {
        let v = vec![
            WireDof::new(17, 4, EntityCategory::Edge, 3),
            WireDof::new(2, 0, EntityCategory::Lambda, 0),
        ];
        let bytes: Vec<u8> = cast_slice(&v).to_vec();
        let mut out = vec![WireDof::zeroed(); 2];
        cast_slice_mut(&mut out).copy_from_slice(&bytes);
        assert_eq!(out[0].id(), 17);
        assert_eq!(out[0].entity(), 4);
        assert_eq!(out[0].category(), Some(EntityCategory::Edge));
        assert_eq!(out[0].slot(), 3);
        assert_eq!(out[1].category(), Some(EntityCategory::Lambda));
    }

    #[test]
    fn dof_state_keeps_value_bits() {
        let s = WireDofState::new(9, true, -0.25, 3);
        assert!(s.fixed());
        assert_eq!(s.value(), -0.25);
        assert_eq!(s.index(), 3);
        assert!(!WireDofState::new(1, false, 0.0, 0).fixed());
    }

    #[test]
    fn status_version_guard() {
        let st = WireStatus::ok(0.5);
        assert_eq!(st.version(), WIRE_VERSION);
        assert_eq!(st.code(), 0);
        assert_eq!(st.value(), 0.5);
        assert!(WireStatus::failed(11).value().is_nan());
    }
}
