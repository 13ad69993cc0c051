use bytemuck::{Pod, Zeroable};

/// A single packed voxel: material id (8 bits), sunlight level (4 bits),
/// sky-exposure flag (1 bit), 3 bits reserved.
///
/// Bit layout, low to high: `[material: 8][sunlight: 4][sky_exposed: 1][reserved: 3]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
#[repr(transparent)]
pub struct Voxel(u16);

const MATERIAL_SHIFT: u16 = 0;
const MATERIAL_MASK: u16 = 0xFF;
const SUNLIGHT_SHIFT: u16 = 8;
const SUNLIGHT_MASK: u16 = 0xF;
const SKY_EXPOSED_BIT: u16 = 1 << 12;

pub const MAX_SUNLIGHT: u8 = 15;

impl Voxel {
    pub const EMPTY: Voxel = Voxel(0);

    pub fn new(material: u8, sunlight: u8, sky_exposed: bool) -> Self {
        debug_assert!(sunlight <= MAX_SUNLIGHT);
        let mut bits = (material as u16 & MATERIAL_MASK) << MATERIAL_SHIFT;
        bits |= (sunlight as u16 & SUNLIGHT_MASK) << SUNLIGHT_SHIFT;
        if sky_exposed {
            bits |= SKY_EXPOSED_BIT;
        }
        Self(bits)
    }

    pub fn material(&self) -> u8 {
        ((self.0 >> MATERIAL_SHIFT) & MATERIAL_MASK) as u8
    }

    pub fn sunlight(&self) -> u8 {
        ((self.0 >> SUNLIGHT_SHIFT) & SUNLIGHT_MASK) as u8
    }

    pub fn sky_exposed(&self) -> bool {
        self.0 & SKY_EXPOSED_BIT != 0
    }

    pub fn with_material(self, material: u8) -> Self {
        Self::new(material, self.sunlight(), self.sky_exposed())
    }

    pub fn with_sunlight(self, sunlight: u8) -> Self {
        Self::new(self.material(), sunlight.min(MAX_SUNLIGHT), self.sky_exposed())
    }

    pub fn with_sky_exposed(self, sky_exposed: bool) -> Self {
        Self::new(self.material(), self.sunlight(), sky_exposed)
    }

    pub fn is_empty(&self) -> bool {
        self.material() == 0
    }

    pub fn raw(&self) -> u16 {
        self.0
    }

    pub fn from_raw(raw: u16) -> Self {
        Self(raw)
    }
}

impl Default for Voxel {
    fn default() -> Self {
        Self::EMPTY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_and_unpacks_fields() {
        let v = Voxel::new(200, 11, true);
        assert_eq!(v.material(), 200);
        assert_eq!(v.sunlight(), 11);
        assert!(v.sky_exposed());
    }

    #[test]
    fn with_material_preserves_light() {
        let v = Voxel::new(1, 7, false).with_material(9);
        assert_eq!(v.material(), 9);
        assert_eq!(v.sunlight(), 7);
    }

    #[test]
    fn sunlight_saturates_at_max() {
        let v = Voxel::new(0, 0, false).with_sunlight(255);
        assert_eq!(v.sunlight(), MAX_SUNLIGHT);
    }

    #[test]
    fn empty_is_zero_material() {
        assert!(Voxel::EMPTY.is_empty());
        assert_eq!(Voxel::default(), Voxel::EMPTY);
    }
}
