/// One entry in the material palette. Index 0 is reserved for air.
#[derive(Clone, Debug)]
pub struct Material {
    pub name: String,
    pub solid: bool,
    pub transparent: bool,
    pub liquid: bool,
}

/// Immutable, caller-supplied table of materials indexed by material id.
///
/// Built once at engine startup. Callers provide their own material list since
/// this engine doesn't own asset definitions.
#[derive(Clone, Debug)]
pub struct MaterialPalette {
    materials: Vec<Material>,
}

impl MaterialPalette {
    pub fn new(materials: Vec<Material>) -> Self {
        assert!(
            !materials.is_empty() && !materials[0].solid,
            "material 0 must be present and non-solid (air)"
        );
        Self { materials }
    }

    pub fn is_solid(&self, material_id: u8) -> bool {
        self.get(material_id).solid
    }

    pub fn is_transparent(&self, material_id: u8) -> bool {
        self.get(material_id).transparent
    }

    pub fn is_liquid(&self, material_id: u8) -> bool {
        self.get(material_id).liquid
    }

    pub fn is_empty_material(&self, material_id: u8) -> bool {
        material_id == 0
    }

    pub fn get(&self, material_id: u8) -> &Material {
        self.materials
            .get(material_id as usize)
            .unwrap_or_else(|| panic!("material id {material_id} out of range of palette"))
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }
}
