use serde::{Deserialize, Serialize};

use super::{G_CM3_TO_KG_M3, MPA_TO_PSI};
use crate::orm::record::{Record, RecordMeta};

/// Structural material with mechanical and thermal properties
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Material {
    #[serde(flatten)]
    pub meta: RecordMeta,

    pub name: String,
    pub specification: Option<String>,
    pub astm_grade: Option<String>,

    /// g/cm³
    pub density: f64,

    /// MPa
    pub tensile_strength: f64,
    pub yield_strength: f64,
    /// GPa
    pub elastic_modulus: f64,

    /// °C
    pub melting_point: Option<f64>,
    /// W/(m·K)
    pub thermal_conductivity: Option<f64>,
    /// µm/(m·°C)
    pub thermal_expansion: Option<f64>,
    /// operating range (min, max) in °C
    pub temperature_rating: Option<(f64, f64)>,

    pub primary_element: Option<String>,
    pub alloy_composition: Option<String>,
    /// metal, composite, polymer, ceramic, alloy
    pub category: Option<String>,
}

impl Record for Material {
    const RECORD_TYPE: &'static str = "material";

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }
}

impl Material {
    pub fn new(name: &str, density: f64) -> Self {
        Self {
            name: name.to_string(),
            density,
            ..Self::default()
        }
    }

    pub fn density_kg_m3(&self) -> f64 {
        self.density * G_CM3_TO_KG_M3
    }

    pub fn tensile_strength_psi(&self) -> f64 {
        self.tensile_strength * MPA_TO_PSI
    }

    pub fn yield_strength_psi(&self) -> f64 {
        self.yield_strength * MPA_TO_PSI
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unit_conversions() {
        let alloy = Material {
            tensile_strength: 572.0,
            yield_strength: 503.0,
            ..Material::new("Aluminum 7075-T6", 2.81)
        };
        assert!((alloy.density_kg_m3() - 2810.0).abs() < 1e-9);
        assert!((alloy.tensile_strength_psi() - 82_961.7).abs() < 0.1);
        assert!((alloy.yield_strength_psi() - 72_954.1).abs() < 0.1);
    }

    #[test]
    fn test_temperature_rating_is_a_pair() {
        let titanium = Material {
            temperature_rating: Some((-250.0, 400.0)),
            ..Material::new("Ti-6Al-4V", 4.43)
        };
        let map = titanium.to_map(true).unwrap();
        assert_eq!(map["temperature_rating"], json!([-250.0, 400.0]));
    }
}
