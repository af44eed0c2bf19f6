use serde::{Deserialize, Serialize};

use super::{Material, LBF_TO_KN, LB_TO_KG};
use crate::orm::record::{Record, RecordMeta};

/// Engine type with performance and physical specifications
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Engine {
    #[serde(flatten)]
    pub meta: RecordMeta,

    pub model: String,
    pub manufacturer: String,
    /// turbofan, turbojet, turboprop, ...
    pub engine_type: String,

    /// pounds-force
    pub thrust: f64,
    /// lb/lbf/hr
    pub specific_fuel_consumption: Option<f64>,
    pub bypass_ratio: Option<f64>,

    /// dry weight, pounds
    pub weight: f64,
    /// inches
    pub length: Option<f64>,
    pub diameter: Option<f64>,

    pub max_rpm: Option<u32>,
    pub compression_ratio: Option<f64>,

    pub first_run: Option<String>,
    pub production_status: Option<String>,

    #[serde(default)]
    pub material_ids: Vec<i64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub materials: Vec<Material>,
}

impl Record for Engine {
    const RECORD_TYPE: &'static str = "engine";

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }
}

impl Engine {
    pub fn new(model: &str, manufacturer: &str, engine_type: &str, thrust: f64) -> Self {
        Self {
            model: model.to_string(),
            manufacturer: manufacturer.to_string(),
            engine_type: engine_type.to_string(),
            thrust,
            ..Self::default()
        }
    }

    pub fn thrust_kn(&self) -> f64 {
        self.thrust * LBF_TO_KN
    }

    pub fn weight_kg(&self) -> f64 {
        self.weight * LB_TO_KG
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_conversions() {
        let engine = Engine {
            weight: 5_216.0,
            ..Engine::new("CFM56-7B27", "CFM International", "turbofan", 27_300.0)
        };
        assert!((engine.thrust_kn() - 121.436).abs() < 1e-3);
        assert!((engine.weight_kg() - 2_365.93).abs() < 0.01);
    }
}
