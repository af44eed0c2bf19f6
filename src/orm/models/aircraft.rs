use serde::{Deserialize, Serialize};

use super::{Engine, FlightData, Material, FT_TO_M, KT_TO_MS, LB_TO_KG};
use crate::orm::backend::{Backend, GraphNode};
use crate::orm::error::{OrmError, OrmResult};
use crate::orm::record::{Record, RecordMeta};

/// Aircraft type with its specifications and performance envelope
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Aircraft {
    #[serde(flatten)]
    pub meta: RecordMeta,

    pub model: String,
    pub manufacturer: String,

    /// knots
    pub max_speed: f64,
    pub cruise_speed: Option<f64>,
    /// feet
    pub max_altitude: f64,
    /// nautical miles
    pub range: Option<f64>,

    /// feet
    pub wingspan: f64,
    pub length: f64,
    pub height: Option<f64>,

    /// pounds
    pub mtow: f64,
    pub mlw: Option<f64>,
    pub oew: Option<f64>,

    pub passenger_capacity: Option<u32>,
    /// cubic feet
    pub cargo_capacity: Option<f64>,
    /// gallons
    pub fuel_capacity: Option<f64>,

    pub num_engines: Option<u8>,
    pub engine_type: Option<String>,

    /// YYYY-MM-DD
    pub first_flight: Option<String>,
    pub production_status: Option<String>,

    #[serde(default)]
    pub engine_ids: Vec<i64>,
    #[serde(default)]
    pub material_ids: Vec<i64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub engines: Vec<Engine>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub materials: Vec<Material>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flights: Vec<FlightData>,
}

impl Record for Aircraft {
    const RECORD_TYPE: &'static str = "aircraft";

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }
}

impl Aircraft {
    pub fn new(model: &str, manufacturer: &str, max_speed: f64) -> Self {
        Self {
            model: model.to_string(),
            manufacturer: manufacturer.to_string(),
            max_speed,
            ..Self::default()
        }
    }

    pub fn wingspan_m(&self) -> f64 {
        self.wingspan * FT_TO_M
    }

    pub fn length_m(&self) -> f64 {
        self.length * FT_TO_M
    }

    pub fn mtow_kg(&self) -> f64 {
        self.mtow * LB_TO_KG
    }

    pub fn max_speed_ms(&self) -> f64 {
        self.max_speed * KT_TO_MS
    }

    /// Every component reachable from this aircraft within `max_depth` hops.
    ///
    /// Only backends that can traverse (the graph store) support this; others
    /// return `NotImplemented`.
    pub fn traverse_components(&self, backend: &dyn Backend, max_depth: usize) -> OrmResult<Vec<GraphNode>> {
        let id = self.saved_id()?;
        backend.traverse(Self::RECORD_TYPE, id, &[], max_depth)
    }

    /// Materials used by the airframe directly or by any of its engines
    pub fn find_related_materials(&self, backend: &dyn Backend) -> OrmResult<Vec<Material>> {
        let id = self.saved_id()?;
        let relations = ["engines".to_string(), "materials".to_string()];
        backend
            .traverse(Self::RECORD_TYPE, id, &relations, 2)?
            .into_iter()
            .filter(|node| node.record_type == Material::RECORD_TYPE)
            .map(|node| Material::from_map(node.data))
            .collect()
    }

    fn saved_id(&self) -> OrmResult<i64> {
        self.id().ok_or_else(|| {
            OrmError::Validation(format!("aircraft '{}' has not been saved", self.model))
        })
    }
}
