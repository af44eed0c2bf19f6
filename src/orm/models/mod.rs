//! Aerospace domain models
//!
//! Measurements are stored in the units the industry publishes them in
//! (feet, pounds, knots, pounds-force, MPa). Conversion helpers on each
//! model return SI values.

pub mod aircraft;
pub mod engine;
pub mod flight_data;
pub mod material;

pub use aircraft::Aircraft;
pub use engine::Engine;
pub use flight_data::FlightData;
pub use material::Material;

pub(crate) const FT_TO_M: f64 = 0.3048;
pub(crate) const LB_TO_KG: f64 = 0.453592;
pub(crate) const KT_TO_MS: f64 = 0.514444;
pub(crate) const LBF_TO_KN: f64 = 0.00444822;
pub(crate) const G_CM3_TO_KG_M3: f64 = 1000.0;
pub(crate) const MPA_TO_PSI: f64 = 145.038;
pub(crate) const NMI_TO_KM: f64 = 1.852;
pub(crate) const GAL_TO_L: f64 = 3.78541;
