use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Aircraft, GAL_TO_L, NMI_TO_KM};
use crate::orm::record::{Record, RecordMeta};

fn default_status() -> String {
    "scheduled".to_string()
}

/// One flight flown by an aircraft
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightData {
    #[serde(flatten)]
    pub meta: RecordMeta,

    pub flight_number: String,
    pub aircraft_id: i64,

    /// ICAO airport codes
    pub origin: String,
    pub destination: String,

    pub departure_date: DateTime<Utc>,
    pub arrival_date: Option<DateTime<Utc>>,
    /// minutes
    pub flight_time: Option<u32>,

    /// nautical miles
    pub distance: Option<f64>,
    /// gallons
    pub fuel_used: Option<f64>,
    /// knots
    pub avg_speed: Option<f64>,
    /// feet
    pub max_altitude_reached: Option<f64>,

    pub passengers: Option<u32>,
    /// pounds
    pub cargo_weight: Option<f64>,

    /// scheduled, departed, arrived, cancelled
    #[serde(default = "default_status")]
    pub status: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aircraft: Option<Box<Aircraft>>,
}

impl Record for FlightData {
    const RECORD_TYPE: &'static str = "flight_data";

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }
}

impl FlightData {
    pub fn new(
        flight_number: &str,
        aircraft_id: i64,
        origin: &str,
        destination: &str,
        departure_date: DateTime<Utc>,
    ) -> Self {
        Self {
            meta: RecordMeta::default(),
            flight_number: flight_number.to_string(),
            aircraft_id,
            origin: origin.to_string(),
            destination: destination.to_string(),
            departure_date,
            arrival_date: None,
            flight_time: None,
            distance: None,
            fuel_used: None,
            avg_speed: None,
            max_altitude_reached: None,
            passengers: None,
            cargo_weight: None,
            status: default_status(),
            aircraft: None,
        }
    }

    pub fn distance_km(&self) -> Option<f64> {
        self.distance.map(|nmi| nmi * NMI_TO_KM)
    }

    pub fn fuel_used_liters(&self) -> Option<f64> {
        self.fuel_used.map(|gal| gal * GAL_TO_L)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn departure() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 8, 30, 0).unwrap()
    }

    #[test]
    fn test_unit_conversions() {
        let flight = FlightData {
            distance: Some(2_150.0),
            fuel_used: Some(5_400.0),
            ..FlightData::new("AA100", 1, "KJFK", "KLAX", departure())
        };
        assert!((flight.distance_km().unwrap() - 3_981.8).abs() < 1e-6);
        assert!((flight.fuel_used_liters().unwrap() - 20_441.214).abs() < 1e-3);
        assert_eq!(FlightData::new("AA101", 1, "KLAX", "KJFK", departure()).distance_km(), None);
    }

    #[test]
    fn test_status_defaults_to_scheduled() {
        let map = match json!({
            "flight_number": "BA117",
            "aircraft_id": 3,
            "origin": "EGLL",
            "destination": "KJFK",
            "departure_date": "2026-03-14T11:00:00Z"
        }) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        };
        let flight = FlightData::from_map(map).unwrap();
        assert_eq!(flight.status, "scheduled");
        assert!(flight.aircraft.is_none());
        assert_eq!(flight.departure_date, Utc.with_ymd_and_hms(2026, 3, 14, 11, 0, 0).unwrap());
    }
}
