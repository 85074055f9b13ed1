use crate::domain::{DomainError, DomainResult, EventRecord};
use serde::{Deserialize, Serialize};

/// Variable under which zones are stored on hierarchy entities
pub const GEOFENCE_VARIABLE: &str = "geofence";

/// WGS84 coordinate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawGeoPoint")]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Build from a GeoJSON `[lng, lat]` pair
    pub fn from_lng_lat(coordinates: [f64; 2]) -> Self {
        Self {
            lat: coordinates[1],
            lng: coordinates[0],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawGeoPoint {
    LatLng { lat: f64, lng: f64 },
    GeoJson { coordinates: Vec<f64> },
}

impl TryFrom<RawGeoPoint> for GeoPoint {
    type Error = String;

    fn try_from(raw: RawGeoPoint) -> Result<Self, Self::Error> {
        match raw {
            RawGeoPoint::LatLng { lat, lng } => Ok(GeoPoint { lat, lng }),
            RawGeoPoint::GeoJson { coordinates } => match coordinates.as_slice() {
                [lng, lat, ..] => Ok(GeoPoint { lat: *lat, lng: *lng }),
                _ => Err(format!(
                    "expected [lng, lat] coordinates, got {} values",
                    coordinates.len()
                )),
            },
        }
    }
}

/// Which transition of a zone raises an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventColor {
    /// Alert when the device leaves the zone
    Green,
    /// Alert when the device enters the zone
    Red,
}

impl EventColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventColor::Green => "green",
            EventColor::Red => "red",
        }
    }

    /// Whether a device with the given membership is in the alerting condition
    pub fn is_alerting(&self, inside: bool) -> bool {
        match self {
            EventColor::Green => !inside,
            EventColor::Red => inside,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ZoneShape {
    /// Ring of `[lng, lat]` vertices
    Polygon(Vec<[f64; 2]>),
    /// Center as `[lng, lat]`, radius in meters
    Circle { center: [f64; 2], radius: f64 },
}

/// Named geofence owned by an organization, group or subgroup
#[derive(Debug, Clone, PartialEq)]
pub struct Zone {
    pub id: String,
    pub name: String,
    pub shape: ZoneShape,
    pub event_color: EventColor,
    pub action_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum GeoJsonShape {
    Polygon { coordinates: Vec<Vec<[f64; 2]>> },
    Point { coordinates: [f64; 2], radius: f64 },
}

#[derive(Debug, Deserialize)]
struct ZoneMetadata {
    geolocation: GeoJsonShape,
    event: EventColor,
    #[serde(default)]
    action_id: Option<String>,
}

impl Zone {
    /// Parse a zone out of a `geofence` data record
    pub fn from_record(record: &EventRecord) -> DomainResult<Zone> {
        let id = record.id.clone().ok_or_else(|| {
            DomainError::InvalidZone(record.variable.clone(), "record has no id".to_string())
        })?;

        let metadata = record
            .metadata
            .clone()
            .ok_or_else(|| DomainError::InvalidZone(id.clone(), "missing metadata".to_string()))?;

        let metadata: ZoneMetadata = serde_json::from_value(serde_json::Value::Object(metadata))
            .map_err(|e| DomainError::InvalidZone(id.clone(), e.to_string()))?;

        let shape = match metadata.geolocation {
            GeoJsonShape::Polygon { coordinates } => {
                let ring = coordinates.into_iter().next().ok_or_else(|| {
                    DomainError::InvalidZone(id.clone(), "polygon has no ring".to_string())
                })?;
                ZoneShape::Polygon(ring)
            }
            GeoJsonShape::Point {
                coordinates,
                radius,
            } => {
                if !radius.is_finite() || radius < 0.0 {
                    return Err(DomainError::InvalidZone(
                        id,
                        format!("invalid radius {}", radius),
                    ));
                }
                ZoneShape::Circle {
                    center: coordinates,
                    radius,
                }
            }
        };

        Ok(Zone {
            name: record.value_str().unwrap_or(&id).to_string(),
            id,
            shape,
            event_color: metadata.event,
            action_id: metadata.action_id.filter(|a| !a.is_empty()),
        })
    }
}
