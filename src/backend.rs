//! HTTP adapter for the tourist-safety backend.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::CollaboratorError;
use crate::feed::PositionSample;
use crate::geo::Coordinate;
use crate::traits::{AssetSource, SosReceipt, SosSink, TelemetrySink, ZoneSource};
use crate::zones::{AssetKind, ResponseAsset, RiskLevel, RiskZone};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            timeout_secs: 10,
        }
    }
}

impl BackendConfig {
    /// Defaults overridden by `SAFENAV_BACKEND_URL` and
    /// `SAFENAV_BACKEND_TIMEOUT_SECS` when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("SAFENAV_BACKEND_URL") {
            config.base_url = url;
        }
        if let Ok(raw) = std::env::var("SAFENAV_BACKEND_TIMEOUT_SECS") {
            match raw.parse() {
                Ok(secs) => config.timeout_secs = secs,
                Err(_) => warn!(value = %raw, "ignoring unparsable backend timeout"),
            }
        }
        config
    }
}

#[derive(Debug, Clone)]
pub struct BackendClient {
    base_url: reqwest::Url,
    client: reqwest::blocking::Client,
}

impl BackendClient {
    pub fn new(config: BackendConfig) -> Result<Self, CollaboratorError> {
        let base_url = reqwest::Url::parse(&config.base_url)
            .map_err(|err| CollaboratorError::InvalidUrl(format!("{}: {}", config.base_url, err)))?;
        if base_url.cannot_be_a_base() {
            return Err(CollaboratorError::InvalidUrl(config.base_url));
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    fn endpoint(&self, segments: &[&str]) -> Result<reqwest::Url, CollaboratorError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| CollaboratorError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn get_json<T: for<'de> Deserialize<'de>>(&self, segments: &[&str]) -> Result<T, CollaboratorError> {
        let url = self.endpoint(segments)?;
        debug!(%url, "backend GET");
        let response = self.client.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(CollaboratorError::Rejected {
                status: status.as_u16(),
            });
        }
        Ok(response.json()?)
    }

    fn post_json<B: Serialize>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<reqwest::blocking::Response, CollaboratorError> {
        let url = self.endpoint(segments)?;
        debug!(%url, "backend POST");
        let response = self.client.post(url).json(body).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(CollaboratorError::Rejected {
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

impl ZoneSource for BackendClient {
    fn fetch_active_zones(&self) -> Result<Vec<RiskZone>, CollaboratorError> {
        let body: Vec<RiskZoneDto> = self.get_json(&["api", "risk-zones", "active"])?;
        Ok(convert_all(body, RiskZoneDto::into_zone))
    }
}

impl AssetSource for BackendClient {
    fn fetch_police_stations(&self) -> Result<Vec<ResponseAsset>, CollaboratorError> {
        let body: Vec<PoliceDepartmentDto> = self.get_json(&["api", "police-stations"])?;
        Ok(convert_all(body, PoliceDepartmentDto::into_asset))
    }

    fn fetch_hospitals(&self) -> Result<Vec<ResponseAsset>, CollaboratorError> {
        let body: Vec<HospitalDto> = self.get_json(&["api", "hospitals"])?;
        Ok(convert_all(body, HospitalDto::into_asset))
    }
}

impl TelemetrySink for BackendClient {
    fn post_position(&self, session_id: &str, sample: &PositionSample) -> Result<(), CollaboratorError> {
        let body = LocationBody {
            lat: sample.coordinate.lat(),
            lng: sample.coordinate.lng(),
            accuracy: sample.accuracy_m,
        };
        self.post_json(&["api", "action", "location", session_id], &body)?;
        Ok(())
    }
}

impl SosSink for BackendClient {
    fn post_sos(&self, session_id: &str, position: Coordinate) -> Result<SosReceipt, CollaboratorError> {
        let body = LocationBody {
            lat: position.lat(),
            lng: position.lng(),
            accuracy: None,
        };
        let response = self.post_json(&["api", "action", "sos", session_id], &body)?;
        let reply: SosReply = response.json()?;
        debug!(status = ?reply.status, "SOS acknowledged");
        Ok(SosReceipt {
            accepted: reply.status.is_some(),
        })
    }
}

/// Converts each record, skipping (and logging) the ones that fail validation.
fn convert_all<D, T, F>(records: Vec<D>, convert: F) -> Vec<T>
where
    F: Fn(D, usize) -> Option<T>,
{
    let total = records.len();
    let converted: Vec<T> = records
        .into_iter()
        .enumerate()
        .filter_map(|(idx, record)| convert(record, idx))
        .collect();
    if converted.len() < total {
        warn!(skipped = total - converted.len(), total, "skipped invalid backend records");
    }
    converted
}

fn coordinate(lat: Option<f64>, lng: Option<f64>) -> Option<Coordinate> {
    Coordinate::new(lat?, lng?).ok()
}

#[derive(Debug, Serialize)]
struct LocationBody {
    lat: f64,
    lng: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    accuracy: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct SosReply {
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RiskZoneDto {
    id: Option<String>,
    zone_id: Option<i64>,
    name: Option<String>,
    description: Option<String>,
    center_lat: Option<f64>,
    center_lng: Option<f64>,
    radius_meters: Option<f64>,
    risk_level: Option<String>,
    active: Option<bool>,
}

impl RiskZoneDto {
    fn into_zone(self, idx: usize) -> Option<RiskZone> {
        let center = coordinate(self.center_lat, self.center_lng)?;
        let id = self
            .id
            .or_else(|| self.zone_id.map(|zone_id| zone_id.to_string()))
            .unwrap_or_else(|| format!("zone-{}", idx));
        let name = self.name.unwrap_or_else(|| id.clone());
        let level = RiskLevel::parse(self.risk_level.as_deref());

        let zone = RiskZone::new(id, name, center, self.radius_meters?, level).ok()?;
        let zone = zone.with_active(self.active.unwrap_or(true));
        Some(match self.description {
            Some(description) => zone.with_description(description),
            None => zone,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PoliceDepartmentDto {
    id: Option<String>,
    name: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    contact_number: Option<String>,
    is_active: Option<bool>,
}

impl PoliceDepartmentDto {
    fn into_asset(self, idx: usize) -> Option<ResponseAsset> {
        let position = coordinate(self.latitude, self.longitude)?;
        let id = self.id.unwrap_or_else(|| format!("police-{}", idx));
        let name = self.name.unwrap_or_else(|| "Police Station".to_string());
        let asset = ResponseAsset::new(
            id,
            name,
            AssetKind::Police,
            position,
            self.contact_number.unwrap_or_default(),
        );
        Some(asset.with_available(self.is_active.unwrap_or(true)))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HospitalDto {
    id: Option<String>,
    hospital_id: Option<i64>,
    name: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    contact: Option<String>,
    emergency: Option<bool>,
    is_active: Option<bool>,
}

impl HospitalDto {
    fn into_asset(self, idx: usize) -> Option<ResponseAsset> {
        let position = coordinate(self.latitude, self.longitude)?;
        let id = self
            .id
            .or_else(|| self.hospital_id.map(|hospital_id| format!("hospital-{}", hospital_id)))
            .unwrap_or_else(|| format!("hospital-{}", idx));
        let name = self.name.unwrap_or_else(|| "Hospital".to_string());
        let asset = ResponseAsset::new(id, name, AssetKind::Hospital, position, self.contact.unwrap_or_default());
        Some(
            asset
                .with_available(self.is_active.unwrap_or(true))
                .with_emergency(self.emergency.unwrap_or(false)),
        )
    }
}
