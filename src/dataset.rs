//! Offline zones and police stations bundled into the binary.
//!
//! Used whenever the backend hands back an empty list.

use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::warn;

use crate::geo::Coordinate;
use crate::zones::{AssetKind, ResponseAsset, RiskLevel, RiskZone};

const ZONES_JSON: &str = include_str!("../data/offline_zones.json");
const STATIONS_JSON: &str = include_str!("../data/police_stations.json");

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ZoneFile {
    restricted_zones: Vec<ZoneRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ZoneRecord {
    id: Option<String>,
    name: String,
    description: Option<String>,
    position: [f64; 2],
    radius: f64,
    risk_level: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StationFile {
    assam_police_stations: BTreeMap<String, Vec<StationRecord>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StationRecord {
    id: Option<String>,
    position: [f64; 2],
    name: String,
    contact: String,
    available: Option<bool>,
    response_time: Option<String>,
}

/// The bundled risk zones. Malformed entries are skipped.
pub fn bundled_zones() -> Vec<RiskZone> {
    match parse_zones(ZONES_JSON) {
        Ok(zones) => zones,
        Err(err) => {
            warn!(error = %err, "bundled zone dataset is unreadable");
            Vec::new()
        }
    }
}

/// The bundled police stations. Malformed entries are skipped.
pub fn bundled_police_stations() -> Vec<ResponseAsset> {
    match parse_stations(STATIONS_JSON) {
        Ok(stations) => stations,
        Err(err) => {
            warn!(error = %err, "bundled station dataset is unreadable");
            Vec::new()
        }
    }
}

fn parse_zones(json: &str) -> Result<Vec<RiskZone>, serde_json::Error> {
    let file: ZoneFile = serde_json::from_str(json)?;

    let zones = file
        .restricted_zones
        .into_iter()
        .enumerate()
        .filter_map(|(idx, record)| {
            let id = record.id.unwrap_or_else(|| format!("fallback-zone-{}", idx));
            let zone = Coordinate::new(record.position[0], record.position[1]).and_then(|center| {
                RiskZone::new(
                    id.clone(),
                    record.name,
                    center,
                    record.radius,
                    RiskLevel::parse(record.risk_level.as_deref()),
                )
            });
            match zone {
                Ok(zone) => Some(match record.description {
                    Some(description) => zone.with_description(description),
                    None => zone,
                }),
                Err(err) => {
                    warn!(%id, error = %err, "skipping bundled zone");
                    None
                }
            }
        })
        .collect();

    Ok(zones)
}

fn parse_stations(json: &str) -> Result<Vec<ResponseAsset>, serde_json::Error> {
    let file: StationFile = serde_json::from_str(json)?;

    let mut stations = Vec::new();
    for (district, records) in file.assam_police_stations {
        for (idx, record) in records.into_iter().enumerate() {
            let id = record.id.unwrap_or_else(|| format!("{}-{}", district, idx));
            let position = match Coordinate::new(record.position[0], record.position[1]) {
                Ok(position) => position,
                Err(err) => {
                    warn!(%id, error = %err, "skipping bundled station");
                    continue;
                }
            };

            let mut station = ResponseAsset::new(id, record.name, AssetKind::Police, position, record.contact)
                .with_available(record.available.unwrap_or(true));
            if let Some(response_time) = record.response_time {
                station = station.with_response_time(response_time);
            }
            stations.push(station);
        }
    }

    Ok(stations)
}
