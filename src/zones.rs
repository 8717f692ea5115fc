//! Risk geofences, response assets and the snapshot index that serves them.
//!
//! The index holds one immutable [`ZoneSnapshot`] behind an `Arc`. Refreshes
//! build a new snapshot and swap the pointer; readers clone the `Arc` once and
//! keep a consistent view for as long as they need it.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::dataset;
use crate::error::GeoError;
use crate::geo::{contains_point, distance_meters, Coordinate};
use crate::traits::{AssetSource, ZoneSource};

/// Severity of a risk zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl RiskLevel {
    /// Case-insensitive parse; missing or unrecognised levels are `Medium`.
    pub fn parse(level: Option<&str>) -> Self {
        match level.map(|l| l.trim().to_ascii_lowercase()).as_deref() {
            Some("high") => RiskLevel::High,
            Some("low") => RiskLevel::Low,
            _ => RiskLevel::Medium,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
        };
        f.write_str(label)
    }
}

/// A circular risk geofence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskZone {
    id: String,
    name: String,
    description: Option<String>,
    center: Coordinate,
    radius_m: f64,
    level: RiskLevel,
    active: bool,
}

impl RiskZone {
    /// Creates an active zone. The radius must be positive and finite.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        center: Coordinate,
        radius_m: f64,
        level: RiskLevel,
    ) -> Result<Self, GeoError> {
        if !radius_m.is_finite() || radius_m <= 0.0 {
            return Err(GeoError::InvalidRadius(radius_m));
        }
        Ok(Self {
            id: id.into(),
            name: name.into(),
            description: None,
            center,
            radius_m,
            level,
            active: true,
        })
    }

    /// Attaches free text shown alongside the zone.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Marks the zone active or retired.
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Free text, if the authority supplied any.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Center of the geofence circle.
    pub fn center(&self) -> Coordinate {
        self.center
    }

    /// Radius in meters, always positive.
    pub fn radius_m(&self) -> f64 {
        self.radius_m
    }

    /// Severity used for scoring and filtering.
    pub fn level(&self) -> RiskLevel {
        self.level
    }

    /// Inactive zones never count toward scoring.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// True when `point` is inside or on the circle.
    pub fn contains(&self, point: Coordinate) -> bool {
        contains_point(self.center, self.radius_m, point)
    }
}

/// What sort of help a [`ResponseAsset`] offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetKind {
    Police,
    Hospital,
}

/// A police station or hospital.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseAsset {
    id: String,
    name: String,
    kind: AssetKind,
    position: Coordinate,
    contact: String,
    available: bool,
    response_time: Option<String>,
    emergency: bool,
}

impl ResponseAsset {
    /// Creates an available asset with no fixed response time.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        kind: AssetKind,
        position: Coordinate,
        contact: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            position,
            contact: contact.into(),
            available: true,
            response_time: None,
            emergency: false,
        }
    }

    /// Unavailable assets are listed but earn no scoring bonus.
    pub fn with_available(mut self, available: bool) -> Self {
        self.available = available;
        self
    }

    /// A fixed ETA string published by the asset.
    pub fn with_response_time(mut self, response_time: impl Into<String>) -> Self {
        self.response_time = Some(response_time.into());
        self
    }

    /// Flags a hospital with an emergency department.
    pub fn with_emergency(mut self, emergency: bool) -> Self {
        self.emergency = emergency;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Police station or hospital.
    pub fn kind(&self) -> AssetKind {
        self.kind
    }

    /// Where the asset is.
    pub fn position(&self) -> Coordinate {
        self.position
    }

    /// Phone number, possibly empty.
    pub fn contact(&self) -> &str {
        &self.contact
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    /// The published response time, if any.
    pub fn response_time(&self) -> Option<&str> {
        self.response_time.as_deref()
    }

    /// Hospitals only: whether the facility runs an emergency department.
    pub fn has_emergency(&self) -> bool {
        self.emergency
    }
}

/// Display filter on zone severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskFilter {
    #[default]
    All,
    High,
    Medium,
    Low,
}

impl RiskFilter {
    /// Whether zones at `level` pass this filter.
    pub fn matches(&self, level: RiskLevel) -> bool {
        match self {
            RiskFilter::All => true,
            RiskFilter::High => level == RiskLevel::High,
            RiskFilter::Medium => level == RiskLevel::Medium,
            RiskFilter::Low => level == RiskLevel::Low,
        }
    }
}

/// Which map layers the user has switched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerVisibility {
    pub zones: bool,
    pub police: bool,
    pub hospitals: bool,
    pub routes: bool,
}

impl Default for LayerVisibility {
    fn default() -> Self {
        Self {
            zones: true,
            police: true,
            hospitals: true,
            routes: true,
        }
    }
}

impl LayerVisibility {
    /// Whether the layer for `kind` is switched on.
    pub fn shows(&self, kind: AssetKind) -> bool {
        match kind {
            AssetKind::Police => self.police,
            AssetKind::Hospital => self.hospitals,
        }
    }
}

/// Visibility settings applied to containment and display queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ZoneView {
    pub risk_filter: RiskFilter,
    pub layers: LayerVisibility,
    pub include_inactive: bool,
}

impl ZoneView {
    fn admits(&self, zone: &RiskZone) -> bool {
        self.layers.zones
            && (self.include_inactive || zone.is_active())
            && self.risk_filter.matches(zone.level())
    }
}

/// Zones matching `risk_filter`, or nothing when the layer is hidden.
pub fn filtered_zones(zones: &[RiskZone], risk_filter: RiskFilter, show_layer: bool) -> Vec<RiskZone> {
    if !show_layer {
        return Vec::new();
    }
    zones
        .iter()
        .filter(|zone| risk_filter.matches(zone.level()))
        .cloned()
        .collect()
}

/// The closest asset to `point` with its distance, or `None` for no assets.
pub fn nearest_asset<'a, I>(point: Coordinate, assets: I) -> Option<(&'a ResponseAsset, f64)>
where
    I: IntoIterator<Item = &'a ResponseAsset>,
{
    let mut best: Option<(&ResponseAsset, f64)> = None;
    for asset in assets {
        let distance = distance_meters(point, asset.position());
        match best {
            Some((_, min)) if distance >= min => {}
            _ => best = Some((asset, distance)),
        }
    }
    best
}

/// An immutable set of zones and assets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ZoneSnapshot {
    zones: Vec<RiskZone>,
    assets: Vec<ResponseAsset>,
}

impl ZoneSnapshot {
    /// A snapshot over exactly these zones and assets.
    pub fn new(zones: Vec<RiskZone>, assets: Vec<ResponseAsset>) -> Self {
        Self { zones, assets }
    }

    /// Every zone, active or not.
    pub fn zones(&self) -> &[RiskZone] {
        &self.zones
    }

    /// Police stations and hospitals together.
    pub fn assets(&self) -> &[ResponseAsset] {
        &self.assets
    }

    /// Zones that count toward scoring.
    pub fn active_zones(&self) -> impl Iterator<Item = &RiskZone> {
        self.zones.iter().filter(|zone| zone.is_active())
    }

    /// Assets of one kind, in snapshot order.
    pub fn assets_of(&self, kind: AssetKind) -> impl Iterator<Item = &ResponseAsset> {
        self.assets.iter().filter(move |asset| asset.kind() == kind)
    }

    /// Every zone admitted by `view` whose circle contains `point`.
    pub fn zones_containing(&self, point: Coordinate, view: &ZoneView) -> Vec<&RiskZone> {
        self.zones
            .iter()
            .filter(|zone| view.admits(zone) && zone.contains(point))
            .collect()
    }
}

/// How one collection resolved during a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceOutcome {
    /// The collaborator returned this many records.
    Fresh(usize),
    /// The bundled dataset is used: the collaborator returned nothing, or
    /// failed before anything was ever loaded.
    Fallback,
    /// The collaborator failed; the previous data is kept.
    Retained,
}

/// Per-collection result of [`ZoneIndex::refresh`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshOutcome {
    pub zones: SourceOutcome,
    pub police: SourceOutcome,
    pub hospitals: SourceOutcome,
}

impl RefreshOutcome {
    fn changed_nothing(&self) -> bool {
        [self.zones, self.police, self.hospitals]
            .iter()
            .all(|outcome| *outcome == SourceOutcome::Retained)
    }
}

/// The nearest visible asset of a kind, measured from a position.
#[derive(Debug, Clone, PartialEq)]
pub struct NearestAsset {
    pub asset: ResponseAsset,
    pub distance_m: f64,
}

#[derive(Debug, Default)]
struct IndexInner {
    snapshot: RwLock<Arc<ZoneSnapshot>>,
    view: RwLock<ZoneView>,
    /// Held across read-modify-swap so concurrent writers never lose updates.
    swap: Mutex<()>,
}

/// Shared handle to the current zone/asset snapshot.
///
/// Cloning the handle shares the same snapshot.
#[derive(Debug, Clone, Default)]
pub struct ZoneIndex {
    inner: Arc<IndexInner>,
}

impl ZoneIndex {
    /// An index serving `snapshot` with the default view.
    pub fn new(snapshot: ZoneSnapshot) -> Self {
        Self {
            inner: Arc::new(IndexInner {
                snapshot: RwLock::new(Arc::new(snapshot)),
                view: RwLock::new(ZoneView::default()),
                swap: Mutex::new(()),
            }),
        }
    }

    /// An index seeded with the bundled offline dataset.
    pub fn with_bundled() -> Self {
        Self::new(ZoneSnapshot::new(dataset::bundled_zones(), dataset::bundled_police_stations()))
    }

    /// The current snapshot; stays consistent while held.
    pub fn snapshot(&self) -> Arc<ZoneSnapshot> {
        Arc::clone(&self.inner.snapshot.read())
    }

    /// Swaps in `snapshot` wholesale.
    pub fn replace(&self, snapshot: ZoneSnapshot) {
        let _swap = self.inner.swap.lock();
        self.store(snapshot);
    }

    fn store(&self, snapshot: ZoneSnapshot) {
        *self.inner.snapshot.write() = Arc::new(snapshot);
    }

    /// Current visibility settings.
    pub fn view(&self) -> ZoneView {
        *self.inner.view.read()
    }

    /// Replaces all visibility settings at once.
    pub fn set_view(&self, view: ZoneView) {
        *self.inner.view.write() = view;
    }

    /// Changes only the severity filter.
    pub fn set_risk_filter(&self, risk_filter: RiskFilter) {
        self.inner.view.write().risk_filter = risk_filter;
    }

    /// Changes only the layer toggles.
    pub fn set_layers(&self, layers: LayerVisibility) {
        self.inner.view.write().layers = layers;
    }

    /// Visible zones containing `point`.
    pub fn zones_containing(&self, point: Coordinate) -> Vec<RiskZone> {
        let view = self.view();
        self.snapshot()
            .zones_containing(point, &view)
            .into_iter()
            .cloned()
            .collect()
    }

    /// True when any visible zone contains `point`.
    pub fn is_in_any_zone(&self, point: Coordinate) -> bool {
        !self.zones_containing(point).is_empty()
    }

    /// Zones to draw under the current view.
    pub fn visible_zones(&self) -> Vec<RiskZone> {
        let view = self.view();
        self.snapshot()
            .zones()
            .iter()
            .filter(|zone| view.admits(zone))
            .cloned()
            .collect()
    }

    /// Nearest asset of `kind`, or `None` when its layer is hidden or none exist.
    pub fn nearest(&self, point: Coordinate, kind: AssetKind) -> Option<NearestAsset> {
        if !self.view().layers.shows(kind) {
            return None;
        }
        let snapshot = self.snapshot();
        nearest_asset(point, snapshot.assets_of(kind)).map(|(asset, distance_m)| NearestAsset {
            asset: asset.clone(),
            distance_m,
        })
    }

    /// Pulls fresh zones, police stations and hospitals and swaps in a new
    /// snapshot.
    ///
    /// Each collection resolves on its own. Empty zones or police fall back
    /// to the bundled dataset. A failed fetch keeps what the index already
    /// had, or falls back when it never had any. There is no bundled hospital
    /// data, so hospitals are only ever fresh or retained.
    ///
    /// Fetching happens before the swap lock is taken; the snapshot is then
    /// rebuilt from whatever is current at swap time.
    pub fn refresh<Z, A>(&self, zone_source: &Z, asset_source: &A) -> RefreshOutcome
    where
        Z: ZoneSource + ?Sized,
        A: AssetSource + ?Sized,
    {
        let fetched_zones = zone_source.fetch_active_zones();
        let fetched_police = asset_source.fetch_police_stations();
        let fetched_hospitals = asset_source.fetch_hospitals();

        let _swap = self.inner.swap.lock();
        let current = self.snapshot();

        let (zones, zones_outcome) = match fetched_zones {
            Ok(zones) if !zones.is_empty() => {
                let count = zones.len();
                (zones, SourceOutcome::Fresh(count))
            }
            Ok(_) => (dataset::bundled_zones(), SourceOutcome::Fallback),
            Err(err) if current.zones().is_empty() => {
                warn!(error = %err, "risk zone refresh failed with nothing loaded, using bundled zones");
                (dataset::bundled_zones(), SourceOutcome::Fallback)
            }
            Err(err) => {
                warn!(error = %err, "risk zone refresh failed, keeping previous zones");
                (current.zones().to_vec(), SourceOutcome::Retained)
            }
        };

        let previous_police: Vec<ResponseAsset> = current.assets_of(AssetKind::Police).cloned().collect();
        let (mut assets, police_outcome) = match fetched_police {
            Ok(police) if !police.is_empty() => {
                let count = police.len();
                (police, SourceOutcome::Fresh(count))
            }
            Ok(_) => (dataset::bundled_police_stations(), SourceOutcome::Fallback),
            Err(err) if previous_police.is_empty() => {
                warn!(error = %err, "police refresh failed with nothing loaded, using bundled stations");
                (dataset::bundled_police_stations(), SourceOutcome::Fallback)
            }
            Err(err) => {
                warn!(error = %err, "police refresh failed, keeping previous stations");
                (previous_police, SourceOutcome::Retained)
            }
        };

        let hospitals_outcome = match fetched_hospitals {
            Ok(hospitals) => {
                let count = hospitals.len();
                assets.extend(hospitals);
                SourceOutcome::Fresh(count)
            }
            Err(err) => {
                warn!(error = %err, "hospital refresh failed, keeping previous hospitals");
                assets.extend(current.assets_of(AssetKind::Hospital).cloned());
                SourceOutcome::Retained
            }
        };

        let outcome = RefreshOutcome {
            zones: zones_outcome,
            police: police_outcome,
            hospitals: hospitals_outcome,
        };

        if outcome.changed_nothing() {
            debug!("nothing refreshed, snapshot unchanged");
        } else {
            info!(
                zones = zones.len(),
                assets = assets.len(),
                ?zones_outcome,
                ?police_outcome,
                ?hospitals_outcome,
                "zone snapshot refreshed"
            );
            self.store(ZoneSnapshot::new(zones, assets));
        }

        outcome
    }
}

/// A change in which zones contain the user.
#[derive(Debug, Clone, PartialEq)]
pub enum ZoneTransition {
    Entered { id: String, name: String, level: RiskLevel },
    Left { id: String, name: String },
}

/// Remembers which zones the user was inside and reports changes.
#[derive(Debug, Default)]
pub struct ZoneTracker {
    inside: Vec<(String, String)>,
}

impl ZoneTracker {
    /// A tracker that has seen no position yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Diffs `containing` against the previous call.
    pub fn update(&mut self, containing: &[RiskZone]) -> Vec<ZoneTransition> {
        let mut transitions = Vec::new();

        for zone in containing {
            if !self.inside.iter().any(|(id, _)| id == zone.id()) {
                transitions.push(ZoneTransition::Entered {
                    id: zone.id().to_string(),
                    name: zone.name().to_string(),
                    level: zone.level(),
                });
            }
        }

        for (id, name) in &self.inside {
            if !containing.iter().any(|zone| zone.id() == id) {
                transitions.push(ZoneTransition::Left {
                    id: id.clone(),
                    name: name.clone(),
                });
            }
        }

        self.inside = containing
            .iter()
            .map(|zone| (zone.id().to_string(), zone.name().to_string()))
            .collect();

        transitions
    }

    /// Forgets the previous position without emitting transitions.
    pub fn reset(&mut self) {
        self.inside.clear();
    }

    /// Whether the last update was inside any zone.
    pub fn is_inside_any(&self) -> bool {
        !self.inside.is_empty()
    }
}
