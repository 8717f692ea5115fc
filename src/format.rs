//! Human-readable distance and travel-time labels.

/// Average speeds used for ETA labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TravelMode {
    /// 5 km/h.
    Walk,
    /// 30 km/h.
    Drive,
}

impl TravelMode {
    pub fn speed_kmh(&self) -> f64 {
        match self {
            TravelMode::Walk => 5.0,
            TravelMode::Drive => 30.0,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            TravelMode::Walk => "walk",
            TravelMode::Drive => "drive",
        }
    }
}

/// "850m" below a kilometre, "1.2km" above.
pub fn format_distance(meters: f64) -> String {
    if meters < 1000.0 {
        format!("{}m", meters.round() as i64)
    } else {
        format!("{:.1}km", meters / 1000.0)
    }
}

/// "< 1 min", "12 min walk" or "1h 5m drive".
pub fn format_eta(meters: f64, mode: TravelMode) -> String {
    let minutes = (meters / 1000.0 / mode.speed_kmh() * 60.0).round() as i64;
    if minutes < 1 {
        return "< 1 min".to_string();
    }
    if minutes < 60 {
        return format!("{} min {}", minutes, mode.label());
    }
    format!("{}h {}m {}", minutes / 60, minutes % 60, mode.label())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_distance() {
        assert_eq!(format_distance(0.0), "0m");
        assert_eq!(format_distance(849.6), "850m");
        assert_eq!(format_distance(1000.0), "1.0km");
        assert_eq!(format_distance(1249.0), "1.2km");
    }

    #[test]
    fn test_format_eta_walk() {
        assert_eq!(format_eta(20.0, TravelMode::Walk), "< 1 min");
        assert_eq!(format_eta(1000.0, TravelMode::Walk), "12 min walk");
    }

    #[test]
    fn test_format_eta_drive_hours() {
        // 32.5 km at 30 km/h is 65 minutes.
        assert_eq!(format_eta(32_500.0, TravelMode::Drive), "1h 5m drive");
        assert_eq!(format_eta(5_000.0, TravelMode::Drive), "10 min drive");
    }
}
