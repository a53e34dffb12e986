use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current weather for one city, as returned by every lookup.
///
/// Values are stored exactly as the provider reported them (metric units);
/// rounding for display is the caller's concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    pub city_id: i64,
    pub city: String,
    pub country: String,
    pub temperature_c: f64,
    pub temp_min_c: f64,
    pub temp_max_c: f64,
    pub humidity_pct: u8,
    pub pressure_hpa: u32,
    pub visibility_m: u32,
    pub wind_speed_mps: f64,
    pub wind_deg: f64,
    pub sunrise: DateTime<Utc>,
    pub sunset: DateTime<Utc>,
    pub condition: String,
}

/// Result of the composed dashboard lookup.
///
/// When the batch path fails and the client falls back to per-city requests,
/// cities that could not be fetched are listed in `failed_cities` instead of
/// being silently dropped.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardWeather {
    pub records: Vec<WeatherRecord>,
    pub failed_cities: Vec<String>,
}

impl DashboardWeather {
    pub fn is_degraded(&self) -> bool {
        !self.failed_cities.is_empty()
    }
}

/// Snapshot of the cache contents, for introspection only.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub keys: Vec<String>,
}

/// The fixed set of dashboard cities: OpenWeather numeric id and the name
/// used for the per-city fallback lookup.
pub const DASHBOARD_CITIES: &[(i64, &str)] = &[
    (1248991, "Colombo"),
    (1850147, "Tokyo"),
    (2644210, "Liverpool"),
    (2988507, "Paris"),
    (2147714, "Sydney"),
    (4930956, "Boston"),
    (1796236, "Shanghai"),
    (3143244, "Oslo"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dashboard_city_ids_and_names_line_up() {
        assert_eq!(DASHBOARD_CITIES.len(), 8);

        let (id, name) = DASHBOARD_CITIES[0];
        assert_eq!(id, 1248991);
        assert_eq!(name, "Colombo");
    }

    #[test]
    fn degraded_flag_tracks_failed_cities() {
        let full = DashboardWeather { records: vec![], failed_cities: vec![] };
        assert!(!full.is_degraded());

        let partial = DashboardWeather {
            records: vec![],
            failed_cities: vec!["Oslo".to_string()],
        };
        assert!(partial.is_degraded());
    }
}
