use chrono::{DateTime, Duration, Utc};
use std::{
    collections::HashMap,
    fmt::Debug,
    sync::{Arc, Mutex},
};

use crate::model::{CacheStats, WeatherRecord};

/// Source of "now" for freshness checks, injectable for tests.
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// What a cache entry holds: one record for a by-name lookup, a list for a
/// batch lookup. The two kinds never share a key.
#[derive(Debug, Clone)]
pub enum CachedValue {
    Single(WeatherRecord),
    Batch(Vec<WeatherRecord>),
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: CachedValue,
    stored_at: DateTime<Utc>,
}

/// Time-windowed in-memory cache keyed by request parameters.
///
/// At most one entry exists per key; a write overwrites. Entries older than
/// the freshness window are treated as absent on read and are only removed
/// by being overwritten or by [`WeatherCache::clear`]. The lock is held for
/// map access only, never across an HTTP request, so two concurrent misses
/// for the same key will both fetch and both write (last write wins).
#[derive(Debug)]
pub struct WeatherCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    window: Duration,
    clock: Arc<dyn Clock>,
}

impl WeatherCache {
    /// Default freshness window, matching the dashboard refresh interval.
    pub const DEFAULT_WINDOW_SECS: u64 = 5 * 60;

    pub fn new(window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            window,
            clock,
        }
    }

    /// Return the cached value for `key` if it is still fresh.
    pub fn get(&self, key: &str) -> Option<CachedValue> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let entry = entries.get(key)?;

        if self.clock.now() - entry.stored_at < self.window {
            Some(entry.value.clone())
        } else {
            None
        }
    }

    /// Store `value` under `key`, stamped with the current time. Replaces any
    /// previous entry for the key.
    pub fn put(&self, key: &str, value: CachedValue) {
        let entry = CacheEntry { value, stored_at: self.clock.now() };
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), entry);
    }

    /// Drop every entry, fresh or stale.
    pub fn clear(&self) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.clear();
    }

    /// Entry count and keys, including entries that have aged past the
    /// window but have not been overwritten yet.
    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        CacheStats {
            size: entries.len(),
            keys: entries.keys().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    /// Clock whose "now" is advanced by hand.
    #[derive(Debug)]
    struct ManualClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        fn starting_at(now: DateTime<Utc>) -> Self {
            Self { now: Mutex::new(now) }
        }

        fn advance(&self, by: Duration) {
            let mut now = self.now.lock().unwrap();
            *now += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }
    }

    fn record(city: &str) -> WeatherRecord {
        WeatherRecord {
            city_id: 1248991,
            city: city.to_string(),
            country: "LK".to_string(),
            temperature_c: 28.4,
            temp_min_c: 27.0,
            temp_max_c: 30.1,
            humidity_pct: 74,
            pressure_hpa: 1012,
            visibility_m: 10000,
            wind_speed_mps: 4.6,
            wind_deg: 240.0,
            sunrise: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            sunset: Utc.timestamp_opt(1_700_043_200, 0).unwrap(),
            condition: "scattered clouds".to_string(),
        }
    }

    fn cache_with_manual_clock(window_secs: i64) -> (WeatherCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_at(
            Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
        ));
        let cache = WeatherCache::new(Duration::seconds(window_secs), clock.clone());
        (cache, clock)
    }

    #[test]
    fn fresh_entry_is_returned() {
        let (cache, clock) = cache_with_manual_clock(300);
        cache.put("city_Colombo", CachedValue::Single(record("Colombo")));

        clock.advance(Duration::seconds(299));

        match cache.get("city_Colombo") {
            Some(CachedValue::Single(rec)) => assert_eq!(rec, record("Colombo")),
            other => panic!("expected fresh single entry, got {other:?}"),
        }
    }

    #[test]
    fn entry_at_window_age_is_treated_as_absent() {
        let (cache, clock) = cache_with_manual_clock(300);
        cache.put("city_Colombo", CachedValue::Single(record("Colombo")));

        clock.advance(Duration::seconds(300));

        assert!(cache.get("city_Colombo").is_none());
        // Stale entries are not removed, only ignored.
        assert_eq!(cache.stats().size, 1);
    }

    #[test]
    fn put_overwrites_value_and_timestamp() {
        let (cache, clock) = cache_with_manual_clock(300);
        cache.put("city_Colombo", CachedValue::Single(record("Colombo")));

        clock.advance(Duration::seconds(400));
        assert!(cache.get("city_Colombo").is_none());

        let mut warmer = record("Colombo");
        warmer.temperature_c = 31.0;
        cache.put("city_Colombo", CachedValue::Single(warmer.clone()));

        assert_eq!(cache.stats().size, 1, "overwrite must not append");
        match cache.get("city_Colombo") {
            Some(CachedValue::Single(rec)) => assert_eq!(rec.temperature_c, 31.0),
            other => panic!("expected refreshed entry, got {other:?}"),
        }

        // Fresh again from the new timestamp.
        clock.advance(Duration::seconds(299));
        assert!(cache.get("city_Colombo").is_some());
    }

    #[test]
    fn clear_empties_everything() {
        let (cache, _clock) = cache_with_manual_clock(300);
        cache.put("city_Colombo", CachedValue::Single(record("Colombo")));
        cache.put(
            "1248991,1850147",
            CachedValue::Batch(vec![record("Colombo"), record("Tokyo")]),
        );
        assert_eq!(cache.stats().size, 2);

        cache.clear();

        let stats = cache.stats();
        assert_eq!(stats.size, 0);
        assert!(stats.keys.is_empty());
        assert!(cache.get("city_Colombo").is_none());
    }

    #[test]
    fn stats_reports_keys() {
        let (cache, _clock) = cache_with_manual_clock(300);
        cache.put("city_Colombo", CachedValue::Single(record("Colombo")));
        cache.put("city_Tokyo", CachedValue::Single(record("Tokyo")));

        let mut keys = cache.stats().keys;
        keys.sort();
        assert_eq!(keys, vec!["city_Colombo", "city_Tokyo"]);
    }

    #[test]
    fn missing_key_is_a_miss() {
        let (cache, _clock) = cache_with_manual_clock(300);
        assert!(cache.get("city_Nowhere").is_none());
    }
}
