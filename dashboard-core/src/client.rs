use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    cache::{CachedValue, Clock, SystemClock, WeatherCache},
    config::Config,
    error::{Error, Result},
    model::{CacheStats, DashboardWeather, WeatherRecord, DASHBOARD_CITIES},
};

/// Weather lookups against OpenWeather with a shared time-windowed cache.
///
/// Cheap to clone; clones share the same cache and HTTP connection pool.
/// In-flight requests for the same key are not deduplicated: two concurrent
/// misses both fetch and both write the cache, last write wins.
#[derive(Debug, Clone)]
pub struct WeatherClient {
    http: Client,
    api_key: String,
    base_url: String,
    cache: Arc<WeatherCache>,
}

impl WeatherClient {
    /// Build a client from config. Fails with [`Error::MissingApiKey`] when
    /// no credential is configured, before any request is attempted.
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Same as [`WeatherClient::new`] but with an injected clock for the
    /// cache freshness checks.
    pub fn with_clock(config: &Config, clock: Arc<dyn Clock>) -> Result<Self> {
        let Some(api_key) = config.api_key.clone().filter(|k| !k.is_empty()) else {
            tracing::error!("OpenWeather API key is missing, weather lookups are unavailable");
            return Err(Error::MissingApiKey);
        };

        let window = Duration::seconds(config.cache_ttl_secs as i64);

        Ok(Self {
            http: Client::new(),
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            cache: Arc::new(WeatherCache::new(window, clock)),
        })
    }

    /// Current weather for a single city by name.
    ///
    /// Served from the cache when a fresh entry exists; otherwise one request
    /// is issued and its result cached. Provider failures are returned
    /// unchanged as [`Error::Upstream`], never retried.
    pub async fn weather_by_city(&self, city: &str) -> Result<WeatherRecord> {
        if city.trim().is_empty() {
            return Err(Error::InvalidRequest("city name must not be empty".to_string()));
        }

        let key = format!("city_{city}");
        if let Some(CachedValue::Single(record)) = self.cache.get(&key) {
            tracing::debug!(%city, "serving weather from cache");
            return Ok(record);
        }

        let record = self.fetch_single(city).await?;
        self.cache.put(&key, CachedValue::Single(record.clone()));

        Ok(record)
    }

    /// Current weather for several cities by numeric id, in one batch call.
    ///
    /// All-or-nothing: a batch failure fails the whole call. Records come
    /// back in the provider's response order. The cache key is the joined id
    /// list in caller order, so callers should pass a consistent ordering.
    pub async fn weather_for_cities(&self, city_ids: &[i64]) -> Result<Vec<WeatherRecord>> {
        if city_ids.is_empty() {
            return Err(Error::InvalidRequest("city id list must not be empty".to_string()));
        }

        let key = city_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");

        if let Some(CachedValue::Batch(records)) = self.cache.get(&key) {
            tracing::debug!(ids = %key, "serving batch weather from cache");
            return Ok(records);
        }

        let records = self.fetch_batch(&key).await?;
        self.cache.put(&key, CachedValue::Batch(records.clone()));

        Ok(records)
    }

    /// Current weather for the fixed dashboard city set.
    ///
    /// Tries the batch path first. If it fails, falls back to one per-city
    /// request per dashboard city, issued concurrently; cities that still
    /// fail are listed in `failed_cities` rather than failing the call.
    /// Only when every city is unavailable does this return an error.
    pub async fn all_cities_weather(&self) -> Result<DashboardWeather> {
        let ids: Vec<i64> = DASHBOARD_CITIES.iter().map(|(id, _)| *id).collect();

        match self.weather_for_cities(&ids).await {
            Ok(records) => Ok(DashboardWeather { records, failed_cities: Vec::new() }),
            Err(err) => {
                tracing::warn!(error = %err, "batch fetch failed, falling back to per-city requests");
                self.fallback_per_city().await
            }
        }
    }

    async fn fallback_per_city(&self) -> Result<DashboardWeather> {
        let mut handles = Vec::with_capacity(DASHBOARD_CITIES.len());
        for (_, name) in DASHBOARD_CITIES {
            let client = self.clone();
            let city = (*name).to_string();
            handles.push((
                (*name).to_string(),
                tokio::spawn(async move { client.weather_by_city(&city).await }),
            ));
        }

        let mut records = Vec::new();
        let mut failed_cities = Vec::new();

        for (city, handle) in handles {
            match handle.await {
                Ok(Ok(record)) => records.push(record),
                Ok(Err(err)) => {
                    tracing::warn!(%city, error = %err, "dropping city from dashboard");
                    failed_cities.push(city);
                }
                Err(err) => {
                    tracing::warn!(%city, error = %err, "city lookup task failed");
                    failed_cities.push(city);
                }
            }
        }

        if records.is_empty() {
            return Err(Error::Upstream {
                status: None,
                message: "weather is unavailable for every dashboard city".to_string(),
            });
        }

        Ok(DashboardWeather { records, failed_cities })
    }

    /// Unconditionally empty the cache.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Cache size and keys. Introspection only, no side effects.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    async fn fetch_single(&self, city: &str) -> Result<WeatherRecord> {
        let url = format!("{}/weather", self.base_url);

        let res = self
            .http
            .get(&url)
            .query(&[("q", city), ("units", "metric"), ("appid", self.api_key.as_str())])
            .send()
            .await
            .map_err(Error::transport)?;

        let body = read_success_body(res).await?;
        let parsed: OwCityWeather = serde_json::from_str(&body)?;

        Ok(parsed.into_record())
    }

    async fn fetch_batch(&self, joined_ids: &str) -> Result<Vec<WeatherRecord>> {
        let url = format!("{}/group", self.base_url);

        let res = self
            .http
            .get(&url)
            .query(&[("id", joined_ids), ("units", "metric"), ("appid", self.api_key.as_str())])
            .send()
            .await
            .map_err(Error::transport)?;

        let body = read_success_body(res).await?;
        let parsed: OwGroupResponse = serde_json::from_str(&body)?;

        Ok(parsed.list.into_iter().map(OwCityWeather::into_record).collect())
    }
}

/// Read the body, turning a non-success status into [`Error::Upstream`] with
/// the provider's message when one can be extracted.
async fn read_success_body(res: reqwest::Response) -> Result<String> {
    let status = res.status();
    let body = res.text().await.map_err(Error::transport)?;

    if !status.is_success() {
        let message = serde_json::from_str::<OwErrorBody>(&body)
            .ok()
            .and_then(|e| e.message)
            .unwrap_or_else(|| truncate_body(&body));

        return Err(Error::Upstream { status: Some(status.as_u16()), message });
    }

    Ok(body)
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    temp_min: f64,
    temp_max: f64,
    pressure: u32,
    humidity: u8,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    description: String,
}

#[derive(Debug, Default, Deserialize)]
struct OwWind {
    #[serde(default)]
    speed: f64,
    #[serde(default)]
    deg: f64,
}

#[derive(Debug, Deserialize)]
struct OwSys {
    country: Option<String>,
    sunrise: i64,
    sunset: i64,
}

/// One city object, shared by the `/weather` response and the entries of the
/// `/group` response list.
#[derive(Debug, Deserialize)]
struct OwCityWeather {
    id: i64,
    name: String,
    main: OwMain,
    weather: Vec<OwWeather>,
    // The provider omits `wind` for some stations; default to calm.
    #[serde(default)]
    wind: OwWind,
    #[serde(default)]
    visibility: u32,
    sys: OwSys,
}

#[derive(Debug, Deserialize)]
struct OwGroupResponse {
    list: Vec<OwCityWeather>,
}

#[derive(Debug, Deserialize)]
struct OwErrorBody {
    message: Option<String>,
}

impl OwCityWeather {
    fn into_record(self) -> WeatherRecord {
        let condition = self
            .weather
            .first()
            .map(|w| w.description.clone())
            .unwrap_or_else(|| "Unknown".to_string());

        WeatherRecord {
            city_id: self.id,
            city: self.name,
            country: self.sys.country.unwrap_or_default(),
            temperature_c: self.main.temp,
            temp_min_c: self.main.temp_min,
            temp_max_c: self.main.temp_max,
            humidity_pct: self.main.humidity,
            pressure_hpa: self.main.pressure,
            visibility_m: self.visibility,
            wind_speed_mps: self.wind.speed,
            wind_deg: self.wind.deg,
            sunrise: unix_to_utc(self.sys.sunrise),
            sunset: unix_to_utc(self.sys.sunset),
            condition,
        }
    }
}

fn unix_to_utc(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_default()
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() <= MAX {
        return body.to_string();
    }

    // Cut at a char boundary; provider error pages are not always ASCII.
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }

    format!("{}...", &body[..end])
}
