use anyhow::Context;
use clap::{Parser, Subcommand};
use dashboard_core::{Config, WeatherClient, WeatherRecord};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "dashboard", version, about = "Weather dashboard CLI")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the OpenWeather API key in the config file.
    Configure,

    /// Show current weather for one city.
    City {
        /// City name, e.g. "Colombo".
        name: String,
    },

    /// Show current weather for the full dashboard city set.
    All,

    /// Show cache size and keys.
    ///
    /// The cache is in-memory and lives only for one invocation, so this
    /// starts empty every run; it is mainly useful from a shell that keeps
    /// the process alive, or as a smoke check that configuration loads.
    CacheStats,

    /// Empty the response cache of the current invocation.
    CacheClear,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::City { name } => {
                let client = client_from_config()?;
                let record = client.weather_by_city(&name).await?;
                print_record(&record);
                Ok(())
            }
            Command::All => {
                let client = client_from_config()?;
                let dashboard = client.all_cities_weather().await?;

                for record in &dashboard.records {
                    print_record(record);
                    println!();
                }

                if dashboard.is_degraded() {
                    println!(
                        "Note: weather is currently unavailable for: {}",
                        dashboard.failed_cities.join(", ")
                    );
                }

                Ok(())
            }
            Command::CacheStats => {
                let client = client_from_config()?;
                let stats = client.cache_stats();
                println!("Cache entries: {}", stats.size);
                for key in stats.keys {
                    println!("  {key}");
                }
                Ok(())
            }
            Command::CacheClear => {
                let client = client_from_config()?;
                client.clear_cache();
                println!("Cache cleared.");
                Ok(())
            }
        }
    }
}

fn client_from_config() -> anyhow::Result<WeatherClient> {
    let config = Config::load().context("Failed to load configuration")?;
    Ok(WeatherClient::new(&config)?)
}

fn configure() -> anyhow::Result<()> {
    let mut config = Config::load().context("Failed to load configuration")?;

    let key = inquire::Password::new("OpenWeather API key:")
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;

    config.api_key = Some(key);
    config.save().context("Failed to save configuration")?;

    let path = Config::config_file_path()?;
    println!("Saved configuration to {}", path.display());

    Ok(())
}

fn print_record(record: &WeatherRecord) {
    println!("{}, {} - {}", record.city, record.country, record.condition);
    println!(
        "  {:.1}°C (min {:.1}°C / max {:.1}°C)",
        record.temperature_c, record.temp_min_c, record.temp_max_c
    );
    println!(
        "  humidity {}%, pressure {} hPa, visibility {} m",
        record.humidity_pct, record.pressure_hpa, record.visibility_m
    );
    println!(
        "  wind {:.1} m/s at {:.0}°",
        record.wind_speed_mps, record.wind_deg
    );
    println!(
        "  sunrise {} / sunset {}",
        record.sunrise.with_timezone(&chrono::Local).format("%H:%M"),
        record.sunset.with_timezone(&chrono::Local).format("%H:%M")
    );
}
