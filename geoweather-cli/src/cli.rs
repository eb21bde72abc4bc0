use anyhow::{Context, Result, anyhow, bail};
use chrono::Local;
use clap::{Args, Parser, Subcommand, ValueEnum};
use geoweather_core::{
    AuthorizationStatus, CancellationToken, Config, Coordinate, LocationProvider,
    LocationResolver, OpenWeatherFetcher, PipelineError, PlaceName, Pipeline, Report,
    location::{FixedLocationProvider, IpLocationProvider, NominatimGeocoder},
};
use std::sync::Arc;

use crate::prompt::ConsolePrompt;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "geoweather", version, about = "Current weather where you are")]
pub struct Cli {
    /// Print debug logs to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the OpenWeather API key.
    Configure,

    /// Allow, deny or reset access to your location.
    Permission {
        #[arg(value_enum)]
        action: PermissionAction,
    },

    /// Print the name of the place you are in.
    Detect {
        #[command(flatten)]
        location: LocationArgs,
    },

    /// Show current weather for your location, or for a named city.
    Show {
        /// City name; skips location detection.
        #[arg(long, conflicts_with_all = ["lat", "lon"])]
        city: Option<String>,

        #[command(flatten)]
        location: LocationArgs,

        /// Overrides the configured API key.
        #[arg(long, env = "OPENWEATHER_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PermissionAction {
    Allow,
    Deny,
    Reset,
}

impl From<PermissionAction> for AuthorizationStatus {
    fn from(action: PermissionAction) -> Self {
        match action {
            PermissionAction::Allow => AuthorizationStatus::Authorized,
            PermissionAction::Deny => AuthorizationStatus::Denied,
            PermissionAction::Reset => AuthorizationStatus::NotDetermined,
        }
    }
}

/// Explicit coordinates replace the IP based lookup.
#[derive(Debug, Clone, Default, Args)]
pub struct LocationArgs {
    /// Latitude in degrees.
    #[arg(long, requires = "lon", allow_negative_numbers = true)]
    pub lat: Option<f64>,

    /// Longitude in degrees.
    #[arg(long, requires = "lat", allow_negative_numbers = true)]
    pub lon: Option<f64>,
}

impl LocationArgs {
    pub fn coordinate(&self) -> Result<Option<Coordinate>> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Ok(Some(Coordinate::new(lat, lon)?)),
            _ => Ok(None),
        }
    }
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Permission { action } => set_permission(action),
            Command::Detect { location } => detect(location).await,
            Command::Show {
                city,
                location,
                api_key,
            } => show(city, location, api_key).await,
        }
    }
}

fn configure() -> Result<()> {
    let mut config = Config::load()?;

    let api_key = inquire::Password::new("OpenWeather API key:")
        .without_confirmation()
        .with_display_mode(inquire::PasswordDisplayMode::Masked)
        .with_help_message("Create one at https://home.openweathermap.org/api_keys")
        .prompt()
        .context("Failed to read API key")?;

    let api_key = api_key.trim();
    if api_key.is_empty() {
        bail!("API key must not be empty");
    }

    config.set_api_key(api_key.to_string());
    config.save()?;

    println!("Saved configuration to {}", Config::config_file_path()?.display());
    Ok(())
}

fn set_permission(action: PermissionAction) -> Result<()> {
    let status = AuthorizationStatus::from(action);
    remember_permission(status)?;

    println!("Location permission: {status}");
    Ok(())
}

async fn detect(location: LocationArgs) -> Result<()> {
    let config = Config::load()?;
    let resolver = build_resolver(&config, &location)?;

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c({
        let cancel = cancel.clone();
        move || cancel.cancel()
    });

    let result = resolver.resolve(&cancel).await;
    persist_decision(&location, resolver.provider().as_ref())?;

    let place = result.map_err(|e| explain(e.into()))?;
    println!("{place}");
    Ok(())
}

async fn show(city: Option<String>, location: LocationArgs, api_key: Option<String>) -> Result<()> {
    let mut config = Config::load()?;
    if let Some(api_key) = api_key {
        config.set_api_key(api_key);
    }

    let fetcher = OpenWeatherFetcher::from_settings(config.api_key()?.to_string(), &config.weather)?;
    let pipeline = Arc::new(Pipeline::new(
        build_resolver(&config, &location)?,
        Arc::new(fetcher),
    ));

    cancel_on_ctrl_c({
        let pipeline = pipeline.clone();
        move || pipeline.cancel()
    });

    let result = match city {
        Some(name) => {
            let place = PlaceName::new(&name).ok_or_else(|| anyhow!("City name must not be empty"))?;
            pipeline.refresh(place).await
        }
        None => {
            let result = pipeline.run().await;
            persist_decision(&location, pipeline.resolver().provider().as_ref())?;
            result
        }
    };

    let report = result.map_err(explain)?;
    print!("{}", render_report(&report));
    Ok(())
}

fn build_resolver(config: &Config, location: &LocationArgs) -> Result<LocationResolver> {
    let provider: Arc<dyn LocationProvider> = match location.coordinate()? {
        Some(coordinate) => Arc::new(FixedLocationProvider::new(coordinate)),
        None => Arc::new(IpLocationProvider::from_settings(
            &config.location,
            Arc::new(ConsolePrompt),
        )?),
    };
    let geocoder = Arc::new(NominatimGeocoder::from_settings(&config.location)?);

    Ok(LocationResolver::new(provider, geocoder).with_settings((&config.location).into()))
}

/// Keep the answer given at the permission prompt for the next run.
fn persist_decision(location: &LocationArgs, provider: &dyn LocationProvider) -> Result<()> {
    if location.coordinate()?.is_some() {
        return Ok(());
    }

    match provider.authorization_status() {
        AuthorizationStatus::NotDetermined => Ok(()),
        status => remember_permission(status),
    }
}

fn remember_permission(status: AuthorizationStatus) -> Result<()> {
    let mut config = Config::load()?;
    if config.location.permission != status {
        config.set_permission(status);
        config.save()?;
    }
    Ok(())
}

fn cancel_on_ctrl_c(cancel: impl FnOnce() + Send + 'static) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel();
        }
    });
}

/// Prints the blocking explanation a denied permission calls for.
fn explain(err: PipelineError) -> anyhow::Error {
    if err.is_permission_denied() {
        eprintln!("Location services disabled");
        eprintln!(
            "Please run `geoweather permission allow` to enable location services for this app, \
             or pass --lat and --lon."
        );
    }
    err.into()
}

fn render_report(report: &Report) -> String {
    let updated = report.fetched_at.with_timezone(&Local).format("%H:%M");

    format!(
        "{}\n{}\n{}°C\n(updated {})\n",
        report.place, report.weather.condition, report.weather.temperature_celsius, updated
    )
}
