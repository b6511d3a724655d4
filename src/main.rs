use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;
use uuid::Uuid;

use prodrome_engine::activity_log::init_logging;
use prodrome_engine::audio::load_wav_mono;
use prodrome_engine::synthetic::{generate_attack_history, generate_voice_like};
use prodrome_engine::{
    EngineConfig, EnvironmentalContext, InMemoryStore, JsonFileStore, RecordStore, RiskEngine,
};

/// Vocal biomarker analysis and migraine risk forecasting
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (defaults to ~/.prodrome/config.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// User the command applies to
    #[arg(short, long, default_value = "default")]
    user: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze one WAV recording and store the session
    Analyze { wav: PathBuf },

    /// Establish the baseline from relaxed-state WAV recordings (at least 3)
    Calibrate {
        #[arg(required = true)]
        wavs: Vec<PathBuf>,
    },

    /// Log a migraine attack
    LogAttack {
        /// Severity 1-10
        severity: u8,
        /// Symptom (repeatable)
        #[arg(long = "symptom")]
        symptoms: Vec<String>,
        #[command(flatten)]
        environment: EnvironmentArgs,
        /// When it started (RFC 3339); defaults to now
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },

    /// List recent attacks with early-versus-recent frequency
    Attacks {
        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Record the latest heart-rate-variability reading (ms)
    SetHrv { hrv_ms: u32 },

    /// Generate and store a risk forecast
    Forecast {
        #[command(flatten)]
        environment: EnvironmentArgs,
    },

    /// Validate one forecast, or every forecast whose window has elapsed
    Validate { forecast_id: Option<Uuid> },

    /// Model accuracy over a trailing window
    Performance {
        #[arg(long, default_value = "30")]
        days: u32,
    },

    /// Stress trend over recent voice sessions
    Trend {
        #[arg(long, default_value = "7")]
        days: u32,
    },

    /// Run the whole pipeline on seeded synthetic data (no records are written)
    Demo {
        #[arg(long, default_value = "42")]
        seed: u64,
        #[arg(long, default_value = "24")]
        attacks: usize,
    },
}

/// Current or recorded environmental conditions
#[derive(clap::Args, Debug)]
struct EnvironmentArgs {
    /// Barometric pressure (hPa)
    #[arg(long)]
    pressure: Option<f64>,
    #[arg(long)]
    weather: Option<String>,
    /// Temperature (Celsius)
    #[arg(long)]
    temperature: Option<f64>,
}

impl From<EnvironmentArgs> for EnvironmentalContext {
    fn from(args: EnvironmentArgs) -> Self {
        Self {
            weather_condition: args.weather,
            barometric_pressure: args.pressure,
            temperature: args.temperature,
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).context("Failed to serialize output")?);
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&EngineConfig::log_dir()?, args.verbose)?;

    let config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::load_or_default(),
    };

    let data_path = config.data_path()?;
    info!("Records file: {:?}", data_path);
    let store = JsonFileStore::open(&data_path).context("Failed to open records file")?;
    let engine = RiskEngine::new(store, config)?;
    let now = Utc::now();
    let user = args.user.as_str();

    match args.command {
        Command::Analyze { wav } => {
            let audio = load_wav_mono(&wav, engine.config().sample_rate)?;
            info!("Analyzing {:.1}s of audio", audio.duration_secs());
            print_json(&engine.analyze_voice(user, &audio.samples, now)?)?;
        }
        Command::Calibrate { wavs } => {
            let buffers = wavs
                .iter()
                .map(|path| load_wav_mono(path, engine.config().sample_rate).map(|a| a.samples))
                .collect::<Result<Vec<_>>>()?;
            print_json(&engine.establish_baseline(user, &buffers, now)?)?;
        }
        Command::LogAttack {
            severity,
            symptoms,
            environment,
            at,
        } => {
            let attack = engine.log_attack(user, at.unwrap_or(now), severity, symptoms, environment.into())?;
            print_json(&attack)?;
        }
        Command::Attacks { limit } => {
            print_json(&serde_json::json!({
                "attacks": engine.recent_attacks(user, limit)?,
                "frequency": engine.attack_frequency(user, now)?,
            }))?;
        }
        Command::SetHrv { hrv_ms } => {
            engine.set_hrv(user, hrv_ms)?;
            println!("HRV for {} set to {} ms", user, hrv_ms);
        }
        Command::Forecast { environment } => {
            print_json(&engine.generate_forecast(user, &environment.into(), now)?)?;
        }
        Command::Validate { forecast_id: Some(id) } => {
            print_json(&engine.validate_forecast(id, now)?)?;
        }
        Command::Validate { forecast_id: None } => {
            let count = engine.validate_due_forecasts(user, now)?;
            println!("Validated {} forecast(s)", count);
        }
        Command::Performance { days } => {
            print_json(&engine.get_model_performance(user, days, now)?)?;
        }
        Command::Trend { days } => {
            print_json(&engine.voice_trend(user, days, now)?)?;
        }
        Command::Demo { seed, attacks } => {
            run_demo(engine.config().clone(), user, seed, attacks)?;
        }
    }

    Ok(())
}

/// End-to-end run over an in-memory store
fn run_demo(config: EngineConfig, user: &str, seed: u64, attack_count: usize) -> Result<()> {
    let sample_rate = config.sample_rate;
    let engine = RiskEngine::new(InMemoryStore::new(), config)?;
    let now = Utc::now();

    info!(seed, attack_count, "Running demo");

    for attack in generate_attack_history(user, now, 60, attack_count, seed)? {
        engine.store().append_attack_event(&attack)?;
    }

    let calibration: Vec<Vec<f32>> = (0..3)
        .map(|i| generate_voice_like(150.0, sample_rate, 3000, seed + i))
        .collect();
    engine.establish_baseline(user, &calibration, now - Duration::days(14))?;

    // A week of routine check-ins, drifting upward in the last day
    for day in (1..=7).rev() {
        let f0 = if day <= 1 { 185.0 } else { 150.0 + day as f64 };
        let chunk = generate_voice_like(f0, sample_rate, 2500, seed + 100 + day as u64);
        engine.analyze_voice(user, &chunk, now - Duration::days(day) + Duration::hours(12))?;
    }
    let today = generate_voice_like(190.0, sample_rate, 2500, seed + 200);
    let analysis = engine.analyze_voice(user, &today, now - Duration::hours(1))?;
    engine.set_hrv(user, 48)?;

    let current = EnvironmentalContext {
        weather_condition: Some("Storm".to_string()),
        barometric_pressure: Some(992.0),
        temperature: Some(14.0),
    };
    let forecast = engine.generate_forecast(user, &current, now)?;
    let trend = engine.voice_trend(user, 7, now)?;

    print_json(&serde_json::json!({
        "latest_analysis": analysis,
        "trend": trend,
        "forecast": forecast,
    }))
}
