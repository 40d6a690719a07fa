//! InYear CLI - summarize a health-store export from the command line
//!
//! Commands:
//! - day: Totals for one local calendar day
//! - year: Year-to-date totals and daily averages
//! - dashboard: Year, today and yesterday as dashboard cards
//! - validate: Check that an export parses and report sample counts
//! - doctor: Diagnose configuration and environment

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use inyear::config::{parse_timezone, Config, ENV_PLATFORM, ENV_RESPONSE_POLICY, ENV_TIMEZONE};
use inyear::display::{daily_cards, yearly_cards, RefreshTracker};
use inyear::window::local_date;
use inyear::{
    daily_from_export, dashboard_from_export, yearly_from_export, HealthError, Metric, Platform,
    INYEAR_VERSION,
};

const ENV_LOG_LEVEL: &str = "INYEAR_LOG_LEVEL";

/// InYear - daily and year-to-date health metrics
#[derive(Parser)]
#[command(name = "inyear")]
#[command(version = INYEAR_VERSION)]
#[command(about = "Summarize HealthKit and Health Connect exports", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct ExportArgs {
    /// Export file path (use - for stdin)
    #[arg(short, long)]
    input: PathBuf,

    /// Source platform: ios or android (default from INYEAR_PLATFORM)
    #[arg(long)]
    platform: Option<String>,

    /// UTC, local, or an offset like +02:00 (default from INYEAR_TIMEZONE)
    #[arg(long)]
    timezone: Option<String>,

    /// Output format (text on a terminal, JSON otherwise)
    #[arg(long, value_enum)]
    output_format: Option<OutputFormat>,
}

#[derive(Subcommand)]
enum Commands {
    /// Totals for one local calendar day
    Day {
        #[command(flatten)]
        export: ExportArgs,

        /// Date as YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<String>,

        /// Summarize yesterday instead of today
        #[arg(long, conflicts_with = "date")]
        yesterday: bool,
    },

    /// Year-to-date totals and daily averages
    Year {
        #[command(flatten)]
        export: ExportArgs,

        /// Year to summarize (default: current year)
        #[arg(long)]
        year: Option<i32>,

        /// Day used for weight and sleep averages, YYYY-MM-DD
        #[arg(long)]
        reference_date: Option<String>,

        /// Treat this RFC 3339 instant as the current time
        #[arg(long)]
        now: Option<String>,
    },

    /// Year, today and yesterday as dashboard cards
    Dashboard {
        #[command(flatten)]
        export: ExportArgs,

        /// Treat this RFC 3339 instant as the current time
        #[arg(long)]
        now: Option<String>,

        /// File holding the previous refresh's figures for the change badges; updated on success
        #[arg(long)]
        state: Option<PathBuf>,
    },

    /// Check that an export parses and report sample counts
    Validate {
        /// Export file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Source platform: ios or android
        #[arg(long)]
        platform: Option<String>,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and environment
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Dashboard-style cards
    Text,
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = std::env::var(ENV_LOG_LEVEL)
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn run(cli: Cli) -> Result<(), InYearCliError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;

    match cli.command {
        Commands::Day {
            export,
            date,
            yesterday,
        } => runtime.block_on(cmd_day(export, date.as_deref(), yesterday)),
        Commands::Year {
            export,
            year,
            reference_date,
            now,
        } => runtime.block_on(cmd_year(export, year, reference_date.as_deref(), now.as_deref())),
        Commands::Dashboard { export, now, state } => {
            runtime.block_on(cmd_dashboard(export, now.as_deref(), state.as_deref()))
        }
        Commands::Validate {
            input,
            platform,
            json,
        } => cmd_validate(&input, platform.as_deref(), json),
        Commands::Doctor { json } => cmd_doctor(json),
    }
}

/// Export contents plus the effective platform and timezone
struct Resolved {
    raw_json: String,
    platform: Platform,
    timezone: FixedOffset,
    format: OutputFormat,
}

fn resolve(export: &ExportArgs) -> Result<Resolved, InYearCliError> {
    let config = Config::from_env()?;
    let platform = match &export.platform {
        Some(raw) => raw.parse()?,
        None => config.platform,
    };
    let timezone = match &export.timezone {
        Some(raw) => parse_timezone(raw)?,
        None => config.timezone,
    };
    let format = export.output_format.unwrap_or_else(default_format);

    Ok(Resolved {
        raw_json: read_input(&export.input)?,
        platform,
        timezone,
        format,
    })
}

fn default_format() -> OutputFormat {
    if atty::is(atty::Stream::Stdout) {
        OutputFormat::Text
    } else {
        OutputFormat::Json
    }
}

fn read_input(input: &Path) -> Result<String, InYearCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, InYearCliError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| InYearCliError::Health(HealthError::InvalidDate(format!("{raw}: {e}"))))
}

fn parse_now(raw: Option<&str>) -> Result<DateTime<Utc>, InYearCliError> {
    match raw {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| InYearCliError::Health(HealthError::InvalidDate(format!("{raw}: {e}")))),
        None => Ok(Utc::now()),
    }
}

fn print_json<T: Serialize>(value: &T, format: OutputFormat) -> Result<(), InYearCliError> {
    match format {
        OutputFormat::JsonPretty => println!("{}", serde_json::to_string_pretty(value)?),
        _ => println!("{}", serde_json::to_string(value)?),
    }
    Ok(())
}

async fn cmd_day(export: ExportArgs, date: Option<&str>, yesterday: bool) -> Result<(), InYearCliError> {
    let resolved = resolve(&export)?;
    let today = local_date(Utc::now(), &resolved.timezone);
    let date = match date {
        Some(raw) => parse_date(raw)?,
        None if yesterday => today
            .pred_opt()
            .ok_or_else(|| InYearCliError::Health(HealthError::InvalidDate(format!("no day before {today}"))))?,
        None => today,
    };

    let summary = daily_from_export(&resolved.raw_json, resolved.platform, date, resolved.timezone).await?;

    match resolved.format {
        OutputFormat::Text => {
            println!("{}", summary.date);
            for card in daily_cards(&summary) {
                println!("  {card}");
            }
            Ok(())
        }
        format => print_json(&summary, format),
    }
}

async fn cmd_year(
    export: ExportArgs,
    year: Option<i32>,
    reference_date: Option<&str>,
    now: Option<&str>,
) -> Result<(), InYearCliError> {
    let resolved = resolve(&export)?;
    let now = parse_now(now)?;
    let year = year.unwrap_or_else(|| local_date(now, &resolved.timezone).year());
    let reference_date = reference_date.map(parse_date).transpose()?;

    let summary = yearly_from_export(
        &resolved.raw_json,
        resolved.platform,
        year,
        reference_date,
        now,
        resolved.timezone,
    )
    .await?;

    match resolved.format {
        OutputFormat::Text => {
            println!("In {} ... ({} days)", summary.year, summary.total_days);
            for card in yearly_cards(&summary) {
                println!("  {card}");
            }
            Ok(())
        }
        format => print_json(&summary, format),
    }
}

async fn cmd_dashboard(
    export: ExportArgs,
    now: Option<&str>,
    state: Option<&Path>,
) -> Result<(), InYearCliError> {
    let resolved = resolve(&export)?;
    let now = parse_now(now)?;
    let date = local_date(now, &resolved.timezone);

    let mut tracker = match state {
        Some(path) if path.exists() => serde_json::from_str(&fs::read_to_string(path)?)?,
        _ => RefreshTracker::new(),
    };
    let snapshot = dashboard_from_export(
        &resolved.raw_json,
        resolved.platform,
        date,
        now,
        resolved.timezone,
        &mut tracker,
    )
    .await?;
    if let Some(path) = state {
        fs::write(path, serde_json::to_string(&tracker)?)?;
    }

    match resolved.format {
        OutputFormat::Text => {
            print!("{}", snapshot.dashboard);
            Ok(())
        }
        format => print_json(&snapshot, format),
    }
}

fn cmd_validate(input: &Path, platform: Option<&str>, json: bool) -> Result<(), InYearCliError> {
    let platform = match platform {
        Some(raw) => raw.parse()?,
        None => Config::from_env()?.platform,
    };
    let raw_json = read_input(input)?;
    let samples = platform.adapter().parse(&raw_json)?;

    let mut counts: BTreeMap<String, usize> = Metric::ALL
        .iter()
        .map(|metric| (metric.as_str().to_string(), 0))
        .collect();
    let mut errors = Vec::new();
    for (index, tagged) in samples.iter().enumerate() {
        *counts.entry(tagged.metric.as_str().to_string()).or_default() += 1;
        if let Some(end) = tagged.sample.end_time {
            if end < tagged.sample.start_time {
                errors.push(ValidationErrorDetail {
                    index,
                    metric: tagged.metric.as_str().to_string(),
                    error: format!("ends at {end} before it starts at {}", tagged.sample.start_time),
                });
            }
        }
    }

    let report = ValidationReport {
        platform: platform.as_str().to_string(),
        total_samples: samples.len(),
        invalid_samples: errors.len(),
        counts,
        errors,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report ({})", platform.store_name());
        println!("=================");
        println!("Total samples:   {}", report.total_samples);
        println!("Invalid samples: {}", report.invalid_samples);
        println!("\nSamples per metric:");
        for (metric, count) in &report.counts {
            println!("  {metric:<16} {count}");
        }

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!("  - {} sample (index {}): {}", err.metric, err.index, err.error);
            }
        }
    }

    if report.invalid_samples > 0 {
        Err(InYearCliError::ValidationFailed(report.invalid_samples))
    } else {
        Ok(())
    }
}

fn cmd_doctor(json: bool) -> Result<(), InYearCliError> {
    let mut checks = vec![DoctorCheck {
        name: "version".to_string(),
        status: CheckStatus::Ok,
        message: format!("InYear version {INYEAR_VERSION}"),
    }];

    match Config::from_env() {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Ok,
                message: format!(
                    "platform {}, timezone {}, response policy {:?}",
                    config.platform.as_str(),
                    config.timezone,
                    config.response_policy
                ),
            });
        }
        Err(e) => {
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: format!(
                    "{e} (check {ENV_PLATFORM}, {ENV_TIMEZONE}, {ENV_RESPONSE_POLICY})"
                ),
            });
        }
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Warning,
            message: "stdin is a TTY; pass --input FILE or pipe an export with --input -".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (ready for --input -)".to_string(),
        }
    };
    checks.push(stdin_check);

    let has_errors = checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    let report = DoctorReport {
        version: INYEAR_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("InYear Doctor Report");
        println!("====================");
        println!("Version: {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    if has_errors {
        Err(InYearCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Error types

#[derive(Debug)]
enum InYearCliError {
    Io(io::Error),
    Health(HealthError),
    Json(serde_json::Error),
    ValidationFailed(usize),
    DoctorFailed,
}

impl From<io::Error> for InYearCliError {
    fn from(e: io::Error) -> Self {
        InYearCliError::Io(e)
    }
}

impl From<HealthError> for InYearCliError {
    fn from(e: HealthError) -> Self {
        InYearCliError::Health(e)
    }
}

impl From<serde_json::Error> for InYearCliError {
    fn from(e: serde_json::Error) -> Self {
        InYearCliError::Json(e)
    }
}

#[derive(Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<InYearCliError> for CliError {
    fn from(e: InYearCliError) -> Self {
        match e {
            InYearCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            InYearCliError::Health(e) => {
                let hint = match &e {
                    HealthError::ParseError(_) | HealthError::JsonError(_) => {
                        "Check that --platform matches the export"
                    }
                    HealthError::InvalidDate(_) => "Dates are YYYY-MM-DD; instants are RFC 3339",
                    HealthError::InvalidTimezone(_) => "Use UTC, local, or an offset like +02:00",
                    HealthError::Config(_) => "Run 'inyear doctor' to check configuration",
                    _ => "Check the health store export",
                };
                CliError {
                    code: "HEALTH_ERROR".to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            InYearCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            InYearCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{count} samples failed validation"),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            InYearCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(Serialize)]
struct ValidationReport {
    platform: String,
    total_samples: usize,
    invalid_samples: usize,
    counts: BTreeMap<String, usize>,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(Serialize)]
struct ValidationErrorDetail {
    index: usize,
    metric: String,
    error: String,
}

#[derive(Serialize)]
struct DoctorReport {
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
