use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{ArgGroup, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;

mod classify;
mod config;
mod db;
mod error;
mod models;
mod normalize;
mod report;
mod score;
mod survey;
mod trend;

#[derive(Parser)]
#[command(name = "student-risk")]
#[command(about = "Academic risk scoring and classification for student cohorts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import factor readings from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Print the active scoring configuration
    ShowConfig,
    /// Apply a JSON patch on top of the active configuration
    UpdateConfig {
        #[arg(long)]
        patch: PathBuf,
    },
    /// Score students and record their assessments
    #[command(group(
        ArgGroup::new("scope")
            .args(["cohort", "email"])
            .multiple(false)
    ))]
    Score {
        #[arg(long)]
        cohort: Option<String>,
        #[arg(long)]
        email: Option<String>,
        /// Score with a configuration file in preview mode instead of the active one
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Score a completed self-assessment questionnaire
    Survey {
        #[arg(long)]
        definition: PathBuf,
        #[arg(long)]
        responses: PathBuf,
    },
    /// Summarize how recorded assessments move over time
    #[command(group(
        ArgGroup::new("scope")
            .args(["cohort", "email"])
            .multiple(false)
    ))]
    Trend {
        #[arg(long)]
        cohort: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long, default_value_t = 90)]
        since_days: i64,
        #[arg(long, default_value_t = 7)]
        window_days: i64,
    },
    /// Generate a markdown report
    #[command(group(
        ArgGroup::new("scope")
            .args(["cohort", "email"])
            .multiple(false)
    ))]
    Report {
        #[arg(long)]
        cohort: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long, default_value_t = 90)]
        since_days: i64,
        #[arg(long, default_value_t = 7)]
        window_days: i64,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} readings from {}.", csv.display());
        }
        Commands::ShowConfig => {
            let config = db::active_config(&pool).await?;
            if let Some(id) = config.id {
                println!("Active configuration {id}:");
            }
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::UpdateConfig { patch } => {
            let raw = std::fs::read_to_string(&patch)
                .with_context(|| format!("failed to read {}", patch.display()))?;
            let patch: config::ConfigPatch = serde_json::from_str(&raw)
                .context("patch file is not a valid configuration patch")?;
            let current = db::active_config(&pool).await?;
            let next = current.apply(&patch);
            if let Err(err) = next.validate() {
                anyhow::bail!(
                    "rejected configuration update: {err} (try it with `score --config` first)"
                );
            }
            let stored = db::insert_config(&pool, &next).await?;
            if let Some(id) = stored.id {
                println!("Configuration updated; active snapshot is {id}.");
            }
        }
        Commands::Score {
            cohort,
            email,
            config,
            limit,
        } => {
            let (risk_config, persist) = match config {
                Some(path) => {
                    let raw = std::fs::read_to_string(&path)
                        .with_context(|| format!("failed to read {}", path.display()))?;
                    let parsed: config::RiskConfig = serde_json::from_str(&raw)
                        .context("configuration file does not parse")?;
                    (parsed.as_preview(), false)
                }
                None => (db::active_config(&pool).await?, true),
            };

            let records =
                db::fetch_latest_readings(&pool, cohort.as_deref(), email.as_deref()).await?;
            if records.is_empty() {
                println!("No factor readings found for this scope.");
                return Ok(());
            }

            let outcome = score::assess_cohort(&risk_config, &records, Utc::now())?;

            if persist {
                for student in &outcome.scored {
                    db::insert_assessment(&pool, student.student_id, &student.assessment).await?;
                }
            }

            if outcome.scored.is_empty() {
                println!("No students could be scored for this scope.");
            } else {
                println!("Students by risk (most at-risk first):");
                for student in outcome.scored.iter().take(limit) {
                    let driver = student
                        .assessment
                        .top_factor()
                        .map(|f| format!(", driven by {}", f.factor.as_str()))
                        .unwrap_or_default();
                    println!(
                        "- {} ({}, {}) score {:.2} {}{}",
                        student.full_name,
                        student.email,
                        student.cohort,
                        student.assessment.score,
                        student.assessment.level.as_str(),
                        driver
                    );
                    for warning in &student.assessment.warnings {
                        println!("  warning: {warning}");
                    }
                }
            }
            for note in &outcome.skipped {
                println!("skipped {note}");
            }
            if !persist {
                println!("Preview only; no assessments were recorded.");
            }
        }
        Commands::Survey {
            definition,
            responses,
        } => {
            let raw = std::fs::read_to_string(&definition)
                .with_context(|| format!("failed to read {}", definition.display()))?;
            let definition: survey::SurveyDefinition =
                serde_json::from_str(&raw).context("questionnaire definition does not parse")?;
            let raw = std::fs::read_to_string(&responses)
                .with_context(|| format!("failed to read {}", responses.display()))?;
            let responses: Vec<survey::SurveyResponse> =
                serde_json::from_str(&raw).context("questionnaire responses do not parse")?;

            let config = db::active_config(&pool).await?;
            let outcome = survey::score_survey(&definition, &responses, &config.score_bands)?;
            println!(
                "{}: score {:.2} {} ({:.0}% complete)",
                outcome.survey,
                outcome.score,
                outcome.level.as_str(),
                outcome.completion_percent
            );
            for warning in &outcome.warnings {
                println!("  warning: {warning}");
            }
        }
        Commands::Trend {
            cohort,
            email,
            since_days,
            window_days,
        } => {
            let since_date = trend::cutoff_date(since_days);
            let history =
                db::fetch_history(&pool, since_date, cohort.as_deref(), email.as_deref()).await?;
            if history.is_empty() {
                println!("No recorded assessments since {since_date}.");
                return Ok(());
            }

            let config = db::active_config(&pool).await?;
            let summary = trend::summarize(&history, window_days, config.trend_epsilon);
            println!("Direction: {}", summary.direction.as_str());
            for bucket in &summary.buckets {
                match bucket.mean_score {
                    Some(mean) => println!(
                        "- {}: mean score {:.2} across {} assessments",
                        bucket.period_start,
                        mean,
                        bucket.counts.total()
                    ),
                    None => println!("- {}: no assessments", bucket.period_start),
                }
            }
        }
        Commands::Report {
            cohort,
            email,
            since_days,
            window_days,
            out,
        } => {
            let since_date = trend::cutoff_date(since_days);
            let config = db::active_config(&pool).await?;
            let records =
                db::fetch_latest_readings(&pool, cohort.as_deref(), email.as_deref()).await?;
            let outcome = score::assess_cohort(&config, &records, Utc::now())?;
            let history =
                db::fetch_history(&pool, since_date, cohort.as_deref(), email.as_deref()).await?;
            let summary = trend::summarize(&history, window_days, config.trend_epsilon);

            let report = report::build_report(
                cohort.as_deref().or(email.as_deref()),
                since_date,
                &outcome.scored,
                &summary,
            );
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
