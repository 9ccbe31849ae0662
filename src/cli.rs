//! Command-line parsing and dispatch for the recommender binary.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use crate::advisor::AdvisorClient;
use crate::config::Settings;
use crate::generate::{self, GenerationSummary, TableRow};
use crate::interview;
use crate::profile::CustomerProfile;
use crate::recommend::RecommendationEngine;
use crate::train::{self, CATEGORICAL_COLUMNS, TrainingConfig};

#[derive(Debug, Parser)]
#[command(name = "insurance-recommender", version, about = "Insurance product recommender")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate a labeled synthetic customer table.
    Generate(GenerateArgs),
    /// Fit encoders and the classifier, report held-out metrics, save artifacts.
    Train(TrainArgs),
    /// Rank every product for one customer.
    Recommend(RecommendArgs),
    /// Interactive chatbot: questionnaire, ranked scores and an advisor explanation.
    Chat(ChatArgs),
}

#[derive(Debug, Parser)]
pub struct GenerateArgs {
    /// Number of customers to generate.
    #[arg(short = 'n', long, default_value_t = generate::DEFAULT_ROWS)]
    pub rows: usize,

    /// Seed for the single random stream.
    #[arg(long, default_value_t = generate::DEFAULT_SEED)]
    pub seed: u64,

    /// Output CSV (defaults to INSURANCE_DATA_PATH or data/synthetic_dataset.csv).
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Parser)]
pub struct ArtifactArgs {
    /// Serialized model.
    #[arg(long)]
    pub model: Option<PathBuf>,

    /// Serialized label encoders.
    #[arg(long)]
    pub encoders: Option<PathBuf>,
}

#[derive(Debug, Parser)]
pub struct TrainArgs {
    /// Input CSV produced by `generate`.
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    #[command(flatten)]
    pub artifacts: ArtifactArgs,

    /// Seed for the train/test shuffle.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Fraction of rows held out for evaluation.
    #[arg(long, default_value_t = 0.2)]
    pub test_ratio: f64,
}

#[derive(Debug, Parser)]
pub struct RecommendArgs {
    #[arg(long)]
    pub age: i64,

    #[arg(long)]
    pub marital_status: String,

    /// yes or no.
    #[arg(long)]
    pub has_kids: String,

    #[arg(long)]
    pub income_bracket: String,

    #[arg(long, default_value = "none")]
    pub life_event: String,

    /// Print the ranking as JSON instead of score bars.
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub artifacts: ArtifactArgs,
}

#[derive(Debug, Parser)]
pub struct ChatArgs {
    #[command(flatten)]
    pub artifacts: ArtifactArgs,

    /// Skip the language model and show scores only.
    #[arg(long)]
    pub no_advisor: bool,
}

fn load_engine(settings: &Settings, args: &ArtifactArgs) -> Result<RecommendationEngine> {
    let model = args.model.clone().unwrap_or_else(|| settings.model_path.clone());
    let encoders = args.encoders.clone().unwrap_or_else(|| settings.encoders_path.clone());
    RecommendationEngine::load(&model, &encoders).context("cannot start without a trained model; run `train` first")
}

fn parse_yes_no(value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "yes" | "y" | "1" | "true" => Ok(true),
        "no" | "n" | "0" | "false" => Ok(false),
        other => anyhow::bail!("--has-kids must be yes or no, got '{other}'"),
    }
}

fn run_generate(settings: &Settings, args: GenerateArgs) -> Result<()> {
    let output = args.output.unwrap_or_else(|| settings.data_path.clone());
    let examples = generate::generate(args.rows, args.seed);
    generate::write_table_to_path(&output, &examples)
        .with_context(|| format!("failed to write {}", output.display()))?;

    println!("✅ Dataset created with {} customers → {}", examples.len(), output.display());
    println!("\nFirst 5 rows:");
    for ex in examples.iter().take(5) {
        let r = TableRow::from(ex);
        println!(
            "   {:>3}  {:<9} {}  {:<7} {:<12} {}",
            r.age, r.marital_status, r.has_kids, r.income_bracket, r.life_event, r.recommended_insurance
        );
    }
    println!("\nRecommendation breakdown:");
    print!("{}", GenerationSummary::of(&examples));
    Ok(())
}

fn run_train(settings: &Settings, args: TrainArgs) -> Result<()> {
    let input = args.input.unwrap_or_else(|| settings.data_path.clone());
    let model = args.artifacts.model.unwrap_or_else(|| settings.model_path.clone());
    let encoders = args.artifacts.encoders.unwrap_or_else(|| settings.encoders_path.clone());
    let config = TrainingConfig {
        seed: args.seed,
        test_ratio: args.test_ratio,
        ..TrainingConfig::default()
    };

    let outcome = train::train_and_persist(&input, &model, &encoders, &config)
        .with_context(|| format!("training on {} failed", input.display()))?;

    for column in CATEGORICAL_COLUMNS {
        let encoder = outcome.encoders.get(column)?;
        println!("   '{column}' categories: {:?}", encoder.classes());
    }
    println!("\n Training on {} rows, testing on {} rows", outcome.train_rows, outcome.test_rows);
    println!("\n Model Performance:");
    println!("{}", outcome.report);
    println!("Model saved → {}", model.display());
    println!("Encoders saved → {}", encoders.display());
    Ok(())
}

fn run_recommend(settings: &Settings, args: RecommendArgs) -> Result<()> {
    let engine = load_engine(settings, &args.artifacts)?;
    let has_kids = parse_yes_no(&args.has_kids)?;
    let profile = CustomerProfile::parse(
        args.age,
        &args.marital_status,
        has_kids,
        &args.income_bracket,
        &args.life_event,
    )?;
    let ranked = engine.recommend(&profile)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&ranked)?);
        return Ok(());
    }
    println!("\n Recommendations (ranked by confidence):");
    println!("{}", interview::format_scores(&ranked));
    Ok(())
}

fn run_chat(settings: &Settings, args: ChatArgs) -> Result<()> {
    let engine = load_engine(settings, &args.artifacts)?;
    let advisor = if args.no_advisor {
        None
    } else {
        Some(AdvisorClient::new(settings.advisor.clone()).context("failed to build HTTP client")?)
    };

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut stdout = io::stdout();
    let Some(profile) = interview::collect_profile(&mut input, &mut stdout)? else {
        info!("input closed before the questionnaire finished");
        return Ok(());
    };

    println!("\n⏳ Analyzing your profile...");
    let ranked = engine.recommend(&profile)?;
    println!("\n📊 Model scores:");
    println!("{}", interview::format_scores(&ranked));

    if let Some(advisor) = advisor {
        println!("\n💬 Advisor recommendation:\n");
        stdout.flush()?;
        println!("{}\n", advisor.explain(&profile, &ranked));
    }
    Ok(())
}

/// Parses arguments and runs the chosen command.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::from_env()?;
    match cli.command {
        Command::Generate(args) => run_generate(&settings, args),
        Command::Train(args) => run_train(&settings, args),
        Command::Recommend(args) => run_recommend(&settings, args),
        Command::Chat(args) => run_chat(&settings, args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_recommend() {
        let cli = Cli::try_parse_from([
            "insurance-recommender",
            "recommend",
            "--age",
            "34",
            "--marital-status",
            "married",
            "--has-kids",
            "yes",
            "--income-bracket",
            "medium",
            "--life-event",
            "new_baby",
        ])
        .unwrap();
        match cli.command {
            Command::Recommend(args) => {
                assert_eq!(args.age, 34);
                assert_eq!(args.life_event, "new_baby");
                assert!(!args.json);
                assert!(args.artifacts.model.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_recommend_json() {
        let cli = Cli::try_parse_from([
            "insurance-recommender",
            "recommend",
            "--age",
            "60",
            "--marital-status",
            "single",
            "--has-kids",
            "no",
            "--income-bracket",
            "high",
            "--json",
        ])
        .unwrap();
        match cli.command {
            Command::Recommend(args) => {
                assert!(args.json);
                assert_eq!(args.life_event, "none");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_yes_no() {
        assert!(parse_yes_no("Yes").unwrap());
        assert!(!parse_yes_no(" no ").unwrap());
        assert!(parse_yes_no("perhaps").is_err());
    }
}
