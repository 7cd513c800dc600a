//! Autisense CLI Module
//!
//! Command-line interface for training, comparing, inspecting and predicting.

use clap::{Parser, Subcommand};
use colored::*;
use dialoguer::{theme::ColorfulTheme, Input, Select};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::evaluation::{render_bar_chart, CandidateOutcome, EvaluationReport};
use crate::inference::form::display_label;
use crate::inference::{form_options, sample_record, FormSubmission, InferenceService, Prediction, Verdict};
use crate::pipeline::{Pipeline, PipelineConfig};
use crate::utils::DataLoader;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn indent(block: &str) {
    for line in block.lines() {
        println!("  {}", line);
    }
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "autisense")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Autism screening classifier: train, compare, inspect and serve")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full pipeline and write a deployable artifact
    Train {
        /// Screening CSV
        #[arg(short, long)]
        data: PathBuf,

        /// Pipeline config (JSON); missing keys keep their defaults
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Artifact output file
        #[arg(short, long, default_value = "models/artifact.json")]
        output: PathBuf,

        /// Write the full run report as JSON
        #[arg(long)]
        report: Option<PathBuf>,

        /// Deploy the best candidate instead of grid-tuning AdaBoost
        #[arg(long)]
        no_tune: bool,
    },

    /// Compare the candidate models without packaging
    Compare {
        /// Screening CSV
        #[arg(short, long)]
        data: PathBuf,

        /// Pipeline config (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Predict with a saved artifact
    Predict {
        /// Artifact file
        #[arg(short, long, default_value = "models/artifact.json")]
        artifact: PathBuf,

        /// CSV of records to classify
        #[arg(short, long, conflicts_with_all = ["sample", "interactive"])]
        input: Option<PathBuf>,

        /// Classify the built-in reference record
        #[arg(long, conflicts_with = "interactive")]
        sample: bool,

        /// Fill in the questionnaire in the terminal
        #[arg(long)]
        interactive: bool,
    },

    /// Summarize a screening CSV
    Info {
        /// Screening CSV
        #[arg(short, long)]
        data: PathBuf,
    },

    /// Show an artifact's vocabularies and feature importances
    Inspect {
        /// Artifact file
        #[arg(short, long, default_value = "models/artifact.json")]
        artifact: PathBuf,
    },

    /// Start the web server
    Serve {
        /// Artifact file; defaults to ARTIFACT_PATH
        #[arg(short, long)]
        artifact: Option<PathBuf>,

        /// Server port; defaults to API_PORT
        #[arg(short, long)]
        port: Option<u16>,

        /// Server host; defaults to API_HOST
        #[arg(long)]
        host: Option<String>,
    },
}

fn load_config(path: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    Ok(match path {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    })
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_train(
    data_path: &Path,
    config_path: Option<&Path>,
    output: &Path,
    report: Option<&Path>,
    no_tune: bool,
) -> anyhow::Result<()> {
    section("Train");

    let mut config = load_config(config_path)?;
    if no_tune {
        config = config.with_tuning(false);
    }

    step_run("Loading data");
    let start = Instant::now();
    let dataset = DataLoader::new(config.schema.clone()).load_csv(data_path)?;
    step_done(&format!("{} rows in {:?}", dataset.len(), start.elapsed()));

    step_run("Running pipeline");
    let start = Instant::now();
    let outcome = Pipeline::new(config).run(&dataset)?;
    step_done(&format!("{:.2?}", start.elapsed()));

    print_evaluation(&outcome.evaluation);

    if let (Some(tuning), Some(metrics)) = (&outcome.tuning, &outcome.tuned_metrics) {
        section("Tuned AdaBoost");
        let p = tuning.best_params;
        println!(
            "  {:<16} n_estimators={} learning_rate={} max_depth={}",
            muted("Best params"),
            p.n_estimators,
            p.learning_rate,
            p.max_depth
        );
        println!("  {:<16} {:.4} (+/- {:.4})", muted("CV accuracy"), tuning.best_score, tuning.best_std);
        println!("  {:<16} {}", muted("Test accuracy"), format!("{:.4}", metrics.accuracy).white().bold());
        println!();
        indent(&metrics.report.to_string());
    }

    outcome.artifact.save(output)?;
    if let Some(report_path) = report {
        fs::write(report_path, outcome.to_json()?)?;
    }

    println!();
    println!(
        "  {} {} {}",
        ok("saved"),
        outcome.artifact_metadata.model_name.white().bold(),
        dim(&format!("→ {}", output.display()))
    );
    println!();
    Ok(())
}

pub fn cmd_compare(data_path: &Path, config_path: Option<&Path>) -> anyhow::Result<()> {
    section("Compare");

    let config = load_config(config_path)?;
    step_run("Loading data");
    let dataset = DataLoader::new(config.schema.clone()).load_csv(data_path)?;
    step_done(&format!("{} rows", dataset.len()));

    step_run("Evaluating candidates");
    let start = Instant::now();
    let report = Pipeline::new(config).compare(&dataset)?;
    step_done(&format!("{:.2?}", start.elapsed()));

    print_evaluation(&report);
    println!();
    Ok(())
}

fn print_evaluation(report: &EvaluationReport) {
    section("Candidates");
    println!("  {:<24} {:>10} {:>18}", muted("Model"), muted("Accuracy"), muted("CV"));
    println!("  {}", dim(&"─".repeat(54)));

    for outcome in report.ranking() {
        match outcome {
            CandidateOutcome::Succeeded(result) => {
                println!("  {:<24} {:>10.4} {:>18}", result.name, result.accuracy(), result.cv.to_string());
            }
            CandidateOutcome::Failed { name, error, .. } => {
                println!("  {:<24} {:>10}", name, format!("err: {}", error).red());
            }
        }
    }

    if let Some(best) = report.best() {
        println!();
        println!("  {} {} {:.4}", ok("best"), best.name.white().bold(), best.accuracy());
    }

    section("Accuracy");
    indent(&render_bar_chart(&report.accuracy_by_model(), 30));
}

pub fn cmd_predict(artifact: &Path, input: Option<&Path>, sample: bool, interactive: bool) -> anyhow::Result<()> {
    let service = InferenceService::load(artifact)?;

    if interactive {
        return predict_interactive(&service);
    }

    section("Predict");
    if sample || input.is_none() {
        let prediction = service.predict(&sample_record())?;
        indent(&Verdict::from_prediction(&prediction).summary());
        println!();
        return Ok(());
    }

    if let Some(input) = input {
        let schema = service.artifact().transform().schema().clone();
        let records = DataLoader::new(schema).load_records(input)?;
        let predictions = service.predict_batch(&records)?;
        print_predictions(&predictions);
    }
    println!();
    Ok(())
}

fn print_predictions(predictions: &[Prediction]) {
    println!("  {:<6} {:<8} {:>10} {:>10}", muted("Row"), muted("Label"), muted("P(No)"), muted("P(Yes)"));
    println!("  {}", dim(&"─".repeat(38)));
    for (row, prediction) in predictions.iter().enumerate() {
        let label = if prediction.is_positive() {
            prediction.label_name.yellow()
        } else {
            prediction.label_name.normal()
        };
        println!(
            "  {:<6} {:<8} {:>10.4} {:>10.4}",
            row,
            label,
            prediction.probabilities.negative,
            prediction.probabilities.positive
        );
    }
    let positives = predictions.iter().filter(|p| p.is_positive()).count();
    println!();
    println!("  {:<16} {} / {}", muted("Traits detected"), positives, predictions.len());
}

fn select_label(theme: &ColorfulTheme, prompt: &str, choices: &[String]) -> anyhow::Result<String> {
    let index = Select::with_theme(theme)
        .with_prompt(prompt)
        .items(choices)
        .default(0)
        .interact()?;
    Ok(choices[index].clone())
}

fn predict_interactive(service: &InferenceService) -> anyhow::Result<()> {
    let theme = ColorfulTheme::default();
    let options = form_options(&service.artifact());
    let choices = |field: &str| options.get(field).cloned().unwrap_or_default();

    section("Questionnaire");
    let binary = ["0".to_string(), "1".to_string()];
    let mut answers = [0.0; 10];
    for (i, answer) in answers.iter_mut().enumerate() {
        let picked = select_label(&theme, &format!("A{}", i + 1), &binary)?;
        *answer = if picked == "1" { 1.0 } else { 0.0 };
    }

    let age_mons: f64 = Input::with_theme(&theme)
        .with_prompt("Age (months)")
        .default(36.0)
        .interact_text()?;

    let submission = FormSubmission {
        answers,
        age_mons,
        sex: select_label(&theme, "Sex", &choices("Sex"))?,
        ethnicity: select_label(&theme, "Ethnicity", &choices("Ethnicity"))?,
        jaundice: select_label(&theme, "Born with jaundice", &choices("Jaundice"))?,
        family_mem_with_asd: select_label(&theme, "Family member with ASD", &choices("Family_mem_with_ASD"))?,
        who_completed_the_test: select_label(&theme, "Who completed the test", &choices("Who completed the test"))?,
    };

    let prediction = service.predict(&submission.to_record())?;
    println!();
    indent(&Verdict::from_prediction(&prediction).summary());
    println!();
    Ok(())
}

pub fn cmd_info(data_path: &Path) -> anyhow::Result<()> {
    section("Data Info");

    let loader = DataLoader::new(PipelineConfig::default().schema);
    let dataset = loader.load_csv(data_path)?;
    let summary = dataset.summary(loader.schema());

    println!("  {:<12} {}", muted("File"), data_path.display());
    println!("  {:<12} {}", muted("Rows"), summary.n_rows);
    println!("  {:<12} {}", muted("Features"), summary.n_features);
    println!("  {:<12} {}", muted("Yes"), summary.positives);
    println!("  {:<12} {}", muted("No"), summary.negatives);
    println!();

    println!("  {:<28} {:>8}", muted("Field"), muted("Missing"));
    println!("  {}", dim(&"─".repeat(38)));
    for (field, missing) in &summary.missing_by_field {
        println!("  {:<28} {:>8}", field, missing);
    }
    println!();
    Ok(())
}

pub fn cmd_inspect(artifact_path: &Path) -> anyhow::Result<()> {
    let service = InferenceService::load(artifact_path)?;
    let artifact = service.artifact();
    let metadata = artifact.metadata();

    section("Artifact");
    println!("  {:<14} {}", muted("Model"), metadata.model_name.white().bold());
    println!("  {:<14} {}", muted("Id"), metadata.id);
    println!("  {:<14} {}", muted("Created"), metadata.created_at.to_rfc3339());
    println!("  {:<14} {}", muted("Version"), metadata.crate_version);
    if let Some(score) = metadata.cv_score {
        println!("  {:<14} {:.4}", muted("CV accuracy"), score);
    }
    if let Some(accuracy) = metadata.test_accuracy {
        println!("  {:<14} {:.4}", muted("Test accuracy"), accuracy);
    }

    section("Vocabularies");
    for vocab in artifact.transform().vocabularies() {
        let labels: Vec<String> = vocab
            .values()
            .iter()
            .enumerate()
            .map(|(code, value)| format!("{}={}", code, display_label(vocab.field(), value)))
            .collect();
        println!("  {:<24} {}", muted(vocab.field()), labels.join(", "));
    }

    section("Feature importances");
    match artifact.feature_importances() {
        Some(importances) => indent(&render_bar_chart(&importances, 30)),
        None => println!("  {}", dim("model does not report feature importances")),
    }
    println!();
    Ok(())
}

// ─── Serve ─────────────────────────────────────────────────────────────────────

pub async fn cmd_serve(artifact: Option<PathBuf>, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    use crate::server::{run_server, ServerConfig};

    let mut config = ServerConfig::default();
    if let Some(artifact) = artifact {
        config = config.with_artifact_path(artifact);
    }
    if let Some(host) = host {
        config = config.with_host(host);
    }
    if let Some(port) = port {
        config = config.with_port(port);
    }

    section("Serve");
    println!("  {:<10} {}", muted("Form"), accent(&format!("http://{}:{}", config.host, config.port)));
    println!("  {:<10} {}", muted("Health"), accent(&format!("http://{}:{}/api/health", config.host, config.port)));
    println!("  {:<10} {}", muted("Artifact"), config.artifact_path.display());
    println!("  {}", dim("ctrl+c to stop"));
    println!();

    run_server(config).await
}
