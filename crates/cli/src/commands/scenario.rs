//! Offline scenario commands

use anyhow::{Context, Result};
use colored::Colorize;
use handover_lib::{
    orchestrator::Resolution,
    predictor::{CellClassifier, HeuristicClassifier, OnnxClassifier},
    scenario::{replay, ReplayRecord, ReplaySummary, Scenario},
    DecisionOrchestrator, DecisionOutcome,
};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tabled::Tabled;

use crate::output::{
    color_confidence, color_status, format_seconds, print_error, print_info, print_json,
    print_success, print_table, OutputFormat,
};

/// Row for the replay table
#[derive(Tabled)]
struct ReplayRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "UE")]
    ue: String,
    #[tabled(rename = "Serving")]
    serving: String,
    #[tabled(rename = "Outcome")]
    outcome: String,
    #[tabled(rename = "Target")]
    target: String,
    #[tabled(rename = "Mode")]
    mode: String,
    #[tabled(rename = "Confidence")]
    confidence: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

impl From<&ReplayRecord> for ReplayRow {
    fn from(record: &ReplayRecord) -> Self {
        let mut row = ReplayRow {
            time: format_seconds(record.timestamp),
            ue: record.ue_id.to_string(),
            serving: record.serving_before.to_string(),
            outcome: color_status(record.outcome.label()),
            target: "-".to_string(),
            mode: "-".to_string(),
            confidence: "-".to_string(),
            detail: String::new(),
        };

        match &record.outcome {
            DecisionOutcome::Applied {
                target_cell,
                confidence,
                mode,
            } => {
                row.target = target_cell.to_string();
                row.mode = mode.to_string();
                if let Some(c) = confidence {
                    row.confidence = color_confidence(*c);
                }
            }
            DecisionOutcome::Skipped { reason } => {
                row.detail = reason.to_string();
            }
            DecisionOutcome::FallenBack {
                reason,
                mode,
                rule_result,
            } => {
                row.mode = mode.to_string();
                row.detail = match rule_result {
                    Resolution::Applied { target_cell, .. } => {
                        row.target = target_cell.to_string();
                        format!("{}; rule applied", reason)
                    }
                    Resolution::Skipped { reason: skip } => format!("{}; rule {}", reason, skip),
                };
            }
        }
        row
    }
}

#[derive(Serialize)]
struct ReplayReport<'a> {
    scenario: &'a str,
    model_version: String,
    records: &'a [ReplayRecord],
    summary: &'a ReplaySummary,
}

/// Build the classifier used for predictive mode
pub fn build_classifier(
    model: Option<&str>,
    model_sha256: Option<&str>,
    temperature: f64,
) -> Result<Arc<dyn CellClassifier>> {
    match model {
        Some(path) => {
            let classifier = OnnxClassifier::from_file(Path::new(path), model_sha256)
                .with_context(|| format!("Failed to load model from {}", path))?;
            Ok(Arc::new(classifier))
        }
        None => {
            if temperature <= 0.0 || !temperature.is_finite() {
                anyhow::bail!("Temperature must be positive, got {}", temperature);
            }
            Ok(Arc::new(HeuristicClassifier::new(temperature)))
        }
    }
}

/// Replay a scenario file and print every decision
pub async fn replay_scenario(
    path: &str,
    classifier: Arc<dyn CellClassifier>,
    summary_only: bool,
    format: OutputFormat,
) -> Result<()> {
    let scenario = Scenario::load(Path::new(path))?;
    let problems = scenario.validate();
    if !problems.is_empty() {
        for problem in &problems {
            print_error(problem);
        }
        anyhow::bail!("Scenario {} has {} problem(s)", path, problems.len());
    }

    let config = scenario.handover_config();
    let registry = Arc::new(config.build_registry()?);
    let model_version = classifier.model_version();
    let orchestrator = DecisionOrchestrator::new(registry, Some(classifier), config)?;

    let records = replay(&orchestrator, &scenario).await?;
    let summary = ReplaySummary::from_records(&records);

    match format {
        OutputFormat::Json => {
            let report = ReplayReport {
                scenario: &scenario.name,
                model_version,
                records: if summary_only { &[] } else { &records },
                summary: &summary,
            };
            print_json(&report)?;
        }
        OutputFormat::Table => {
            println!("{}", "Scenario Replay".bold());
            println!("{}", "=".repeat(60));
            println!("Scenario: {}", scenario.name.cyan());
            println!("Model:    {}", model_version.cyan());
            println!();

            if !summary_only {
                let rows: Vec<ReplayRow> = records.iter().map(ReplayRow::from).collect();
                print_table(rows, "Scenario has no ticks");
                println!();
            }
            print_summary(&summary);
        }
    }
    Ok(())
}

fn print_summary(summary: &ReplaySummary) {
    println!("{}", "Summary".bold());
    println!("  Ticks:       {}", summary.ticks);
    println!("  Handovers:   {}", summary.handovers.to_string().green());
    println!("  Applied:     {}", summary.applied);
    println!("  Skipped:     {}", summary.skipped);
    println!("  Fallen back: {}", summary.fallen_back);
    for (reason, count) in &summary.suppressed {
        println!("    suppressed {:<18} {}", reason, count);
    }
    for (reason, count) in &summary.fallbacks {
        println!("    fallback   {:<18} {}", reason, count);
    }
}

/// Check a scenario file without running it
pub fn validate_scenario(path: &str, format: OutputFormat) -> Result<()> {
    let scenario = Scenario::load(Path::new(path))?;
    let problems = scenario.validate();

    match format {
        OutputFormat::Json => {
            print_json(&serde_json::json!({
                "scenario": scenario.name,
                "valid": problems.is_empty(),
                "cells": scenario.cells.len(),
                "ues": scenario.ues.len(),
                "ticks": scenario.tick_count(),
                "problems": problems,
            }))?;
        }
        OutputFormat::Table => {
            print_info(&format!(
                "{}: {} cells, {} UEs, {} ticks",
                scenario.name,
                scenario.cells.len(),
                scenario.ues.len(),
                scenario.tick_count()
            ));
            if problems.is_empty() {
                print_success("Scenario is valid");
            } else {
                for problem in &problems {
                    print_error(problem);
                }
            }
        }
    }

    if !problems.is_empty() {
        anyhow::bail!("Scenario has {} problem(s)", problems.len());
    }
    Ok(())
}
