//! Confidence threshold table

use anyhow::Result;
use handover_lib::{predictor::required_confidence, MAX_PRIORITY, MIN_PRIORITY};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{format_confidence, print_json, print_table, OutputFormat};

#[derive(Debug, Serialize, Tabled)]
struct ThresholdRow {
    #[tabled(rename = "Priority")]
    priority: u8,
    #[tabled(rename = "Required")]
    #[tabled(display_with = "display_confidence")]
    required_confidence: f64,
}

fn display_confidence(value: &f64) -> String {
    format_confidence(*value)
}

fn rows(priority: Option<u8>) -> Result<Vec<ThresholdRow>> {
    let priorities: Vec<u8> = match priority {
        Some(p) if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&p) => {
            anyhow::bail!("Priority must be within {}..={}", MIN_PRIORITY, MAX_PRIORITY)
        }
        Some(p) => vec![p],
        None => (MIN_PRIORITY..=MAX_PRIORITY).collect(),
    };
    Ok(priorities
        .into_iter()
        .map(|priority| ThresholdRow {
            priority,
            required_confidence: required_confidence(priority),
        })
        .collect())
}

/// Show the predictor confidence required at each service priority
pub fn show_thresholds(priority: Option<u8>, format: OutputFormat) -> Result<()> {
    let rows = rows(priority)?;
    match format {
        OutputFormat::Json => print_json(&rows)?,
        OutputFormat::Table => print_table(rows, "No priorities selected"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_table() {
        let rows = rows(None).unwrap();
        assert_eq!(rows.len(), 10);
        assert!((rows[0].required_confidence - 0.5).abs() < 1e-9);
        assert!((rows[9].required_confidence - 0.95).abs() < 1e-9);
    }

    #[test]
    fn test_out_of_range_priority() {
        assert!(rows(Some(0)).is_err());
        assert!(rows(Some(11)).is_err());
        assert_eq!(rows(Some(5)).unwrap().len(), 1);
    }
}
