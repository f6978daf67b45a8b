//! Report rendering
//!
//! Produces the exported report as strings: a JSON object
//! `{createdAt, summary, results[]}` and a flattened CSV with a
//! `summary_*` key/value preamble, an energy-sample section, and a
//! tabular result section. Writing the strings to disk stays with the
//! caller.

use std::fmt::Write as _;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::bench::{PromptResult, RunReport, RunSummary};
use crate::error::Result;

#[derive(Serialize)]
struct JsonReport<'a> {
    #[serde(rename = "createdAt")]
    created_at: &'a str,
    summary: &'a RunSummary,
    results: &'a [PromptResult],
}

/// Seconds since the Unix epoch, for `createdAt` stamps
#[must_use]
pub fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Render a run report as pretty-printed JSON
///
/// # Errors
/// Returns [`crate::MedirError::Serialization`] if serialization fails.
pub fn render_json(report: &RunReport, created_at: &str) -> Result<String> {
    let json = JsonReport {
        created_at,
        summary: &report.summary,
        results: &report.results,
    };
    Ok(serde_json::to_string_pretty(&json)?)
}

/// Render a run report as flattened CSV
///
/// Three sections separated by blank lines: a `summary_*` key/value
/// preamble, the energy samples, and the per-prompt result table. The
/// completion column is always quoted, with internal quotes doubled.
#[must_use]
pub fn render_csv(report: &RunReport) -> String {
    let mut out = String::new();
    let summary = &report.summary;

    let _ = writeln!(out, "summary_totalPrompts,{}", summary.total_prompts);
    let _ = writeln!(out, "summary_avgTtftMs,{:.2}", summary.ttft_ms.average);
    let _ = writeln!(out, "summary_p50TtftMs,{:.2}", summary.ttft_ms.p50);
    let _ = writeln!(out, "summary_p95TtftMs,{:.2}", summary.ttft_ms.p95);
    let _ = writeln!(out, "summary_avgGenMs,{:.2}", summary.generation_ms.average);
    let _ = writeln!(out, "summary_p50GenMs,{:.2}", summary.generation_ms.p50);
    let _ = writeln!(out, "summary_p95GenMs,{:.2}", summary.generation_ms.p95);
    let _ = writeln!(out, "summary_totalPromptTokens,{}", summary.total_prompt_tokens);
    let _ = writeln!(
        out,
        "summary_totalCompletionTokens,{}",
        summary.total_completion_tokens
    );
    let _ = writeln!(out, "summary_tokensPerSecond,{:.2}", summary.tokens_per_second);
    let _ = writeln!(
        out,
        "summary_classificationAccuracy,{:.4}",
        summary.classification_accuracy
    );
    let _ = writeln!(out, "summary_totalEnergyMj,{:.2}", summary.total_energy_mj);
    let _ = writeln!(out, "summary_peakMemoryBytes,{}", summary.peak_memory_bytes);
    let _ = writeln!(out, "summary_cpuTimeS,{:.3}", summary.cpu_time_s);
    let _ = writeln!(out, "summary_wallTimeS,{:.3}", summary.wall_time_s);

    out.push('\n');
    out.push_str("timestamp_seconds,thermalState,energy_mJ\n");
    for sample in &report.energy_samples {
        let _ = writeln!(
            out,
            "{:.3},{},{:.2}",
            sample.timestamp_s,
            sample.thermal.as_str(),
            sample.cumulative_mj
        );
    }

    out.push('\n');
    out.push_str(
        "id,category,modelID,ttftMs,genMs,promptTokens,completionTokens,tps,\
         expectedCategory,classificationAccuracy,completion\n",
    );
    for result in &report.results {
        let _ = writeln!(
            out,
            "{},{},{},{},{},{},{},{:.2},{},{},{}",
            result.id,
            result.category,
            result.model_id,
            result.ttft_ms,
            result.generation_ms,
            result.prompt_tokens,
            result.completion_tokens,
            result.tokens_per_second,
            result.expected_category,
            result.category_matched,
            csv_quote(&result.completion)
        );
    }
    out
}

/// Quote a CSV field, doubling internal quotes
fn csv_quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::RunSummary;
    use crate::catalog::CategoryLabel;
    use crate::energy::{EnergySample, ThermalState};
    use crate::stats::QuantileSummary;

    fn sample_report() -> RunReport {
        RunReport {
            summary: RunSummary {
                total_prompts: 1,
                ttft_ms: QuantileSummary {
                    average: 12.0,
                    p50: 12.0,
                    p95: 12.0,
                },
                generation_ms: QuantileSummary {
                    average: 340.0,
                    p50: 340.0,
                    p95: 340.0,
                },
                total_prompt_tokens: 5,
                total_completion_tokens: 42,
                tokens_per_second: 123.5,
                classification_accuracy: 1.0,
                total_energy_mj: 88.25,
                peak_memory_bytes: 1024,
                cpu_time_s: 0.5,
                wall_time_s: 1.25,
            },
            results: vec![PromptResult {
                id: 1,
                category: CategoryLabel::Factual,
                model_id: "M1".to_string(),
                ttft_ms: 12,
                generation_ms: 340,
                prompt_tokens: 5,
                completion_tokens: 42,
                tokens_per_second: 123.5,
                completion: "He said \"hello\", twice".to_string(),
                expected_category: CategoryLabel::Factual,
                category_matched: true,
            }],
            log: vec!["run complete: 1 results".to_string()],
            energy_samples: vec![
                EnergySample {
                    timestamp_s: 0.0,
                    cumulative_mj: 0.0,
                    thermal: ThermalState::Nominal,
                },
                EnergySample {
                    timestamp_s: 1.5,
                    cumulative_mj: 88.25,
                    thermal: ThermalState::Fair,
                },
            ],
        }
    }

    #[test]
    fn test_json_report_shape() {
        let json = render_json(&sample_report(), "1754556000").unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["createdAt"], "1754556000");
        assert_eq!(value["summary"]["total_prompts"], 1);
        assert_eq!(value["results"][0]["id"], 1);
        assert_eq!(value["results"][0]["category"], "factual");
    }

    #[test]
    fn test_csv_sections_and_preamble() {
        let csv = render_csv(&sample_report());
        assert!(csv.starts_with("summary_totalPrompts,1\n"));
        assert!(csv.contains("summary_classificationAccuracy,1.0000"));
        assert!(csv.contains("timestamp_seconds,thermalState,energy_mJ"));
        assert!(csv.contains("0.000,nominal,0.00"));
        assert!(csv.contains("1.500,fair,88.25"));
        assert!(csv.contains("expectedCategory,classificationAccuracy,completion"));
        // Sections separated by blank lines
        assert_eq!(csv.matches("\n\n").count(), 2);
    }

    #[test]
    fn test_csv_completion_quoting_doubles_internal_quotes() {
        let csv = render_csv(&sample_report());
        assert!(csv.contains("\"He said \"\"hello\"\", twice\""));
    }

    #[test]
    fn test_csv_result_row_fields() {
        let csv = render_csv(&sample_report());
        let row = csv
            .lines()
            .find(|l| l.starts_with("1,factual,M1,"))
            .expect("result row present");
        assert!(row.contains(",12,340,5,42,123.50,factual,true,"));
    }

    #[test]
    fn test_unix_timestamp_is_sane() {
        // After 2020-01-01 and monotone-ish.
        assert!(unix_timestamp() > 1_577_836_800);
    }
}
