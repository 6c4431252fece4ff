//! Selector usage records and the HTML, JSON, text and CSV reports built
//! from them

use std::collections::BTreeMap;
use std::fmt::{self, Write as _};
use std::path::{Path, PathBuf};
use std::time::Duration;

use autoheal_core_types::LocatorStrategy;
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ReportingConfig;
use crate::errors::LocatorError;
use crate::types::LocatorResult;

const COST_PER_MILLION_TOKENS: f64 = 0.15;

/// How a reported lookup ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SelectorStrategy {
    OriginalSelector,
    Cached,
    DomAnalysis,
    VisualAnalysis,
    Failed,
}

impl SelectorStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectorStrategy::OriginalSelector => "ORIGINAL_SELECTOR",
            SelectorStrategy::Cached => "CACHED",
            SelectorStrategy::DomAnalysis => "DOM_ANALYSIS",
            SelectorStrategy::VisualAnalysis => "VISUAL_ANALYSIS",
            SelectorStrategy::Failed => "FAILED",
        }
    }

    /// Token estimate used when the provider reports no usage.
    pub fn estimated_tokens(&self) -> u64 {
        match self {
            SelectorStrategy::DomAnalysis => 1_500,
            SelectorStrategy::VisualAnalysis => 45_000,
            SelectorStrategy::OriginalSelector | SelectorStrategy::Cached | SelectorStrategy::Failed => 0,
        }
    }

    pub fn is_healed(&self) -> bool {
        matches!(
            self,
            SelectorStrategy::DomAnalysis | SelectorStrategy::VisualAnalysis
        )
    }
}

impl From<&LocatorResult> for SelectorStrategy {
    fn from(result: &LocatorResult) -> Self {
        match result.strategy {
            LocatorStrategy::OriginalSelector => SelectorStrategy::OriginalSelector,
            LocatorStrategy::Cached => SelectorStrategy::Cached,
            LocatorStrategy::DomAnalysis => SelectorStrategy::DomAnalysis,
            LocatorStrategy::VisualAnalysis => SelectorStrategy::VisualAnalysis,
            LocatorStrategy::Hybrid => match result.healed_by {
                Some(LocatorStrategy::VisualAnalysis) => SelectorStrategy::VisualAnalysis,
                _ => SelectorStrategy::DomAnalysis,
            },
        }
    }
}

impl fmt::Display for SelectorStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectorUsageRecord {
    pub timestamp: DateTime<Local>,
    pub original_selector: String,
    pub description: String,
    pub strategy: SelectorStrategy,
    pub execution_time_ms: u64,
    pub success: bool,
    pub actual_selector: Option<String>,
    pub element_details: Option<String>,
    pub reasoning: Option<String>,
    pub tokens_used: u64,
}

impl SelectorUsageRecord {
    pub fn success(original_selector: &str, description: &str, result: &LocatorResult) -> Self {
        let strategy = SelectorStrategy::from(result);
        Self {
            timestamp: Local::now(),
            original_selector: original_selector.to_string(),
            description: description.to_string(),
            strategy,
            execution_time_ms: result.execution_time.as_millis() as u64,
            success: true,
            actual_selector: Some(result.actual_selector.clone()),
            element_details: Some(result.element.describe()),
            reasoning: Some(result.reasoning.clone()),
            tokens_used: result
                .tokens_used
                .unwrap_or_else(|| strategy.estimated_tokens()),
        }
    }

    pub fn failure(
        original_selector: &str,
        description: &str,
        elapsed: Duration,
        error: &LocatorError,
    ) -> Self {
        Self {
            timestamp: Local::now(),
            original_selector: original_selector.to_string(),
            description: description.to_string(),
            strategy: SelectorStrategy::Failed,
            execution_time_ms: elapsed.as_millis() as u64,
            success: false,
            actual_selector: None,
            element_details: None,
            reasoning: Some(error.to_string()),
            tokens_used: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_selectors: u64,
    pub successful: u64,
    pub failed: u64,
    pub by_strategy: BTreeMap<SelectorStrategy, u64>,
    pub success_rate: f64,
    pub average_execution_ms: f64,
    pub total_tokens: u64,
    pub estimated_cost_usd: f64,
    pub healed: u64,
}

impl ReportSummary {
    pub fn from_records(records: &[SelectorUsageRecord]) -> Self {
        let mut summary = ReportSummary {
            total_selectors: records.len() as u64,
            ..Self::default()
        };
        let mut total_ms = 0u64;
        for record in records {
            *summary.by_strategy.entry(record.strategy).or_default() += 1;
            if record.success {
                summary.successful += 1;
            } else {
                summary.failed += 1;
            }
            if record.strategy.is_healed() {
                summary.healed += 1;
            }
            total_ms += record.execution_time_ms;
            summary.total_tokens += record.tokens_used;
        }
        if !records.is_empty() {
            summary.success_rate = summary.successful as f64 / records.len() as f64;
            summary.average_execution_ms = total_ms as f64 / records.len() as f64;
        }
        summary.estimated_cost_usd =
            summary.total_tokens as f64 * COST_PER_MILLION_TOKENS / 1_000_000.0;
        summary
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    generated_at: DateTime<Local>,
    summary: &'a ReportSummary,
    records: &'a [SelectorUsageRecord],
}

/// Collects one record per lookup and writes the enabled report formats.
pub struct AutoHealReporter {
    config: ReportingConfig,
    records: Mutex<Vec<SelectorUsageRecord>>,
}

impl AutoHealReporter {
    pub fn new(config: ReportingConfig) -> Self {
        Self {
            config,
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &ReportingConfig {
        &self.config
    }

    pub fn record(&self, record: SelectorUsageRecord) {
        debug!(
            selector = %record.original_selector,
            strategy = %record.strategy,
            success = record.success,
            "Recorded selector usage"
        );
        self.records.lock().push(record);
    }

    pub fn records(&self) -> Vec<SelectorUsageRecord> {
        self.records.lock().clone()
    }

    pub fn summary(&self) -> ReportSummary {
        ReportSummary::from_records(&self.records.lock())
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }

    /// Write every enabled format and return the files written.
    pub async fn generate_reports(&self) -> Result<Vec<PathBuf>, LocatorError> {
        let records = self.records();
        let summary = ReportSummary::from_records(&records);
        let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let directory = &self.config.output_directory;

        let mut outputs: Vec<(&str, String)> = Vec::new();
        if self.config.generate_html {
            outputs.push(("html", render_html(&summary, &records)));
        }
        if self.config.generate_json {
            outputs.push(("json", render_json(&summary, &records)?));
        }
        if self.config.generate_text {
            outputs.push(("txt", render_text(&summary, &records)));
        }
        if self.config.generate_csv {
            outputs.push(("csv", render_csv(&records)?));
        }

        let mut written = Vec::new();
        if !outputs.is_empty() {
            tokio::fs::create_dir_all(directory).await.map_err(|err| {
                LocatorError::Report(format!(
                    "failed to create {}: {err}",
                    directory.display()
                ))
            })?;
        }
        for (extension, content) in outputs {
            let path = report_path(directory, &self.config.report_name_prefix, &stamp, extension);
            tokio::fs::write(&path, content).await.map_err(|err| {
                LocatorError::Report(format!("failed to write {}: {err}", path.display()))
            })?;
            info!(path = %path.display(), "Wrote AutoHeal report");
            written.push(path);
        }

        if self.config.console_logging {
            log_summary(&summary);
        }
        Ok(written)
    }
}

fn report_path(directory: &Path, prefix: &str, stamp: &str, extension: &str) -> PathBuf {
    directory.join(format!("{prefix}_{stamp}.{extension}"))
}

fn log_summary(summary: &ReportSummary) {
    info!(
        total = summary.total_selectors,
        successful = summary.successful,
        failed = summary.failed,
        healed = summary.healed,
        success_rate = format!("{:.1}%", summary.success_rate * 100.0),
        avg_ms = format!("{:.1}", summary.average_execution_ms),
        tokens = summary.total_tokens,
        cost_usd = format!("{:.4}", summary.estimated_cost_usd),
        "AutoHeal report summary"
    );
    for (strategy, count) in &summary.by_strategy {
        info!(strategy = %strategy, count, "AutoHeal strategy usage");
    }
}

pub(crate) fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

fn render_html(summary: &ReportSummary, records: &[SelectorUsageRecord]) -> String {
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str("<title>AutoHeal Locator Report</title>\n<style>\n");
    html.push_str(
        "body{font-family:sans-serif;margin:2em}table{border-collapse:collapse;width:100%}\
         th,td{border:1px solid #ccc;padding:4px 8px;text-align:left}th{background:#f0f0f0}\
         .success{color:#2e7d32}.failure{color:#c62828}\n",
    );
    html.push_str("</style>\n</head>\n<body>\n<h1>AutoHeal Locator Report</h1>\n");

    html.push_str("<h2>Summary</h2>\n<table>\n");
    let rows = [
        ("Total selectors", summary.total_selectors.to_string()),
        ("Successful", summary.successful.to_string()),
        ("Failed", summary.failed.to_string()),
        ("Healed by AI", summary.healed.to_string()),
        ("Success rate", format!("{:.1}%", summary.success_rate * 100.0)),
        ("Average time", format!("{:.1} ms", summary.average_execution_ms)),
        ("Total tokens", summary.total_tokens.to_string()),
        ("Estimated cost", format!("${:.4}", summary.estimated_cost_usd)),
    ];
    for (label, value) in rows {
        let _ = writeln!(html, "<tr><th>{label}</th><td>{value}</td></tr>");
    }
    for (strategy, count) in &summary.by_strategy {
        let _ = writeln!(html, "<tr><th>{strategy}</th><td>{count}</td></tr>");
    }
    html.push_str("</table>\n");

    html.push_str("<h2>Selectors</h2>\n<table>\n<tr><th>Time</th><th>Original selector</th>\
                   <th>Description</th><th>Strategy</th><th>Actual selector</th><th>Result</th>\
                   <th>Time (ms)</th><th>Tokens</th><th>Reasoning</th></tr>\n");
    for record in records {
        let (class, label) = if record.success {
            ("success", "Success")
        } else {
            ("failure", "Failed")
        };
        let _ = writeln!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td>\
             <td class='{class}'>{label}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            record.timestamp.format("%Y-%m-%d %H:%M:%S"),
            escape_html(&record.original_selector),
            escape_html(&record.description),
            record.strategy,
            escape_html(record.actual_selector.as_deref().unwrap_or("-")),
            record.execution_time_ms,
            record.tokens_used,
            escape_html(record.reasoning.as_deref().unwrap_or("")),
        );
    }
    html.push_str("</table>\n</body>\n</html>\n");
    html
}

fn render_json(summary: &ReportSummary, records: &[SelectorUsageRecord]) -> Result<String, LocatorError> {
    let report = JsonReport {
        generated_at: Local::now(),
        summary,
        records,
    };
    serde_json::to_string_pretty(&report)
        .map_err(|err| LocatorError::Report(format!("failed to encode JSON report: {err}")))
}

fn render_text(summary: &ReportSummary, records: &[SelectorUsageRecord]) -> String {
    let mut text = String::new();
    let rule = "=".repeat(60);
    let _ = writeln!(text, "{rule}\nAUTOHEAL LOCATOR REPORT\n{rule}");
    let _ = writeln!(text, "Total selectors: {}", summary.total_selectors);
    let _ = writeln!(text, "Successful:      {}", summary.successful);
    let _ = writeln!(text, "Failed:          {}", summary.failed);
    let _ = writeln!(text, "Healed by AI:    {}", summary.healed);
    let _ = writeln!(text, "Success rate:    {:.1}%", summary.success_rate * 100.0);
    let _ = writeln!(text, "Average time:    {:.1} ms", summary.average_execution_ms);
    let _ = writeln!(text, "Total tokens:    {}", summary.total_tokens);
    let _ = writeln!(text, "Estimated cost:  ${:.4}", summary.estimated_cost_usd);
    text.push_str("\nStrategy usage:\n");
    for (strategy, count) in &summary.by_strategy {
        let _ = writeln!(text, "  {strategy:<18} {count}");
    }
    text.push_str("\nSelectors:\n");
    for record in records {
        let _ = writeln!(
            text,
            "[{}] {} '{}' ({}) -> {} in {} ms",
            record.timestamp.format("%H:%M:%S"),
            if record.success { "OK  " } else { "FAIL" },
            record.original_selector,
            record.description,
            record.actual_selector.as_deref().unwrap_or("-"),
            record.execution_time_ms,
        );
        let _ = writeln!(text, "       strategy {} tokens {}", record.strategy, record.tokens_used);
    }
    text
}

#[derive(Serialize)]
struct CsvRow<'a> {
    timestamp: String,
    original_selector: &'a str,
    description: &'a str,
    strategy: &'static str,
    success: bool,
    actual_selector: &'a str,
    execution_time_ms: u64,
    tokens_used: u64,
    element_details: &'a str,
    reasoning: &'a str,
}

fn render_csv(records: &[SelectorUsageRecord]) -> Result<String, LocatorError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for record in records {
        writer
            .serialize(CsvRow {
                timestamp: record.timestamp.to_rfc3339(),
                original_selector: &record.original_selector,
                description: &record.description,
                strategy: record.strategy.as_str(),
                success: record.success,
                actual_selector: record.actual_selector.as_deref().unwrap_or(""),
                execution_time_ms: record.execution_time_ms,
                tokens_used: record.tokens_used,
                element_details: record.element_details.as_deref().unwrap_or(""),
                reasoning: record.reasoning.as_deref().unwrap_or(""),
            })
            .map_err(|err| LocatorError::Report(format!("failed to encode CSV row: {err}")))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| LocatorError::Report(format!("failed to flush CSV report: {err}")))?;
    String::from_utf8(bytes).map_err(|err| LocatorError::Report(format!("CSV report is not UTF-8: {err}")))
}

#[cfg(test)]
mod tests {
    use autoheal_core_types::WebElement;

    use super::*;

    fn healed(strategy: LocatorStrategy, healed_by: Option<LocatorStrategy>, tokens: Option<u64>) -> LocatorResult {
        let mut result = LocatorResult::new(
            WebElement::new("e1", "button").with_attribute("id", "login"),
            "#login",
            strategy,
        )
        .with_execution_time(Duration::from_millis(40))
        .with_reasoning("found <button>")
        .with_tokens(tokens);
        result.healed_by = healed_by;
        result
    }

    #[test]
    fn test_strategy_mapping_and_tokens() {
        let hybrid_visual = healed(
            LocatorStrategy::Hybrid,
            Some(LocatorStrategy::VisualAnalysis),
            None,
        );
        let record = SelectorUsageRecord::success("#old", "login", &hybrid_visual);
        assert_eq!(record.strategy, SelectorStrategy::VisualAnalysis);
        assert_eq!(record.tokens_used, 45_000);
        assert_eq!(record.element_details.as_deref(), Some("button#login.null"));

        let hybrid_unknown = healed(LocatorStrategy::Hybrid, None, Some(321));
        let record = SelectorUsageRecord::success("#old", "login", &hybrid_unknown);
        assert_eq!(record.strategy, SelectorStrategy::DomAnalysis);
        assert_eq!(record.tokens_used, 321);

        let original = healed(LocatorStrategy::OriginalSelector, None, None);
        assert_eq!(SelectorUsageRecord::success("#old", "login", &original).tokens_used, 0);
    }

    #[test]
    fn test_summary() {
        let records = vec![
            SelectorUsageRecord::success("#a", "a", &healed(LocatorStrategy::OriginalSelector, None, None)),
            SelectorUsageRecord::success("#b", "b", &healed(LocatorStrategy::DomAnalysis, None, None)),
            SelectorUsageRecord::failure(
                "#c",
                "c",
                Duration::from_millis(100),
                &LocatorError::ElementNotFound("c".into()),
            ),
        ];
        let summary = ReportSummary::from_records(&records);
        assert_eq!(summary.total_selectors, 3);
        assert_eq!(summary.successful, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.healed, 1);
        assert_eq!(summary.total_tokens, 1_500);
        assert_eq!(summary.average_execution_ms, 60.0);
        assert!((summary.estimated_cost_usd - 0.000225).abs() < 1e-12);
        assert_eq!(summary.by_strategy[&SelectorStrategy::Failed], 1);
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html("a[title=\"x\"] > b & 'c'"),
            "a[title=&quot;x&quot;] &gt; b &amp; &#39;c&#39;"
        );
    }

    #[tokio::test]
    async fn test_generate_all_formats() {
        let dir = tempfile::tempdir().unwrap();
        let config = ReportingConfig {
            generate_csv: true,
            report_name_prefix: "Run".to_string(),
            ..ReportingConfig::enabled_in(dir.path().join("reports"))
        };
        let reporter = AutoHealReporter::new(config);
        reporter.record(SelectorUsageRecord::success(
            "#old",
            "login <button>",
            &healed(LocatorStrategy::DomAnalysis, None, Some(900)),
        ));

        let files = reporter.generate_reports().await.unwrap();
        let extensions: Vec<String> = files
            .iter()
            .map(|p| p.extension().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(extensions, vec!["html", "json", "txt", "csv"]);
        for file in &files {
            let name = file.file_name().unwrap().to_string_lossy();
            assert!(name.starts_with("Run_"), "{name}");
        }

        let html = std::fs::read_to_string(&files[0]).unwrap();
        assert!(html.contains("login &lt;button&gt;"));

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&files[1]).unwrap()).unwrap();
        assert_eq!(json["summary"]["total_tokens"], 900);
        assert_eq!(json["records"][0]["strategy"], "DOM_ANALYSIS");

        let csv = std::fs::read_to_string(&files[3]).unwrap();
        let mut lines = csv.lines();
        assert!(lines.next().unwrap().starts_with("timestamp,original_selector"));
        assert_eq!(lines.count(), 1);
    }

    #[tokio::test]
    async fn test_nothing_enabled_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = ReportingConfig {
            generate_html: false,
            generate_json: false,
            generate_text: false,
            generate_csv: false,
            console_logging: false,
            ..ReportingConfig::enabled_in(dir.path().join("none"))
        };
        let files = AutoHealReporter::new(config).generate_reports().await.unwrap();
        assert!(files.is_empty());
        assert!(!dir.path().join("none").exists());
    }
}
