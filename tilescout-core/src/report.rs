// Report generation from scrape outcomes

use crate::error::Result;
use crate::scrape::ScrapeOutcome;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tilescout_scanner::{ProductRecord, StopReason};
use tilescout_scanner::normalize::extract_url_path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Json,
    Csv,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            "csv" => Some(ReportFormat::Csv),
            _ => None,
        }
    }

    /// Guess the format from an output file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_str)
    }
}

/// Render `outcome` in the requested format.
pub fn generate_report(outcome: &ScrapeOutcome, format: ReportFormat) -> Result<String> {
    render(outcome, &outcome.records, format, false)
}

/// Same as [`generate_report`] over the enriched snapshot, if there is one.
pub fn generate_enriched_report(
    outcome: &ScrapeOutcome,
    format: ReportFormat,
) -> Result<Option<String>> {
    outcome
        .enriched
        .as_deref()
        .map(|records| render(outcome, records, format, true))
        .transpose()
}

fn render(
    outcome: &ScrapeOutcome,
    records: &[ProductRecord],
    format: ReportFormat,
    enriched: bool,
) -> Result<String> {
    Ok(match format {
        ReportFormat::Text => text_report(outcome, records, enriched),
        ReportFormat::Json => generate_json_report(records)?,
        ReportFormat::Csv => generate_csv_report(records)?,
    })
}

/// Pretty-printed JSON array of records.
pub fn generate_json_report(
    records: &[ProductRecord],
) -> std::result::Result<String, serde_json::Error> {
    serde_json::to_string_pretty(records)
}

/// CSV with a fixed header row, written even when there are no records.
pub fn generate_csv_report(records: &[ProductRecord]) -> std::result::Result<String, csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    writer.write_record(ProductRecord::FIELDS)?;
    for record in records {
        writer.serialize(record)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

pub fn generate_text_report(outcome: &ScrapeOutcome) -> String {
    text_report(outcome, &outcome.records, false)
}

fn text_report(outcome: &ScrapeOutcome, records: &[ProductRecord], enriched: bool) -> String {
    let rule = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";
    let mut report = String::new();

    report.push_str(rule);
    report.push_str("                          TILESCOUT SCRAPE REPORT\n");
    report.push_str(rule);
    report.push('\n');

    report.push_str(&format!("Start URL:    {}\n", outcome.start_url));
    report.push_str(&format!("Mode:         {}\n", outcome.mode.as_str()));
    report.push_str(&format!(
        "Generated:    {}\n",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    ));
    report.push_str(&format!("Pages:        {}\n", outcome.pages.len()));
    report.push_str(&format!("Records:      {}\n", records.len()));
    if enriched {
        report.push_str("Details:      enriched from product pages\n");
    }

    let incomplete = records
        .iter()
        .filter(|r| r.price.is_empty() || r.missing_details())
        .count();
    report.push_str(&format!("Incomplete:   {}\n", incomplete));

    if outcome.cancelled {
        report.push_str("Status:       stopped early (run budget exhausted)\n");
    }
    report.push('\n');

    report.push_str(rule);
    report.push_str("CATEGORIES\n");
    report.push_str(rule);
    report.push('\n');

    if outcome.pages.is_empty() {
        report.push_str("  No listing pages found.\n");
    }

    for page in &outcome.pages {
        let status = match page.saturation {
            Some(ref saturation) if saturation.reason == StopReason::Stalled => format!(
                "{} clicks, {} scrolls, scrolling failed",
                saturation.clicks, saturation.scrolls
            ),
            Some(ref saturation) => format!(
                "{} clicks, {} scrolls",
                saturation.clicks, saturation.scrolls
            ),
            None => "failed".to_string(),
        };
        report.push_str(&format!(
            "  {:>5}  {}  ({})\n",
            page.records,
            extract_url_path(&page.url),
            status
        ));
    }
    report.push('\n');

    let by_availability = availability_breakdown(records);
    if !by_availability.is_empty() {
        report.push_str(rule);
        report.push_str("AVAILABILITY\n");
        report.push_str(rule);
        report.push('\n');
        for (status, count) in by_availability {
            report.push_str(&format!("  {:>5}  {}\n", count, status));
        }
        report.push('\n');
    }

    report
}

/// One-line summary for the end of a run.
pub fn summary_line(outcome: &ScrapeOutcome) -> String {
    format!(
        "{} records from {} listing pages",
        outcome.records.len(),
        outcome.pages.len()
    )
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

fn availability_breakdown(records: &[ProductRecord]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for record in records {
        let status = if record.availability.is_empty() {
            "(unknown)".to_string()
        } else {
            record.availability.clone()
        };
        *counts.entry(status).or_insert(0) += 1;
    }
    counts
}
