// Tests for report generation functionality

use std::path::Path;
use tilescout_core::ProductRecord;
use tilescout_core::report::{
    ReportFormat, generate_csv_report, generate_enriched_report, generate_json_report,
    generate_report, generate_text_report, save_report, summary_line,
};
use tilescout_core::scrape::{PageSummary, RunMode, ScrapeOutcome};
use tilescout_scanner::{Saturation, StopReason};

fn laptop() -> ProductRecord {
    ProductRecord {
        code: "1829374".to_string(),
        title: "Lenovo IdeaPad 5, 16GB".to_string(),
        price: "899,00 €".to_string(),
        availability: "Άμεσα Διαθέσιμο".to_string(),
        specs: "16GB RAM 512GB SSD".to_string(),
        image: "https://cdn.public.gr/1829374.webp".to_string(),
        link: "https://www.public.gr/p/lenovo-ideapad-5/1829374".to_string(),
    }
}

fn outcome(records: Vec<ProductRecord>) -> ScrapeOutcome {
    let url = "https://www.public.gr/cat/computers/laptops".to_string();
    ScrapeOutcome {
        start_url: url.clone(),
        mode: RunMode::SinglePage,
        targets: vec![url.clone()],
        pages: vec![PageSummary {
            url,
            records: records.len(),
            saturation: Some(Saturation {
                steps: 3,
                clicks: 2,
                scrolls: 0,
                reason: StopReason::Exhausted,
            }),
        }],
        records,
        enriched: None,
        cancelled: false,
    }
}

// ============================================================================
// Report Format Tests
// ============================================================================

#[test]
fn test_report_format_from_str() {
    assert_eq!(ReportFormat::from_str("text"), Some(ReportFormat::Text));
    assert_eq!(ReportFormat::from_str("JSON"), Some(ReportFormat::Json));
    assert_eq!(ReportFormat::from_str("Csv"), Some(ReportFormat::Csv));
    assert_eq!(ReportFormat::from_str("xlsx"), None);
}

#[test]
fn test_report_format_from_path() {
    assert_eq!(
        ReportFormat::from_path(Path::new("out/products.csv")),
        Some(ReportFormat::Csv)
    );
    assert_eq!(
        ReportFormat::from_path(Path::new("products.json")),
        Some(ReportFormat::Json)
    );
    assert_eq!(ReportFormat::from_path(Path::new("products")), None);
}

// ============================================================================
// CSV Tests
// ============================================================================

#[test]
fn test_csv_header_order() {
    let csv = generate_csv_report(&[]).unwrap();
    assert_eq!(csv, "code,title,price,availability,specs,image,link\n");
}

#[test]
fn test_csv_quotes_commas() {
    let csv = generate_csv_report(&[laptop()]).unwrap();
    let mut lines = csv.lines();

    assert_eq!(lines.next(), Some("code,title,price,availability,specs,image,link"));
    assert_eq!(
        lines.next(),
        Some(
            "1829374,\"Lenovo IdeaPad 5, 16GB\",\"899,00 €\",Άμεσα Διαθέσιμο,16GB RAM 512GB SSD,\
             https://cdn.public.gr/1829374.webp,https://www.public.gr/p/lenovo-ideapad-5/1829374"
        )
    );
    assert_eq!(lines.next(), None);
}

#[test]
fn test_csv_keeps_empty_fields() {
    let mut record = laptop();
    record.price.clear();
    record.image.clear();

    let csv = generate_csv_report(&[record]).unwrap();
    let row = csv.lines().nth(1).unwrap();

    assert!(row.starts_with("1829374,\"Lenovo IdeaPad 5, 16GB\",,"));
    assert!(row.contains("SSD,,https://"));
}

// ============================================================================
// JSON Tests
// ============================================================================

#[test]
fn test_json_is_record_array() {
    let json = generate_json_report(&[laptop(), ProductRecord::default()]).unwrap();
    let parsed: Vec<ProductRecord> = serde_json::from_str(&json).unwrap();

    assert_eq!(parsed.len(), 2);
    assert_eq!(parsed[0], laptop());
    assert!(json.contains("\"availability\": \"Άμεσα Διαθέσιμο\""));
}

// ============================================================================
// Text Report Tests
// ============================================================================

#[test]
fn test_text_report_summary() {
    let report = generate_text_report(&outcome(vec![laptop()]));

    assert!(report.contains("TILESCOUT SCRAPE REPORT"));
    assert!(report.contains("Mode:         single-page"));
    assert!(report.contains("Records:      1"));
    assert!(report.contains("/cat/computers/laptops  (2 clicks, 0 scrolls)"));
    assert!(report.contains("Άμεσα Διαθέσιμο"));
    assert!(!report.contains("stopped early"));
}

#[test]
fn test_text_report_without_pages() {
    let mut empty = outcome(Vec::new());
    empty.pages.clear();
    empty.cancelled = true;

    let report = generate_text_report(&empty);

    assert!(report.contains("No listing pages found."));
    assert!(report.contains("stopped early"));
    assert!(!report.contains("AVAILABILITY"));
}

#[test]
fn test_generate_report_dispatch() {
    let outcome = outcome(vec![laptop()]);

    let csv = generate_report(&outcome, ReportFormat::Csv).unwrap();
    let json = generate_report(&outcome, ReportFormat::Json).unwrap();

    assert!(csv.starts_with("code,title"));
    assert!(json.trim_start().starts_with('['));
    assert_eq!(summary_line(&outcome), "1 records from 1 listing pages");
}

#[test]
fn test_enriched_snapshot_is_rendered_separately() {
    let mut bare = laptop();
    bare.availability.clear();
    bare.specs.clear();
    let mut outcome = outcome(vec![bare]);

    assert!(
        generate_enriched_report(&outcome, ReportFormat::Csv)
            .unwrap()
            .is_none()
    );

    outcome.enriched = Some(vec![laptop()]);
    let primary = generate_report(&outcome, ReportFormat::Csv).unwrap();
    let enriched = generate_enriched_report(&outcome, ReportFormat::Csv)
        .unwrap()
        .unwrap();

    assert!(!primary.contains("16GB RAM 512GB SSD"));
    assert!(enriched.contains("16GB RAM 512GB SSD"));

    let text = generate_enriched_report(&outcome, ReportFormat::Text)
        .unwrap()
        .unwrap();
    assert!(text.contains("Details:      enriched from product pages"));
    assert!(text.contains("Άμεσα Διαθέσιμο"));
}

#[test]
fn test_text_report_marks_stalled_pages() {
    let mut outcome = outcome(vec![laptop()]);
    if let Some(saturation) = outcome.pages[0].saturation.as_mut() {
        saturation.reason = StopReason::Stalled;
    }

    let report = generate_text_report(&outcome);

    assert!(report.contains("(2 clicks, 0 scrolls, scrolling failed)"));
}

// ============================================================================
// File Output Tests
// ============================================================================

#[test]
fn test_save_report() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("products.csv");

    let csv = generate_csv_report(&[laptop()]).unwrap();
    save_report(&csv, &path).unwrap();

    assert_eq!(std::fs::read_to_string(&path).unwrap(), csv);
}
