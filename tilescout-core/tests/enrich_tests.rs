// Tests for detail-page enrichment

use std::sync::Arc;
use std::time::Duration;
use tilescout_core::enrich::{DetailEnricher, DetailFields};
use tilescout_core::{ProductRecord, SiteProfile};
use tilescout_scanner::fake::{FakeDriver, FakePage};

const DETAIL: &str = "https://www.public.gr/p/lenovo-ideapad/1829374";

fn detail_page(availability: &str, specs: &[&str]) -> String {
    let items: String = specs
        .iter()
        .map(|s| format!(r#"<div class="spec-item">{}</div>"#, s))
        .collect();
    format!(
        r#"<app-product-page-availability>
            <span class="mdc-typography--subtitle2 mdc-typography--bold">{}</span>
        </app-product-page-availability>
        <section class="product__specifications"><div class="specs-table">{}</div></section>"#,
        availability, items
    )
}

fn enricher(driver: &FakeDriver) -> DetailEnricher<FakeDriver> {
    DetailEnricher::new(Arc::new(driver.clone()), &SiteProfile::default())
        .unwrap()
        .with_settle(Duration::ZERO)
}

fn record(link: &str) -> ProductRecord {
    ProductRecord::new("Lenovo IdeaPad".to_string(), link.to_string())
}

// ============================================================================
// Detail Parsing Tests
// ============================================================================

#[test]
fn test_read_details_joins_spec_items() {
    let enricher = enricher(&FakeDriver::new());

    let details = enricher.read_details(&detail_page(
        "Άμεσα Διαθέσιμο",
        &["Οθόνη:  15.6\"", "  ", "RAM: 16GB"],
    ));

    assert_eq!(
        details,
        DetailFields {
            availability: "Άμεσα Διαθέσιμο".to_string(),
            specs: "Οθόνη: 15.6\"; RAM: 16GB".to_string(),
        }
    );
}

#[test]
fn test_read_details_separates_label_and_value_blocks() {
    let enricher = enricher(&FakeDriver::new());

    let details = enricher.read_details(&detail_page(
        "Άμεσα Διαθέσιμο",
        &["<div>Επεξεργαστής</div><div>Intel Core i7</div>", "<p>RAM</p><p>16GB</p>"],
    ));

    assert_eq!(details.specs, "Επεξεργαστής Intel Core i7; RAM 16GB");
}

#[test]
fn test_read_details_on_unrelated_page() {
    let enricher = enricher(&FakeDriver::new());

    let details = enricher.read_details("<html><body><h1>404</h1></body></html>");

    assert_eq!(details, DetailFields::default());
}

// ============================================================================
// Enrichment Pass Tests
// ============================================================================

#[tokio::test]
async fn test_enrich_returns_copies_and_keeps_input() {
    let driver = FakeDriver::new().with_page(DETAIL, FakePage::new(detail_page("Εξαντλημένο", &["SSD: 512GB"])));
    let records = vec![record(DETAIL)];

    let enriched = enricher(&driver).enrich(&records).await;

    assert_eq!(enriched.len(), 1);
    assert_eq!(enriched[0].availability, "Εξαντλημένο");
    assert_eq!(enriched[0].specs, "SSD: 512GB");
    assert!(records[0].availability.is_empty());
    assert!(records[0].specs.is_empty());
}

#[tokio::test]
async fn test_enrich_only_fills_empty_fields() {
    let driver = FakeDriver::new().with_page(DETAIL, FakePage::new(detail_page("Εξαντλημένο", &["SSD: 512GB"])));
    let mut partial = record(DETAIL);
    partial.availability = "Άμεσα Διαθέσιμο".to_string();

    let enriched = enricher(&driver).enrich(&[partial]).await;

    assert_eq!(enriched[0].availability, "Άμεσα Διαθέσιμο");
    assert_eq!(enriched[0].specs, "SSD: 512GB");
}

#[tokio::test]
async fn test_complete_records_are_not_visited() {
    let driver = FakeDriver::new();
    let mut complete = record(DETAIL);
    complete.availability = "Άμεσα Διαθέσιμο".to_string();
    complete.specs = "RAM: 8GB".to_string();

    let enriched = enricher(&driver).enrich(std::slice::from_ref(&complete)).await;

    assert_eq!(enriched, vec![complete]);
    assert_eq!(driver.sessions_opened(), 0);
}

#[tokio::test]
async fn test_navigation_failure_leaves_record_unchanged() {
    let driver = FakeDriver::new().with_page(DETAIL, FakePage::unreachable());
    let records = vec![record(DETAIL), ProductRecord::default()];

    let enriched = enricher(&driver).with_workers(2).enrich(&records).await;

    assert_eq!(enriched, records);
    assert_eq!(driver.navigations(), vec![DETAIL.to_string()]);
}
