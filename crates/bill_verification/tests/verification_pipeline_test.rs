// End-to-end verification tests
// Rate sheets on disk, an offline embedder, and full bills walked through
// hospital, category, and item matching into the financial summary.

use std::sync::Arc;

use bill_core_models::{
    BillInput, BillInputCategory, BillInputItem, FailureReason, VerificationStatus,
};
use bill_verification::rate_sheets::RateSheetStore;
use bill_verification::test_support::HashedBagEmbedder;
use bill_verification::{Verifier, VerifierConfig};

const CITY_CARE_SHEET: &str = r#"{
    "hospital_name": "City Care Hospital",
    "categories": [
        {
            "category_name": "radiology",
            "items": [
                {"item_name": "X-Ray Chest PA", "rate": 800.0, "type": "service"},
                {"item_name": "CT Scan Abdomen", "rate": 800.0, "type": "service"}
            ]
        },
        {
            "category_name": "medicines",
            "items": [
                {"item_name": "Paracetamol 650mg", "rate": 20.0, "type": "unit"}
            ]
        }
    ]
}"#;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

async fn load_catalog(
    provider: &HashedBagEmbedder,
) -> (tempfile::TempDir, Arc<bill_verification::rate_sheets::RateSheetCatalog>) {
    init_tracing();
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("city_care.json"), CITY_CARE_SHEET).expect("write sheet");
    let store = RateSheetStore::new(dir.path());
    store.reload(provider).await.expect("reload succeeds");
    let catalog = store.current();
    (dir, catalog)
}

fn one_category_bill(category: &str, items: &[(&str, f64, f64)]) -> BillInput {
    BillInput {
        hospital_name: "City Care Hospital".to_string(),
        categories: vec![BillInputCategory {
            category_name: category.to_string(),
            items: items
                .iter()
                .map(|(name, qty, amount)| BillInputItem {
                    item_name: (*name).to_string(),
                    quantity: *qty,
                    amount: *amount,
                })
                .collect(),
        }],
    }
}

#[tokio::test]
async fn green_red_unclassified_contributions_reconcile() {
    let provider = HashedBagEmbedder::new(256);
    let (_dir, catalog) = load_catalog(&provider).await;
    let verifier = Verifier::new(VerifierConfig::default(), None);

    let bill = one_category_bill(
        "radiology",
        &[
            ("X-Ray Chest PA", 1.0, 450.0),
            ("CT Scan Abdomen", 1.0, 1200.0),
            ("Custom Wellness Regimen Zq", 1.0, 5000.0),
        ],
    );
    let report = verifier
        .verify(&provider, &catalog, &bill)
        .await
        .expect("verify succeeds");

    // GREEN contributes (450, 0, 0); RED (800, 400, 0); UNCLASSIFIED (0, 0, 5000)
    assert_eq!(report.total_bill_amount, 6650.0);
    assert_eq!(report.total_allowed_amount, 1250.0);
    assert_eq!(report.total_extra_amount, 400.0);
    assert_eq!(report.total_unclassified_amount, 5000.0);
    assert!(report.financials_balanced);

    let items = &report.results[0].items;
    assert_eq!(items[0].status, VerificationStatus::Green);
    assert_eq!(items[1].status, VerificationStatus::Red);
    assert_eq!(items[1].extra_amount, 400.0);
    assert_eq!(items[2].status, VerificationStatus::Unclassified);
}

#[tokio::test]
async fn dosage_mismatch_rejects_despite_high_similarity() {
    let provider = HashedBagEmbedder::new(256);
    let (_dir, catalog) = load_catalog(&provider).await;
    let verifier = Verifier::new(VerifierConfig::default(), None);

    let bill = one_category_bill("medicines", &[("Paracetamol 500mg", 2.0, 50.0)]);
    let report = verifier
        .verify(&provider, &catalog, &bill)
        .await
        .expect("verify succeeds");

    let item = &report.results[0].items[0];
    assert_eq!(item.status, VerificationStatus::Unclassified);
    assert_eq!(item.allowed_amount, 0.0);
    // The rejected candidate stays visible for diagnostics
    assert_eq!(item.matched_item.as_deref(), Some("Paracetamol 650mg"));
    let diagnostics = item.diagnostics.as_ref().expect("diagnostics recorded");
    assert_eq!(diagnostics.failure_reason, Some(FailureReason::DosageMismatch));
}

#[tokio::test]
async fn quantity_scales_unit_pricing() {
    let provider = HashedBagEmbedder::new(256);
    let (_dir, catalog) = load_catalog(&provider).await;
    let verifier = Verifier::new(VerifierConfig::default(), None);

    // 3 units at the tie-up rate of 20 allow 60 in total
    let bill = one_category_bill("medicines", &[("Paracetamol 650mg", 3.0, 75.0)]);
    let report = verifier
        .verify(&provider, &catalog, &bill)
        .await
        .expect("verify succeeds");

    let item = &report.results[0].items[0];
    assert_eq!(item.status, VerificationStatus::Red);
    assert_eq!(item.allowed_amount, 60.0);
    assert_eq!(item.extra_amount, 15.0);
}

#[tokio::test]
async fn hospital_and_category_similarities_are_recorded() {
    let provider = HashedBagEmbedder::new(256);
    let (_dir, catalog) = load_catalog(&provider).await;
    let verifier = Verifier::new(VerifierConfig::default(), None);

    let bill = one_category_bill("radiology", &[("X-Ray Chest PA", 1.0, 450.0)]);
    let report = verifier
        .verify(&provider, &catalog, &bill)
        .await
        .expect("verify succeeds");

    assert_eq!(report.matched_hospital.as_deref(), Some("City Care Hospital"));
    assert_eq!(report.hospital_similarity, Some(1.0));
    assert_eq!(report.results[0].matched_category.as_deref(), Some("radiology"));
    assert_eq!(report.results[0].category_similarity, Some(1.0));
}

#[tokio::test]
async fn embedding_outage_degrades_to_unclassified_items() {
    let provider = HashedBagEmbedder::new(256);
    let (_dir, catalog) = load_catalog(&provider).await;
    let verifier = Verifier::new(VerifierConfig::default(), None);

    // The failing provider breaks only this query; indices were built with
    // the healthy one
    let failing = HashedBagEmbedder::failing_on(256, "Novel");
    let bill = one_category_bill("radiology", &[("Novel Imaging Study", 1.0, 900.0)]);
    let report = verifier
        .verify(&failing, &catalog, &bill)
        .await
        .expect("verify still produces a report");

    let item = &report.results[0].items[0];
    assert_eq!(item.status, VerificationStatus::Unclassified);
    assert_eq!(report.total_unclassified_amount, 900.0);
    assert!(report.financials_balanced);
}

#[tokio::test]
async fn completeness_holds_across_mixed_statuses() {
    let provider = HashedBagEmbedder::new(256);
    let (_dir, catalog) = load_catalog(&provider).await;
    let verifier = Verifier::new(VerifierConfig::default(), None);

    let bill = BillInput {
        hospital_name: "City Care Hospital".to_string(),
        categories: vec![
            BillInputCategory {
                category_name: "radiology".to_string(),
                items: vec![
                    BillInputItem {
                        item_name: "X-Ray Chest PA".to_string(),
                        quantity: 1.0,
                        amount: 450.0,
                    },
                    BillInputItem {
                        item_name: "Unknown Imaging Zz".to_string(),
                        quantity: 1.0,
                        amount: 700.0,
                    },
                ],
            },
            BillInputCategory {
                category_name: "administrative".to_string(),
                items: vec![BillInputItem {
                    item_name: "Registration Fee".to_string(),
                    quantity: 1.0,
                    amount: 50.0,
                }],
            },
        ],
    };

    let report = verifier
        .verify(&provider, &catalog, &bill)
        .await
        .expect("verify succeeds");

    assert_eq!(report.all_items().count(), bill.item_count());
    assert_eq!(report.counts.total() as usize, bill.item_count());
    // Admin fee excluded from the reconciliation but tracked separately
    assert_eq!(report.total_allowed_not_comparable, 50.0);
    assert!(report.financials_balanced);
}
