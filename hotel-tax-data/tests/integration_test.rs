//! Integration tests for tax configuration loading using the SQLite backend.

use pretty_assertions::assert_eq;
use rust_decimal_macros::dec;
use sqlx::sqlite::SqlitePoolOptions;

use hotel_tax_core::{ConfigurationFilter, NewEstablishment, TaxRepository, TaxType};
use hotel_tax_data::{ConfigurationLoader, ConfigurationLoaderError, LoadSummary};
use hotel_tax_sqlite::SqliteRepository;

const TEST_CSV: &str = include_str!("../test-data/tax_configurations.csv");

/// Sets up a test database with migrations run but no establishments.
async fn setup_test_db_without_establishment() -> SqliteRepository {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");

    let repo = SqliteRepository::new_with_pool(pool);
    repo.run_migrations()
        .await
        .expect("Failed to run migrations");

    repo
}

async fn setup_test_db() -> SqliteRepository {
    let repo = setup_test_db_without_establishment().await;

    repo.insert_establishment(&NewEstablishment {
        name: "Grand Hotel Kinshasa".to_string(),
        currency: "CDF".to_string(),
        country_code: Some("CD".to_string()),
        utc_offset_minutes: 60,
    })
    .await
    .expect("Failed to insert establishment");

    repo
}

fn all_for(establishment_id: i64) -> ConfigurationFilter {
    ConfigurationFilter {
        establishment_id: Some(establishment_id),
        active: None,
    }
}

#[tokio::test]
async fn test_load_all_configurations() {
    let repo = setup_test_db().await;

    let records = ConfigurationLoader::parse(TEST_CSV.as_bytes()).expect("Failed to parse CSV");
    let summary = ConfigurationLoader::load(&repo, &records)
        .await
        .expect("Failed to load configurations");

    assert_eq!(
        summary,
        LoadSummary {
            created: 4,
            updated: 0
        }
    );
}

#[tokio::test]
async fn test_load_and_retrieve_configurations() {
    let repo = setup_test_db().await;

    let records = ConfigurationLoader::parse(TEST_CSV.as_bytes()).unwrap();
    ConfigurationLoader::load(&repo, &records).await.unwrap();

    let stored = repo.list_configurations(&all_for(1)).await.unwrap();

    assert_eq!(stored.len(), 4);
    assert_eq!(stored[0].name, "TVA");
    assert_eq!(stored[0].rate, dec!(16));
    assert_eq!(stored[0].tax_type, TaxType::Percentage);
    assert_eq!(
        stored[0].applicable_to,
        vec!["accommodation", "restaurant", "services"]
    );
    assert_eq!(stored[1].tax_type, TaxType::FixedPerNight);
    assert_eq!(stored[1].rate, dec!(2500));
    assert_eq!(stored[2].country_code, None);
    assert!(!stored[3].active);
}

#[tokio::test]
async fn test_reload_is_idempotent() {
    let repo = setup_test_db().await;
    let records = ConfigurationLoader::parse(TEST_CSV.as_bytes()).unwrap();

    ConfigurationLoader::load(&repo, &records).await.unwrap();
    let before = repo.list_configurations(&all_for(1)).await.unwrap();
    let summary = ConfigurationLoader::load(&repo, &records).await.unwrap();
    let after = repo.list_configurations(&all_for(1)).await.unwrap();

    assert_eq!(
        summary,
        LoadSummary {
            created: 0,
            updated: 4
        }
    );
    let ids = |list: &[hotel_tax_core::TaxConfiguration]| list.iter().map(|c| c.id).collect::<Vec<_>>();
    assert_eq!(ids(&after), ids(&before));
    assert_eq!(after[0].rate, before[0].rate);
}

#[tokio::test]
async fn test_reload_updates_changed_rate() {
    let repo = setup_test_db().await;
    ConfigurationLoader::load(
        &repo,
        &ConfigurationLoader::parse(TEST_CSV.as_bytes()).unwrap(),
    )
    .await
    .unwrap();

    let changed = "establishment_id,name,description,rate,type,applicable_to,country_code,active
1,TVA,Taxe sur la valeur ajoutée,18,percentage,accommodation|restaurant,CD,true";
    let summary = ConfigurationLoader::load(
        &repo,
        &ConfigurationLoader::parse(changed.as_bytes()).unwrap(),
    )
    .await
    .unwrap();

    let stored = repo.list_configurations(&all_for(1)).await.unwrap();
    assert_eq!(summary.updated, 1);
    assert_eq!(stored.len(), 4);
    assert_eq!(stored[0].rate, dec!(18));
    assert_eq!(stored[0].applicable_to, vec!["accommodation", "restaurant"]);
}

#[tokio::test]
async fn test_load_without_establishment_fails_with_line() {
    let repo = setup_test_db_without_establishment().await;

    let records = ConfigurationLoader::parse(TEST_CSV.as_bytes()).unwrap();
    let result = ConfigurationLoader::load(&repo, &records).await;

    match result {
        Err(ConfigurationLoaderError::Invalid { line, message }) => {
            assert_eq!(line, 2);
            assert!(
                message.contains("establishmentId"),
                "unexpected message: {message}"
            );
        }
        other => panic!("expected Invalid error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_invalid_record_aborts_before_any_write() {
    let repo = setup_test_db().await;
    let text = "establishment_id,name,description,rate,type,applicable_to,country_code,active
1,TVA,,16,percentage,accommodation,CD,true
1,Levy,,2500,per_week,accommodation,CD,true";

    let records = ConfigurationLoader::parse(text.as_bytes()).unwrap();
    let result = ConfigurationLoader::load(&repo, &records).await;

    assert!(matches!(
        result,
        Err(ConfigurationLoaderError::Invalid { line: 3, .. })
    ));
    assert!(repo.list_configurations(&all_for(1)).await.unwrap().is_empty());
}
