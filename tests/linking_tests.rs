//! Identity linking tests
//!
//! Phone-to-identity resolution at debt creation, the inverse sweep when an
//! identity's phone becomes known, idempotency, and concurrent sweeps.

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use tally_server::debt::{CreateDebtRequest, DebtLimits, DebtService};
use tally_server::identity::Identity;
use tally_server::linking::LinkingService;
use tally_server::notifier::Notifier;
use tally_server::store::{DebtStore, IdentityStore, IdentityWrite, MemStore, SharedStore};

struct Harness {
    store: SharedStore,
    debts: DebtService,
    linking: Arc<LinkingService>,
}

fn setup() -> Harness {
    let store: SharedStore = Arc::new(MemStore::new());
    let linking = Arc::new(LinkingService::new(store.clone()));
    Harness {
        debts: DebtService::new(
            store.clone(),
            linking.clone(),
            Notifier::disabled(),
            DebtLimits::default(),
        ),
        linking,
        store,
    }
}

async fn register(store: &SharedStore, name: &str, phone: Option<&str>) -> Uuid {
    let now = Utc::now();
    let identity = Identity {
        id: Uuid::new_v4(),
        name: name.to_string(),
        email: None,
        phone_number: phone.map(String::from),
        avatar_url: None,
        created_at: now,
        updated_at: now,
    };
    match store.insert_identity(&identity).await.unwrap() {
        IdentityWrite::Written(identity) => identity.id,
        other => panic!("unexpected insert outcome: {:?}", other),
    }
}

async fn open_debt(harness: &Harness, lender: Uuid, phone: &str) -> Uuid {
    harness
        .debts
        .create_debt(
            lender,
            CreateDebtRequest {
                debtor_phone_number: phone.to_string(),
                principal_amount: 10000,
                interest_rate: 0.0,
                due_date: Utc::now() + Duration::days(30),
                notes: None,
                is_external: false,
                external_lender_name: None,
            },
        )
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn test_debt_without_match_stays_unlinked() {
    let harness = setup();
    let lender = register(&harness.store, "Ada", None).await;

    let debt_id = open_debt(&harness, lender, "+2348012345678").await;

    let debt = harness.store.find_debt_by_id(debt_id).await.unwrap().unwrap();
    assert_eq!(debt.debtor_id, None);
    assert_eq!(debt.debtor_phone_number, "+2348012345678");
}

#[tokio::test]
async fn test_late_registration_is_swept_up() {
    let harness = setup();
    let lender = register(&harness.store, "Ada", None).await;
    let debt_id = open_debt(&harness, lender, "+2348012345678").await;

    // The debtor registers after the debt exists
    let debtor = register(&harness.store, "Bayo", Some("+2348012345678")).await;
    let linked = harness
        .linking
        .link_identity_to_existing_debts(debtor, "+2348012345678")
        .await
        .unwrap();
    assert_eq!(linked, 1);

    let debt = harness.store.find_debt_by_id(debt_id).await.unwrap().unwrap();
    assert_eq!(debt.debtor_id, Some(debtor));
    // The matching key is untouched by linking
    assert_eq!(debt.debtor_phone_number, "+2348012345678");
}

#[tokio::test]
async fn test_sweep_is_idempotent() {
    let harness = setup();
    let lender = register(&harness.store, "Ada", None).await;
    open_debt(&harness, lender, "+2348012345678").await;
    open_debt(&harness, lender, "+2348012345678").await;

    let debtor = register(&harness.store, "Bayo", Some("+2348012345678")).await;

    let first = harness
        .linking
        .link_identity_to_existing_debts(debtor, "+2348012345678")
        .await
        .unwrap();
    assert_eq!(first, 2);

    // Re-running links nothing further and does not error
    let second = harness
        .linking
        .link_identity_to_existing_debts(debtor, "+2348012345678")
        .await
        .unwrap();
    assert_eq!(second, 0);
}

#[tokio::test]
async fn test_concurrent_sweeps_link_each_debt_once() {
    let harness = setup();
    let lender = register(&harness.store, "Ada", None).await;
    let debt_id = open_debt(&harness, lender, "+2348012345678").await;
    let debtor = register(&harness.store, "Bayo", Some("+2348012345678")).await;

    // Duplicate webhook deliveries race each other
    let (a, b) = tokio::join!(
        harness
            .linking
            .link_identity_to_existing_debts(debtor, "+2348012345678"),
        harness
            .linking
            .link_identity_to_existing_debts(debtor, "+2348012345678"),
    );

    assert_eq!(a.unwrap() + b.unwrap(), 1);
    let debt = harness.store.find_debt_by_id(debt_id).await.unwrap().unwrap();
    assert_eq!(debt.debtor_id, Some(debtor));
}

#[tokio::test]
async fn test_maintenance_pass_covers_all_identities() {
    let harness = setup();
    let lender = register(&harness.store, "Ada", None).await;
    let bayo_debt = open_debt(&harness, lender, "+2348012345678").await;
    let chidi_debt = open_debt(&harness, lender, "+2347011112222").await;
    open_debt(&harness, lender, "+2349055556666").await; // nobody registered

    let bayo = register(&harness.store, "Bayo", Some("+2348012345678")).await;
    let chidi = register(&harness.store, "Chidi", Some("+2347011112222")).await;

    let linked = harness.linking.link_all_unlinked_debts().await.unwrap();
    assert_eq!(linked, 2);

    let debt = harness.store.find_debt_by_id(bayo_debt).await.unwrap().unwrap();
    assert_eq!(debt.debtor_id, Some(bayo));
    let debt = harness.store.find_debt_by_id(chidi_debt).await.unwrap().unwrap();
    assert_eq!(debt.debtor_id, Some(chidi));

    // A second pass finds nothing left to do
    assert_eq!(harness.linking.link_all_unlinked_debts().await.unwrap(), 0);
}

#[tokio::test]
async fn test_linked_debts_are_never_relinked() {
    let harness = setup();
    let lender = register(&harness.store, "Ada", None).await;
    let debtor = register(&harness.store, "Bayo", Some("+2348012345678")).await;
    let debt_id = open_debt(&harness, lender, "+2348012345678").await;

    // Created against a registered phone, so linked from the start
    let debt = harness.store.find_debt_by_id(debt_id).await.unwrap().unwrap();
    assert_eq!(debt.debtor_id, Some(debtor));

    // Another identity sweeping the same phone must not steal the link
    let late = Uuid::new_v4();
    let linked = harness
        .linking
        .link_identity_to_existing_debts(late, "+2348012345678")
        .await
        .unwrap();
    assert_eq!(linked, 0);

    let debt = harness.store.find_debt_by_id(debt_id).await.unwrap().unwrap();
    assert_eq!(debt.debtor_id, Some(debtor));
}
