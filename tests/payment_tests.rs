//! Payment applier tests
//!
//! Manual and gateway payment application, balance math, idempotency per
//! reference, and the PAID transition, exercised against the in-memory store.

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use tally_server::debt::{CreateDebtRequest, Debt, DebtLimits, DebtService, DebtStatus};
use tally_server::error::ApiError;
use tally_server::identity::Identity;
use tally_server::linking::LinkingService;
use tally_server::notifier::Notifier;
use tally_server::payment::{
    GatewayCallback, InitiatePaymentRequest, PaymentService, PaymentStatus, RecordPaymentRequest,
    MANUAL_GATEWAY,
};
use tally_server::store::{DebtStore, IdentityStore, IdentityWrite, MemStore, SharedStore};

struct Harness {
    store: SharedStore,
    debts: DebtService,
    payments: PaymentService,
}

fn setup() -> Harness {
    let store: SharedStore = Arc::new(MemStore::new());
    let linking = Arc::new(LinkingService::new(store.clone()));
    Harness {
        debts: DebtService::new(
            store.clone(),
            linking,
            Notifier::disabled(),
            DebtLimits::default(),
        ),
        payments: PaymentService::new(store.clone(), Notifier::disabled()),
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

async fn open_debt(harness: &Harness, lender: Uuid, principal: i64, rate: f64) -> Debt {
    harness
        .debts
        .create_debt(
            lender,
            CreateDebtRequest {
                debtor_phone_number: "+2348012345678".to_string(),
                principal_amount: principal,
                interest_rate: rate,
                due_date: Utc::now() + Duration::days(30),
                notes: None,
                is_external: false,
                external_lender_name: None,
            },
        )
        .await
        .unwrap()
}

fn record(amount: i64) -> RecordPaymentRequest {
    RecordPaymentRequest {
        amount,
        notes: None,
    }
}

// ============================================================================
// Manual payments
// ============================================================================

#[tokio::test]
async fn test_full_payment_settles_debt() {
    let harness = setup();
    let lender = register(&harness.store, "Ada", None).await;
    let debt = open_debt(&harness, lender, 10000, 10.0).await;

    let payment = harness
        .payments
        .record_payment(debt.id, lender, record(11000))
        .await
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Successful);
    assert_eq!(payment.gateway, MANUAL_GATEWAY);
    assert!(payment.paid_at.is_some());

    let debt = harness.store.find_debt_by_id(debt.id).await.unwrap().unwrap();
    assert_eq!(debt.outstanding_balance, 0);
    assert_eq!(debt.status, DebtStatus::Paid);
    assert!(debt.paid_at.is_some());
}

#[tokio::test]
async fn test_partial_payments_track_running_balance() {
    let harness = setup();
    let lender = register(&harness.store, "Ada", None).await;
    let debt = open_debt(&harness, lender, 10000, 10.0).await;

    harness
        .payments
        .record_payment(debt.id, lender, record(3000))
        .await
        .unwrap();
    harness
        .payments
        .record_payment(debt.id, lender, record(4000))
        .await
        .unwrap();

    let debt = harness.store.find_debt_by_id(debt.id).await.unwrap().unwrap();
    assert_eq!(debt.outstanding_balance, 11000 - 3000 - 4000);
    assert_eq!(debt.status, DebtStatus::Pending);
    assert!(debt.paid_at.is_none());
}

#[tokio::test]
async fn test_overpayment_is_rejected() {
    let harness = setup();
    let lender = register(&harness.store, "Ada", None).await;
    let debt = open_debt(&harness, lender, 3000, 0.0).await;
    assert_eq!(debt.outstanding_balance, 3000);

    let result = harness
        .payments
        .record_payment(debt.id, lender, record(5000))
        .await;
    assert!(matches!(result, Err(ApiError::Validation(_))));

    let debt = harness.store.find_debt_by_id(debt.id).await.unwrap().unwrap();
    assert_eq!(debt.outstanding_balance, 3000);
}

#[tokio::test]
async fn test_manual_recording_is_lender_only() {
    let harness = setup();
    let lender = register(&harness.store, "Ada", None).await;
    let stranger = register(&harness.store, "Chidi", None).await;
    let debt = open_debt(&harness, lender, 10000, 10.0).await;

    let result = harness
        .payments
        .record_payment(debt.id, stranger, record(1000))
        .await;
    assert!(matches!(result, Err(ApiError::Forbidden(_))));
}

#[tokio::test]
async fn test_settled_debts_take_no_payments() {
    let harness = setup();
    let lender = register(&harness.store, "Ada", None).await;
    let debt = open_debt(&harness, lender, 10000, 10.0).await;

    harness
        .payments
        .record_payment(debt.id, lender, record(11000))
        .await
        .unwrap();
    assert!(matches!(
        harness.payments.record_payment(debt.id, lender, record(1)).await,
        Err(ApiError::Validation(_))
    ));

    let defaulted = open_debt(&harness, lender, 5000, 0.0).await;
    harness.debts.mark_defaulted(defaulted.id, lender).await.unwrap();
    assert!(matches!(
        harness
            .payments
            .record_payment(defaulted.id, lender, record(1000))
            .await,
        Err(ApiError::Validation(_))
    ));
}

// ============================================================================
// Gateway payments
// ============================================================================

#[tokio::test]
async fn test_initiate_then_settle() {
    let harness = setup();
    let lender = register(&harness.store, "Ada", None).await;
    let debtor = register(&harness.store, "Bayo", Some("+2348012345678")).await;
    let debt = open_debt(&harness, lender, 10000, 10.0).await;
    assert_eq!(debt.debtor_id, Some(debtor));

    let pending = harness
        .payments
        .initiate_gateway_payment(
            debtor,
            InitiatePaymentRequest {
                debt_id: debt.id,
                amount: 11000,
                gateway: "paystack".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(pending.status, PaymentStatus::Pending);

    // Initiation alone never touches the balance
    let unchanged = harness.store.find_debt_by_id(debt.id).await.unwrap().unwrap();
    assert_eq!(unchanged.outstanding_balance, 11000);

    let settled = harness
        .payments
        .apply_gateway_payment(GatewayCallback {
            reference: pending.reference.clone(),
            amount: 11000,
            status: PaymentStatus::Successful,
            gateway: Some("paystack".to_string()),
            debt_id: None,
        })
        .await
        .unwrap();
    assert_eq!(settled.status, PaymentStatus::Successful);

    let debt = harness.store.find_debt_by_id(debt.id).await.unwrap().unwrap();
    assert_eq!(debt.outstanding_balance, 0);
    assert_eq!(debt.status, DebtStatus::Paid);
}

#[tokio::test]
async fn test_repeated_reference_applies_once() {
    let harness = setup();
    let lender = register(&harness.store, "Ada", None).await;
    let debt = open_debt(&harness, lender, 10000, 10.0).await;

    let pending = harness
        .payments
        .initiate_gateway_payment(
            lender,
            InitiatePaymentRequest {
                debt_id: debt.id,
                amount: 4000,
                gateway: "paystack".to_string(),
            },
        )
        .await
        .unwrap();

    let callback = || GatewayCallback {
        reference: pending.reference.clone(),
        amount: 4000,
        status: PaymentStatus::Successful,
        gateway: Some("paystack".to_string()),
        debt_id: None,
    };

    harness.payments.apply_gateway_payment(callback()).await.unwrap();
    let repeat = harness.payments.apply_gateway_payment(callback()).await.unwrap();
    assert_eq!(repeat.status, PaymentStatus::Successful);

    // The balance moved exactly once
    let debt = harness.store.find_debt_by_id(debt.id).await.unwrap().unwrap();
    assert_eq!(debt.outstanding_balance, 11000 - 4000);
}

#[tokio::test]
async fn test_failed_gateway_payment_leaves_debt_untouched() {
    let harness = setup();
    let lender = register(&harness.store, "Ada", None).await;
    let debt = open_debt(&harness, lender, 10000, 10.0).await;

    let pending = harness
        .payments
        .initiate_gateway_payment(
            lender,
            InitiatePaymentRequest {
                debt_id: debt.id,
                amount: 4000,
                gateway: "paystack".to_string(),
            },
        )
        .await
        .unwrap();

    let failed = harness
        .payments
        .apply_gateway_payment(GatewayCallback {
            reference: pending.reference.clone(),
            amount: 4000,
            status: PaymentStatus::Failed,
            gateway: None,
            debt_id: None,
        })
        .await
        .unwrap();
    assert_eq!(failed.status, PaymentStatus::Failed);
    assert!(failed.paid_at.is_none());

    let debt = harness.store.find_debt_by_id(debt.id).await.unwrap().unwrap();
    assert_eq!(debt.outstanding_balance, 11000);
    assert_eq!(debt.status, DebtStatus::Pending);
}

#[tokio::test]
async fn test_unseen_reference_is_recorded_from_callback() {
    let harness = setup();
    let lender = register(&harness.store, "Ada", None).await;
    let debt = open_debt(&harness, lender, 10000, 10.0).await;

    let payment = harness
        .payments
        .apply_gateway_payment(GatewayCallback {
            reference: "psk_ref_001".to_string(),
            amount: 2000,
            status: PaymentStatus::Successful,
            gateway: Some("paystack".to_string()),
            debt_id: Some(debt.id),
        })
        .await
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Successful);

    let debt = harness.store.find_debt_by_id(debt.id).await.unwrap().unwrap();
    assert_eq!(debt.outstanding_balance, 9000);
}

#[tokio::test]
async fn test_unseen_reference_without_debt_is_rejected() {
    let harness = setup();

    let result = harness
        .payments
        .apply_gateway_payment(GatewayCallback {
            reference: "psk_ref_002".to_string(),
            amount: 2000,
            status: PaymentStatus::Successful,
            gateway: None,
            debt_id: None,
        })
        .await;
    assert!(matches!(result, Err(ApiError::NotFound(_))));
}

#[tokio::test]
async fn test_settle_amount_must_match_initiation() {
    let harness = setup();
    let lender = register(&harness.store, "Ada", None).await;
    let debt = open_debt(&harness, lender, 10000, 10.0).await;

    let pending = harness
        .payments
        .initiate_gateway_payment(
            lender,
            InitiatePaymentRequest {
                debt_id: debt.id,
                amount: 4000,
                gateway: "paystack".to_string(),
            },
        )
        .await
        .unwrap();

    let result = harness
        .payments
        .apply_gateway_payment(GatewayCallback {
            reference: pending.reference.clone(),
            amount: 9999,
            status: PaymentStatus::Successful,
            gateway: None,
            debt_id: None,
        })
        .await;
    assert!(matches!(result, Err(ApiError::Validation(_))));

    let debt = harness.store.find_debt_by_id(debt.id).await.unwrap().unwrap();
    assert_eq!(debt.outstanding_balance, 11000);
}

#[tokio::test]
async fn test_payment_listing_limited_to_parties() {
    let harness = setup();
    let lender = register(&harness.store, "Ada", None).await;
    let stranger = register(&harness.store, "Chidi", None).await;
    let debt = open_debt(&harness, lender, 10000, 10.0).await;

    harness
        .payments
        .record_payment(debt.id, lender, record(1000))
        .await
        .unwrap();

    let listed = harness.payments.list_payments(debt.id, lender).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert!(matches!(
        harness.payments.list_payments(debt.id, stranger).await,
        Err(ApiError::Forbidden(_))
    ));
}
