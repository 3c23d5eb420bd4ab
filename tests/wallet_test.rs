mod common;

use std::sync::Arc;

use uuid::Uuid;

use common::InMemoryStore;
use vaultpay::domain::{TxStatus, TxType};
use vaultpay::error::codes;
use vaultpay::services::wallets::{CreateWalletRequest, TopUpRequest};
use vaultpay::services::WalletService;

fn service(store: &Arc<InMemoryStore>) -> WalletService {
    WalletService::new(store.clone(), store.clone())
}

#[tokio::test]
async fn test_create_wallet_once() {
    let store = Arc::new(InMemoryStore::new());
    let svc = service(&store);
    let user = Uuid::new_v4();

    let resp = svc
        .create_wallet(&CreateWalletRequest {
            user_id: user,
            name: "savings".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(resp.user_id, user);
    assert_eq!(resp.name, "savings");

    // one wallet per user
    let err = svc
        .create_wallet(&CreateWalletRequest {
            user_id: user,
            name: String::new(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), codes::VALIDATION_ERROR);
}

#[tokio::test]
async fn test_create_wallet_rejects_long_name() {
    let store = Arc::new(InMemoryStore::new());
    let svc = service(&store);

    let err = svc
        .create_wallet(&CreateWalletRequest {
            user_id: Uuid::new_v4(),
            name: "x".repeat(21),
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), codes::VALIDATION_ERROR);
}

#[tokio::test]
async fn test_balance_of_missing_wallet_is_empty() {
    let store = Arc::new(InMemoryStore::new());
    let svc = service(&store);

    let resp = svc.get_balance(Uuid::new_v4()).await.unwrap();
    assert!(resp.balances.is_empty());
}

#[tokio::test]
async fn test_top_up_credits_and_records_transaction() {
    let store = Arc::new(InMemoryStore::new());
    let svc = service(&store);
    let user = Uuid::new_v4();
    store.seed_wallet(user, "USD", 0);

    let resp = svc
        .top_up(&TopUpRequest {
            user_id: user,
            amount: 1_000,
            currency: "USD".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(resp.balance, 1_000);

    let balance = svc.get_balance(user).await.unwrap();
    assert_eq!(balance.balances.get("USD"), Some(&1_000));

    let txs = store.transactions_of(user);
    assert_eq!(txs.len(), 1);
    assert_eq!(txs[0].tx_type, TxType::TopUp);
    assert_eq!(txs[0].status, TxStatus::Approved);
    assert_eq!(txs[0].amount, 1_000);
}

#[tokio::test]
async fn test_top_up_validation_and_missing_wallet() {
    let store = Arc::new(InMemoryStore::new());
    let svc = service(&store);
    let user = Uuid::new_v4();
    store.seed_wallet(user, "USD", 0);

    let err = svc
        .top_up(&TopUpRequest {
            user_id: user,
            amount: 0,
            currency: "USD".to_string(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), codes::VALIDATION_ERROR);

    let err = svc
        .top_up(&TopUpRequest {
            user_id: Uuid::new_v4(),
            amount: 100,
            currency: "USD".to_string(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), codes::NOT_FOUND);
}

#[tokio::test]
async fn test_list_wallets_pages_with_total() {
    let store = Arc::new(InMemoryStore::new());
    let svc = service(&store);
    for _ in 0..3 {
        store.seed_wallet(Uuid::new_v4(), "USD", 100);
    }

    let page = svc.list_wallets(2, 0).await.unwrap();
    assert_eq!(page.wallets.len(), 2);
    assert_eq!(page.total, 3);

    let rest = svc.list_wallets(2, 2).await.unwrap();
    assert_eq!(rest.wallets.len(), 1);
    assert_eq!(rest.total, 3);
}

#[tokio::test]
async fn test_transactions_listing_reports_total() {
    let store = Arc::new(InMemoryStore::new());
    let svc = service(&store);
    let user = Uuid::new_v4();
    store.seed_wallet(user, "USD", 0);

    for i in 0..5 {
        svc.top_up(&TopUpRequest {
            user_id: user,
            amount: 100 + i,
            currency: "USD".to_string(),
        })
        .await
        .unwrap();
    }

    let resp = svc.get_transactions(user, 3, 0).await.unwrap();
    assert_eq!(resp.transactions.len(), 3);
    assert_eq!(resp.total, 5);
}
