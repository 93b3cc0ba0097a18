//! Scheduled transactions collecting threshold signatures

use super::test_helpers::{operator_id, setup};
use crate::crypto::{Key, KeyList, PrivateKey};
use crate::error::Error;
use crate::hbar::Hbar;
use crate::query::ScheduleInfoQuery;
use crate::receipt::TransactionReceiptQuery;
use crate::status::Status;
use crate::tx_builder::{
    AnyTransactionData, ScheduleCreateTransaction, ScheduleDeleteTransaction, ScheduleSignTransaction,
    TransferTransaction,
};

fn threshold_key(keys: &[PrivateKey], threshold: u32) -> Key {
    KeyList::threshold(keys.iter().map(|k| Key::from(k.public_key())).collect(), threshold)
        .unwrap()
        .into()
}

#[tokio::test]
async fn test_threshold_schedule_executes_after_second_signature() {
    let (network, client) = setup();
    let keys: Vec<PrivateKey> = (0..3).map(|_| PrivateKey::generate_ed25519()).collect();
    let shared = network.create_account(threshold_key(&keys, 2), Hbar::new(10));
    let operator = operator_id(&client);

    let inner = TransferTransaction::new()
        .hbar_transfer(shared.clone(), Hbar::new(-4))
        .hbar_transfer(operator, Hbar::new(4));

    let receipt = inner
        .schedule()
        .unwrap()
        .schedule_memo("pay rent")
        .freeze_with(&client)
        .unwrap()
        .sign(&keys[0])
        .await
        .unwrap()
        .execute(&client)
        .await
        .unwrap()
        .get_receipt(&client)
        .await
        .unwrap();

    let schedule_id = receipt.schedule_id.clone().expect("schedule id in receipt");
    let scheduled_transaction_id = receipt
        .scheduled_transaction_id
        .clone()
        .expect("scheduled transaction id in receipt");
    assert!(scheduled_transaction_id.scheduled);

    let info = ScheduleInfoQuery::new()
        .schedule_id(schedule_id.clone())
        .execute(&client)
        .await
        .unwrap();
    assert!(!info.is_executed());
    assert_eq!(info.memo, "pay rent");
    assert!(info.signatories.contains(&keys[0].public_key()));
    assert!(matches!(info.scheduled_transaction, AnyTransactionData::Transfer(_)));
    assert_eq!(network.balance(&shared), Some(Hbar::new(10)));

    let receipt = ScheduleSignTransaction::new()
        .schedule_id(schedule_id.clone())
        .freeze_with(&client)
        .unwrap()
        .sign(&keys[2])
        .await
        .unwrap()
        .execute(&client)
        .await
        .unwrap()
        .get_receipt(&client)
        .await
        .unwrap();
    assert_eq!(receipt.status, Status::Success);

    let info = ScheduleInfoQuery::new()
        .schedule_id(schedule_id)
        .execute(&client)
        .await
        .unwrap();
    assert!(info.executed_at.is_some());

    let scheduled_receipt = TransactionReceiptQuery::new()
        .transaction_id(scheduled_transaction_id)
        .validate_status(true)
        .execute(&client)
        .await
        .unwrap();
    assert_eq!(scheduled_receipt.status, Status::Success);
    assert_eq!(network.balance(&shared), Some(Hbar::new(6)));
}

#[tokio::test]
async fn test_signing_executed_schedule_fails() {
    let (network, client) = setup();
    let key = PrivateKey::generate_ed25519();
    let owner = network.create_account(key.public_key(), Hbar::new(5));

    let receipt = TransferTransaction::new()
        .hbar_transfer(owner, Hbar::new(-1))
        .hbar_transfer(operator_id(&client), Hbar::new(1))
        .schedule()
        .unwrap()
        .freeze_with(&client)
        .unwrap()
        .sign(&key)
        .await
        .unwrap()
        .execute(&client)
        .await
        .unwrap()
        .get_receipt(&client)
        .await
        .unwrap();
    let schedule_id = receipt.schedule_id.unwrap();

    let err = ScheduleSignTransaction::new()
        .schedule_id(schedule_id)
        .freeze_with(&client)
        .unwrap()
        .sign(&key)
        .await
        .unwrap()
        .execute(&client)
        .await
        .unwrap()
        .get_receipt(&client)
        .await
        .unwrap_err();

    assert!(
        matches!(err, Error::ReceiptStatus { status: Status::ScheduleAlreadyExecuted, .. }),
        "got {err:?}"
    );
}

#[tokio::test]
async fn test_schedule_without_admin_key_is_immutable() {
    let (network, client) = setup();
    let key = PrivateKey::generate_ed25519();
    let owner = network.create_account(key.public_key(), Hbar::new(5));

    let receipt = ScheduleCreateTransaction::new()
        .scheduled_transaction(
            TransferTransaction::new()
                .hbar_transfer(owner, Hbar::new(-1))
                .hbar_transfer(operator_id(&client), Hbar::new(1)),
        )
        .unwrap()
        .freeze_with(&client)
        .unwrap()
        .execute(&client)
        .await
        .unwrap()
        .get_receipt(&client)
        .await
        .unwrap();

    let err = ScheduleDeleteTransaction::new()
        .schedule_id(receipt.schedule_id.unwrap())
        .freeze_with(&client)
        .unwrap()
        .execute(&client)
        .await
        .unwrap()
        .get_receipt(&client)
        .await
        .unwrap_err();

    assert!(
        matches!(err, Error::ReceiptStatus { status: Status::ScheduleIsImmutable, .. }),
        "got {err:?}"
    );
}

#[test]
fn test_chunked_transaction_cannot_be_scheduled() {
    let err = crate::tx_builder::TopicMessageSubmitTransaction::new()
        .message(vec![1u8; 3000])
        .schedule()
        .unwrap_err();
    assert!(matches!(err, Error::IllegalState(_)));
}
