//! Draft, freeze, sign, submit and resolve

use super::test_helpers::{operator_id, setup};
use crate::crypto::PrivateKey;
use crate::entity::AccountId;
use crate::error::Error;
use crate::hbar::Hbar;
use crate::query::AccountBalanceQuery;
use crate::receipt::{TransactionReceiptQuery, TransactionRecordQuery};
use crate::status::Status;
use crate::test_utils::{MockNetwork, MockResponse, MOCK_TRANSACTION_FEE};
use crate::transaction_id::TransactionId;
use crate::tx_builder::{
    AccountCreateTransaction, AnyTransaction, FrozenTransaction, TopicMessageSubmitTransaction, Transaction,
    TransferData, TransferTransaction,
};
use crate::wire::Operation;

#[tokio::test]
async fn test_account_create_with_initial_balance() {
    let (network, client) = setup();
    let key = PrivateKey::generate_ed25519();

    let receipt = AccountCreateTransaction::new()
        .key(key.public_key())
        .initial_balance(Hbar::new(5))
        .freeze_with(&client)
        .unwrap()
        .execute(&client)
        .await
        .unwrap()
        .get_receipt(&client)
        .await
        .unwrap();

    assert_eq!(receipt.status, Status::Success);
    let account_id = receipt.account_id.expect("receipt carries the new account");

    let balance = AccountBalanceQuery::new()
        .account_id(account_id)
        .execute(&client)
        .await
        .unwrap();
    assert_eq!(balance.hbars, Hbar::new(5));

    let operator_balance = network.balance(&operator_id(&client)).unwrap();
    assert_eq!(operator_balance, Hbar::new(10_000) - Hbar::new(5) - MOCK_TRANSACTION_FEE);
}

#[tokio::test]
async fn test_record_lists_transfers_and_fee() {
    let (_network, client) = setup();
    let key = PrivateKey::generate_ed25519();

    let response = AccountCreateTransaction::new()
        .key(key.public_key())
        .initial_balance(Hbar::new(1))
        .transaction_memo("hello")
        .freeze_with(&client)
        .unwrap()
        .execute(&client)
        .await
        .unwrap();
    let record = response.get_record(&client).await.unwrap();

    assert_eq!(record.transaction_id, response.transaction_id);
    assert_eq!(record.memo, "hello");
    assert_eq!(record.transaction_fee, MOCK_TRANSACTION_FEE);
    assert_eq!(record.transfers.len(), 2);
    let credited: Hbar = record
        .transfers
        .iter()
        .filter(|t| t.amount > Hbar::ZERO)
        .map(|t| t.amount)
        .fold(Hbar::ZERO, |acc, amount| acc + amount);
    assert_eq!(credited, Hbar::new(1));
}

#[tokio::test]
async fn test_duplicate_submission_is_rejected_at_precheck() {
    let (_network, client) = setup();

    let frozen = TransferTransaction::new()
        .hbar_transfer(operator_id(&client), Hbar::ZERO)
        .freeze_with(&client)
        .unwrap();
    let transaction_id = frozen.transaction_id().clone();

    frozen.clone().execute(&client).await.unwrap();
    let err = frozen.execute(&client).await.unwrap_err();

    match err {
        Error::PrecheckStatus { status, transaction_id: id } => {
            assert_eq!(status, Status::DuplicateTransaction);
            assert_eq!(id, Some(transaction_id));
        }
        other => panic!("expected duplicate precheck, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_duplicates_returned_only_when_requested() {
    let (network, client) = setup();
    let frozen = TransferTransaction::new()
        .hbar_transfer(operator_id(&client), Hbar::ZERO)
        .node_account_ids([AccountId::from_num(3), AccountId::from_num(4)])
        .freeze_with(&client)
        .unwrap();

    let first = frozen.clone().execute(&client).await.unwrap();
    assert_eq!(first.node_id, AccountId::from_num(3));

    // Node 3 is busy, so the resubmission reaches consensus through node 4.
    network.script(
        &MockNetwork::node_endpoint(3),
        Operation::SubmitTransaction,
        [MockResponse::Status(Status::Busy)],
    );
    let second = frozen.execute(&client).await.unwrap();
    assert_eq!(second.node_id, AccountId::from_num(4));
    assert_eq!(second.transaction_id, first.transaction_id);

    let receipt = first.get_receipt(&client).await.unwrap();
    assert_eq!(receipt.status, Status::Success);
    assert!(receipt.duplicates.is_empty());

    let receipt = TransactionReceiptQuery::new()
        .transaction_id(first.transaction_id.clone())
        .include_duplicates(true)
        .execute(&client)
        .await
        .unwrap();
    assert_eq!(receipt.status, Status::Success);
    assert_eq!(receipt.duplicates.len(), 1);
    assert_eq!(receipt.duplicates[0].status, Status::DuplicateTransaction);
    assert!(receipt.children.is_empty());

    let record = first.get_record(&client).await.unwrap();
    assert!(record.duplicates.is_empty());

    let record = TransactionRecordQuery::new()
        .transaction_id(first.transaction_id.clone())
        .include_duplicates(true)
        .execute(&client)
        .await
        .unwrap();
    assert_eq!(record.duplicates.len(), 1);
    assert_eq!(record.duplicates[0].receipt.status, Status::DuplicateTransaction);
    assert_eq!(record.duplicates[0].transaction_id, first.transaction_id);
}

#[tokio::test]
async fn test_unsigned_foreign_payer_never_reaches_network() {
    let (network, client) = setup();
    let other = network.create_account(PrivateKey::generate_ed25519().public_key(), Hbar::new(10));

    let err = TransferTransaction::new()
        .transaction_id(TransactionId::generate(other.clone()))
        .hbar_transfer(other, Hbar::ZERO)
        .freeze_with(&client)
        .unwrap()
        .execute(&client)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::NotSigned(_)), "got {err:?}");
    assert!(network.calls().is_empty());
}

#[tokio::test]
async fn test_foreign_payer_signed_by_its_key() {
    let (network, client) = setup();
    let payer_key = PrivateKey::generate_ed25519();
    let payer = network.create_account(payer_key.public_key(), Hbar::new(10));

    let receipt = TransferTransaction::new()
        .transaction_id(TransactionId::generate(payer.clone()))
        .hbar_transfer(payer.clone(), Hbar::new(-2))
        .hbar_transfer(operator_id(&client), Hbar::new(2))
        .freeze_with(&client)
        .unwrap()
        .sign(&payer_key)
        .await
        .unwrap()
        .execute(&client)
        .await
        .unwrap()
        .get_receipt(&client)
        .await
        .unwrap();

    assert_eq!(receipt.status, Status::Success);
    assert_eq!(
        network.balance(&payer),
        Some(Hbar::new(8) - MOCK_TRANSACTION_FEE)
    );
}

#[tokio::test]
async fn test_known_payer_key_blocks_other_signers() {
    let (network, client) = setup();
    let payer_key = PrivateKey::generate_ed25519();
    let payer = network.create_account(payer_key.public_key(), Hbar::new(10));
    let stranger = PrivateKey::generate_ed25519();

    let frozen = TransferTransaction::new()
        .transaction_id(TransactionId::generate(payer.clone()))
        .hbar_transfer(payer.clone(), Hbar::new(-1))
        .hbar_transfer(operator_id(&client), Hbar::new(1))
        .freeze_with(&client)
        .unwrap()
        .payer_key(payer_key.public_key());

    let err = frozen
        .clone()
        .sign(&stranger)
        .await
        .unwrap()
        .execute(&client)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotSigned(_)), "got {err:?}");
    assert!(network.calls().is_empty());

    let receipt = frozen
        .sign(&payer_key)
        .await
        .unwrap()
        .execute(&client)
        .await
        .unwrap()
        .get_receipt(&client)
        .await
        .unwrap();
    assert_eq!(receipt.status, Status::Success);
}

#[tokio::test]
async fn test_too_many_chunks_fails_before_submission() {
    let (network, client) = setup();

    let err = TopicMessageSubmitTransaction::new()
        .topic_id(crate::entity::AccountId::from_num(1001))
        .message(vec![7u8; 1024 * 20 + 1])
        .freeze_with(&client)
        .unwrap_err();

    assert!(
        matches!(err, Error::MaxChunksExceeded { required: 21, max: 20 }),
        "got {err:?}"
    );
    assert!(network.calls().is_empty());
}

#[tokio::test]
async fn test_failed_receipt_surfaces_as_receipt_error() {
    let (network, client) = setup();
    let poor = network.create_account(PrivateKey::generate_ed25519().public_key(), Hbar::new(1));

    let response = TransferTransaction::new()
        .hbar_transfer(operator_id(&client), Hbar::new(-1_000_000))
        .hbar_transfer(poor, Hbar::new(1_000_000))
        .freeze_with(&client)
        .unwrap()
        .execute(&client)
        .await
        .unwrap();

    let err = response.get_receipt(&client).await.unwrap_err();
    match err {
        Error::ReceiptStatus { status, transaction_id, receipt } => {
            assert_eq!(status, Status::InsufficientAccountBalance);
            assert_eq!(transaction_id, response.transaction_id);
            assert_eq!(receipt.status, Status::InsufficientAccountBalance);
        }
        other => panic!("expected receipt error, got {other:?}"),
    }

    let receipt = response
        .clone()
        .validate_status(false)
        .get_receipt(&client)
        .await
        .unwrap();
    assert_eq!(receipt.status, Status::InsufficientAccountBalance);
}

#[tokio::test(start_paused = true)]
async fn test_receipt_polls_until_final() {
    let (network, client) = setup();
    network.set_receipt_delay(2);

    let receipt = TransferTransaction::new()
        .hbar_transfer(operator_id(&client), Hbar::ZERO)
        .freeze_with(&client)
        .unwrap()
        .execute(&client)
        .await
        .unwrap()
        .get_receipt(&client)
        .await
        .unwrap();

    assert_eq!(receipt.status, Status::Success);
    assert_eq!(network.calls_for(Operation::GetTransactionReceipt).len(), 3);
}

#[tokio::test]
async fn test_bytes_round_trip_at_each_stage() {
    let (network, client) = setup();
    let operator = operator_id(&client);

    let draft = TransferTransaction::new()
        .hbar_transfer(operator.clone(), Hbar::ZERO)
        .transaction_memo("round trip");
    let restored = Transaction::<TransferData>::from_bytes(&draft.to_bytes().unwrap()).unwrap();
    assert_eq!(restored, draft);
    assert!(!AnyTransaction::from_bytes(&draft.to_bytes().unwrap()).unwrap().is_frozen());

    let frozen = draft.freeze_with(&client).unwrap();
    let bytes = frozen.to_bytes().unwrap();
    let restored = FrozenTransaction::<TransferData>::from_bytes(&bytes).unwrap();
    assert_eq!(restored.transaction_id(), frozen.transaction_id());
    assert_eq!(restored.body_bytes(0), frozen.body_bytes(0));
    assert!(AnyTransaction::from_bytes(&bytes).unwrap().is_frozen());

    let signed = frozen.sign_with_operator(&client).await.unwrap();
    let restored = FrozenTransaction::<TransferData>::from_bytes(&signed.to_bytes().unwrap()).unwrap();
    assert_eq!(restored.signatures()[0].len(), 1);
    assert_eq!(restored.transaction_hash().unwrap(), signed.transaction_hash().unwrap());

    let response = restored.execute(&client).await.unwrap();
    assert_eq!(response.transaction_hash, signed.transaction_hash().unwrap());
    assert_eq!(
        response.get_receipt(&client).await.unwrap().status,
        Status::Success
    );
    assert_eq!(network.calls_for(Operation::SubmitTransaction).len(), 1);
}

#[tokio::test]
async fn test_concurrent_submissions_share_one_client() {
    let (network, client) = setup();
    let receiver = network.create_account(PrivateKey::generate_ed25519().public_key(), Hbar::ZERO);

    let submissions = (0..8).map(|_| {
        let client = client.clone();
        let receiver = receiver.clone();
        async move {
            TransferTransaction::new()
                .hbar_transfer(operator_id(&client), Hbar::new(-1))
                .hbar_transfer(receiver, Hbar::new(1))
                .freeze_with(&client)?
                .execute(&client)
                .await?
                .get_receipt(&client)
                .await
        }
    });
    let receipts = futures::future::join_all(submissions).await;

    assert!(receipts.iter().all(|r| matches!(r, Ok(receipt) if receipt.status == Status::Success)));
    assert_eq!(network.balance(&receiver), Some(Hbar::new(8)));
}
