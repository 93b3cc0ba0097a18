//! Token association, transfers and custom fees

use super::test_helpers::setup;
use crate::crypto::PrivateKey;
use crate::error::Error;
use crate::hbar::Hbar;
use crate::query::AccountBalanceQuery;
use crate::status::Status;
use crate::tx_builder::{TokenAssociateTransaction, TransferTransaction};

#[tokio::test]
async fn test_token_transfer_assesses_custom_fee() {
    let (network, client) = setup();
    let treasury_key = PrivateKey::generate_ed25519();
    let receiver_key = PrivateKey::generate_ecdsa();
    let treasury = network.create_account(treasury_key.public_key(), Hbar::new(10));
    let receiver = network.create_account(receiver_key.public_key(), Hbar::ZERO);
    let collector = network.create_account(PrivateKey::generate_ed25519().public_key(), Hbar::ZERO);
    let token = network.create_token(&treasury, 1_000);
    network.set_custom_fee(&token, &collector, Hbar::new(1));

    let receipt = TokenAssociateTransaction::new()
        .account_id(receiver.clone())
        .token_ids([token.clone()])
        .freeze_with(&client)
        .unwrap()
        .sign(&receiver_key)
        .await
        .unwrap()
        .execute(&client)
        .await
        .unwrap()
        .get_receipt(&client)
        .await
        .unwrap();
    assert_eq!(receipt.status, Status::Success);

    let record = TransferTransaction::new()
        .token_transfer(token.clone(), treasury.clone(), -250)
        .token_transfer(token.clone(), receiver.clone(), 250)
        .freeze_with(&client)
        .unwrap()
        .sign(&treasury_key)
        .await
        .unwrap()
        .execute(&client)
        .await
        .unwrap()
        .get_record(&client)
        .await
        .unwrap();

    assert_eq!(record.receipt.status, Status::Success);
    assert_eq!(record.token_transfers.len(), 2);
    assert_eq!(record.assessed_custom_fees.len(), 1);
    let fee = &record.assessed_custom_fees[0];
    assert_eq!(fee.amount, Hbar::new(1).to_tinybars());
    assert_eq!(fee.fee_collector_account_id, collector);
    assert_eq!(fee.payer_account_ids, vec![treasury.clone()]);

    assert_eq!(network.token_balance(&receiver, &token), Some(250));
    assert_eq!(network.token_balance(&treasury, &token), Some(750));
    assert_eq!(network.balance(&collector), Some(Hbar::new(1)));

    let balance = AccountBalanceQuery::new()
        .account_id(receiver)
        .execute(&client)
        .await
        .unwrap();
    assert_eq!(balance.tokens.get(&token), Some(&250));
}

#[tokio::test]
async fn test_transfer_to_unassociated_account_fails() {
    let (network, client) = setup();
    let treasury_key = PrivateKey::generate_ed25519();
    let treasury = network.create_account(treasury_key.public_key(), Hbar::new(10));
    let stranger = network.create_account(PrivateKey::generate_ed25519().public_key(), Hbar::ZERO);
    let token = network.create_token(&treasury, 100);

    let err = TransferTransaction::new()
        .token_transfer(token.clone(), treasury.clone(), -10)
        .token_transfer(token.clone(), stranger.clone(), 10)
        .freeze_with(&client)
        .unwrap()
        .sign(&treasury_key)
        .await
        .unwrap()
        .execute(&client)
        .await
        .unwrap()
        .get_receipt(&client)
        .await
        .unwrap_err();

    assert!(
        matches!(err, Error::ReceiptStatus { status: Status::TokenNotAssociatedToAccount, .. }),
        "got {err:?}"
    );
    assert_eq!(network.token_balance(&treasury, &token), Some(100));
}

#[tokio::test]
async fn test_sender_signature_is_required() {
    let (network, client) = setup();
    let owner = network.create_account(PrivateKey::generate_ed25519().public_key(), Hbar::new(10));
    let operator = client.operator_account_id().unwrap();

    let err = TransferTransaction::new()
        .hbar_transfer(owner.clone(), Hbar::new(-3))
        .hbar_transfer(operator, Hbar::new(3))
        .freeze_with(&client)
        .unwrap()
        .execute(&client)
        .await
        .unwrap()
        .get_receipt(&client)
        .await
        .unwrap_err();

    assert!(
        matches!(err, Error::ReceiptStatus { status: Status::InvalidSignature, .. }),
        "got {err:?}"
    );
    assert_eq!(network.balance(&owner), Some(Hbar::new(10)));
}
