//! Chunked topic messages and subscriptions

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::test_helpers::setup;
use crate::error::Error;
use crate::query::TopicMessageQuery;
use crate::status::Status;
use crate::tx_builder::{TopicCreateTransaction, TopicMessageSubmitTransaction};
use crate::wire::Operation;

fn message(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[tokio::test]
async fn test_chunked_message_is_reassembled_by_subscription() {
    let (network, client) = setup();

    let topic_id = TopicCreateTransaction::new()
        .topic_memo("events")
        .freeze_with(&client)
        .unwrap()
        .execute(&client)
        .await
        .unwrap()
        .get_receipt(&client)
        .await
        .unwrap()
        .topic_id
        .expect("topic id in receipt");

    let payload = message(2500);
    let frozen = TopicMessageSubmitTransaction::new()
        .topic_id(topic_id.clone())
        .message(payload.clone())
        .freeze_with(&client)
        .unwrap();
    assert_eq!(frozen.chunk_count(), 3);
    let initial_transaction_id = frozen.transaction_id().clone();

    let responses = frozen.execute_all(&client).await.unwrap();
    assert_eq!(responses.len(), 3);
    let last = responses.last().unwrap().get_receipt(&client).await.unwrap();
    assert_eq!(last.topic_sequence_number, 3);
    assert_eq!(network.calls_for(Operation::SubmitTransaction).len(), 4);

    let stored = network.topic_messages(&topic_id);
    assert_eq!(stored.len(), 3);
    assert!(stored.iter().all(|c| c.chunk_info.as_ref().unwrap().total == 3));

    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = TopicMessageQuery::new()
        .topic_id(topic_id)
        .limit(1)
        .subscribe(&client, move |message| {
            let _ = tx.send(message);
        })
        .unwrap();
    handle.join().await;

    let delivered = rx.recv().await.expect("one message delivered");
    assert_eq!(delivered.contents, payload);
    assert_eq!(delivered.transaction_id, initial_transaction_id);
    assert_eq!(delivered.sequence_number, 3);
    assert_eq!(delivered.chunks.len(), 3);
    assert_eq!(delivered.running_hash, stored[2].running_hash);
}

#[tokio::test]
async fn test_subscription_starts_at_sequence_number() {
    let (network, client) = setup();
    let topic_id = TopicCreateTransaction::new()
        .freeze_with(&client)
        .unwrap()
        .execute(&client)
        .await
        .unwrap()
        .get_receipt(&client)
        .await
        .unwrap()
        .topic_id
        .unwrap();

    for text in ["one", "two", "three"] {
        TopicMessageSubmitTransaction::new()
            .topic_id(topic_id.clone())
            .message(text)
            .freeze_with(&client)
            .unwrap()
            .execute(&client)
            .await
            .unwrap()
            .get_receipt(&client)
            .await
            .unwrap();
    }
    assert_eq!(network.topic_messages(&topic_id).len(), 3);

    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    let handle = TopicMessageQuery::new()
        .topic_id(topic_id)
        .start_sequence_number(2)
        .limit(2)
        .subscribe(&client, move |message| sink.lock().push(message.contents))
        .unwrap();
    handle.join().await;

    assert_eq!(*received.lock(), vec![b"two".to_vec(), b"three".to_vec()]);
}

#[tokio::test]
async fn test_unknown_topic_reports_error() {
    let (_network, client) = setup();
    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = errors.clone();

    let handle = TopicMessageQuery::new()
        .topic_id(crate::entity::AccountId::from_num(9_999))
        .poll_interval(Duration::from_millis(10))
        .error_handler(move |err| sink.lock().push(err.to_string()))
        .subscribe(&client, |_| {})
        .unwrap();
    handle.join().await;

    let errors = errors.lock();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains(Status::InvalidTopicId.as_str_name()), "{}", errors[0]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_no_callback_starts_after_unsubscribe() {
    let (_network, client) = setup();
    let topic_id = TopicCreateTransaction::new()
        .freeze_with(&client)
        .unwrap()
        .execute(&client)
        .await
        .unwrap()
        .get_receipt(&client)
        .await
        .unwrap()
        .topic_id
        .unwrap();

    for i in 0..5u8 {
        TopicMessageSubmitTransaction::new()
            .topic_id(topic_id.clone())
            .message(vec![i])
            .freeze_with(&client)
            .unwrap()
            .execute(&client)
            .await
            .unwrap()
            .get_receipt(&client)
            .await
            .unwrap();
    }

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let (started_tx, mut started_rx) = mpsc::unbounded_channel();
    let handle = TopicMessageQuery::new()
        .topic_id(topic_id)
        .subscribe(&client, move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                let _ = started_tx.send(());
                // Hold the task inside the first callback while unsubscribing.
                std::thread::sleep(Duration::from_millis(300));
            }
        })
        .unwrap();

    started_rx.recv().await.expect("first callback ran");
    handle.unsubscribe();
    let at_unsubscribe = calls.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(600)).await;

    assert_eq!(at_unsubscribe, 1);
    assert_eq!(calls.load(Ordering::SeqCst), at_unsubscribe);
    assert!(handle.is_finished());
}

#[test]
fn test_subscribe_needs_topic_id() {
    let (_network, client) = setup();
    let err = TopicMessageQuery::new().subscribe(&client, |_| {}).unwrap_err();
    assert!(matches!(err, Error::IllegalState(_)));
}
