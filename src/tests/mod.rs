//! End-to-end scenarios against the in-memory ledger

mod key_list_proptests;
mod schedule_tests;
mod token_transfer_tests;
mod topic_tests;
mod transaction_lifecycle_tests;
