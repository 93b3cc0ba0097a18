//! Test utilities
//!
//! `MockNetwork` is an in-memory ledger behind the `Transport` trait. It
//! verifies signatures, rejects duplicates, moves balances, runs schedules
//! once enough keys have signed, stores topic messages and answers receipt,
//! record, balance and schedule queries. Responses can be scripted per node
//! and operation to exercise the retry paths.
//!
//! Only compiled for tests or with the `test_utils` feature.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use crate::client::Client;
use crate::crypto::{Key, PrivateKey, SignatureMap};
use crate::entity::{AccountId, ContractId, FileId, LedgerId, ScheduleId, TokenId, TopicId};
use crate::hbar::Hbar;
use crate::node_manager::{Transport, TransportError};
use crate::query::{AccountBalance, ScheduleInfo, TopicMessageChunk};
use crate::receipt::{
    AssessedCustomFee, ContractFunctionResult, TokenTransfer, TransactionReceipt, TransactionRecord, Transfer,
};
use crate::status::Status;
use crate::timestamp::Timestamp;
use crate::transaction_id::TransactionId;
use crate::tx_builder::{
    AccountCreateData, AnyTransactionData, ChunkInfo, ContractExecuteData, FileAppendData, SchedulableBody,
    ScheduleCreateData, TokenAssociateData, TopicCreateData, TopicMessageSubmitData, TransactionData,
    TransferData,
};
use crate::wire::{self, Operation, QueryRequest, ResponseEnvelope, SignedTransaction, TransactionBody};

/// Flat network fee charged to the payer of every accepted transaction.
pub const MOCK_TRANSACTION_FEE: Hbar = Hbar::from_tinybars(100_000);

pub const MOCK_MIRROR: &str = "mock-mirror";

const OPERATOR_NUM: u64 = 2;
const OPERATOR_BALANCE: Hbar = Hbar::new(10_000);
const FIRST_ENTITY_NUM: u64 = 1001;
const GENESIS: Timestamp = Timestamp::new(1_700_000_000, 0);

/// A canned reply, returned instead of the ledger's own answer.
#[derive(Debug, Clone)]
pub enum MockResponse {
    Status(Status),
    Error(TransportError),
    /// Never answer; the caller's per-call deadline has to fire.
    Hang,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub endpoint: String,
    pub operation: Operation,
}

#[derive(Debug, Default)]
struct MockAccount {
    key: Option<Key>,
    tinybars: i64,
    receiver_signature_required: bool,
    /// Associated tokens and their balances.
    tokens: HashMap<TokenId, i64>,
}

#[derive(Debug, Default)]
struct MockTopic {
    submit_key: Option<Key>,
    running_hash: Vec<u8>,
    messages: Vec<TopicMessageChunk>,
}

#[derive(Debug)]
struct MockSchedule {
    info: ScheduleInfo,
    body: SchedulableBody,
    signatures: SignatureMap,
}

#[derive(Debug)]
struct Outcome {
    record: TransactionRecord,
    polls: u32,
    /// Node that accepted the transaction first.
    node: Option<AccountId>,
}

impl Outcome {
    /// The same transaction reached consensus again through another node.
    fn add_duplicate(&mut self) {
        let mut duplicate = self.record.clone();
        duplicate.receipt = TransactionReceipt::from_status(Status::DuplicateTransaction);
        duplicate.receipt.transaction_id = Some(self.record.transaction_id.clone());
        duplicate.transfers.clear();
        duplicate.token_transfers.clear();
        duplicate.assessed_custom_fees.clear();
        duplicate.children.clear();
        duplicate.duplicates.clear();

        self.record.receipt.duplicates.push(duplicate.receipt.clone());
        self.record.duplicates.push(duplicate);
    }
}

/// What a transaction did, before it is recorded.
#[derive(Debug)]
struct Effects {
    receipt: TransactionReceipt,
    transfers: Vec<Transfer>,
    token_transfers: Vec<TokenTransfer>,
    assessed_custom_fees: Vec<AssessedCustomFee>,
    contract_function_result: Option<ContractFunctionResult>,
}

impl Effects {
    fn status(status: Status) -> Self {
        Self {
            receipt: TransactionReceipt::from_status(status),
            transfers: Vec::new(),
            token_transfers: Vec::new(),
            assessed_custom_fees: Vec::new(),
            contract_function_result: None,
        }
    }

    fn success() -> Self {
        Self::status(Status::Success)
    }
}

struct TxContext<'a> {
    transaction_id: &'a TransactionId,
    payer: &'a AccountId,
    signatures: &'a SignatureMap,
    chunk_info: Option<&'a ChunkInfo>,
    consensus: Timestamp,
}

#[derive(Debug, Default)]
struct Ledger {
    nodes: HashMap<String, AccountId>,
    scripts: HashMap<(String, Operation), VecDeque<MockResponse>>,
    calls: Vec<RecordedCall>,
    accounts: HashMap<AccountId, MockAccount>,
    /// Fixed hbar custom fee per token: (collector, tinybars).
    tokens: HashMap<TokenId, Option<(AccountId, i64)>>,
    topics: HashMap<TopicId, MockTopic>,
    files: HashMap<FileId, Vec<u8>>,
    contracts: Vec<ContractId>,
    schedules: HashMap<ScheduleId, MockSchedule>,
    outcomes: HashMap<TransactionId, Outcome>,
    receipt_delay: u32,
    next_num: u64,
    ticks: u64,
}

/// In-memory ledger reachable through `Transport`.
#[derive(Debug, Clone)]
pub struct MockNetwork {
    ledger: Arc<Mutex<Ledger>>,
}

impl Default for MockNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl MockNetwork {
    pub fn new() -> Self {
        Self {
            ledger: Arc::new(Mutex::new(Ledger {
                next_num: FIRST_ENTITY_NUM,
                ..Default::default()
            })),
        }
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::new(self.clone())
    }

    pub fn node_endpoint(num: u64) -> String {
        format!("mock-node-{num}")
    }

    /// Client with three nodes (0.0.3 to 0.0.5) and a funded operator 0.0.2.
    pub fn client(&self) -> Client {
        self.client_with_nodes(3)
    }

    pub fn client_with_nodes(&self, count: u64) -> Client {
        let nodes: Vec<(AccountId, String)> = (3..3 + count)
            .map(|num| (AccountId::from_num(num), Self::node_endpoint(num)))
            .collect();

        let key = PrivateKey::generate_ed25519();
        let operator = AccountId::from_num(OPERATOR_NUM);
        {
            let mut ledger = self.ledger.lock();
            for (account_id, endpoint) in &nodes {
                ledger.nodes.insert(endpoint.clone(), account_id.clone());
            }
            ledger.accounts.insert(
                operator.clone(),
                MockAccount {
                    key: Some(key.public_key().into()),
                    tinybars: OPERATOR_BALANCE.to_tinybars(),
                    ..Default::default()
                },
            );
        }

        Client::builder(self.transport())
            .nodes(nodes)
            .mirror_network([MOCK_MIRROR.to_string()])
            .ledger_id(LedgerId::local())
            .operator(operator, Arc::new(key))
            .build()
            .expect("mock client settings are valid")
    }

    /// Queue canned replies for `operation` on `endpoint`, used before the ledger answers.
    pub fn script(&self, endpoint: &str, operation: Operation, responses: impl IntoIterator<Item = MockResponse>) {
        self.ledger
            .lock()
            .scripts
            .entry((endpoint.to_string(), operation))
            .or_default()
            .extend(responses);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.ledger.lock().calls.clone()
    }

    pub fn calls_for(&self, operation: Operation) -> Vec<RecordedCall> {
        self.calls().into_iter().filter(|c| c.operation == operation).collect()
    }

    /// Number of receipt polls answered with UNKNOWN before the real receipt.
    pub fn set_receipt_delay(&self, polls: u32) {
        self.ledger.lock().receipt_delay = polls;
    }

    pub fn create_account(&self, key: impl Into<Key>, balance: Hbar) -> AccountId {
        let mut ledger = self.ledger.lock();
        let account_id = ledger.next_id();
        ledger.accounts.insert(
            account_id.clone(),
            MockAccount {
                key: Some(key.into()),
                tinybars: balance.to_tinybars(),
                ..Default::default()
            },
        );
        account_id
    }

    /// New fungible token with `supply` units held by `treasury`.
    pub fn create_token(&self, treasury: &AccountId, supply: i64) -> TokenId {
        let mut ledger = self.ledger.lock();
        let token_id = ledger.next_id();
        ledger.tokens.insert(token_id.clone(), None);
        if let Some(account) = ledger.accounts.get_mut(treasury) {
            account.tokens.insert(token_id.clone(), supply);
        }
        token_id
    }

    /// Charge senders of `token_id` a fixed hbar fee paid to `collector`.
    pub fn set_custom_fee(&self, token_id: &TokenId, collector: &AccountId, fee: Hbar) {
        self.ledger
            .lock()
            .tokens
            .insert(token_id.clone(), Some((collector.clone(), fee.to_tinybars())));
    }

    pub fn create_file(&self, contents: &[u8]) -> FileId {
        let mut ledger = self.ledger.lock();
        let file_id = ledger.next_id();
        ledger.files.insert(file_id.clone(), contents.to_vec());
        file_id
    }

    pub fn create_contract(&self) -> ContractId {
        let mut ledger = self.ledger.lock();
        let contract_id = ledger.next_id();
        ledger.contracts.push(contract_id.clone());
        contract_id
    }

    pub fn balance(&self, account_id: &AccountId) -> Option<Hbar> {
        self.ledger
            .lock()
            .accounts
            .get(account_id)
            .map(|a| Hbar::from_tinybars(a.tinybars))
    }

    pub fn token_balance(&self, account_id: &AccountId, token_id: &TokenId) -> Option<i64> {
        self.ledger
            .lock()
            .accounts
            .get(account_id)
            .and_then(|a| a.tokens.get(token_id).copied())
    }

    pub fn file_contents(&self, file_id: &FileId) -> Option<Vec<u8>> {
        self.ledger.lock().files.get(file_id).cloned()
    }

    pub fn topic_messages(&self, topic_id: &TopicId) -> Vec<TopicMessageChunk> {
        self.ledger
            .lock()
            .topics
            .get(topic_id)
            .map(|t| t.messages.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Transport for MockNetwork {
    async fn call(
        &self,
        endpoint: &str,
        operation: Operation,
        request: Vec<u8>,
        _deadline: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        let scripted = {
            let mut ledger = self.ledger.lock();
            ledger.calls.push(RecordedCall {
                endpoint: endpoint.to_string(),
                operation,
            });
            ledger
                .scripts
                .get_mut(&(endpoint.to_string(), operation))
                .and_then(VecDeque::pop_front)
        };

        let envelope = match scripted {
            Some(MockResponse::Status(status)) => ResponseEnvelope::status_only(status),
            Some(MockResponse::Error(err)) => return Err(err),
            Some(MockResponse::Hang) => return std::future::pending().await,
            None => self.ledger.lock().handle(endpoint, operation, &request),
        };
        wire::encode(&envelope).map_err(|e| TransportError::Failed(e.to_string()))
    }
}

fn respond<T: Serialize>(payload: &T) -> ResponseEnvelope {
    match wire::encode(payload) {
        Ok(payload) => ResponseEnvelope {
            status: Status::Ok.code(),
            payload,
        },
        Err(_) => ResponseEnvelope::status_only(Status::FailInvalid),
    }
}

impl Ledger {
    fn next_id(&mut self) -> AccountId {
        let num = self.next_num;
        self.next_num += 1;
        AccountId::from_num(num)
    }

    fn tick(&mut self) -> Timestamp {
        self.ticks += 1;
        GENESIS.plus_nanos(self.ticks * 1_000)
    }

    fn handle(&mut self, endpoint: &str, operation: Operation, request: &[u8]) -> ResponseEnvelope {
        if operation == Operation::SubmitTransaction {
            return self.submit(endpoint, request);
        }
        let Ok(query) = wire::decode::<QueryRequest>(request) else {
            return ResponseEnvelope::status_only(Status::InvalidTransaction);
        };

        match (operation, query) {
            (
                Operation::GetTransactionReceipt,
                QueryRequest::TransactionReceipt {
                    transaction_id,
                    include_children,
                    include_duplicates,
                },
            ) => {
                let delay = self.receipt_delay;
                match self.outcomes.get_mut(&transaction_id) {
                    None => ResponseEnvelope::status_only(Status::ReceiptNotFound),
                    Some(outcome) => {
                        outcome.polls += 1;
                        if outcome.polls <= delay {
                            return respond(&TransactionReceipt::from_status(Status::Unknown));
                        }
                        let mut receipt = outcome.record.receipt.clone();
                        if !include_children {
                            receipt.children.clear();
                        }
                        if !include_duplicates {
                            receipt.duplicates.clear();
                        }
                        respond(&receipt)
                    }
                }
            }
            (
                Operation::GetTransactionRecord,
                QueryRequest::TransactionRecord {
                    transaction_id,
                    include_children,
                    include_duplicates,
                },
            ) => match self.outcomes.get(&transaction_id) {
                Some(outcome) if outcome.polls >= self.receipt_delay => {
                    let mut record = outcome.record.clone();
                    if !include_children {
                        record.children.clear();
                        record.receipt.children.clear();
                    }
                    if !include_duplicates {
                        record.duplicates.clear();
                        record.receipt.duplicates.clear();
                    }
                    respond(&record)
                }
                _ => ResponseEnvelope::status_only(Status::RecordNotFound),
            },
            (Operation::GetAccountBalance, QueryRequest::AccountBalance { account_id }) => {
                match self.accounts.get(&account_id) {
                    None => ResponseEnvelope::status_only(Status::InvalidAccountId),
                    Some(account) => respond(&AccountBalance {
                        account_id,
                        hbars: Hbar::from_tinybars(account.tinybars),
                        tokens: account
                            .tokens
                            .iter()
                            .map(|(token, amount)| (token.clone(), (*amount).max(0) as u64))
                            .collect(),
                    }),
                }
            }
            (Operation::GetScheduleInfo, QueryRequest::ScheduleInfo { schedule_id }) => {
                match self.schedules.get(&schedule_id) {
                    None => ResponseEnvelope::status_only(Status::InvalidScheduleId),
                    Some(schedule) => {
                        let mut info = schedule.info.clone();
                        info.signatories = schedule.signatures.public_keys().cloned().collect();
                        respond(&info)
                    }
                }
            }
            (
                Operation::GetTopicMessages,
                QueryRequest::TopicMessages {
                    topic_id,
                    start_sequence_number,
                    limit,
                },
            ) => match self.topics.get(&topic_id) {
                None => ResponseEnvelope::status_only(Status::InvalidTopicId),
                Some(topic) => {
                    let page: Vec<TopicMessageChunk> = topic
                        .messages
                        .iter()
                        .filter(|m| m.sequence_number >= start_sequence_number)
                        .take(limit)
                        .cloned()
                        .collect();
                    respond(&page)
                }
            },
            _ => ResponseEnvelope::status_only(Status::NotSupported),
        }
    }

    fn submit(&mut self, endpoint: &str, request: &[u8]) -> ResponseEnvelope {
        let Ok(signed) = wire::decode::<SignedTransaction>(request) else {
            return ResponseEnvelope::status_only(Status::InvalidTransaction);
        };
        let Ok(body) = wire::decode::<TransactionBody>(&signed.body_bytes) else {
            return ResponseEnvelope::status_only(Status::InvalidTransaction);
        };

        let node = self.nodes.get(endpoint).cloned();
        if let Some(node) = &node {
            if !body.node_account_ids.contains(node) {
                return ResponseEnvelope::status_only(Status::InvalidNodeAccount);
            }
        }
        if signed.signatures.verify_all(&signed.body_bytes).is_err() {
            return ResponseEnvelope::status_only(Status::InvalidSignature);
        }
        if let Some(outcome) = self.outcomes.get_mut(&body.transaction_id) {
            // A node only knows what it accepted itself.
            if node.is_none() || outcome.node == node {
                return ResponseEnvelope::status_only(Status::DuplicateTransaction);
            }
            outcome.add_duplicate();
            return ResponseEnvelope::status_only(Status::Ok);
        }

        let payer = body.transaction_id.account_id.clone();
        let Some(account) = self.accounts.get_mut(&payer) else {
            return ResponseEnvelope::status_only(Status::PayerAccountNotFound);
        };
        if !account
            .key
            .as_ref()
            .is_some_and(|key| key.is_satisfied_by(&signed.signatures))
        {
            return ResponseEnvelope::status_only(Status::InvalidSignature);
        }
        if body.max_transaction_fee < MOCK_TRANSACTION_FEE {
            return ResponseEnvelope::status_only(Status::InsufficientTxFee);
        }
        if account.tinybars < MOCK_TRANSACTION_FEE.to_tinybars() {
            return ResponseEnvelope::status_only(Status::InsufficientPayerBalance);
        }
        account.tinybars -= MOCK_TRANSACTION_FEE.to_tinybars();

        let consensus = self.tick();
        let context = TxContext {
            transaction_id: &body.transaction_id,
            payer: &payer,
            signatures: &signed.signatures,
            chunk_info: body.chunk_info.as_ref(),
            consensus,
        };
        let effects = self.apply(&body.data, &context);
        self.record(
            body.transaction_id.clone(),
            effects,
            body.memo.clone(),
            MOCK_TRANSACTION_FEE,
            Sha256::digest(request).to_vec(),
            consensus,
        );
        if let Some(outcome) = self.outcomes.get_mut(&body.transaction_id) {
            outcome.node = node;
        }
        ResponseEnvelope::status_only(Status::Ok)
    }

    fn record(
        &mut self,
        transaction_id: TransactionId,
        effects: Effects,
        memo: String,
        fee: Hbar,
        transaction_hash: Vec<u8>,
        consensus: Timestamp,
    ) {
        let mut receipt = effects.receipt;
        receipt.transaction_id = Some(transaction_id.clone());
        let record = TransactionRecord {
            receipt,
            transaction_hash,
            consensus_timestamp: consensus,
            transaction_id: transaction_id.clone(),
            memo,
            transaction_fee: fee,
            transfers: effects.transfers,
            token_transfers: effects.token_transfers,
            contract_function_result: effects.contract_function_result,
            assessed_custom_fees: effects.assessed_custom_fees,
            children: Vec::new(),
            duplicates: Vec::new(),
        };
        self.outcomes.insert(
            transaction_id,
            Outcome {
                record,
                polls: 0,
                node: None,
            },
        );
    }

    fn account_key(&self, account_id: &AccountId) -> Option<Key> {
        self.accounts.get(account_id).and_then(|a| a.key.clone())
    }

    /// Keys that must have signed for `data` paid by `payer` to execute.
    fn required_keys(&self, data: &AnyTransactionData, payer: &AccountId) -> Vec<Key> {
        let mut keys: Vec<Key> = self.account_key(payer).into_iter().collect();
        match data {
            AnyTransactionData::AccountCreate(create) if create.receiver_signature_required => {
                keys.extend(create.key.clone());
            }
            AnyTransactionData::Transfer(transfer) => {
                let hbar = transfer
                    .hbar_transfers
                    .iter()
                    .map(|t| (&t.account_id, t.amount.to_tinybars()));
                let token = transfer.token_transfers.iter().map(|t| (&t.account_id, t.amount));
                for (account_id, amount) in hbar.chain(token) {
                    let Some(account) = self.accounts.get(account_id) else {
                        continue;
                    };
                    if amount < 0 || (amount > 0 && account.receiver_signature_required) {
                        keys.extend(account.key.clone());
                    }
                }
            }
            AnyTransactionData::TokenAssociate(associate) => {
                if let Some(account_id) = &associate.account_id {
                    keys.extend(self.account_key(account_id));
                }
            }
            AnyTransactionData::TopicMessageSubmit(submit) => {
                if let Some(topic) = submit.topic_id.as_ref().and_then(|id| self.topics.get(id)) {
                    keys.extend(topic.submit_key.clone());
                }
            }
            AnyTransactionData::ScheduleDelete(delete) => {
                if let Some(schedule) = delete.schedule_id.as_ref().and_then(|id| self.schedules.get(id)) {
                    keys.extend(schedule.info.admin_key.clone());
                }
            }
            _ => {}
        }
        keys
    }

    fn apply(&mut self, data: &AnyTransactionData, ctx: &TxContext<'_>) -> Effects {
        let signed = self
            .required_keys(data, ctx.payer)
            .iter()
            .all(|key| key.is_satisfied_by(ctx.signatures));
        if !signed {
            return Effects::status(Status::InvalidSignature);
        }

        match data {
            AnyTransactionData::AccountCreate(create) => self.account_create(create, ctx),
            AnyTransactionData::Transfer(transfer) => self.transfer(transfer),
            AnyTransactionData::TokenAssociate(associate) => self.token_associate(associate),
            AnyTransactionData::ContractExecute(execute) => self.contract_execute(execute),
            AnyTransactionData::TopicCreate(create) => self.topic_create(create),
            AnyTransactionData::TopicMessageSubmit(submit) => self.topic_submit(submit, ctx),
            AnyTransactionData::FileAppend(append) => self.file_append(append),
            AnyTransactionData::ScheduleCreate(create) => self.schedule_create(create, ctx),
            AnyTransactionData::ScheduleSign(sign) => match &sign.schedule_id {
                Some(id) => self.schedule_sign(id, ctx),
                None => Effects::status(Status::InvalidScheduleId),
            },
            AnyTransactionData::ScheduleDelete(delete) => match &delete.schedule_id {
                Some(id) => self.schedule_delete(id, ctx),
                None => Effects::status(Status::InvalidScheduleId),
            },
        }
    }

    fn account_create(&mut self, create: &AccountCreateData, ctx: &TxContext<'_>) -> Effects {
        let Some(key) = create.key.clone() else {
            return Effects::status(Status::KeyNotProvided);
        };
        let initial = create.initial_balance.to_tinybars();
        let Some(payer) = self.accounts.get_mut(ctx.payer) else {
            return Effects::status(Status::PayerAccountNotFound);
        };
        if initial < 0 || payer.tinybars < initial {
            return Effects::status(Status::InsufficientPayerBalance);
        }
        payer.tinybars -= initial;

        let account_id = self.next_id();
        self.accounts.insert(
            account_id.clone(),
            MockAccount {
                key: Some(key),
                tinybars: initial,
                receiver_signature_required: create.receiver_signature_required,
                tokens: HashMap::new(),
            },
        );

        let mut effects = Effects::success();
        effects.receipt.account_id = Some(account_id.clone());
        effects.transfers = vec![
            Transfer {
                account_id: ctx.payer.clone(),
                amount: Hbar::from_tinybars(-initial),
                is_approved: false,
            },
            Transfer {
                account_id,
                amount: Hbar::from_tinybars(initial),
                is_approved: false,
            },
        ];
        effects
    }

    fn transfer(&mut self, transfer: &TransferData) -> Effects {
        if transfer.hbar_transfers.iter().any(|t| t.is_approval)
            || transfer.token_transfers.iter().any(|t| t.is_approval)
        {
            return Effects::status(Status::SpenderDoesNotHaveAllowance);
        }

        let mut hbar: HashMap<AccountId, i64> = HashMap::new();
        for t in &transfer.hbar_transfers {
            if !self.accounts.contains_key(&t.account_id) {
                return Effects::status(Status::InvalidAccountId);
            }
            *hbar.entry(t.account_id.clone()).or_default() += t.amount.to_tinybars();
        }
        if hbar.values().sum::<i64>() != 0 {
            return Effects::status(Status::InvalidAccountAmounts);
        }

        let mut tokens: HashMap<(TokenId, AccountId), i64> = HashMap::new();
        let mut token_sums: HashMap<TokenId, i64> = HashMap::new();
        let mut assessed = Vec::new();
        for t in &transfer.token_transfers {
            let Some(fee) = self.tokens.get(&t.token_id) else {
                return Effects::status(Status::InvalidTokenId);
            };
            let Some(account) = self.accounts.get(&t.account_id) else {
                return Effects::status(Status::InvalidAccountId);
            };
            if !account.tokens.contains_key(&t.token_id) {
                return Effects::status(Status::TokenNotAssociatedToAccount);
            }
            *tokens.entry((t.token_id.clone(), t.account_id.clone())).or_default() += t.amount;
            *token_sums.entry(t.token_id.clone()).or_default() += t.amount;

            if let Some((collector, amount)) = fee {
                if t.amount < 0 && &t.account_id != collector {
                    *hbar.entry(t.account_id.clone()).or_default() -= amount;
                    *hbar.entry(collector.clone()).or_default() += amount;
                    assessed.push(AssessedCustomFee {
                        token_id: None,
                        amount: *amount,
                        fee_collector_account_id: collector.clone(),
                        payer_account_ids: vec![t.account_id.clone()],
                    });
                }
            }
        }
        if token_sums.values().any(|sum| *sum != 0) {
            return Effects::status(Status::InvalidAccountAmounts);
        }

        for (account_id, delta) in &hbar {
            let balance = self.accounts.get(account_id).map_or(0, |a| a.tinybars);
            if balance + delta < 0 {
                return Effects::status(Status::InsufficientAccountBalance);
            }
        }
        for ((token_id, account_id), delta) in &tokens {
            let balance = self
                .accounts
                .get(account_id)
                .and_then(|a| a.tokens.get(token_id).copied())
                .unwrap_or(0);
            if balance + delta < 0 {
                return Effects::status(Status::InsufficientTokenBalance);
            }
        }

        let mut effects = Effects::success();
        for (account_id, delta) in hbar {
            if let Some(account) = self.accounts.get_mut(&account_id) {
                account.tinybars += delta;
            }
            if delta != 0 {
                effects.transfers.push(Transfer {
                    account_id,
                    amount: Hbar::from_tinybars(delta),
                    is_approved: false,
                });
            }
        }
        for ((token_id, account_id), delta) in tokens {
            if let Some(balance) = self
                .accounts
                .get_mut(&account_id)
                .and_then(|a| a.tokens.get_mut(&token_id))
            {
                *balance += delta;
            }
            effects.token_transfers.push(TokenTransfer {
                token_id,
                account_id,
                amount: delta,
            });
        }
        effects.assessed_custom_fees = assessed;
        effects
    }

    fn token_associate(&mut self, associate: &TokenAssociateData) -> Effects {
        let Some(account_id) = &associate.account_id else {
            return Effects::status(Status::InvalidAccountId);
        };
        if associate.token_ids.iter().any(|t| !self.tokens.contains_key(t)) {
            return Effects::status(Status::InvalidTokenId);
        }
        let Some(account) = self.accounts.get_mut(account_id) else {
            return Effects::status(Status::InvalidAccountId);
        };
        if associate.token_ids.iter().any(|t| account.tokens.contains_key(t)) {
            return Effects::status(Status::TokenAlreadyAssociatedToAccount);
        }
        for token_id in &associate.token_ids {
            account.tokens.insert(token_id.clone(), 0);
        }
        Effects::success()
    }

    fn contract_execute(&mut self, execute: &ContractExecuteData) -> Effects {
        let Some(contract_id) = execute.contract_id.as_ref().filter(|id| self.contracts.contains(id)) else {
            return Effects::status(Status::InvalidContractId);
        };
        let mut effects = Effects::success();
        effects.receipt.contract_id = Some(contract_id.clone());
        effects.contract_function_result = Some(ContractFunctionResult {
            contract_id: contract_id.clone(),
            bytes: Sha256::digest(&execute.function_parameters).to_vec(),
            error_message: None,
            gas_used: execute.gas.min(21_000),
        });
        effects
    }

    fn topic_create(&mut self, create: &TopicCreateData) -> Effects {
        let topic_id = self.next_id();
        self.topics.insert(
            topic_id.clone(),
            MockTopic {
                submit_key: create.submit_key.clone(),
                ..Default::default()
            },
        );
        let mut effects = Effects::success();
        effects.receipt.topic_id = Some(topic_id);
        effects
    }

    fn topic_submit(&mut self, submit: &TopicMessageSubmitData, ctx: &TxContext<'_>) -> Effects {
        let Some(topic) = submit.topic_id.as_ref().and_then(|id| self.topics.get_mut(id)) else {
            return Effects::status(Status::InvalidTopicId);
        };
        let contents = submit.chunk_data.data.clone();
        let mut hasher = Sha256::new();
        hasher.update(&topic.running_hash);
        hasher.update(&contents);
        topic.running_hash = hasher.finalize().to_vec();

        let sequence_number = topic.messages.len() as u64 + 1;
        topic.messages.push(TopicMessageChunk {
            consensus_timestamp: ctx.consensus,
            sequence_number,
            contents,
            running_hash: topic.running_hash.clone(),
            transaction_id: ctx.transaction_id.clone(),
            chunk_info: ctx.chunk_info.cloned(),
        });

        let mut effects = Effects::success();
        effects.receipt.topic_sequence_number = sequence_number;
        effects
    }

    fn file_append(&mut self, append: &FileAppendData) -> Effects {
        let Some(file) = append.file_id.as_ref().and_then(|id| self.files.get_mut(id)) else {
            return Effects::status(Status::InvalidFileId);
        };
        file.extend_from_slice(&append.chunk_data.data);
        let mut effects = Effects::success();
        effects.receipt.file_id = append.file_id.clone();
        effects
    }

    fn schedule_create(&mut self, create: &ScheduleCreateData, ctx: &TxContext<'_>) -> Effects {
        let Some(body) = create.scheduled.clone() else {
            return Effects::status(Status::InvalidTransaction);
        };
        if !body.data.is_schedulable() {
            return Effects::status(Status::InvalidTransaction);
        }
        let payer_account_id = create.payer_account_id.clone().unwrap_or_else(|| ctx.payer.clone());

        let identical = self.schedules.values().find(|s| {
            s.body == body
                && s.info.payer_account_id == payer_account_id
                && s.info.memo == create.schedule_memo
                && s.info.admin_key == create.admin_key
                && s.info.executed_at.is_none()
                && s.info.deleted_at.is_none()
        });
        if let Some(existing) = identical {
            let mut effects = Effects::status(Status::IdenticalScheduleAlreadyCreated);
            effects.receipt.schedule_id = Some(existing.info.schedule_id.clone());
            effects.receipt.scheduled_transaction_id = Some(existing.info.scheduled_transaction_id.clone());
            return effects;
        }

        let schedule_id = self.next_id();
        let scheduled_transaction_id = ctx.transaction_id.clone().with_scheduled(true);
        self.schedules.insert(
            schedule_id.clone(),
            MockSchedule {
                info: ScheduleInfo {
                    schedule_id: schedule_id.clone(),
                    creator_account_id: ctx.payer.clone(),
                    payer_account_id,
                    signatories: Vec::new(),
                    admin_key: create.admin_key.clone(),
                    scheduled_transaction_id: scheduled_transaction_id.clone(),
                    scheduled_transaction: (*body.data).clone(),
                    memo: create.schedule_memo.clone(),
                    expiration_time: create.expiration_time,
                    executed_at: None,
                    deleted_at: None,
                    wait_for_expiry: create.wait_for_expiry,
                },
                body,
                signatures: ctx.signatures.clone(),
            },
        );
        self.try_execute_schedule(&schedule_id, ctx.consensus);

        let mut effects = Effects::success();
        effects.receipt.schedule_id = Some(schedule_id);
        effects.receipt.scheduled_transaction_id = Some(scheduled_transaction_id);
        effects
    }

    fn schedule_sign(&mut self, schedule_id: &ScheduleId, ctx: &TxContext<'_>) -> Effects {
        let Some(schedule) = self.schedules.get_mut(schedule_id) else {
            return Effects::status(Status::InvalidScheduleId);
        };
        if schedule.info.deleted_at.is_some() {
            return Effects::status(Status::ScheduleAlreadyDeleted);
        }
        if schedule.info.executed_at.is_some() {
            return Effects::status(Status::ScheduleAlreadyExecuted);
        }

        let before = schedule.signatures.len();
        schedule.signatures.merge(ctx.signatures);
        if schedule.signatures.len() == before {
            return Effects::status(Status::NoNewValidSignatures);
        }
        let scheduled_transaction_id = schedule.info.scheduled_transaction_id.clone();
        self.try_execute_schedule(schedule_id, ctx.consensus);

        let mut effects = Effects::success();
        effects.receipt.scheduled_transaction_id = Some(scheduled_transaction_id);
        effects
    }

    fn schedule_delete(&mut self, schedule_id: &ScheduleId, ctx: &TxContext<'_>) -> Effects {
        let Some(schedule) = self.schedules.get_mut(schedule_id) else {
            return Effects::status(Status::InvalidScheduleId);
        };
        if schedule.info.admin_key.is_none() {
            return Effects::status(Status::ScheduleIsImmutable);
        }
        if schedule.info.deleted_at.is_some() {
            return Effects::status(Status::ScheduleAlreadyDeleted);
        }
        if schedule.info.executed_at.is_some() {
            return Effects::status(Status::ScheduleAlreadyExecuted);
        }
        schedule.info.deleted_at = Some(ctx.consensus);
        Effects::success()
    }

    /// Execute a schedule once its signatories satisfy every required key.
    fn try_execute_schedule(&mut self, schedule_id: &ScheduleId, consensus: Timestamp) {
        let Some(schedule) = self.schedules.get(schedule_id) else {
            return;
        };
        if schedule.info.executed_at.is_some()
            || schedule.info.deleted_at.is_some()
            || schedule.info.wait_for_expiry
        {
            return;
        }

        let data = (*schedule.body.data).clone();
        let payer = schedule.info.payer_account_id.clone();
        let signatures = schedule.signatures.clone();
        let transaction_id = schedule.info.scheduled_transaction_id.clone();
        let memo = schedule.body.memo.clone();

        let ready = self
            .required_keys(&data, &payer)
            .iter()
            .all(|key| key.is_satisfied_by(&signatures));
        if !ready {
            return;
        }

        let context = TxContext {
            transaction_id: &transaction_id,
            payer: &payer,
            signatures: &signatures,
            chunk_info: None,
            consensus,
        };
        let effects = self.apply(&data, &context);
        self.record(transaction_id.clone(), effects, memo, Hbar::ZERO, Vec::new(), consensus);

        if let Some(schedule) = self.schedules.get_mut(schedule_id) {
            schedule.info.executed_at = Some(consensus);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_responses_come_first() {
        let network = MockNetwork::new();
        let endpoint = MockNetwork::node_endpoint(3);
        network.script(
            &endpoint,
            Operation::GetAccountBalance,
            [MockResponse::Status(Status::Busy)],
        );

        let request = wire::encode(&QueryRequest::AccountBalance {
            account_id: AccountId::from_num(2),
        })
        .unwrap();
        let first: ResponseEnvelope = wire::decode(
            &network
                .call(&endpoint, Operation::GetAccountBalance, request.clone(), Duration::from_secs(1))
                .await
                .unwrap(),
        )
        .unwrap();
        assert_eq!(first.status, Status::Busy.code());

        let second: ResponseEnvelope = wire::decode(
            &network
                .call(&endpoint, Operation::GetAccountBalance, request, Duration::from_secs(1))
                .await
                .unwrap(),
        )
        .unwrap();
        assert_eq!(second.status, Status::InvalidAccountId.code());
        assert_eq!(network.calls().len(), 2);
    }

    #[test]
    fn test_custom_fee_transfer() {
        let network = MockNetwork::new();
        let key = PrivateKey::generate_ed25519();
        let treasury = network.create_account(key.public_key(), Hbar::new(10));
        let receiver = network.create_account(key.public_key(), Hbar::new(0));
        let collector = network.create_account(key.public_key(), Hbar::new(0));
        let token = network.create_token(&treasury, 1_000);
        network.set_custom_fee(&token, &collector, Hbar::new(1));

        let mut ledger = network.ledger.lock();
        ledger.accounts.get_mut(&receiver).unwrap().tokens.insert(token.clone(), 0);
        let data = TransferData {
            hbar_transfers: Vec::new(),
            token_transfers: vec![
                crate::tx_builder::TokenTransfer {
                    token_id: token.clone(),
                    account_id: treasury.clone(),
                    amount: -100,
                    expected_decimals: None,
                    is_approval: false,
                },
                crate::tx_builder::TokenTransfer {
                    token_id: token.clone(),
                    account_id: receiver.clone(),
                    amount: 100,
                    expected_decimals: None,
                    is_approval: false,
                },
            ],
        };
        let effects = ledger.transfer(&data);
        assert_eq!(effects.receipt.status, Status::Success);
        assert_eq!(effects.assessed_custom_fees.len(), 1);
        assert_eq!(ledger.accounts[&collector].tinybars, Hbar::new(1).to_tinybars());
        assert_eq!(ledger.accounts[&treasury].tinybars, Hbar::new(9).to_tinybars());
    }
}
