//! Testing helpers and mock collaborators.
//!
//! Provides an in-memory [`AccountStore`] and a scripted [`CarrierApi`] so
//! flow and engine tests run hermetically, without object storage or a
//! carrier endpoint.

use crate::actions::PlanKind;
use crate::carrier::{
    CarrierApi, CarrierError, CarrierReply, CarrierResponse, OtpExchange, SessionToken,
};
use crate::storage::{AccountStore, LinkedAccount, StorageError, UserId};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tokio::sync::RwLock;

#[derive(Clone)]
struct MemRecord {
    accounts: Vec<LinkedAccount>,
    default_account: Option<u32>,
    next_account_id: u32,
    temp: HashMap<String, Value>,
}

impl Default for MemRecord {
    fn default() -> Self {
        Self {
            accounts: Vec::new(),
            default_account: None,
            next_account_id: 1,
            temp: HashMap::new(),
        }
    }
}

/// In-memory [`AccountStore`] with the same contract as the R2 one.
#[derive(Default)]
pub struct MemoryAccountStore {
    records: RwLock<HashMap<i64, MemRecord>>,
}

impl MemoryAccountStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn get_or_create_user(&self, chat_id: i64) -> Result<UserId, StorageError> {
        let mut records = self.records.write().await;
        records.entry(chat_id).or_default();
        Ok(UserId(chat_id))
    }

    async fn list_accounts(&self, user: UserId) -> Result<Vec<LinkedAccount>, StorageError> {
        let records = self.records.read().await;
        Ok(records
            .get(&user.0)
            .map(|r| r.accounts.clone())
            .unwrap_or_default())
    }

    async fn add_account(
        &self,
        user: UserId,
        msisdn_blob: String,
        token: SessionToken,
    ) -> Result<LinkedAccount, StorageError> {
        let mut records = self.records.write().await;
        let record = records.entry(user.0).or_default();
        let account = LinkedAccount {
            id: record.next_account_id,
            msisdn_blob,
            token,
            linked_at: Utc::now(),
        };
        record.next_account_id += 1;
        record.accounts.push(account.clone());
        Ok(account)
    }

    async fn update_token(
        &self,
        user: UserId,
        account_id: u32,
        token: SessionToken,
    ) -> Result<(), StorageError> {
        let mut records = self.records.write().await;
        if let Some(record) = records.get_mut(&user.0) {
            if let Some(account) = record.accounts.iter_mut().find(|a| a.id == account_id) {
                account.token = token;
            }
        }
        Ok(())
    }

    async fn get_default(&self, user: UserId) -> Result<Option<u32>, StorageError> {
        let records = self.records.read().await;
        Ok(records.get(&user.0).and_then(|r| r.default_account))
    }

    async fn set_default(
        &self,
        user: UserId,
        account_id: Option<u32>,
    ) -> Result<(), StorageError> {
        let mut records = self.records.write().await;
        if let Some(record) = records.get_mut(&user.0) {
            record.default_account = account_id;
        }
        Ok(())
    }

    async fn delete_account(&self, user: UserId, account_id: u32) -> Result<(), StorageError> {
        let mut records = self.records.write().await;
        if let Some(record) = records.get_mut(&user.0) {
            record.accounts.retain(|a| a.id != account_id);
        }
        Ok(())
    }

    async fn put_temp(
        &self,
        user: UserId,
        key: &str,
        value: Option<Value>,
    ) -> Result<(), StorageError> {
        let mut records = self.records.write().await;
        let record = records.entry(user.0).or_default();
        match value {
            Some(value) => {
                record.temp.insert(key.to_string(), value);
            }
            None => {
                record.temp.remove(key);
            }
        }
        Ok(())
    }

    async fn get_temp(&self, user: UserId, key: &str) -> Result<Option<Value>, StorageError> {
        let records = self.records.read().await;
        Ok(records.get(&user.0).and_then(|r| r.temp.get(key).cloned()))
    }
}

/// Build a carrier response for a script.
#[must_use]
pub fn carrier_response(code: &str, payload: Value) -> CarrierResponse {
    CarrierResponse {
        response_code: code.to_string(),
        description: String::new(),
        status_code: 200,
        payload,
    }
}

/// Scripted [`CarrierApi`]: every call pops the next queued response, in
/// order, regardless of operation. Exhausting the script yields a sentinel
/// unknown response so a test that over-calls fails loudly.
#[derive(Default)]
pub struct MockCarrier {
    responses: Mutex<VecDeque<CarrierResponse>>,
}

impl MockCarrier {
    /// A carrier that answers with `responses` in order.
    #[must_use]
    pub fn with_responses(responses: Vec<CarrierResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
        }
    }

    /// Queue another response.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn push(&self, response: CarrierResponse) {
        self.responses
            .lock()
            .expect("mock script lock")
            .push_back(response);
    }

    fn next(&self) -> CarrierResponse {
        self.responses
            .lock()
            .expect("mock script lock")
            .pop_front()
            .unwrap_or_else(|| CarrierResponse {
                response_code: "MOCK0000".to_string(),
                description: "mock script exhausted".to_string(),
                status_code: 599,
                payload: Value::Null,
            })
    }

    fn next_reply(&self) -> CarrierReply {
        CarrierReply {
            response: self.next(),
            refreshed: None,
        }
    }
}

#[async_trait]
impl CarrierApi for MockCarrier {
    async fn send_otp(&self, _msisdn: &str) -> Result<CarrierResponse, CarrierError> {
        Ok(self.next())
    }

    async fn exchange_otp(
        &self,
        _msisdn: &str,
        _code: &str,
    ) -> Result<OtpExchange, CarrierError> {
        let response = self.next();
        let token = response
            .payload
            .get("token")
            .and_then(Value::as_str)
            .map(SessionToken::new);
        Ok(OtpExchange { response, token })
    }

    async fn view_balance(&self, _token: &SessionToken) -> Result<CarrierReply, CarrierError> {
        Ok(self.next_reply())
    }

    async fn view_profile(&self, _token: &SessionToken) -> Result<CarrierReply, CarrierError> {
        Ok(self.next_reply())
    }

    async fn recharge_pin(
        &self,
        _token: &SessionToken,
        _pin: &str,
        _target: Option<&str>,
    ) -> Result<CarrierReply, CarrierError> {
        Ok(self.next_reply())
    }

    async fn recharge_online(
        &self,
        _token: &SessionToken,
        _amount: &str,
        _target: Option<&str>,
    ) -> Result<CarrierReply, CarrierError> {
        Ok(self.next_reply())
    }

    async fn send_sms(
        &self,
        _token: &SessionToken,
        _destination: &str,
        _text: &str,
        _free: bool,
    ) -> Result<CarrierReply, CarrierError> {
        Ok(self.next_reply())
    }

    async fn subscribed_products(
        &self,
        _token: &SessionToken,
    ) -> Result<CarrierReply, CarrierError> {
        Ok(self.next_reply())
    }

    async fn list_products(
        &self,
        _token: &SessionToken,
        _kind: PlanKind,
        _category: &str,
    ) -> Result<CarrierReply, CarrierError> {
        Ok(self.next_reply())
    }

    async fn subscribe(
        &self,
        _token: &SessionToken,
        _code: &str,
    ) -> Result<CarrierReply, CarrierError> {
        Ok(self.next_reply())
    }

    async fn unsubscribe(
        &self,
        _token: &SessionToken,
        _code: &str,
    ) -> Result<CarrierReply, CarrierError> {
        Ok(self.next_reply())
    }

    async fn take_loan(&self, _token: &SessionToken) -> Result<CarrierReply, CarrierError> {
        Ok(self.next_reply())
    }
}
