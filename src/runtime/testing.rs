//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use super::traits::MessageStore;
use crate::db::{NewMessage, StoredMessage};
use crate::llm::{LlmError, LlmRequest, LlmResponse, LlmService};
use crate::services::{
    Address, AddressClient, PaymentConfirmation, PaymentRequest, ServiceError, StudentTuition,
    TuitionClient, TuitionRecord, TuitionStatus,
};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::Map;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

// ============================================================================
// Mock LLM Client
// ============================================================================

/// Mock LLM client that returns queued responses
pub struct MockLlmClient {
    responses: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
    model_id: String,
    /// Record of all requests made
    pub requests: Mutex<Vec<LlmRequest>>,
}

impl MockLlmClient {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            model_id: model_id.into(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful text response
    pub fn queue_text(&self, text: &str) {
        self.responses.lock().unwrap().push_back(Ok(LlmResponse {
            text: text.to_string(),
            ..LlmResponse::default()
        }));
    }

    /// Queue an error response
    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmService for MockLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock response queued")))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// ============================================================================
// Mock Tuition Client
// ============================================================================

/// Mock tuition API with queued results and a record of calls
#[derive(Default)]
pub struct MockTuitionClient {
    fetch_results: Mutex<VecDeque<Result<StudentTuition, ServiceError>>>,
    payment_results: Mutex<VecDeque<Result<PaymentConfirmation, ServiceError>>>,
    fetches: Mutex<Vec<String>>,
    payments: Mutex<Vec<PaymentRequest>>,
    panic_on_fetch: AtomicBool,
}

impl MockTuitionClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-term record with nothing paid yet
    pub fn tuition(student_no: &str, term: &str, balance: i64) -> StudentTuition {
        let balance = Decimal::from(balance);
        StudentTuition {
            student_no: student_no.to_string(),
            name: None,
            tuitions: vec![TuitionRecord {
                term: term.to_string(),
                tuition_total: balance,
                paid_amount: Decimal::ZERO,
                balance,
                status: TuitionStatus::for_balance(balance),
            }],
        }
    }

    pub fn queue_fetch(&self, result: Result<StudentTuition, ServiceError>) {
        self.fetch_results.lock().unwrap().push_back(result);
    }

    pub fn queue_payment(&self, result: Result<PaymentConfirmation, ServiceError>) {
        self.payment_results.lock().unwrap().push_back(result);
    }

    /// Make the next fetch panic instead of returning
    pub fn panic_on_next_fetch(&self) {
        self.panic_on_fetch.store(true, Ordering::SeqCst);
    }

    pub fn fetches(&self) -> Vec<String> {
        self.fetches.lock().unwrap().clone()
    }

    pub fn payments(&self) -> Vec<PaymentRequest> {
        self.payments.lock().unwrap().clone()
    }
}

#[async_trait]
impl TuitionClient for MockTuitionClient {
    async fn fetch_tuition(&self, student_no: &str) -> Result<StudentTuition, ServiceError> {
        assert!(
            !self.panic_on_fetch.swap(false, Ordering::SeqCst),
            "mock tuition fetch panicked"
        );
        self.fetches.lock().unwrap().push(student_no.to_string());
        self.fetch_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(ServiceError::NotFound))
    }

    async fn pay_tuition(
        &self,
        payment: &PaymentRequest,
    ) -> Result<PaymentConfirmation, ServiceError> {
        self.payments.lock().unwrap().push(payment.clone());
        self.payment_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ServiceError::Upstream("No mock payment queued".to_string())))
    }
}

// ============================================================================
// Mock Address Client
// ============================================================================

/// Mock address book; every query returns the configured entries
#[derive(Default)]
pub struct MockAddressClient {
    addresses: Mutex<Vec<Address>>,
    searches: Mutex<Vec<String>>,
}

impl MockAddressClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn address(name: &str, city: &str) -> Address {
        Address {
            id: None,
            name: name.to_string(),
            city: Some(city.to_string()),
            email: None,
            phone: None,
            extra: Map::new(),
        }
    }

    pub fn set_addresses(&self, addresses: Vec<Address>) {
        *self.addresses.lock().unwrap() = addresses;
    }

    pub fn searches(&self) -> Vec<String> {
        self.searches.lock().unwrap().clone()
    }
}

#[async_trait]
impl AddressClient for MockAddressClient {
    async fn list_addresses(&self) -> Result<Vec<Address>, ServiceError> {
        Ok(self.addresses.lock().unwrap().clone())
    }

    async fn search_addresses(&self, query: &str) -> Result<Vec<Address>, ServiceError> {
        self.searches.lock().unwrap().push(query.to_string());
        Ok(self.addresses.lock().unwrap().clone())
    }
}

// ============================================================================
// Mock Message Store
// ============================================================================

/// In-memory transcript store
#[derive(Default)]
pub struct MockMessageStore {
    messages: Mutex<Vec<StoredMessage>>,
    fail_writes: AtomicBool,
}

impl MockMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail
    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl MessageStore for MockMessageStore {
    async fn add_message(&self, message: &NewMessage<'_>) -> Result<StoredMessage, String> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err("disk full".to_string());
        }
        let mut messages = self.messages.lock().unwrap();
        let stored = StoredMessage {
            id: format!("msg-{}", messages.len() + 1),
            chat_id: message.chat_id.to_string(),
            role: message.role,
            content: message.content.to_string(),
            message_type: message.message_type,
            metadata: message.metadata.cloned(),
            created_at: Utc::now(),
        };
        messages.push(stored.clone());
        Ok(stored)
    }

    async fn get_messages(&self, chat_id: &str) -> Result<Vec<StoredMessage>, String> {
        Ok(self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .cloned()
            .collect())
    }
}
