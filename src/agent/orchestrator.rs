//! Reply orchestration
//!
//! Every utterance gets a language-model answer and a rule-based resolution,
//! evaluated concurrently. A structured reply wins whenever the resolved
//! action produces one; otherwise the model text is used. Upstream failures
//! become fixed user-facing texts and never escape as errors.

use super::intent::{resolve, resolve_pending_payment, Action, Prompt};
use crate::llm::{LlmMessage, LlmRequest, LlmService};
use crate::services::{AddressClient, PaymentRequest, ServiceError, TuitionClient};
use crate::session::{ConversationTurn, MessageType, Role};
use crate::system_prompt::SYSTEM_PROMPT;
use serde::Serialize;
use serde_json::Value;

pub const TUITION_FOUND_TEXT: &str = "Here is the tuition information:";
pub const RATE_LIMIT_TEXT: &str = "⚠️ Rate limit exceeded! Please try again tomorrow.";
pub const STUDENT_NOT_FOUND_TEXT: &str = "🚫 Student not found. Please check the student number.";
pub const PAYMENT_SUCCESS_TEXT: &str = "Payment successful.";
pub const PAYMENT_FAILED_PREFIX: &str = "Payment failed: ";
pub const ADDRESSES_FOUND_TEXT: &str = "Here are the matching addresses:";
pub const NO_ADDRESSES_TEXT: &str = "No addresses found.";
pub const MODEL_UNAVAILABLE_TEXT: &str = "I'm here to help you with tuition queries and payments. You can say 'check my tuition' or 'pay my tuition'.";

const TEMPERATURE: f32 = 0.7;

/// Reply shaped for rendering
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub text: String,
    pub message_type: MessageType,
    pub metadata: Option<Value>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            message_type: MessageType::Text,
            metadata: None,
        }
    }

    fn with_payload(text: impl Into<String>, message_type: MessageType, payload: &impl Serialize) -> Self {
        match serde_json::to_value(payload) {
            Ok(metadata) => Self {
                text: text.into(),
                message_type,
                metadata: Some(metadata),
            },
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize reply payload");
                Self::text(text)
            }
        }
    }
}

/// Sequences intent resolution, adapter calls and the model fallback
pub struct Orchestrator<L, T, A> {
    llm: L,
    tuition: T,
    addresses: A,
}

impl<L, T, A> Orchestrator<L, T, A>
where
    L: LlmService,
    T: TuitionClient,
    A: AddressClient,
{
    pub fn new(llm: L, tuition: T, addresses: A) -> Self {
        Self {
            llm,
            tuition,
            addresses,
        }
    }

    /// Produce the reply to `utterance`. `history` excludes the utterance.
    pub async fn handle(&self, utterance: &str, history: &[ConversationTurn]) -> Reply {
        let action = resolve(utterance);
        tracing::debug!(?action, "Resolved intent");

        let (fallback, structured) = tokio::join!(
            self.fallback_text(utterance, history),
            self.execute(action, history)
        );

        structured.unwrap_or_else(|| Reply::text(fallback))
    }

    /// Language-model answer, or a static help text if the model is down
    async fn fallback_text(&self, utterance: &str, history: &[ConversationTurn]) -> String {
        let request = fallback_request(utterance, history);
        match self.llm.complete(&request).await {
            Ok(response) if !response.text.trim().is_empty() => response.text,
            Ok(_) => {
                tracing::warn!("Model returned an empty reply");
                MODEL_UNAVAILABLE_TEXT.to_string()
            }
            Err(e) => {
                tracing::warn!(error = %e, kind = ?e.kind, "Model unavailable, using static reply");
                MODEL_UNAVAILABLE_TEXT.to_string()
            }
        }
    }

    /// Structured reply for an action; `None` defers to the model
    async fn execute(&self, action: Action, history: &[ConversationTurn]) -> Option<Reply> {
        match action {
            Action::None => None,
            Action::Prompt(prompt) => Some(prompt_reply(prompt)),
            Action::FetchTuition { student_no } => Some(self.fetch_tuition(&student_no).await),
            Action::PayTuition(payment) => Some(self.pay(&payment).await),
            Action::ConfirmPendingPayment => self.confirm_pending(history).await,
            Action::ListAddresses => Some(self.addresses(None).await),
            Action::SearchAddresses { query } => Some(self.addresses(Some(&query)).await),
        }
    }

    async fn fetch_tuition(&self, student_no: &str) -> Reply {
        match self.tuition.fetch_tuition(student_no).await {
            Ok(tuition) => {
                tracing::info!(student_no, terms = tuition.tuitions.len(), "Tuition fetched");
                Reply::with_payload(TUITION_FOUND_TEXT, MessageType::TuitionCard, &tuition)
            }
            Err(ServiceError::RateLimited) => Reply::text(RATE_LIMIT_TEXT),
            Err(ServiceError::NotFound) => Reply::text(STUDENT_NOT_FOUND_TEXT),
            Err(ServiceError::Upstream(message)) => Reply::text(message),
        }
    }

    async fn pay(&self, payment: &PaymentRequest) -> Reply {
        match self.tuition.pay_tuition(payment).await {
            Ok(confirmation) => {
                tracing::info!(
                    student_no = %payment.student_no,
                    amount = %payment.amount,
                    term = payment.term(),
                    "Payment submitted"
                );
                Reply::with_payload(
                    PAYMENT_SUCCESS_TEXT,
                    MessageType::PaymentSuccess,
                    &confirmation,
                )
            }
            Err(e) => Reply::text(format!("{PAYMENT_FAILED_PREFIX}{e}")),
        }
    }

    /// Pay the last quoted balance. Without a quote, or if the payment
    /// fails, there is no structured reply and the model answers instead.
    async fn confirm_pending(&self, history: &[ConversationTurn]) -> Option<Reply> {
        let Some(payment) = resolve_pending_payment(history) else {
            tracing::info!("Confirmation without a quoted balance");
            return None;
        };

        let reply = self.pay(&payment).await;
        if reply.message_type == MessageType::PaymentSuccess {
            Some(reply)
        } else {
            tracing::warn!(student_no = %payment.student_no, reply = %reply.text, "Confirmed payment failed");
            None
        }
    }

    async fn addresses(&self, query: Option<&str>) -> Reply {
        let result = match query {
            Some(q) => self.addresses.search_addresses(q).await,
            None => self.addresses.list_addresses().await,
        };

        match result {
            Ok(addresses) if addresses.is_empty() => Reply {
                text: NO_ADDRESSES_TEXT.to_string(),
                message_type: MessageType::AddressList,
                metadata: Some(Value::Array(Vec::new())),
            },
            Ok(addresses) => {
                Reply::with_payload(ADDRESSES_FOUND_TEXT, MessageType::AddressList, &addresses)
            }
            Err(ServiceError::RateLimited) => Reply::text(RATE_LIMIT_TEXT),
            Err(ServiceError::NotFound) => Reply::text(NO_ADDRESSES_TEXT),
            Err(ServiceError::Upstream(message)) => Reply::text(message),
        }
    }
}

fn prompt_reply(prompt: Prompt) -> Reply {
    Reply::text(prompt.text())
}

/// System prompt, then history oldest-first, then the new utterance
fn fallback_request(utterance: &str, history: &[ConversationTurn]) -> LlmRequest {
    let mut messages: Vec<LlmMessage> = history
        .iter()
        .map(|turn| match turn.role {
            Role::User => LlmMessage::user(turn.content.as_str()),
            Role::Assistant => LlmMessage::assistant(turn.content.as_str()),
        })
        .collect();
    messages.push(LlmMessage::user(utterance));

    LlmRequest {
        system: SYSTEM_PROMPT.to_string(),
        messages,
        temperature: TEMPERATURE,
    }
}
