//! Tuition API client and records
//!
//! Fetching is unauthenticated (`/api/v1/mobile/...`); payments go through
//! the banking endpoint with a bearer token from [`TokenCache`].

use super::auth::TokenCache;
use super::error::is_quota_exceeded;
use super::{ServiceError, TuitionClient};
use crate::config::TuitionCredentials;
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Upstream payment receipt, passed through to the client untouched
pub type PaymentConfirmation = Value;

/// Payment status, always derived from the balance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TuitionStatus {
    Paid,
    Unpaid,
}

impl TuitionStatus {
    pub fn for_balance(balance: Decimal) -> Self {
        if balance.is_zero() {
            TuitionStatus::Paid
        } else {
            TuitionStatus::Unpaid
        }
    }
}

/// One term's tuition for a student
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawTuitionRecord")]
pub struct TuitionRecord {
    pub term: String,
    pub tuition_total: Decimal,
    pub paid_amount: Decimal,
    pub balance: Decimal,
    pub status: TuitionStatus,
}

impl TuitionRecord {
    pub fn is_outstanding(&self) -> bool {
        self.balance > Decimal::ZERO
    }
}

/// Tuition lookup result for a student
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawStudentTuition")]
pub struct StudentTuition {
    pub student_no: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub tuitions: Vec<TuitionRecord>,
}

impl StudentTuition {
    /// The displayed (first) term, if it still has money owing and a term
    /// to pay against. Later terms are never offered for payment.
    pub fn outstanding(&self) -> Option<&TuitionRecord> {
        self.tuitions
            .first()
            .filter(|t| t.is_outstanding() && !t.term.is_empty())
    }
}

// Upstream shapes vary between deployments; these accept every spelling
// the renderer understands and normalise on the way in.

#[derive(Debug, Default, Deserialize)]
struct RawTuitionRecord {
    #[serde(default)]
    term: Option<String>,
    #[serde(default, alias = "amount", alias = "amountDue")]
    tuition_total: Option<Decimal>,
    #[serde(default, alias = "paidAmount")]
    paid_amount: Option<Decimal>,
    #[serde(default)]
    balance: Option<Decimal>,
}

impl RawTuitionRecord {
    fn is_empty(&self) -> bool {
        self.term.is_none()
            && self.tuition_total.is_none()
            && self.paid_amount.is_none()
            && self.balance.is_none()
    }
}

impl From<RawTuitionRecord> for TuitionRecord {
    fn from(raw: RawTuitionRecord) -> Self {
        let tuition_total = raw.tuition_total.unwrap_or(Decimal::ZERO);
        let paid_amount = raw.paid_amount.unwrap_or(Decimal::ZERO);
        let balance = raw.balance.unwrap_or(tuition_total - paid_amount);
        TuitionRecord {
            term: raw.term.unwrap_or_default(),
            tuition_total,
            paid_amount,
            balance,
            status: TuitionStatus::for_balance(balance),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawStudentTuition {
    #[serde(
        alias = "studentNo",
        alias = "studentNumber",
        deserialize_with = "string_or_number"
    )]
    student_no: String,
    #[serde(default, alias = "studentName")]
    name: Option<String>,
    #[serde(default)]
    tuitions: Vec<TuitionRecord>,
    #[serde(flatten)]
    flat: RawTuitionRecord,
}

impl From<RawStudentTuition> for StudentTuition {
    fn from(raw: RawStudentTuition) -> Self {
        let mut tuitions = raw.tuitions;
        if tuitions.is_empty() && !raw.flat.is_empty() {
            tuitions.push(raw.flat.into());
        }
        StudentTuition {
            student_no: raw.student_no,
            name: raw.name,
            tuitions,
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected student number, got {other}"
        ))),
    }
}

/// Remove all whitespace from a term ("Fall 2024" -> "Fall2024").
///
/// Idempotent; the payment endpoint only accepts the compact form.
pub fn canonical_term(term: &str) -> String {
    term.chars().filter(|c| !c.is_whitespace()).collect()
}

/// A payment ready for submission; the term is canonical by construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    pub student_no: String,
    pub amount: Decimal,
    term: String,
}

impl PaymentRequest {
    pub fn new(student_no: impl Into<String>, amount: Decimal, term: &str) -> Self {
        Self {
            student_no: student_no.into(),
            amount,
            term: canonical_term(term),
        }
    }

    pub fn term(&self) -> &str {
        &self.term
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct PaymentBody<'a> {
    student_no: &'a str,
    term: &'a str,
    amount: Decimal,
}

#[derive(Debug, Serialize)]
struct LoginBody<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

/// HTTP client for the tuition payment system
pub struct TuitionService {
    client: Client,
    base_url: Option<String>,
    credentials: TuitionCredentials,
    tokens: Arc<TokenCache>,
}

impl TuitionService {
    pub fn new(
        client: Client,
        base_url: Option<String>,
        credentials: TuitionCredentials,
        tokens: Arc<TokenCache>,
    ) -> Self {
        Self {
            client,
            base_url,
            credentials,
            tokens,
        }
    }

    fn url(&self, path: &str) -> Result<String, ServiceError> {
        self.base_url
            .as_deref()
            .map(|base| format!("{base}/api/v1/{path}"))
            .ok_or_else(|| ServiceError::not_configured("Tuition"))
    }

    async fn login(&self) -> Result<String, ServiceError> {
        let url = self.url("auth/login")?;
        let response = self
            .client
            .post(&url)
            .json(&LoginBody {
                username: &self.credentials.username,
                password: &self.credentials.password,
            })
            .send()
            .await
            .map_err(|e| ServiceError::transport(&e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ServiceError::transport(&e))?;
        if !status.is_success() {
            tracing::error!(status = %status, body = %body, "Tuition API login failed");
            return Err(ServiceError::upstream(status, &body));
        }

        let parsed: LoginResponse = serde_json::from_str(&body)
            .map_err(|e| ServiceError::Upstream(format!("Invalid login response: {e}")))?;
        tracing::info!("Tuition API token acquired");
        Ok(parsed.token)
    }
}

#[async_trait]
impl TuitionClient for TuitionService {
    async fn fetch_tuition(&self, student_no: &str) -> Result<StudentTuition, ServiceError> {
        let url = self.url(&format!("mobile/tuition/{student_no}"))?;
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ServiceError::transport(&e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ServiceError::transport(&e))?;

        if !status.is_success() {
            let err = ServiceError::from_response(status, &body);
            tracing::warn!(student_no, status = %status, error = %err, "Get tuition failed");
            return Err(err);
        }
        if is_quota_exceeded(&body) {
            return Err(ServiceError::RateLimited);
        }

        serde_json::from_str(&body)
            .map_err(|e| ServiceError::Upstream(format!("Invalid tuition response: {e}")))
    }

    async fn pay_tuition(
        &self,
        payment: &PaymentRequest,
    ) -> Result<PaymentConfirmation, ServiceError> {
        let url = self.url("banking/payment")?;
        let token = self.tokens.get_or_login(|| self.login()).await?;

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&PaymentBody {
                student_no: &payment.student_no,
                term: payment.term(),
                amount: payment.amount,
            })
            .send()
            .await
            .map_err(|e| ServiceError::transport(&e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ServiceError::transport(&e))?;

        if !status.is_success() {
            tracing::error!(
                student_no = %payment.student_no,
                status = %status,
                body = %body,
                "Pay tuition failed"
            );
            return Err(ServiceError::upstream(status, &body));
        }

        Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
    }
}
