//! Clients for the upstream tuition and address APIs
//!
//! Transport failures are translated into [`ServiceError`] kinds here so
//! the dialogue layer never sees HTTP details.

mod address;
mod auth;
mod error;
mod tuition;

pub use address::{Address, AddressService};
pub use auth::TokenCache;
pub use error::ServiceError;
pub use tuition::{PaymentConfirmation, PaymentRequest, StudentTuition, TuitionService};

#[cfg(test)]
pub use tuition::{canonical_term, TuitionRecord, TuitionStatus};

use async_trait::async_trait;
use std::sync::Arc;

/// Tuition payment system operations
#[async_trait]
pub trait TuitionClient: Send + Sync {
    /// Look up tuition by student number
    async fn fetch_tuition(&self, student_no: &str) -> Result<StudentTuition, ServiceError>;

    /// Submit a payment; the request's term is already canonical
    async fn pay_tuition(&self, payment: &PaymentRequest)
        -> Result<PaymentConfirmation, ServiceError>;
}

/// Address book operations (lookup by id is only reachable through the gateway)
#[async_trait]
pub trait AddressClient: Send + Sync {
    async fn list_addresses(&self) -> Result<Vec<Address>, ServiceError>;

    async fn search_addresses(&self, query: &str) -> Result<Vec<Address>, ServiceError>;
}

#[async_trait]
impl<T: TuitionClient + ?Sized> TuitionClient for Arc<T> {
    async fn fetch_tuition(&self, student_no: &str) -> Result<StudentTuition, ServiceError> {
        (**self).fetch_tuition(student_no).await
    }

    async fn pay_tuition(
        &self,
        payment: &PaymentRequest,
    ) -> Result<PaymentConfirmation, ServiceError> {
        (**self).pay_tuition(payment).await
    }
}

#[async_trait]
impl<T: AddressClient + ?Sized> AddressClient for Arc<T> {
    async fn list_addresses(&self) -> Result<Vec<Address>, ServiceError> {
        (**self).list_addresses().await
    }

    async fn search_addresses(&self, query: &str) -> Result<Vec<Address>, ServiceError> {
        (**self).search_addresses(query).await
    }
}
