//! Call-detail records
//!
//! Every [`Message`](crate::Message) carries exactly one call-detail handle.
//! Pipeline steps fill in the record and decide when to report or transmit
//! it; the engine itself never touches it.
//!
//! The handle is polymorphic over two capabilities:
//!
//! - [`CallDetailReporter`]: produce the textual form of the record
//! - [`CallDetailSender`]: additionally transmit it to a billing system
//!
//! [`HttpCallDetail`] is the default: the record serialized as indented JSON
//! and POSTed to a configured billing address.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Errors raised while reporting or transmitting a call-detail record
#[derive(Error, Debug)]
pub enum CdrError {
    #[error("Failed to serialize call detail record: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("No billing address configured")]
    NotConfigured,

    #[error("Failed to build billing client: {0}")]
    Client(String),

    #[error("Failed to transmit call detail record: {0}")]
    Transmission(String),

    #[error("Billing endpoint rejected call detail record with status {0}")]
    Status(u16),
}

/// Billing-oriented summary of one session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallDetailRecord {
    pub call_id: String,
    pub from: String,
    pub to: String,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jurisdiction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lata: Option<String>,
    /// The number the target resolves to for number portability purposes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portability_identifier: Option<String>,
}

impl CallDetailRecord {
    /// Session length, once both ends are known
    pub fn duration(&self) -> Option<chrono::Duration> {
        Some(self.end? - self.start?)
    }
}

/// Produces the textual representation of a call-detail record
pub trait CallDetailReporter: fmt::Debug + Send + Sync {
    fn report(&self) -> Result<String, CdrError>;

    /// The structured record behind the report, when the implementation has one
    fn record(&self) -> Option<&CallDetailRecord> {
        None
    }

    fn record_mut(&mut self) -> Option<&mut CallDetailRecord> {
        None
    }
}

/// A reporter that can also submit its record
#[async_trait]
pub trait CallDetailSender: CallDetailReporter {
    async fn send(&self) -> Result<(), CdrError>;

    fn box_clone(&self) -> Box<dyn CallDetailSender>;
}

impl Clone for Box<dyn CallDetailSender> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

/// Where records are POSTed, with the client used to do it
#[derive(Debug, Clone)]
pub struct BillingEndpoint {
    address: String,
    client: reqwest::Client,
}

impl BillingEndpoint {
    pub fn new(address: impl Into<String>, timeout: Duration) -> Result<Self, CdrError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CdrError::Client(e.to_string()))?;
        Ok(Self {
            address: address.into(),
            client,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

/// Default call-detail handle: JSON report, HTTP POST transmission
#[derive(Debug, Clone, Default)]
pub struct HttpCallDetail {
    record: CallDetailRecord,
    endpoint: Option<BillingEndpoint>,
}

impl HttpCallDetail {
    /// A handle that can report but has nowhere to send
    pub fn unconfigured() -> Self {
        Self::default()
    }

    pub fn with_endpoint(endpoint: BillingEndpoint) -> Self {
        Self {
            record: CallDetailRecord::default(),
            endpoint: Some(endpoint),
        }
    }

    pub fn endpoint(&self) -> Option<&BillingEndpoint> {
        self.endpoint.as_ref()
    }
}

impl CallDetailReporter for HttpCallDetail {
    fn report(&self) -> Result<String, CdrError> {
        Ok(serde_json::to_string_pretty(&self.record)?)
    }

    fn record(&self) -> Option<&CallDetailRecord> {
        Some(&self.record)
    }

    fn record_mut(&mut self) -> Option<&mut CallDetailRecord> {
        Some(&mut self.record)
    }
}

#[async_trait]
impl CallDetailSender for HttpCallDetail {
    async fn send(&self) -> Result<(), CdrError> {
        let endpoint = self.endpoint.as_ref().ok_or(CdrError::NotConfigured)?;
        let body = self.report()?;

        let response = endpoint
            .client
            .post(&endpoint.address)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| CdrError::Transmission(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CdrError::Status(status.as_u16()));
        }

        debug!(
            "Submitted call detail record for {} to {}",
            self.record.call_id, endpoint.address
        );
        Ok(())
    }

    fn box_clone(&self) -> Box<dyn CallDetailSender> {
        Box::new(self.clone())
    }
}
