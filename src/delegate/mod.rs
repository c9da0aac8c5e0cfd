//! Contract between the orchestrator and the reasoning service that decides
//! which capabilities to call.

pub mod anthropic;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::tools::{CapabilityDescriptor, CapabilityError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DelegateRequest {
    pub system: String,
    pub messages: Vec<Message>,
    /// Upper bound on capability calls the delegate may make for this request.
    pub max_calls: usize,
    pub cancel: CancellationToken,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DelegateReply {
    pub text: String,
    /// Human-readable record of the exchange, one entry per line.
    pub transcript: String,
}

#[derive(Debug, Clone, Error)]
pub enum DelegateError {
    #[error("reasoning service unreachable: {0}")]
    Unreachable(String),
    #[error("reasoning service rejected the credentials: {0}")]
    Unauthorized(String),
    #[error("reasoning service rejected the request: {0}")]
    Rejected(String),
    #[error("reasoning service returned an unexpected response: {0}")]
    Protocol(String),
    #[error("delegate call cancelled")]
    Cancelled,
}

/// Entry point through which a delegate invokes capabilities. During the
/// execute phase the orchestrator's step recorder plays this role.
#[async_trait]
pub trait CapabilityHost: Send {
    fn capabilities(&self) -> Vec<CapabilityDescriptor>;

    async fn invoke(&mut self, name: &str, arguments: Value) -> Result<Value, CapabilityError>;
}

#[async_trait]
pub trait ReasoningDelegate: Send + Sync {
    fn name(&self) -> &str;

    /// Produces a reply for `request`. Without a host no capability can be
    /// called.
    async fn generate(
        &self,
        request: DelegateRequest,
        host: Option<&mut dyn CapabilityHost>,
    ) -> Result<DelegateReply, DelegateError>;
}
