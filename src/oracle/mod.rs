//! Language-model oracle boundary.
//!
//! The repair pipeline only needs one capability from a model: take an
//! ordered list of messages and return one text blob. [`Oracle`] captures
//! that; [`HttpOracle`] talks to an OpenAI-compatible endpoint and
//! [`ReplayOracle`] serves recorded replies.
//!
//! Requests are assembled fresh for every call. There is no conversation
//! history carried between the defect and fix requests.

pub mod http;
pub mod replay;

pub use http::HttpOracle;
pub use replay::ReplayOracle;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static THINK_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("think pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A single oracle round trip.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OracleRequest {
    pub model: String,
    pub temperature: f32,
    pub messages: Vec<ChatMessage>,
}

#[derive(Error, Debug)]
pub enum OracleError {
    #[error("oracle request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("oracle returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed oracle response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("oracle response contained no completion")]
    EmptyResponse,

    #[error("API key variable {0} is not set")]
    MissingApiKey(String),

    #[error("recorded transport failure: {0}")]
    Recorded(String),

    #[error("no recorded response left (served {served})")]
    ReplayExhausted { served: usize },
}

/// Something that can answer an [`OracleRequest`] with text.
pub trait Oracle {
    fn complete(&self, request: &OracleRequest) -> Result<String, OracleError>;
}

impl<O: Oracle + ?Sized> Oracle for Box<O> {
    fn complete(&self, request: &OracleRequest) -> Result<String, OracleError> {
        (**self).complete(request)
    }
}

impl<O: Oracle + ?Sized> Oracle for &O {
    fn complete(&self, request: &OracleRequest) -> Result<String, OracleError> {
        (**self).complete(request)
    }
}

/// Strip reasoning blocks and markdown fence lines from a completion.
pub fn clean_response(raw: &str) -> String {
    let without_think = THINK_BLOCK.replace_all(raw, "");
    without_think
        .lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
