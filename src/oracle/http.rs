//! Blocking client for OpenAI-compatible chat-completion endpoints.

use super::{clean_response, Oracle, OracleError, OracleRequest};
use reqwest::blocking::Client as HttpClient;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, trace};

/// Oracle backed by `POST <base_url>/chat/completions`.
pub struct HttpOracle {
    http_client: HttpClient,
    endpoint: String,
    api_key: Option<String>,
}

/// Builder for [`HttpOracle`]
pub struct HttpOracleBuilder {
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpOracleBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            timeout: Duration::from_secs(120),
        }
    }

    /// Bearer token sent with every request
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<HttpOracle, OracleError> {
        let http_client = HttpClient::builder().timeout(self.timeout).build()?;
        let endpoint = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));

        Ok(HttpOracle {
            http_client,
            endpoint,
            api_key: self.api_key,
        })
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

impl HttpOracle {
    pub fn builder(base_url: impl Into<String>) -> HttpOracleBuilder {
        HttpOracleBuilder::new(base_url)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Oracle for HttpOracle {
    fn complete(&self, request: &OracleRequest) -> Result<String, OracleError> {
        debug!(
            endpoint = %self.endpoint,
            model = %request.model,
            messages = request.messages.len(),
            "Sending oracle request"
        );

        let mut builder = self.http_client.post(&self.endpoint).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send()?;
        let status = response.status();
        let body = response.text()?;

        if !status.is_success() {
            return Err(OracleError::Status {
                status: status.as_u16(),
                body,
            });
        }

        trace!(bytes = body.len(), "Oracle response received");
        extract_completion(&body)
    }
}

/// Pull `choices[0].message.content` out of a response body.
fn extract_completion(body: &str) -> Result<String, OracleError> {
    let parsed: CompletionResponse = serde_json::from_str(body)?;
    let content = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or(OracleError::EmptyResponse)?;

    Ok(clean_response(&content))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_completion() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"3: bad indent"}}]}"#;
        assert_eq!(extract_completion(body).unwrap(), "3: bad indent");
    }

    #[test]
    fn test_extract_completion_cleans_think_block() {
        let body = r#"{"choices":[{"message":{"content":"<think>hm</think>1: x"}}]}"#;
        assert_eq!(extract_completion(body).unwrap(), "1: x");
    }

    #[test]
    fn test_extract_completion_no_choices() {
        let result = extract_completion(r#"{"choices":[]}"#);
        assert!(matches!(result, Err(OracleError::EmptyResponse)));
    }

    #[test]
    fn test_extract_completion_null_content() {
        let result = extract_completion(r#"{"choices":[{"message":{"content":null}}]}"#);
        assert!(matches!(result, Err(OracleError::EmptyResponse)));
    }

    #[test]
    fn test_extract_completion_malformed() {
        let result = extract_completion("<html>bad gateway</html>");
        assert!(matches!(result, Err(OracleError::Decode(_))));
    }

    #[test]
    fn test_endpoint_joins_base_url() {
        let oracle = HttpOracle::builder("http://localhost:11434/v1/")
            .build()
            .unwrap();
        assert_eq!(oracle.endpoint(), "http://localhost:11434/v1/chat/completions");
    }

    #[test]
    fn test_unreachable_endpoint_is_transport_error() {
        let oracle = HttpOracle::builder("http://127.0.0.1:9")
            .with_timeout(Duration::from_secs(2))
            .build()
            .unwrap();
        let request = OracleRequest {
            model: "m".to_string(),
            temperature: 0.1,
            messages: vec![],
        };
        assert!(matches!(oracle.complete(&request), Err(OracleError::Http(_))));
    }
}
