//! In-memory completion backend for tests and dry runs

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{CallError, ProviderError};
use crate::llm::client::{CHAT_COMPLETION, CompletionClient};
use crate::llm::types::{CompletionRequest, CompletionResponse};

type Responder = Box<dyn Fn(&CompletionRequest) -> Result<CompletionResponse, CallError> + Send + Sync>;

/// One scripted reply
#[derive(Debug, Clone)]
pub enum ScriptStep {
    Reply(CompletionResponse),
    /// Fails with `CallError::Api { status, message }`
    Fail { status: u16, message: String },
}

impl From<&str> for ScriptStep {
    fn from(text: &str) -> Self {
        ScriptStep::Reply(CompletionResponse::text(text))
    }
}

impl From<String> for ScriptStep {
    fn from(text: String) -> Self {
        ScriptStep::Reply(CompletionResponse::text(text))
    }
}

impl From<CompletionResponse> for ScriptStep {
    fn from(response: CompletionResponse) -> Self {
        ScriptStep::Reply(response)
    }
}

/// Completion client that replays a script and records every request.
///
/// Steps are consumed in order; once the queue is empty the fallback
/// responder (if any) answers, otherwise the call fails.
pub struct ScriptedClient {
    model: String,
    steps: Mutex<VecDeque<ScriptStep>>,
    fallback: Option<Responder>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedClient {
    pub fn new<S: Into<ScriptStep>>(steps: impl IntoIterator<Item = S>) -> Self {
        Self {
            model: "mock-model".to_string(),
            steps: Mutex::new(steps.into_iter().map(Into::into).collect()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer every request with `responder`
    pub fn from_fn<F>(responder: F) -> Self
    where
        F: Fn(&CompletionRequest) -> Result<CompletionResponse, CallError> + Send + Sync + 'static,
    {
        Self::new(Vec::<ScriptStep>::new()).with_fallback(responder)
    }

    pub fn with_fallback<F>(mut self, responder: F) -> Self
    where
        F: Fn(&CompletionRequest) -> Result<CompletionResponse, CallError> + Send + Sync + 'static,
    {
        self.fallback = Some(Box::new(responder));
        self
    }

    /// Every request seen so far, in call order
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    fn next_reply(&self, request: &CompletionRequest) -> Result<CompletionResponse, CallError> {
        let step = self.steps.lock().ok().and_then(|mut steps| steps.pop_front());
        match step {
            Some(ScriptStep::Reply(response)) => Ok(response),
            Some(ScriptStep::Fail { status, message }) => Err(CallError::Api { status, message }),
            None => match &self.fallback {
                Some(responder) => responder(request),
                None => Err(CallError::InvalidResponse("script exhausted".to_string())),
            },
        }
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        self.next_reply(&request)
            .map_err(|e| ProviderError::new(CHAT_COMPLETION, e))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::Message;

    fn request(text: &str) -> CompletionRequest {
        CompletionRequest::new(vec![Message::user(text)])
    }

    #[tokio::test]
    async fn test_replays_in_order() {
        let client = ScriptedClient::new(vec!["one", "two"]);
        assert_eq!(client.complete(request("a")).await.unwrap().content, "one");
        assert_eq!(client.complete(request("b")).await.unwrap().content, "two");
        assert!(client.complete(request("c")).await.is_err());
        assert_eq!(client.call_count(), 3);
        assert_eq!(client.requests()[1].messages[0].content, "b");
    }

    #[tokio::test]
    async fn test_scripted_failure() {
        let client = ScriptedClient::new(vec![ScriptStep::Fail {
            status: 500,
            message: "boom".to_string(),
        }]);
        let err = client.complete(request("a")).await.unwrap_err();
        assert_eq!(err.operation, CHAT_COMPLETION);
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_fallback_after_script() {
        let client =
            ScriptedClient::new(vec!["scripted"]).with_fallback(|req| Ok(CompletionResponse::text(format!("echo: {}", req.text()))));
        assert_eq!(client.complete(request("a")).await.unwrap().content, "scripted");
        assert_eq!(client.complete(request("b")).await.unwrap().content, "echo: b");
    }
}
