use serde::{Deserialize, Serialize};

use super::{InterpretationError, LlmClient};

/// OpenAI-compatible `/chat/completions` client.
pub struct ChatCompletionClient {
    base_url: String,
    api_key: Option<String>,
    model: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl ChatCompletionClient {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        model: &str,
        timeout_secs: u64,
    ) -> Result<Self, InterpretationError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| InterpretationError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
            client,
            timeout_secs,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

impl ChatResponse {
    fn first_content(self) -> Result<String, InterpretationError> {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(InterpretationError::EmptyResponse)
    }
}

impl LlmClient for ChatCompletionClient {
    fn complete(
        &self,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, InterpretationError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens,
            temperature,
        };

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().map_err(|e| {
            if e.is_connect() {
                InterpretationError::Connection(self.base_url.clone())
            } else if e.is_timeout() {
                InterpretationError::HttpClient(format!(
                    "Request timed out after {}s",
                    self.timeout_secs
                ))
            } else {
                InterpretationError::HttpClient(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(InterpretationError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| InterpretationError::ResponseParsing(e.to_string()))?;
        let content = parsed.first_content()?;
        tracing::debug!(model = %self.model, chars = content.len(), "Completion received");
        Ok(content)
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, Clone)]
    pub struct LlmCall {
        pub prompt: String,
        pub max_tokens: u32,
        pub temperature: f32,
    }

    /// Replays queued replies in order; an empty queue or `failing()` gives
    /// an upstream error.
    #[derive(Default)]
    pub struct MockLlmClient {
        replies: Mutex<VecDeque<String>>,
        calls: Mutex<Vec<LlmCall>>,
        fail: bool,
    }

    impl MockLlmClient {
        pub fn with_replies(replies: &[&str]) -> Self {
            Self {
                replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
                ..Default::default()
            }
        }

        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        pub fn calls(&self) -> Vec<LlmCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl LlmClient for MockLlmClient {
        fn complete(
            &self,
            prompt: &str,
            max_tokens: u32,
            temperature: f32,
        ) -> Result<String, InterpretationError> {
            self.calls.lock().unwrap().push(LlmCall {
                prompt: prompt.to_string(),
                max_tokens,
                temperature,
            });
            if self.fail {
                return Err(InterpretationError::Upstream {
                    status: 503,
                    body: "model overloaded".into(),
                });
            }
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or(InterpretationError::Upstream {
                    status: 500,
                    body: "no reply queued".into(),
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_choice_content_returned() {
        let parsed: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"hi"}},{"message":{"content":"no"}}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.first_content().unwrap(), "hi");
    }

    #[test]
    fn no_choices_is_empty_response() {
        let parsed: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(
            parsed.first_content(),
            Err(InterpretationError::EmptyResponse)
        ));
    }

    #[test]
    fn request_body_shape() {
        let body = ChatRequest {
            model: "gpt-4o-mini",
            messages: [ChatMessage {
                role: "user",
                content: "p",
            }],
            max_tokens: 4096,
            temperature: 0.2,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["max_tokens"], 4096);
    }

    #[test]
    fn unreachable_endpoint_is_connection_error() {
        let client = ChatCompletionClient::new("http://127.0.0.1:1/v1/", None, "m", 2).unwrap();
        assert_eq!(client.model(), "m");
        let err = client.complete("p", 10, 0.2).unwrap_err();
        assert!(matches!(err, InterpretationError::Connection(_)));
    }
}
