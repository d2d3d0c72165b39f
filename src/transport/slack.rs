use super::retry::{RateLimitPolicy, with_rate_limit};
use super::traits::{ChatApi, ChatFuture, ConversationPage, DirectConversation};
use crate::error::ChatError;
use reqwest::StatusCode;
use serde_json::Value;

pub const DEFAULT_API_BASE: &str = "https://slack.com/api";

/// Slack Web API client. The bot token is sent as a bearer credential on every call.
pub struct SlackClient {
    bot_token: String,
    api_base: String,
    page_size: u32,
    policy: RateLimitPolicy,
    client: reqwest::Client,
}

impl SlackClient {
    pub fn new(bot_token: String, policy: RateLimitPolicy) -> Self {
        Self::with_base_url(bot_token, DEFAULT_API_BASE, policy)
    }

    pub fn with_base_url(bot_token: String, api_base: &str, policy: RateLimitPolicy) -> Self {
        Self {
            bot_token,
            api_base: api_base.trim_end_matches('/').to_string(),
            page_size: 200,
            policy,
            client: reqwest::Client::new(),
        }
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, 1000);
        self
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{method}", self.api_base)
    }

    /// Turn a Web API response into its JSON body, mapping HTTP and `ok: false`
    /// failures onto [`ChatError`].
    async fn read_envelope(endpoint: &str, resp: reqwest::Response) -> Result<Value, ChatError> {
        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            if let Some(retry_after) = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
            {
                tracing::debug!(endpoint, retry_after, "Slack asked to retry later");
            }
            return Err(ChatError::RateLimited {
                endpoint: endpoint.to_string(),
            });
        }

        let body = resp
            .text()
            .await
            .unwrap_or_else(|e| format!("<failed to read response body: {e}>"));

        if !status.is_success() {
            return Err(ChatError::Http {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        // Slack returns 200 for most app-level errors; check JSON "ok" field
        let parsed: Value = serde_json::from_str(&body).unwrap_or_default();
        if parsed.get("ok") == Some(&Value::Bool(true)) {
            return Ok(parsed);
        }

        let code = parsed
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        Err(ChatError::from_api_code(endpoint, code))
    }

    async fn get_once(&self, endpoint: &str, query: &[(&str, String)]) -> Result<Value, ChatError> {
        let resp = self
            .client
            .get(self.url(endpoint))
            .bearer_auth(&self.bot_token)
            .query(query)
            .send()
            .await
            .map_err(|e| transport_error(endpoint, &e))?;
        Self::read_envelope(endpoint, resp).await
    }

    async fn post_once(&self, endpoint: &str, body: &Value) -> Result<Value, ChatError> {
        let resp = self
            .client
            .post(self.url(endpoint))
            .bearer_auth(&self.bot_token)
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error(endpoint, &e))?;
        Self::read_envelope(endpoint, resp).await
    }

    async fn get(&self, endpoint: &str, query: &[(&str, String)]) -> Result<Value, ChatError> {
        with_rate_limit(self.policy, endpoint, || self.get_once(endpoint, query)).await
    }

    async fn post(&self, endpoint: &str, body: &Value) -> Result<Value, ChatError> {
        with_rate_limit(self.policy, endpoint, || self.post_once(endpoint, body)).await
    }

    fn parse_conversation_page(data: &Value) -> ConversationPage {
        let conversations = data
            .get("channels")
            .and_then(Value::as_array)
            .map(|channels| {
                channels
                    .iter()
                    .filter_map(|channel| {
                        let id = channel.get("id").and_then(Value::as_str)?;
                        let user = channel
                            .get("user")
                            .and_then(Value::as_str)
                            .map(ToString::to_string);
                        Some(DirectConversation {
                            id: id.to_string(),
                            user,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let next_cursor = data
            .pointer("/response_metadata/next_cursor")
            .and_then(Value::as_str)
            .filter(|cursor| !cursor.is_empty())
            .map(ToString::to_string);

        ConversationPage {
            conversations,
            next_cursor,
        }
    }
}

fn transport_error(endpoint: &str, err: &reqwest::Error) -> ChatError {
    ChatError::Transport {
        endpoint: endpoint.to_string(),
        message: err.to_string(),
    }
}

fn missing_field(endpoint: &str, field: &str) -> ChatError {
    ChatError::Api {
        endpoint: endpoint.to_string(),
        code: format!("response missing `{field}`"),
    }
}

impl ChatApi for SlackClient {
    fn name(&self) -> &str {
        "slack"
    }

    fn lookup_user_by_email<'a>(&'a self, email: &'a str) -> ChatFuture<'a, String> {
        Box::pin(async move {
            const ENDPOINT: &str = "users.lookupByEmail";
            let data = self.get(ENDPOINT, &[("email", email.to_string())]).await?;
            data.pointer("/user/id")
                .and_then(Value::as_str)
                .map(ToString::to_string)
                .ok_or_else(|| missing_field(ENDPOINT, "user.id"))
        })
    }

    fn open_direct_conversation<'a>(&'a self, user_id: &'a str) -> ChatFuture<'a, String> {
        Box::pin(async move {
            const ENDPOINT: &str = "conversations.open";
            let body = serde_json::json!({ "users": user_id });
            let data = self.post(ENDPOINT, &body).await?;
            data.pointer("/channel/id")
                .and_then(Value::as_str)
                .map(ToString::to_string)
                .ok_or_else(|| missing_field(ENDPOINT, "channel.id"))
        })
    }

    fn list_direct_conversations<'a>(
        &'a self,
        cursor: Option<&'a str>,
    ) -> ChatFuture<'a, ConversationPage> {
        Box::pin(async move {
            let mut query = vec![
                ("types", "im".to_string()),
                ("limit", self.page_size.to_string()),
            ];
            if let Some(cursor) = cursor {
                query.push(("cursor", cursor.to_string()));
            }
            let data = self.get("conversations.list", &query).await?;
            Ok(Self::parse_conversation_page(&data))
        })
    }

    fn post_message<'a>(&'a self, channel: &'a str, text: &'a str) -> ChatFuture<'a, ()> {
        Box::pin(async move {
            let body = serde_json::json!({
                "channel": channel,
                "text": text
            });
            self.post("chat.postMessage", &body).await?;
            Ok(())
        })
    }
}
