use super::types::{DeliveryOutcome, Destination, DestinationSpec, StrategyName};
use crate::error::{ChatError, DeliveryError};
use crate::transport::ChatApi;

pub const DEFAULT_MAX_CONVERSATION_PAGES: usize = 50;

/// Delivers one message through an ordered list of strategies, stopping at the
/// first that succeeds. Holds no state between calls and does not deduplicate.
pub struct Dispatcher<'c> {
    chat: &'c dyn ChatApi,
    strategies: Vec<StrategyName>,
    fallback_channel: Option<String>,
    max_conversation_pages: usize,
}

impl<'c> Dispatcher<'c> {
    pub fn new(chat: &'c dyn ChatApi) -> Self {
        Self {
            chat,
            strategies: StrategyName::DEFAULT_ORDER.to_vec(),
            fallback_channel: None,
            max_conversation_pages: DEFAULT_MAX_CONVERSATION_PAGES,
        }
    }

    #[must_use]
    pub fn with_strategies(mut self, strategies: Vec<StrategyName>) -> Self {
        self.strategies = strategies;
        self
    }

    #[must_use]
    pub fn with_fallback_channel(mut self, channel: Option<String>) -> Self {
        self.fallback_channel = channel.filter(|c| !c.trim().is_empty());
        self
    }

    #[must_use]
    pub fn with_max_conversation_pages(mut self, pages: usize) -> Self {
        self.max_conversation_pages = pages.max(1);
        self
    }

    pub fn fallback_channel(&self) -> Option<&str> {
        self.fallback_channel.as_deref()
    }

    /// Resolve a target once. Lookup failures yield `Unresolved` plus the reason.
    pub async fn resolve(&self, target: &DestinationSpec) -> (Destination, Option<String>) {
        match target {
            DestinationSpec::Direct(id) => (Destination::DirectId(id.clone()), None),
            DestinationSpec::Channel(id) => (Destination::ChannelId(id.clone()), None),
            DestinationSpec::Email(email) => match self.chat.lookup_user_by_email(email).await {
                Ok(user_id) => {
                    tracing::debug!(email = email.as_str(), user_id = user_id.as_str(), "resolved recipient");
                    (Destination::DirectId(user_id), None)
                }
                Err(e) => {
                    tracing::warn!(email = email.as_str(), "could not resolve recipient: {e}");
                    (Destination::Unresolved, Some(e.to_string()))
                }
            },
        }
    }

    pub async fn deliver(
        &self,
        message: &str,
        target: &DestinationSpec,
    ) -> Result<DeliveryOutcome, DeliveryError> {
        let (destination, resolution_error) = self.resolve(target).await;
        let mut outcome = DeliveryOutcome::new(target.label(), destination);
        outcome.resolution_error = resolution_error;

        for &strategy in &self.strategies {
            let attempt = match strategy {
                StrategyName::Direct => self.try_direct(&outcome.destination, message).await,
                StrategyName::OpenOrFind => {
                    self.try_open_or_find(&outcome.destination, message).await
                }
                StrategyName::Broadcast => {
                    self.try_broadcast(&outcome.destination, target, message)
                        .await
                }
            };

            let Some(result) = attempt else {
                tracing::debug!(%strategy, recipient = target.label(), "strategy not applicable");
                continue;
            };

            outcome.attempted.push(strategy);
            match result {
                Ok(()) => {
                    tracing::info!(%strategy, recipient = target.label(), "notification delivered");
                    outcome.succeeded = Some(strategy);
                    return Ok(outcome);
                }
                Err(reason) => {
                    tracing::warn!(
                        %strategy,
                        recipient = target.label(),
                        "delivery strategy failed, falling through: {reason}"
                    );
                    outcome.errors.insert(strategy, reason);
                }
            }
        }

        Err(DeliveryError::Exhausted {
            recipient: target.label().to_string(),
            resolution: outcome.resolution_error,
            attempts: outcome
                .attempted
                .iter()
                .map(|strategy| {
                    let message = outcome.errors.get(strategy).cloned().unwrap_or_default();
                    (strategy.to_string(), message)
                })
                .collect(),
        })
    }

    async fn try_direct(
        &self,
        destination: &Destination,
        message: &str,
    ) -> Option<Result<(), String>> {
        let id = match destination {
            Destination::DirectId(id) | Destination::ChannelId(id) => id,
            Destination::Unresolved => return None,
        };

        Some(match self.chat.post_message(id, message).await {
            Ok(()) => Ok(()),
            Err(e) => {
                if e.is_missing_capability() {
                    tracing::debug!(recipient = id.as_str(), "direct send lacks permission");
                }
                Err(e.to_string())
            }
        })
    }

    async fn try_open_or_find(
        &self,
        destination: &Destination,
        message: &str,
    ) -> Option<Result<(), String>> {
        let Destination::DirectId(user_id) = destination else {
            return None;
        };

        let channel = match self.chat.open_direct_conversation(user_id).await {
            Ok(channel) => channel,
            Err(open_err) if open_err.is_missing_capability() => {
                tracing::debug!(
                    user_id = user_id.as_str(),
                    "cannot open conversation, searching existing ones"
                );
                match self.find_existing_conversation(user_id).await {
                    Ok(Some(channel)) => channel,
                    Ok(None) => {
                        return Some(Err(format!(
                            "{open_err}; no existing conversation with {user_id}"
                        )));
                    }
                    Err(search_err) => {
                        return Some(Err(format!(
                            "{open_err}; conversation search failed: {search_err}"
                        )));
                    }
                }
            }
            Err(open_err) => return Some(Err(open_err.to_string())),
        };

        Some(
            self.chat
                .post_message(&channel, message)
                .await
                .map_err(|e| e.to_string()),
        )
    }

    async fn try_broadcast(
        &self,
        destination: &Destination,
        target: &DestinationSpec,
        message: &str,
    ) -> Option<Result<(), String>> {
        let channel = self.fallback_channel.as_deref()?;
        let text = broadcast_text(destination, target, message);
        Some(
            self.chat
                .post_message(channel, &text)
                .await
                .map_err(|e| e.to_string()),
        )
    }

    /// Page through existing direct conversations for one addressed to `user_id`.
    async fn find_existing_conversation(&self, user_id: &str) -> Result<Option<String>, ChatError> {
        let mut cursor: Option<String> = None;

        for page_no in 1..=self.max_conversation_pages {
            let page = self
                .chat
                .list_direct_conversations(cursor.as_deref())
                .await?;

            if let Some(found) = page
                .conversations
                .into_iter()
                .find(|c| c.user.as_deref() == Some(user_id))
            {
                tracing::debug!(user_id, channel = found.id.as_str(), page_no, "reusing conversation");
                return Ok(Some(found.id));
            }

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => return Ok(None),
            }
        }

        tracing::warn!(
            user_id,
            max_pages = self.max_conversation_pages,
            "conversation search stopped at page limit"
        );
        Ok(None)
    }
}

/// Prefix the message so a human watching the fallback channel knows who it was for.
pub fn broadcast_text(destination: &Destination, target: &DestinationSpec, message: &str) -> String {
    match destination {
        Destination::DirectId(user_id) => format!("<@{user_id}> {message}"),
        Destination::ChannelId(channel) => format!("(for <#{channel}>) {message}"),
        Destination::Unresolved => format!("(for {}) {message}", target.label()),
    }
}
