use crate::error::ChatError;
use std::future::Future;
use std::pin::Pin;

pub type ChatFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ChatError>> + Send + 'a>>;

/// An existing direct conversation as reported by the chat platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectConversation {
    pub id: String,
    /// The counterpart user the conversation is addressed to.
    pub user: Option<String>,
}

/// One page of `list_direct_conversations`.
#[derive(Debug, Clone, Default)]
pub struct ConversationPage {
    pub conversations: Vec<DirectConversation>,
    /// `None` once the listing is exhausted.
    pub next_cursor: Option<String>,
}

/// The four chat operations the dispatcher consumes.
///
/// Implementations own their credential and apply rate-limit retry per call.
pub trait ChatApi: Send + Sync {
    /// Human-readable platform name
    fn name(&self) -> &str;

    /// Resolve a directory identity by email to a user id.
    fn lookup_user_by_email<'a>(&'a self, email: &'a str) -> ChatFuture<'a, String>;

    /// Open (or fetch) a private conversation with `user_id`, returning its channel id.
    fn open_direct_conversation<'a>(&'a self, user_id: &'a str) -> ChatFuture<'a, String>;

    /// List existing direct conversations, one page per call.
    fn list_direct_conversations<'a>(
        &'a self,
        cursor: Option<&'a str>,
    ) -> ChatFuture<'a, ConversationPage>;

    /// Post `text` to a channel or user id.
    fn post_message<'a>(&'a self, channel: &'a str, text: &'a str) -> ChatFuture<'a, ()>;
}
