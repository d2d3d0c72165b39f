pub mod retry;
pub mod slack;
pub mod traits;

pub use retry::{RateLimitPolicy, RateLimitSignal, with_rate_limit};
pub use slack::SlackClient;
pub use traits::{ChatApi, ChatFuture, ConversationPage, DirectConversation};
