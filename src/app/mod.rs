pub mod directory;
pub mod dispatch;
pub mod links;
pub mod report;
pub mod repos;

use crate::cli::SlackArgs;
use crate::config::Config;
use crate::notify::Dispatcher;
use crate::transport::{ChatApi, RateLimitPolicy, SlackClient};

/// Fold command-line chat flags into the loaded config. Flags win.
pub fn apply_slack_args(config: &mut Config, args: &SlackArgs) {
    if let Some(token) = &args.slack_token {
        config.slack.bot_token = Some(token.clone());
    }
    if let Some(channel) = &args.fallback_channel {
        config.slack.fallback_channel = Some(channel.clone());
    }
}

pub fn slack_client(config: &Config) -> Result<SlackClient, crate::error::ConfigError> {
    let token = config.require_slack_token()?;
    Ok(SlackClient::with_base_url(
        token.to_string(),
        &config.slack.api_base,
        RateLimitPolicy::from_config(&config.reliability),
    )
    .with_page_size(config.slack.conversation_page_size))
}

pub fn dispatcher<'c>(chat: &'c dyn ChatApi, config: &Config) -> Dispatcher<'c> {
    Dispatcher::new(chat)
        .with_strategies(config.slack.strategies.clone())
        .with_fallback_channel(config.slack.fallback_channel.clone())
        .with_max_conversation_pages(config.slack.max_conversation_pages)
}
