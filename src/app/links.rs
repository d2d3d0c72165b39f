use super::report::render_links;
use crate::config::Config;
use crate::error::DeliveryError;
use crate::notify::{DeliveryOutcome, DestinationSpec, Dispatcher, StrategyName};
use crate::sources::{LinkRecipient, Roster};
use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_TEMPLATE: &str =
    "Hi {name}, here is your secure onboarding link: {link}\nIt can only be opened once.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    Delivered,
    /// Only the broadcast fallback reached the recipient.
    Fallback,
    Failed,
    DryRun,
}

/// Per-recipient line of the console and JSON reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkResult {
    pub email: String,
    pub status: LinkStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<StrategyName>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attempted: Vec<StrategyName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LinkResult {
    fn from_outcome(email: &str, outcome: &DeliveryOutcome) -> Self {
        Self {
            email: email.to_string(),
            status: if outcome.used_fallback() {
                LinkStatus::Fallback
            } else {
                LinkStatus::Delivered
            },
            strategy: outcome.succeeded,
            attempted: outcome.attempted.clone(),
            error: None,
        }
    }

    fn from_error(email: &str, error: &DeliveryError) -> Self {
        let DeliveryError::Exhausted { attempts, .. } = error;
        Self {
            attempted: attempts
                .iter()
                .filter_map(|(strategy, _)| strategy.parse().ok())
                .collect(),
            ..Self::failed(email, error.to_string())
        }
    }

    pub fn failed(email: &str, reason: String) -> Self {
        Self {
            email: email.to_string(),
            status: LinkStatus::Failed,
            strategy: None,
            attempted: Vec::new(),
            error: Some(reason),
        }
    }
}

pub struct LinksRequest {
    pub input: PathBuf,
    pub template: Option<String>,
    pub report: Option<PathBuf>,
    pub dry_run: bool,
}

pub async fn run(config: &Config, request: LinksRequest) -> Result<()> {
    let chat = if request.dry_run {
        None
    } else {
        Some(super::slack_client(config)?)
    };
    let recipients = Roster::load(&request.input)?.link_recipients()?;
    let template = request.template.as_deref().unwrap_or(DEFAULT_TEMPLATE);

    let results = match &chat {
        Some(chat) => {
            let dispatcher = super::dispatcher(chat, config);
            send_links(&dispatcher, &recipients, template).await
        }
        None => preview_links(&recipients, template),
    };

    println!("{}", render_links(&results, request.dry_run));
    if let Some(path) = &request.report {
        write_report(path, &results)?;
        tracing::info!(path = %path.display(), "delivery report written");
    }

    let failed = results
        .iter()
        .filter(|r| r.status == LinkStatus::Failed)
        .count();
    if failed > 0 {
        bail!("{failed} of {} recipients could not be reached", results.len());
    }
    Ok(())
}

/// Deliver each recipient's link in roster order. One failure never stops the batch.
pub async fn send_links(
    dispatcher: &Dispatcher<'_>,
    recipients: &[LinkRecipient],
    template: &str,
) -> Vec<LinkResult> {
    let mut results = Vec::with_capacity(recipients.len());
    for recipient in recipients {
        let message = render_message(template, recipient);
        let target = DestinationSpec::Email(recipient.email.clone());
        let result = match dispatcher.deliver(&message, &target).await {
            Ok(outcome) => LinkResult::from_outcome(&recipient.email, &outcome),
            Err(e) => {
                tracing::warn!(email = recipient.email.as_str(), "link not delivered: {e}");
                LinkResult::from_error(&recipient.email, &e)
            }
        };
        results.push(result);
    }
    results
}

pub fn preview_links(recipients: &[LinkRecipient], template: &str) -> Vec<LinkResult> {
    recipients
        .iter()
        .map(|recipient| {
            tracing::info!(
                email = recipient.email.as_str(),
                "[dry-run] would send: {}",
                render_message(template, recipient)
            );
            LinkResult {
                status: LinkStatus::DryRun,
                error: None,
                ..LinkResult::failed(&recipient.email, String::new())
            }
        })
        .collect()
}

pub fn render_message(template: &str, recipient: &LinkRecipient) -> String {
    template
        .replace("{name}", recipient.name.as_deref().unwrap_or("there"))
        .replace("{link}", &recipient.link)
}

fn write_report(path: &Path, results: &[LinkResult]) -> Result<()> {
    let json = serde_json::to_string_pretty(results).context("Failed to encode delivery report")?;
    fs::write(path, json)
        .with_context(|| format!("Failed to write delivery report {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing::RecordingChat;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn recipient(email: &str, name: Option<&str>) -> LinkRecipient {
        LinkRecipient {
            email: email.into(),
            link: format!("https://send.example/{}", email.len()),
            name: name.map(Into::into),
        }
    }

    #[test]
    fn message_substitutes_placeholders() {
        let ada = recipient("ada@example.com", Some("Ada"));
        assert_eq!(
            render_message("Hi {name}: {link}", &ada),
            "Hi Ada: https://send.example/15"
        );
        let anon = recipient("x@example.com", None);
        assert!(render_message(DEFAULT_TEMPLATE, &anon).starts_with("Hi there,"));
    }

    #[tokio::test]
    async fn known_unknown_and_fallback_recipients() {
        let chat = RecordingChat {
            users: HashMap::from([("ada@example.com".to_string(), "U-ADA".to_string())]),
            ..RecordingChat::default()
        };
        let recipients = vec![
            recipient("ada@example.com", Some("Ada")),
            recipient("ghost@example.com", None),
        ];

        let dispatcher = Dispatcher::new(&chat).with_fallback_channel(Some("C-onboard".into()));
        let results = send_links(&dispatcher, &recipients, "{link}").await;

        assert_eq!(results[0].status, LinkStatus::Delivered);
        assert_eq!(results[0].strategy, Some(StrategyName::Direct));
        assert_eq!(results[1].status, LinkStatus::Fallback);
        let posts = chat.posts();
        assert_eq!(posts[0].0, "U-ADA");
        assert_eq!(posts[1].0, "C-onboard");
        assert!(posts[1].1.contains("ghost@example.com"));
    }

    #[tokio::test]
    async fn unreachable_recipient_fails_alone() {
        let chat = RecordingChat {
            users: HashMap::from([("ada@example.com".to_string(), "U-ADA".to_string())]),
            ..RecordingChat::default()
        };
        let recipients = vec![
            recipient("ghost@example.com", None),
            recipient("ada@example.com", Some("Ada")),
        ];

        let results = send_links(&Dispatcher::new(&chat), &recipients, "{link}").await;

        assert_eq!(results[0].status, LinkStatus::Failed);
        assert!(
            results[0]
                .error
                .as_deref()
                .unwrap()
                .contains("users_not_found")
        );
        assert_eq!(results[1].status, LinkStatus::Delivered);
    }

    #[test]
    fn preview_sends_nothing() {
        let results = preview_links(&[recipient("ada@example.com", None)], DEFAULT_TEMPLATE);
        assert_eq!(results[0].status, LinkStatus::DryRun);
        assert!(results[0].error.is_none());
    }

    #[test]
    fn report_is_json_array() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("report.json");
        write_report(
            &path,
            &[LinkResult::failed("ada@example.com", "no path".into())],
        )
        .unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value[0]["status"], "failed");
        assert_eq!(value[0]["error"], "no path");
        assert!(value[0].get("strategy").is_none());
    }
}
