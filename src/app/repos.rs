use super::report::{Failure, render_repos};
use crate::config::Config;
use crate::detector::{ChangeSetDetector, Detection, Entity};
use crate::error::{ConfigError, RelayError};
use crate::notify::{DeliveryOutcome, DestinationSpec, Dispatcher};
use crate::sources::{GitHubClient, OwnerKind};
use crate::transport::RateLimitPolicy;
use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};

/// What one notifier run did.
#[derive(Debug, Default)]
pub struct ReposReport {
    /// Set when this was the first run and the baseline was only seeded.
    pub seeded: Option<usize>,
    pub added: Vec<String>,
    pub delivered: Vec<DeliveryOutcome>,
    pub failed: Vec<Failure>,
    pub audit_path: Option<PathBuf>,
    pub dry_run: bool,
}

pub struct ReposRequest {
    pub owner: String,
    pub kind: OwnerKind,
    pub target: Option<DestinationSpec>,
    pub dry_run: bool,
}

pub async fn run(config: &Config, request: ReposRequest) -> Result<()> {
    let target = request
        .target
        .or_else(|| {
            config
                .slack
                .fallback_channel
                .clone()
                .map(DestinationSpec::Channel)
        })
        .ok_or(ConfigError::Missing {
            key: "target",
            hint: "pass --channel, --user or --email, or set slack.fallback_channel",
        })?;
    // Credentials are checked before the first remote call.
    let chat = if request.dry_run {
        None
    } else {
        Some(super::slack_client(config)?)
    };

    let github =
        GitHubClient::from_config(&config.github, RateLimitPolicy::from_config(&config.reliability));
    let repos = github
        .list_repositories(&request.owner, request.kind)
        .await
        .with_context(|| format!("Failed to list repositories of {}", request.owner))?;

    let detector = ChangeSetDetector::new(baseline_path(&config.state_dir(), &request.owner))
        .with_persist_order(config.detector.persist_order)
        .with_audit(config.detector.audit);

    let report = match &chat {
        Some(chat) => {
            let dispatcher = super::dispatcher(chat, config);
            announce(&detector, &dispatcher, &repos, &target).await?
        }
        None => preview(&detector, &repos),
    };

    println!("{}", render_repos(&request.owner, &target, &report));
    if !report.failed.is_empty() {
        bail!(
            "{} of {} announcements could not be delivered",
            report.failed.len(),
            report.added.len()
        );
    }
    Ok(())
}

/// Detect additions and announce each one. Delivery failures are collected,
/// never raised; only detector errors abort.
pub async fn announce(
    detector: &ChangeSetDetector,
    dispatcher: &Dispatcher<'_>,
    current: &[Entity],
    target: &DestinationSpec,
) -> Result<ReposReport, RelayError> {
    let mut change_set = match detector.detect(current)? {
        Detection::Bootstrap { seeded } => {
            return Ok(ReposReport {
                seeded: Some(seeded),
                ..ReposReport::default()
            });
        }
        Detection::Changes(change_set) => change_set,
    };

    let mut report = ReposReport {
        added: change_set.added.iter().map(|e| e.name.clone()).collect(),
        audit_path: change_set.audit_path.clone(),
        ..ReposReport::default()
    };

    for entity in &change_set.added {
        match dispatcher.deliver(&announcement(entity), target).await {
            Ok(outcome) => report.delivered.push(outcome),
            Err(e) => {
                tracing::warn!(repository = entity.name.as_str(), "announcement failed: {e}");
                report.failed.push(Failure {
                    item: entity.name.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    if change_set.is_pending() {
        detector.commit(&mut change_set)?;
    }
    Ok(report)
}

/// Dry-run counterpart of [`announce`]: no writes, no deliveries.
pub fn preview(detector: &ChangeSetDetector, current: &[Entity]) -> ReposReport {
    let mut report = ReposReport {
        dry_run: true,
        ..ReposReport::default()
    };
    match detector.preview(current) {
        Detection::Bootstrap { seeded } => report.seeded = Some(seeded),
        Detection::Changes(change_set) => {
            for entity in &change_set.added {
                tracing::info!("[dry-run] would announce: {}", announcement(entity));
            }
            report.added = change_set.added.into_iter().map(|e| e.name).collect();
        }
    }
    report
}

/// `New repository: <name> - <description> <url>`, omitting absent parts.
pub fn announcement(entity: &Entity) -> String {
    let mut text = format!("New repository: {}", entity.name);
    if let Some(description) = &entity.description {
        text.push_str(" - ");
        text.push_str(description);
    }
    if let Some(url) = &entity.url {
        text.push(' ');
        text.push_str(url);
    }
    text
}

/// One baseline per owner, named so owners never collide on disk.
pub fn baseline_path(state_dir: &Path, owner: &str) -> PathBuf {
    let safe: String = owner
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    state_dir.join(format!("repos-{safe}.json"))
}
