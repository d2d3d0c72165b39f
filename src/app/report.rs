use super::directory::DirectoryReport;
use super::links::{LinkResult, LinkStatus};
use super::repos::ReposReport;
use crate::notify::DestinationSpec;
use serde::Serialize;

/// A per-item failure that did not abort its batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub item: String,
    pub reason: String,
}

fn push_failures(lines: &mut Vec<String>, failed: &[Failure]) {
    if failed.is_empty() {
        return;
    }
    lines.push(String::new());
    lines.push(format!("  Failed ({})", failed.len()));
    for failure in failed {
        lines.push(format!("    ✗ {}: {}", failure.item, failure.reason));
    }
}

pub fn render_repos(owner: &str, target: &DestinationSpec, report: &ReposReport) -> String {
    let mode = if report.dry_run { " (dry run)" } else { "" };
    let mut lines = vec![format!("◆ New repositories for {owner}{mode}"), String::new()];

    if let Some(seeded) = report.seeded {
        lines.push(format!(
            "  First run: baseline seeded with {seeded} repositories, nothing announced."
        ));
        return lines.join("\n");
    }

    lines.push(format!("  Target       {target}"));
    lines.push(format!("  Added        {}", report.added.len()));
    if !report.dry_run {
        lines.push(format!("  Announced    {}", report.delivered.len()));
        let fallback = report.delivered.iter().filter(|o| o.used_fallback()).count();
        if fallback > 0 {
            lines.push(format!("  Via fallback {fallback}"));
        }
    }
    if let Some(path) = &report.audit_path {
        lines.push(format!("  Audit        {}", path.display()));
    }

    if !report.added.is_empty() {
        lines.push(String::new());
        for name in &report.added {
            lines.push(format!("    + {name}"));
        }
    }
    push_failures(&mut lines, &report.failed);
    lines.join("\n")
}

pub fn render_links(results: &[LinkResult], dry_run: bool) -> String {
    let mode = if dry_run { " (dry run)" } else { "" };
    let count = |status: LinkStatus| results.iter().filter(|r| r.status == status).count();

    let mut lines = vec![format!("◆ Secure-link delivery{mode}"), String::new()];
    lines.push(format!("  Recipients   {}", results.len()));
    if dry_run {
        lines.push(format!("  Previewed    {}", count(LinkStatus::DryRun)));
    } else {
        lines.push(format!("  Delivered    {}", count(LinkStatus::Delivered)));
        lines.push(format!("  Via fallback {}", count(LinkStatus::Fallback)));
        lines.push(format!("  Failed       {}", count(LinkStatus::Failed)));
    }

    let failed: Vec<Failure> = results
        .iter()
        .filter(|r| r.status == LinkStatus::Failed)
        .map(|r| Failure {
            item: r.email.clone(),
            reason: r.error.clone().unwrap_or_default(),
        })
        .collect();
    push_failures(&mut lines, &failed);
    lines.join("\n")
}

pub fn render_directory(report: &DirectoryReport, dry_run: bool) -> String {
    let mode = if dry_run { " (dry run)" } else { "" };
    let mut lines = vec![
        format!("◆ Directory onboarding on {}{mode}", report.server),
        String::new(),
        format!("  Module       {}", report.version),
        format!("  Users        {}", report.total),
        format!("  Onboarded    {}", report.onboarded.len()),
    ];
    if dry_run && !report.commands.is_empty() {
        lines.push(String::new());
        for command in &report.commands {
            lines.push(format!("    $ {command}"));
        }
    }
    push_failures(&mut lines, &report.failed);
    lines.join("\n")
}
