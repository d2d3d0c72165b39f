use super::report::{Failure, render_directory};
use crate::config::Config;
use crate::directory::{
    CommandRunner, DirectoryAdmin, DryRunRunner, ModuleVersion, NewDirectoryUser, ProcessRunner,
    SessionTarget, admin_for, with_session,
};
use crate::error::{ConfigError, DirectoryError};
use crate::sources::Roster;
use anyhow::{Result, bail};
use std::path::PathBuf;

#[derive(Debug, Default)]
pub struct DirectoryReport {
    pub server: String,
    pub version: ModuleVersion,
    pub total: usize,
    pub onboarded: Vec<String>,
    pub failed: Vec<Failure>,
    /// Command lines recorded in dry-run mode.
    pub commands: Vec<String>,
}

pub struct DirectoryRequest {
    pub input: PathBuf,
    pub server: Option<String>,
    pub admin_user: Option<String>,
    pub module_version: Option<ModuleVersion>,
    pub group: Option<String>,
    pub dry_run: bool,
}

pub async fn run(config: &Config, request: DirectoryRequest) -> Result<()> {
    let settings = &config.directory;
    let server = request
        .server
        .or_else(|| settings.server.clone())
        .ok_or(ConfigError::Missing {
            key: "directory.server",
            hint: "set it in config.toml or pass --server",
        })?;
    let admin_user = request
        .admin_user
        .or_else(|| settings.admin_user.clone())
        .ok_or(ConfigError::Missing {
            key: "directory.admin_user",
            hint: "set it in config.toml or pass --admin-user",
        })?;
    let version = request.module_version.unwrap_or(settings.module_version);
    let group = request.group.or_else(|| settings.default_group.clone());

    let users = Roster::load(&request.input)?.directory_users(group.as_deref())?;
    let admin = admin_for(version);
    let target = SessionTarget {
        program: &settings.program,
        server: &server,
        admin_user: &admin_user,
        domain: &settings.domain,
    };

    let report = if request.dry_run {
        let runner = DryRunRunner::default();
        let mut report = onboard_all(&runner, admin.as_ref(), target, &users).await?;
        report.commands = runner.commands();
        report
    } else {
        onboard_all(&ProcessRunner, admin.as_ref(), target, &users).await?
    };

    println!("{}", render_directory(&report, request.dry_run));
    if !report.failed.is_empty() {
        bail!(
            "{} of {} directory users could not be onboarded",
            report.failed.len(),
            report.total
        );
    }
    Ok(())
}

/// Onboard every user inside one session. A failing user is recorded and the
/// batch continues; connect and disconnect failures abort.
pub async fn onboard_all(
    runner: &dyn CommandRunner,
    admin: &dyn DirectoryAdmin,
    target: SessionTarget<'_>,
    users: &[NewDirectoryUser],
) -> Result<DirectoryReport, DirectoryError> {
    let mut report = DirectoryReport {
        server: target.server.to_string(),
        version: admin.version(),
        total: users.len(),
        ..DirectoryReport::default()
    };

    let (onboarded, failed) = with_session(runner, admin, target, |session| async move {
        let mut onboarded = Vec::new();
        let mut failed = Vec::new();
        for user in users {
            match session.onboard(user).await {
                Ok(()) => onboarded.push(user.user_name.clone()),
                Err(e) => {
                    tracing::warn!(user = user.user_name.as_str(), "onboarding failed: {e}");
                    failed.push(Failure {
                        item: user.user_name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok((onboarded, failed))
    })
    .await?;

    report.onboarded = onboarded;
    report.failed = failed;
    Ok(report)
}
