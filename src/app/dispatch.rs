use super::directory::DirectoryRequest;
use super::links::LinksRequest;
use super::repos::ReposRequest;
use crate::cli::{Cli, Commands};
use crate::config::Config;
use anyhow::Result;

/// Load configuration for this invocation: an explicit `--config` path must
/// exist, otherwise the default file is created on first use.
pub fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load_or_init()?,
    };
    config.apply_env_overrides();
    Ok(config)
}

pub async fn dispatch(cli: Cli, mut config: Config) -> Result<()> {
    match cli.command {
        Commands::Repos {
            owner,
            kind,
            github_token,
            slack,
            target,
            state_dir,
            dry_run,
        } => {
            super::apply_slack_args(&mut config, &slack);
            if let Some(token) = github_token {
                config.github.token = Some(token);
            }
            if let Some(dir) = state_dir {
                config.detector.state_dir = dir.to_string_lossy().into_owned();
            }
            super::repos::run(
                &config,
                ReposRequest {
                    owner,
                    kind,
                    target: target.destination(),
                    dry_run,
                },
            )
            .await
        }

        Commands::Links {
            input,
            slack,
            template,
            report,
            dry_run,
        } => {
            super::apply_slack_args(&mut config, &slack);
            super::links::run(
                &config,
                LinksRequest {
                    input,
                    template,
                    report,
                    dry_run,
                },
            )
            .await
        }

        Commands::Directory {
            input,
            server,
            admin_user,
            module_version,
            group,
            dry_run,
        } => {
            super::directory::run(
                &config,
                DirectoryRequest {
                    input,
                    server,
                    admin_user,
                    module_version,
                    group,
                    dry_run,
                },
            )
            .await
        }
    }
}
