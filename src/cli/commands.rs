use crate::directory::ModuleVersion;
use crate::notify::DestinationSpec;
use crate::sources::OwnerKind;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// `onboard-relay` - onboarding automations with fallback notification delivery.
#[derive(Parser, Debug)]
#[command(name = "onboard-relay")]
#[command(version)]
#[command(
    about = "Announce new repositories, deliver onboarding links, and create directory accounts.",
    long_about = None
)]
pub struct Cli {
    /// Config file to use instead of ~/.onboard-relay/config.toml (must exist)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Notify about repositories added since the previous run
    Repos {
        /// Organization or user that owns the repositories
        owner: String,

        /// Whether `owner` is an organization or a user
        #[arg(long, value_enum, default_value_t = OwnerKind::Org)]
        kind: OwnerKind,

        /// GitHub token (omit to list public repositories only)
        #[arg(long, value_name = "TOKEN")]
        github_token: Option<String>,

        #[command(flatten)]
        slack: SlackArgs,

        #[command(flatten)]
        target: TargetArgs,

        /// Directory for the baseline and audit files
        #[arg(long, value_name = "DIR")]
        state_dir: Option<PathBuf>,

        /// Show what would be announced without persisting or posting
        #[arg(long)]
        dry_run: bool,
    },

    /// Send each person in a roster their personal secure-share link
    Links {
        /// CSV with `email` and `link` columns (`name` optional)
        #[arg(short, long, value_name = "CSV")]
        input: PathBuf,

        #[command(flatten)]
        slack: SlackArgs,

        /// Message template; `{name}` and `{link}` are substituted
        #[arg(long)]
        template: Option<String>,

        /// Write per-recipient delivery outcomes as JSON
        #[arg(long, value_name = "PATH")]
        report: Option<PathBuf>,

        /// Log messages instead of delivering them
        #[arg(long)]
        dry_run: bool,
    },

    /// Create directory accounts for everyone in a roster
    Directory {
        /// CSV with `email`, `first_name`, `last_name` (`user_name`, `group` optional)
        #[arg(short, long, value_name = "CSV")]
        input: PathBuf,

        /// Directory server to connect to
        #[arg(long)]
        server: Option<String>,

        /// Administrator account used for the session
        #[arg(long)]
        admin_user: Option<String>,

        /// Admin module version (v1, v2)
        #[arg(long)]
        module_version: Option<ModuleVersion>,

        /// Group for rows that do not name one
        #[arg(long)]
        group: Option<String>,

        /// Print the admin commands instead of running them
        #[arg(long)]
        dry_run: bool,
    },
}

/// Chat credentials shared by the notifying commands.
#[derive(Args, Debug, Clone, Default)]
pub struct SlackArgs {
    /// Slack bot token (overrides config and environment)
    #[arg(long, value_name = "TOKEN")]
    pub slack_token: Option<String>,

    /// Channel that receives messages no direct path could deliver
    #[arg(long, value_name = "CHANNEL")]
    pub fallback_channel: Option<String>,
}

/// Notification target. At most one may be given.
#[derive(Args, Debug, Clone, Default)]
#[group(multiple = false)]
pub struct TargetArgs {
    /// Post to this channel id
    #[arg(long, value_name = "CHANNEL")]
    pub channel: Option<String>,

    /// Send directly to this user id
    #[arg(long, value_name = "USER")]
    pub user: Option<String>,

    /// Look up this email address and send directly
    #[arg(long, value_name = "EMAIL")]
    pub email: Option<String>,
}

impl TargetArgs {
    pub fn destination(&self) -> Option<DestinationSpec> {
        if let Some(channel) = &self.channel {
            return Some(DestinationSpec::Channel(channel.clone()));
        }
        if let Some(user) = &self.user {
            return Some(DestinationSpec::Direct(user.clone()));
        }
        self.email.clone().map(DestinationSpec::Email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn repos_parses_target_and_flags() {
        let cli = Cli::try_parse_from([
            "onboard-relay",
            "repos",
            "acme",
            "--kind",
            "user",
            "--email",
            "ada@example.com",
            "--fallback-channel",
            "C-fallback",
            "--dry-run",
        ])
        .unwrap();

        let Commands::Repos {
            owner,
            kind,
            slack,
            target,
            dry_run,
            ..
        } = cli.command
        else {
            panic!("expected repos command");
        };
        assert_eq!(owner, "acme");
        assert_eq!(kind, OwnerKind::User);
        assert!(dry_run);
        assert_eq!(slack.fallback_channel.as_deref(), Some("C-fallback"));
        assert_eq!(
            target.destination(),
            Some(DestinationSpec::Email("ada@example.com".into()))
        );
    }

    #[test]
    fn repos_rejects_two_targets() {
        let result = Cli::try_parse_from([
            "onboard-relay",
            "repos",
            "acme",
            "--channel",
            "C1",
            "--user",
            "U1",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn global_flags_follow_subcommand() {
        let cli = Cli::try_parse_from([
            "onboard-relay",
            "links",
            "--input",
            "people.csv",
            "--config",
            "/etc/relay.toml",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/relay.toml")));
    }

    #[test]
    fn directory_module_version_parses() {
        let cli = Cli::try_parse_from([
            "onboard-relay",
            "directory",
            "-i",
            "hires.csv",
            "--module-version",
            "v1",
        ])
        .unwrap();
        let Commands::Directory { module_version, .. } = cli.command else {
            panic!("expected directory command");
        };
        assert_eq!(module_version, Some(ModuleVersion::V1));
    }
}
