use clap::{CommandFactory, Parser};
use onboard_relay::cli::{Cli, Commands};
use std::path::PathBuf;

#[test]
fn command_tree_is_valid() {
    Cli::command().debug_assert();
}

#[test]
fn links_accepts_report_and_template() {
    let cli = Cli::try_parse_from([
        "onboard-relay",
        "links",
        "-i",
        "people.csv",
        "--report",
        "out.json",
        "--template",
        "Hello {name}: {link}",
        "--slack-token",
        "xoxb-1",
    ])
    .expect("links should parse");

    let Commands::Links {
        input,
        report,
        template,
        slack,
        dry_run,
    } = cli.command
    else {
        panic!("expected links");
    };
    assert_eq!(input, PathBuf::from("people.csv"));
    assert_eq!(report, Some(PathBuf::from("out.json")));
    assert_eq!(template.as_deref(), Some("Hello {name}: {link}"));
    assert_eq!(slack.slack_token.as_deref(), Some("xoxb-1"));
    assert!(!dry_run);
}

#[test]
fn unknown_module_version_is_rejected() {
    let result = Cli::try_parse_from([
        "onboard-relay",
        "directory",
        "-i",
        "hires.csv",
        "--module-version",
        "v9",
    ]);
    assert!(result.is_err());
}
