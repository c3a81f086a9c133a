use std::path::Path;

use askguard::cli::app::{Cli, Command};
use askguard::config::DEFAULT_ROW_LIMIT;
use askguard::models::{ANONYMOUS_USER, Role};
use clap::Parser;

#[test]
fn parses_global_runtime_flags_for_ask() {
    let cli = Cli::parse_from([
        "askguard",
        "--home-dir",
        "/home/tester",
        "--cwd",
        "/work/repo",
        "--db",
        "/tmp/askguard/bank.db",
        "ask",
        "How many branches are there?",
        "--role",
        "viewer",
        "--user",
        "ana",
    ]);

    assert_eq!(
        cli.runtime.home_dir.as_deref(),
        Some(Path::new("/home/tester"))
    );
    assert_eq!(cli.runtime.cwd.as_deref(), Some(Path::new("/work/repo")));
    assert_eq!(
        cli.runtime.db.as_deref(),
        Some(Path::new("/tmp/askguard/bank.db"))
    );

    match cli.command {
        Command::Ask(args) => {
            assert_eq!(args.question, "How many branches are there?");
            assert_eq!(args.role, Role::Viewer);
            assert_eq!(args.user, "ana");
            assert_eq!(args.limit, DEFAULT_ROW_LIMIT);
            assert_eq!(args.timeout_ms, 3_000);
            assert!(args.candidate.is_none());
        }
        other => panic!("expected ask command, got {other:?}"),
    }
}

#[test]
fn ask_defaults_to_anonymous_analyst() {
    let cli = Cli::parse_from([
        "askguard",
        "ask",
        "List branches",
        "--candidate",
        "SELECT * FROM branches",
        "--limit",
        "25",
    ]);

    match cli.command {
        Command::Ask(args) => {
            assert_eq!(args.role, Role::Analyst);
            assert_eq!(args.user, ANONYMOUS_USER);
            assert_eq!(args.limit, 25);
            assert_eq!(args.candidate.as_deref(), Some("SELECT * FROM branches"));
        }
        other => panic!("expected ask command, got {other:?}"),
    }
}

#[test]
fn parses_guard_role_and_mapping_file() {
    let cli = Cli::parse_from([
        "askguard",
        "guard",
        "SELECT * FROM customers",
        "--role",
        "viewer",
        "--roles",
        "roles.json",
    ]);

    match cli.command {
        Command::Guard(args) => {
            assert_eq!(args.sql, "SELECT * FROM customers");
            assert_eq!(args.role, Role::Viewer);
            assert_eq!(args.roles.as_deref(), Some(Path::new("roles.json")));
        }
        other => panic!("expected guard command, got {other:?}"),
    }
}

#[test]
fn parses_init_force_and_health_skip_flags() {
    let cli = Cli::parse_from(["askguard", "init", "--force"]);
    match cli.command {
        Command::Init(args) => assert!(args.force),
        other => panic!("expected init command, got {other:?}"),
    }

    let cli = Cli::parse_from(["askguard", "health", "--skip-generator"]);
    match cli.command {
        Command::Health(args) => {
            assert!(args.skip_generator);
            assert!(args.ollama_url.is_none());
        }
        other => panic!("expected health command, got {other:?}"),
    }
}

#[test]
fn rejects_unknown_role() {
    let parsed = Cli::try_parse_from(["askguard", "ask", "hi", "--role", "superuser"]);
    assert!(parsed.is_err());
}
