use super::*;

// =============================================================================
// argument parsing
// =============================================================================

#[test]
fn cli_definition_is_consistent() {
    use clap::CommandFactory;
    Cli::command().debug_assert();
}

#[test]
fn register_parses_role_case_insensitively() {
    let cli = Cli::try_parse_from([
        "appointly-cli",
        "register",
        "--email",
        "a@b.com",
        "--password",
        "pw",
        "--full-name",
        "A B",
        "--role",
        "OWNER",
    ])
    .unwrap();
    match cli.command {
        Command::Register { role, full_name, .. } => {
            assert_eq!(role, Role::Owner);
            assert_eq!(full_name, "A B");
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn register_rejects_unknown_role() {
    let result = Cli::try_parse_from([
        "appointly-cli",
        "register",
        "--email",
        "a@b.com",
        "--password",
        "pw",
        "--full-name",
        "A B",
        "--role",
        "admin",
    ]);
    assert!(result.is_err());
}

#[test]
fn global_overrides_parse() {
    let cli = Cli::try_parse_from([
        "appointly-cli",
        "--api-url",
        "http://127.0.0.1:9000/api/",
        "--credentials",
        "/tmp/creds.json",
        "shops",
        "get",
        "4",
    ])
    .unwrap();
    assert_eq!(cli.api_url.as_deref(), Some("http://127.0.0.1:9000/api/"));
    assert_eq!(cli.credentials, Some(PathBuf::from("/tmp/creds.json")));
    assert!(matches!(cli.command, Command::Shops(ShopsCommand { command: ShopsSubcommand::Get { shop_id: 4 } })));
}

#[test]
fn book_defaults_notes_to_empty() {
    let cli = Cli::try_parse_from([
        "appointly-cli",
        "appointments",
        "book",
        "--shop-id",
        "4",
        "--start-at",
        "2026-01-01T10:00:00",
        "--end-at",
        "2026-01-01T10:30:00",
    ])
    .unwrap();
    match cli.command {
        Command::Appointments(AppointmentsCommand {
            command: AppointmentsSubcommand::Book { shop_id, notes, .. },
        }) => {
            assert_eq!(shop_id, 4);
            assert_eq!(notes, "");
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn data_commands_restore_the_session_first() {
    let parse = |args: &[&str]| Cli::try_parse_from(args.iter().copied()).unwrap().command;
    assert!(restores_session(&parse(&["appointly-cli", "categories"])));
    assert!(restores_session(&parse(&["appointly-cli", "shops", "list"])));
    assert!(restores_session(&parse(&["appointly-cli", "shops", "get", "4"])));
    assert!(restores_session(&parse(&["appointly-cli", "whoami"])));
    assert!(!restores_session(&parse(&["appointly-cli", "logout"])));
    assert!(!restores_session(&parse(&["appointly-cli", "login", "--email", "a@b.com", "--password", "pw"])));
}

// =============================================================================
// output helpers
// =============================================================================

#[test]
fn describe_navigation_variants() {
    assert_eq!(describe_navigation(&Navigation::Render(AppRoute::Dashboard)), "render /dashboard");
    assert_eq!(describe_navigation(&Navigation::Redirect(AppRoute::Login)), "redirect /login");
    assert_eq!(describe_navigation(&Navigation::Pending(AppRoute::CreateShop)), "pending /shops/new");
    assert_eq!(describe_navigation(&Navigation::NotFound), "not found");
}
