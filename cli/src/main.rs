use std::path::PathBuf;
use std::sync::Arc;

use appointly::config::{ClientConfig, ConfigError};
use appointly::net::transport::ReqwestTransport;
use appointly::net::types::{NewAppointment, NewShop};
use appointly::routes::guard::{self, GuardDecision};
use appointly::routes::{self, AppRoute, Navigation};
use appointly::{ApiClient, ApiError, CredentialStore, FileCredentialStore, Role, SessionError, SessionStore};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[cfg(test)]
#[path = "main_test.rs"]
mod main_test;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("not logged in; run `appointly-cli login` first")]
    NotLoggedIn,
    #[error("session expired; run `appointly-cli login` again")]
    SessionExpired,
    #[error("{0} is not available for this account's role")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid JSON output: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "appointly-cli", about = "Appointment marketplace client")]
struct Cli {
    /// API base URL; overrides `APPOINTLY_API_URL`.
    #[arg(long)]
    api_url: Option<String>,

    /// Credential file; overrides `APPOINTLY_CREDENTIAL_PATH`.
    #[arg(long)]
    credentials: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "APPOINTLY_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Register {
        #[arg(long)]
        email: String,
        #[arg(long, env = "APPOINTLY_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        full_name: String,
        #[arg(long, default_value = "customer", value_parser = parse_role)]
        role: Role,
    },
    Logout,
    /// Print the logged-in user.
    Whoami,
    /// Show what the route guard decides for a path.
    Route {
        path: String,
    },
    Shops(ShopsCommand),
    Categories,
    Appointments(AppointmentsCommand),
    /// Monthly booking counts for a shop you own.
    Analytics {
        shop_id: i64,
    },
}

#[derive(Args, Debug)]
struct ShopsCommand {
    #[command(subcommand)]
    command: ShopsSubcommand,
}

#[derive(Subcommand, Debug)]
enum ShopsSubcommand {
    List,
    Get {
        shop_id: i64,
    },
    Create {
        #[arg(long)]
        category_id: i64,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "")]
        location: String,
        #[arg(long, default_value = "")]
        opening_hours: String,
    },
}

#[derive(Args, Debug)]
struct AppointmentsCommand {
    #[command(subcommand)]
    command: AppointmentsSubcommand,
}

#[derive(Subcommand, Debug)]
enum AppointmentsSubcommand {
    /// Your own bookings.
    Mine,
    /// Bookings at a shop you own.
    Shop {
        shop_id: i64,
    },
    Book {
        #[arg(long)]
        shop_id: i64,
        #[arg(long)]
        start_at: String,
        #[arg(long)]
        end_at: String,
        #[arg(long, default_value = "")]
        notes: String,
    },
    Status {
        appointment_id: i64,
        status: String,
    },
}

fn parse_role(raw: &str) -> Result<Role, String> {
    raw.parse()
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let session = build_session(&cli)?;
    if restores_session(&cli.command) {
        session.hydrate().await;
    }

    match cli.command {
        Command::Login { email, password } => {
            let user = session.login(&email, &password).await?;
            print_json(&user)
        }
        Command::Register { email, password, full_name, role } => {
            let user = session.register(&email, &password, &full_name, role).await?;
            print_json(&user)
        }
        Command::Logout => {
            session.logout();
            println!("logged out");
            Ok(())
        }
        Command::Whoami => {
            let user = session.current_user().ok_or(CliError::NotLoggedIn)?;
            print_json(&user)
        }
        Command::Route { path } => {
            println!("{}", describe_navigation(&routes::resolve(&path, &session.snapshot())));
            Ok(())
        }
        Command::Shops(shops) => run_shops(&session, shops).await,
        Command::Categories => {
            let categories = session.api().categories().await.map_err(|e| api_failure(&session, e))?;
            print_json(&categories)
        }
        Command::Appointments(appointments) => run_appointments(&session, appointments).await,
        Command::Analytics { shop_id } => {
            authorize(&session, AppRoute::Dashboard)?;
            let points = session.api().shop_analytics(shop_id).await.map_err(|e| api_failure(&session, e))?;
            print_json(&points)
        }
    }
}

/// Every command but the auth ones runs against the restored session, so a
/// stale stored credential is resolved or cleared before any other request.
fn restores_session(command: &Command) -> bool {
    !matches!(command, Command::Login { .. } | Command::Register { .. } | Command::Logout)
}

fn build_session(cli: &Cli) -> Result<SessionStore, CliError> {
    let mut config = ClientConfig::from_env()?;
    if let Some(url) = cli.api_url.as_deref() {
        config.api_url = url.trim_end_matches('/').to_owned();
    }
    if let Some(path) = cli.credentials.as_ref() {
        config.credential_path.clone_from(path);
    }
    tracing::debug!(api_url = %config.api_url, credentials = %config.credential_path.display(), "client configured");

    let credentials: Arc<dyn CredentialStore> = Arc::new(FileCredentialStore::new(&config.credential_path));
    let transport = Arc::new(ReqwestTransport::new(&config.api_url, config.timeouts)?);
    let api = ApiClient::new(transport, credentials.clone());
    Ok(SessionStore::new(api, credentials, config.resolve_retries))
}

async fn run_shops(session: &SessionStore, shops: ShopsCommand) -> Result<(), CliError> {
    match shops.command {
        ShopsSubcommand::List => {
            let shops = session.api().shops().await.map_err(|e| api_failure(session, e))?;
            print_json(&shops)
        }
        ShopsSubcommand::Get { shop_id } => {
            let shop = session.api().shop(shop_id).await.map_err(|e| api_failure(session, e))?;
            print_json(&shop)
        }
        ShopsSubcommand::Create { category_id, name, description, location, opening_hours } => {
            authorize(session, AppRoute::CreateShop)?;
            let shop = NewShop { category_id, name, description, location, opening_hours };
            let created = session.api().create_shop(&shop).await.map_err(|e| api_failure(session, e))?;
            print_json(&created)
        }
    }
}

async fn run_appointments(session: &SessionStore, appointments: AppointmentsCommand) -> Result<(), CliError> {
    match appointments.command {
        AppointmentsSubcommand::Mine => {
            authorize(session, AppRoute::MyAppointments)?;
            let list = session.api().my_appointments().await.map_err(|e| api_failure(session, e))?;
            print_json(&list)
        }
        AppointmentsSubcommand::Shop { shop_id } => {
            authorize(session, AppRoute::Dashboard)?;
            let list = session.api().shop_appointments(shop_id).await.map_err(|e| api_failure(session, e))?;
            print_json(&list)
        }
        AppointmentsSubcommand::Book { shop_id, start_at, end_at, notes } => {
            authorize(session, AppRoute::MyAppointments)?;
            let request = NewAppointment { shop_id, start_at, end_at, notes };
            let booked = session.api().create_appointment(&request).await.map_err(|e| api_failure(session, e))?;
            print_json(&booked)
        }
        AppointmentsSubcommand::Status { appointment_id, status } => {
            authorize(session, AppRoute::Dashboard)?;
            let updated = session
                .api()
                .update_appointment_status(appointment_id, &status)
                .await
                .map_err(|e| api_failure(session, e))?;
            print_json(&updated)
        }
    }
}

/// Apply the route guard for `route` to the hydrated session.
fn authorize(session: &SessionStore, route: AppRoute) -> Result<(), CliError> {
    match guard::evaluate(&session.snapshot(), route.access()) {
        GuardDecision::Render => Ok(()),
        GuardDecision::Redirect(guard::LOGIN_PATH) | GuardDecision::Pending => Err(CliError::NotLoggedIn),
        GuardDecision::Redirect(_) => Err(CliError::Forbidden(route.path())),
    }
}

/// Map an API failure to what the user sees, invalidating the session on 401.
fn api_failure(session: &SessionStore, error: ApiError) -> CliError {
    if session.invalidate_if_unauthorized(&error) {
        return CliError::SessionExpired;
    }
    if error.is_not_found() {
        return CliError::NotFound(error.to_string());
    }
    CliError::Api(error)
}

fn describe_navigation(navigation: &Navigation) -> String {
    match navigation {
        Navigation::Render(route) => format!("render {}", route.path()),
        Navigation::Redirect(route) => format!("redirect {}", route.path()),
        Navigation::Pending(route) => format!("pending {}", route.path()),
        Navigation::NotFound => "not found".to_owned(),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
