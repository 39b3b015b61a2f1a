use clap::{Parser, Subcommand};
use club_session::{
    AuthOutcome, Config, FileTokenStore, HttpAuthApi, RegisterRequest, RouteGuard,
    SessionManager,
};
use serde::Serialize;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Manage the club site session from the command line
#[derive(Debug, Parser)]
#[command(name = "clubsession", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Restore the stored session and print it
    Status,
    /// Sign in and store the token pair
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "CLUBSESSION_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account and sign in
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "CLUBSESSION_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Sign out and forget the stored tokens
    Logout,
    /// Show what the route guard does for PATH with the stored session
    Guard { path: String },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn exit_code(outcome: &AuthOutcome) -> ExitCode {
    if outcome.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Initialize tracing (stderr, so stdout stays machine-readable)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clubsession=debug,club_session=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    // Load configuration from environment
    let config = Config::from_env();
    info!(
        "Loaded configuration: api={}, tokens={:?}",
        config.api.base_url, config.store.token_path
    );

    let api = Arc::new(HttpAuthApi::new(&config.api)?);
    let store = Arc::new(FileTokenStore::new(&config.store.token_path));
    let manager = SessionManager::new(api, store).with_login_path(&config.guard.login_path);

    match cli.command {
        Command::Status => {
            manager.init().await;
            print_json(&manager.snapshot())?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Login { email, password } => {
            let outcome = AuthOutcome::from(manager.login(&email, &password).await);
            print_json(&outcome)?;
            Ok(exit_code(&outcome))
        }
        Command::Register {
            name,
            email,
            password,
        } => {
            let request = RegisterRequest::new(name, email, password);
            let outcome = AuthOutcome::from(manager.register(request).await);
            print_json(&outcome)?;
            Ok(exit_code(&outcome))
        }
        Command::Logout => {
            let outcome = AuthOutcome::from(manager.logout().await);
            print_json(&outcome)?;
            Ok(exit_code(&outcome))
        }
        Command::Guard { path } => {
            manager.init().await;
            let guard = RouteGuard::new(config.guard.clone());
            print_json(&serde_json::json!({
                "path": path,
                "class": guard.classify(&path),
                "decision": guard.decide(&manager.snapshot(), &path),
            }))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
