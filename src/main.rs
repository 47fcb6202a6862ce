use std::process::ExitCode;

use clap::{Parser, Subcommand};
use recipe_backend::{
    accounts::create_superuser, api::start_server, config::Config, postgres::PgStore,
    state::State, DATABASE_MAX_CONNECTIONS,
};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "recipe-server", version, about = "Recipe API backend")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API
    Serve,
    /// Create an account with staff and superuser rights
    CreateSuperuser {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "")]
        name: String,
    },
}

async fn serve() -> Result<(), String> {
    let config = Config::load().map_err(|e| e.to_string())?;
    let state = State::new(&config).await.map_err(|e| e.to_string())?;

    start_server(state, config.port)
        .await
        .map_err(|e| e.to_string())
}

async fn superuser(email: &str, password: &str, name: &str) -> Result<(), String> {
    let url = std::env::var("DATABASE_URL")
        .map_err(|_| "DATABASE_URL must be set to create a superuser".to_owned())?;
    let store = PgStore::connect(&url, DATABASE_MAX_CONNECTIONS)
        .await
        .map_err(|e| e.to_string())?;

    let user = create_superuser(&store, email, password, name)
        .await
        .map_err(|e| e.to_string())?;
    log::info!("Superuser {} ready", user.email);
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Serve => serve().await,
        Command::CreateSuperuser {
            email,
            password,
            name,
        } => superuser(&email, &password, &name).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
