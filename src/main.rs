use std::sync::Arc;

use anyhow::Context;
use axum::http::{header::AUTHORIZATION, HeaderMap, HeaderValue};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chirpy::auth::jwt::AccessTokenCodec;
use chirpy::auth::password::hash_password;
use chirpy::config::{self, Config, Platform};
use chirpy::session::SessionService;
use chirpy::store::postgres::PgStore;

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = config::load()?;
    init_tracing(cfg.platform);

    let args = cli::Cli::parse();

    let result = match args.command {
        cli::Commands::Migrate => {
            let db = PgStore::connect(&cfg.database_url).await?;
            tracing::info!("Running migrations...");
            db.migrate().await?;
            println!("Migrations applied.");
            Ok(())
        }
        cli::Commands::HashPassword { password } => {
            let hash = hash_password(&password, cfg.session.bcrypt_cost).await?;
            println!("{}", hash);
            Ok(())
        }
        cli::Commands::User { command } => {
            let sessions = connect_sessions(&cfg).await?;
            handle_user_command(&sessions, command).await
        }
        cli::Commands::Login { email, password } => {
            let sessions = connect_sessions(&cfg).await?;
            let resp = sessions.login(&email, &password).await?;
            println!("{}", serde_json::to_string_pretty(&resp)?);
            Ok(())
        }
        cli::Commands::Token { command } => handle_token_command(&cfg, command).await,
        cli::Commands::Reset => {
            let sessions = connect_sessions(&cfg).await?;
            let removed = sessions.reset_users(cfg.platform).await?;
            println!("Database reset: {} users removed.", removed);
            Ok(())
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

fn init_tracing(platform: Platform) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "chirpy=info".into()),
    );

    match platform {
        Platform::Production => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        Platform::Dev => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

async fn connect_sessions(cfg: &Config) -> anyhow::Result<SessionService> {
    tracing::debug!("Connecting to database...");
    let db = Arc::new(PgStore::connect(&cfg.database_url).await?);
    Ok(SessionService::new(&cfg.session, db.clone(), db))
}

fn bearer(token: &str) -> anyhow::Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    let value = HeaderValue::from_str(&format!("Bearer {}", token))
        .context("token contains characters not allowed in a header")?;
    headers.insert(AUTHORIZATION, value);
    Ok(headers)
}

fn inspect_token(cfg: &Config, token: &str) -> anyhow::Result<()> {
    let codec = AccessTokenCodec::new(cfg.session.secret.clone(), cfg.session.access_token_ttl)
        .with_leeway(cfg.session.token_leeway_secs);
    match codec.validate(token) {
        Ok(user_id) => {
            println!("Token valid:\n  User: {}", user_id);
            Ok(())
        }
        Err(kind) => anyhow::bail!("token rejected: {}", kind),
    }
}

async fn handle_user_command(
    sessions: &SessionService,
    cmd: cli::UserCommands,
) -> anyhow::Result<()> {
    match cmd {
        cli::UserCommands::Create { email, password } => {
            let user = sessions.register(&email, &password).await?;
            println!(
                "User created:\n  ID:      {}\n  Email:   {}\n  Created: {}",
                user.id,
                user.email,
                user.created_at.format("%Y-%m-%d %H:%M:%S")
            );
        }
    }
    Ok(())
}

async fn handle_token_command(cfg: &Config, cmd: cli::TokenCommands) -> anyhow::Result<()> {
    match cmd {
        // access tokens are stateless; no database needed
        cli::TokenCommands::Inspect { token } => inspect_token(cfg, &token)?,
        cli::TokenCommands::Refresh { refresh_token } => {
            let sessions = connect_sessions(cfg).await?;
            let resp = sessions.refresh(&bearer(&refresh_token)?).await?;
            println!("{}", serde_json::to_string_pretty(&resp)?);
        }
        cli::TokenCommands::Revoke { refresh_token } => {
            let sessions = connect_sessions(cfg).await?;
            sessions.revoke(&bearer(&refresh_token)?).await?;
            println!("Refresh token revoked.");
        }
    }
    Ok(())
}
