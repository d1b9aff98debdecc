use clap::{Parser, Subcommand};

/// Chirpy: account and session administration
#[derive(Parser)]
#[command(name = "chirpy", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Apply pending database migrations
    Migrate,

    /// Manage user accounts
    User {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Log in with email and password; prints the tokens as JSON
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "CHIRPY_PASSWORD")]
        password: String,
    },

    /// Inspect, refresh and revoke tokens
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },

    /// Print a bcrypt hash for a password
    HashPassword {
        password: String,
    },

    /// Delete all users and their refresh tokens (dev platform only)
    Reset,
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Create a new account
    Create {
        #[arg(long)]
        email: String,
        #[arg(long, env = "CHIRPY_PASSWORD")]
        password: String,
    },
}

#[derive(Subcommand)]
pub enum TokenCommands {
    /// Validate an access token and print its user id
    Inspect { token: String },
    /// Exchange a refresh token for a new access token
    Refresh { refresh_token: String },
    /// Revoke a refresh token
    Revoke { refresh_token: String },
}
