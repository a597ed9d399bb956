//! Digital Distributor CLI - database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Create types, tables, login roles, grants and RLS policies
//! dd-cli migrate
//!
//! # Set the role login passwords from DB_PASSWORD / DB_*_PASSWORD
//! dd-cli roles set-passwords
//!
//! # Hire an employee (role is inferred from the position)
//! DD_EMPLOYEE_PASSWORD=... dd-cli employee create -u kate -p "Support specialist"
//! ```
//!
//! Every command connects with `DATABASE_URL` as given, so it must carry the
//! credentials of the database owner.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use secrecy::SecretString;

mod commands;

#[derive(Parser)]
#[command(name = "dd-cli")]
#[command(author, version, about = "Digital Distributor CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage the database login roles
    Roles {
        #[command(subcommand)]
        action: RolesAction,
    },
    /// Manage staff accounts
    Employee {
        #[command(subcommand)]
        action: EmployeeAction,
    },
}

#[derive(Subcommand)]
enum RolesAction {
    /// Set each login role's password from the API's environment variables
    SetPasswords,
}

#[derive(Subcommand)]
enum EmployeeAction {
    /// Create a new employee
    Create {
        /// Login name
        #[arg(short, long)]
        username: String,

        /// Job title; decides the role (admin, moderator, support, analyst)
        #[arg(short, long)]
        position: String,

        /// Initial password
        #[arg(long, env = "DD_EMPLOYEE_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Roles { action } => match action {
            RolesAction::SetPasswords => commands::roles::set_passwords().await?,
        },
        Commands::Employee { action } => match action {
            EmployeeAction::Create {
                username,
                position,
                password,
            } => {
                commands::employee::create(&username, &position, &SecretString::from(password))
                    .await?;
            }
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_employee_create_accepts_password_flag() {
        let cli = Cli::try_parse_from([
            "dd-cli",
            "employee",
            "create",
            "-u",
            "kate",
            "-p",
            "Moderator",
            "--password",
            "secret123",
        ]);
        assert!(cli.is_ok());
    }
}
