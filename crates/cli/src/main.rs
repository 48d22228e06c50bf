//! Barberly CLI - database and operations tooling.
//!
//! # Usage
//!
//! ```bash
//! # Apply database migrations
//! barberly migrate
//!
//! # Create a platform admin (password from BARBERLY_ADMIN_PASSWORD)
//! barberly admin create -p 0912345678 -n "Admin Name" --role admin
//!
//! # Load salons, services and staff from YAML
//! barberly seed --file salons.yaml
//!
//! # Follow a payment until it settles
//! barberly payment watch --base-url http://localhost:8080 --payment-id 42
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::time::Duration;

use clap::{Parser, Subcommand};
use url::Url;

mod commands;

#[derive(Parser)]
#[command(name = "barberly")]
#[command(author, version, about = "Barberly CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage users
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Seed salons, services, staff and shifts from a YAML file
    Seed {
        /// Path to the YAML file
        #[arg(short, long)]
        file: String,
    },
    /// Payment tools
    Payment {
        #[command(subcommand)]
        action: PaymentAction,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Create a user with a password read from `BARBERLY_ADMIN_PASSWORD`
    Create {
        /// Login phone number
        #[arg(short, long)]
        phone: String,

        /// Display name
        #[arg(short, long)]
        name: String,

        /// Role (`customer`, `salon_owner`, `admin`)
        #[arg(short, long, default_value = "admin")]
        role: String,
    },
}

#[derive(Subcommand)]
enum PaymentAction {
    /// Poll a payment's status endpoint until it is paid, failed or the timeout ends
    Watch {
        /// API base URL
        #[arg(long)]
        base_url: Url,

        /// Payment to watch
        #[arg(long)]
        payment_id: i32,

        /// Seconds between polls
        #[arg(long, default_value_t = 3)]
        interval: u64,

        /// Seconds before giving up
        #[arg(long, default_value_t = 300)]
        timeout: u64,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Admin { action } => match action {
            AdminAction::Create { phone, name, role } => {
                commands::admin::create_user(&phone, &name, &role).await?;
            }
        },
        Commands::Seed { file } => commands::seed::salons(&file).await?,
        Commands::Payment { action } => match action {
            PaymentAction::Watch {
                base_url,
                payment_id,
                interval,
                timeout,
            } => {
                commands::payment::watch(
                    &base_url,
                    payment_id,
                    Duration::from_secs(interval),
                    Duration::from_secs(timeout),
                )
                .await?;
            }
        },
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_admin_create() {
        let cli = Cli::try_parse_from([
            "barberly", "admin", "create", "-p", "0912345678", "-n", "Lan",
        ])
        .unwrap();
        let Commands::Admin {
            action: AdminAction::Create { phone, role, .. },
        } = cli.command
        else {
            panic!("expected admin create");
        };
        assert_eq!(phone, "0912345678");
        assert_eq!(role, "admin");
    }

    #[test]
    fn test_parse_payment_watch_defaults() {
        let cli = Cli::try_parse_from([
            "barberly",
            "payment",
            "watch",
            "--base-url",
            "http://localhost:8080",
            "--payment-id",
            "42",
        ])
        .unwrap();
        let Commands::Payment {
            action:
                PaymentAction::Watch {
                    payment_id,
                    interval,
                    timeout,
                    ..
                },
        } = cli.command
        else {
            panic!("expected payment watch");
        };
        assert_eq!((payment_id, interval, timeout), (42, 3, 300));
    }

    #[test]
    fn test_seed_requires_file() {
        assert!(Cli::try_parse_from(["barberly", "seed"]).is_err());
    }
}
