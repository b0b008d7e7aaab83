//! Operator commands for the accounts service.
//!
//! # Usage
//!
//! ```bash
//! # Preview what the nightly cleanup would delete
//! cargo run -p cms-manage -- cleanup-reset-codes --dry-run
//!
//! # Unblock one user who hit the reset request limit
//! cargo run -p cms-manage -- clear-rate-limits --email grower@example.com
//!
//! # Check mail delivery end to end
//! cargo run -p cms-manage -- send-test-email --to ops@example.com
//! ```
//!
//! Reads `DATABASE_URL`, `REDIS_URL` and the policy knobs from the
//! environment (a `.env` file is honored). Exits 1 on any error.

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use cms_accounts::config::AccountsConfig;
use cms_accounts::state::AppState;
use cms_accounts::usecase::test_email::SendTestEmailInput;
use cms_core::config::Config as _;

mod report;

#[derive(Parser, Debug)]
#[command(name = "cms-manage", about = "Maintenance commands for CMS accounts")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Delete expired reset codes and used codes past the retention window
    CleanupResetCodes {
        /// Count what would be deleted without deleting anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Reset password-reset request limits
    ClearRateLimits {
        /// Only clear the bucket for this email (default: all buckets)
        #[arg(long)]
        email: Option<String>,
    },
    /// Queue a test email through the outbox
    SendTestEmail {
        /// Recipient address
        #[arg(long)]
        to: String,

        /// Subject line
        #[arg(long)]
        subject: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    cms_core::tracing::init_cli_tracing();

    let cli = Cli::parse();
    let config = AccountsConfig::from_env().context("load accounts config from env")?;
    let state = AppState::connect(&config).await?;
    info!(command = ?cli.command, "running management command");

    match cli.command {
        Command::CleanupResetCodes { dry_run } => {
            let report = state.cleanup_reset_codes().execute(dry_run).await?;
            println!("{}", report::cleanup(&report, dry_run));
        }
        Command::ClearRateLimits { email } => {
            let cleared = state.clear_rate_limits().execute(email.as_deref()).await?;
            println!("{}", report::rate_limits(cleared, email.as_deref()));
        }
        Command::SendTestEmail { to, subject } => {
            let id = state
                .send_test_email()
                .execute(SendTestEmailInput {
                    to: to.clone(),
                    subject,
                })
                .await?;
            println!("{}", report::test_email(id, &to));
        }
    }

    Ok(())
}
