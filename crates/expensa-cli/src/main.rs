//! `expensa`: command-line console for the Expensa REST API.
//!
//! The session survives between invocations in a file under the user's
//! config directory.  When the server rejects the stored credentials and
//! they cannot be renewed, the command exits with status 2 so scripts can
//! tell "sign in again" apart from other failures.

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use expensa_models::ExpenseStatus;
use expensa_sdk::SdkError;

#[derive(Parser, Debug)]
#[command(name = "expensa")]
#[command(author, version, about = "Expensa API console", long_about = None)]
pub struct Cli {
    /// REST API base URL
    #[arg(long, env = "EXPENSA_API_BASE_URL", default_value = expensa_sdk::config::DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Session file (default: <config dir>/expensa/session.json)
    #[arg(long, env = "EXPENSA_SESSION_FILE")]
    pub session_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sign in and store the session
    Login {
        /// Username or e-mail
        #[arg(short, long)]
        username: String,
        #[arg(short, long, env = "EXPENSA_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account and sign in as it
    Register(RegisterArgs),
    /// Forget the stored session
    Logout,
    /// Rotate the stored credential pair now
    Refresh,
    /// Show the signed-in user
    Whoami,
    /// Check whether the signed-in user holds a permission (exit 1 if not)
    Can {
        /// Permission type, e.g. EXPENSE_APPROVE
        permission: String,
    },
    /// Authenticated GET on any API path
    Get {
        /// Path below the base URL, e.g. /users
        path: String,
        /// Query parameter, repeatable
        #[arg(short, long = "query", value_parser = parse_pair)]
        query: Vec<(String, String)>,
        /// Extra header, repeatable
        #[arg(short = 'H', long = "header", value_parser = parse_pair)]
        headers: Vec<(String, String)>,
    },
    /// Authenticated POST on any API path
    Post {
        path: String,
        /// JSON body; no body when omitted
        #[arg(short, long)]
        data: Option<String>,
    },
    /// Authenticated DELETE on any API path
    Delete { path: String },
    /// Expense workflow shortcuts
    Expenses {
        #[command(subcommand)]
        action: ExpenseAction,
    },
}

#[derive(Args, Debug)]
pub struct RegisterArgs {
    #[arg(long)]
    pub username: String,
    #[arg(long)]
    pub email: String,
    #[arg(long, env = "EXPENSA_PASSWORD", hide_env_values = true)]
    pub password: String,
    #[arg(long)]
    pub first_name: String,
    #[arg(long)]
    pub last_name: String,
    #[arg(long)]
    pub phone_number: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum ExpenseAction {
    /// List expenses, optionally filtered by status
    List {
        #[arg(long)]
        status: Option<ExpenseStatus>,
    },
    /// Submitted expenses awaiting approval
    Pending,
    /// Submit a draft
    Submit { id: String },
    /// Approve a submitted expense
    Approve { id: String },
    /// Reject a submitted expense
    Reject {
        id: String,
        #[arg(short, long)]
        reason: String,
    },
}

/// Parse `key=value`.
fn parse_pair(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected key=value, got `{s}`"))
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match commands::run(cli).await {
        Ok(code) => code,
        Err(e) => {
            let status = exit_status(&e);
            if status == EXIT_SESSION_EXPIRED {
                eprintln!("Session expired, sign in again with `expensa login`.");
            } else {
                eprintln!("error: {e:#}");
            }
            ExitCode::from(status)
        }
    }
}

/// Exit status when the stored session could not be renewed.
const EXIT_SESSION_EXPIRED: u8 = 2;

/// Exit status for every other failure.
const EXIT_FAILURE: u8 = 1;

/// Map a command failure to the process exit status.
fn exit_status(err: &anyhow::Error) -> u8 {
    let expired = err.chain().any(|cause| {
        cause
            .downcast_ref::<SdkError>()
            .is_some_and(SdkError::is_session_expired)
    });
    if expired {
        EXIT_SESSION_EXPIRED
    } else {
        EXIT_FAILURE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_parsing() {
        assert_eq!(
            parse_pair("page=2").unwrap(),
            ("page".to_string(), "2".to_string())
        );
        assert_eq!(
            parse_pair("q=a=b").unwrap(),
            ("q".to_string(), "a=b".to_string())
        );
        assert!(parse_pair("novalue").is_err());
        assert!(parse_pair("=x").is_err());
    }

    fn expired() -> SdkError {
        SdkError::SessionExpired {
            source: Box::new(SdkError::Auth("invalid refresh token".into())),
        }
    }

    #[test]
    fn session_expiry_exits_with_2() {
        use anyhow::Context;

        let bare = anyhow::Error::from(expired());
        assert_eq!(exit_status(&bare), EXIT_SESSION_EXPIRED);

        let wrapped = Err::<(), _>(expired()).context("login failed").unwrap_err();
        assert_eq!(exit_status(&wrapped), EXIT_SESSION_EXPIRED);
    }

    #[test]
    fn other_failures_exit_with_1() {
        let sdk = anyhow::Error::from(SdkError::Config("bad base URL".into()));
        assert_eq!(exit_status(&sdk), EXIT_FAILURE);

        let plain = anyhow::anyhow!("--data is not valid JSON");
        assert_eq!(exit_status(&plain), EXIT_FAILURE);

        // `expensa refresh` without a refresh token fails but keeps the session.
        let refresh = anyhow::Error::from(SdkError::Auth("no refresh token available".into()));
        assert_eq!(exit_status(&refresh), EXIT_FAILURE);
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn status_filter_parses_case_insensitively() {
        let cli = Cli::try_parse_from(["expensa", "expenses", "list", "--status", "submitted"])
            .unwrap();
        match cli.command {
            Commands::Expenses {
                action: ExpenseAction::List { status },
            } => assert_eq!(status, Some(ExpenseStatus::Submitted)),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
