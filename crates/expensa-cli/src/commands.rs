//! Subcommand implementations.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context};
use expensa_models::{Expense, ExpenseId, LoginRequest, RegisterRequest, RejectExpenseRequest};
use expensa_sdk::{
    ApiClient, ApiPaths, AuthService, ClientConfig, FileSessionStore, RequestOptions, Resource,
};
use serde_json::Value;

use crate::{Cli, Commands, ExpenseAction, RegisterArgs};

pub async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let store = match cli.session_file {
        Some(path) => FileSessionStore::new(path),
        None => FileSessionStore::in_config_dir()?,
    };
    tracing::debug!(path = %store.path().display(), "session file");

    let config = ClientConfig::new(cli.base_url);
    let client = ApiClient::new(config, Arc::new(store))?;
    let auth = AuthService::new(client);

    match cli.command {
        Commands::Login { username, password } => {
            let response = auth
                .login(&LoginRequest::new(username, password))
                .await
                .context("login failed")?;
            println!("Signed in as {}", response.user.username);
        }
        Commands::Register(args) => register(&auth, args).await?,
        Commands::Logout => {
            auth.logout().await;
            println!("Signed out");
        }
        Commands::Refresh => {
            auth.refresh().await?;
            println!("Session refreshed");
        }
        Commands::Whoami => match auth.current_user() {
            Some(user) => {
                println!("{} <{}>", user.full_name, user.email);
                for role in &user.roles {
                    println!("  {} ({})", role.role_type, role.name);
                }
            }
            None => {
                println!("Not signed in");
                return Ok(ExitCode::FAILURE);
            }
        },
        Commands::Can { permission } => {
            let allowed = auth.has_permission(&permission);
            println!("{permission}: {}", if allowed { "yes" } else { "no" });
            if !allowed {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Get {
            path,
            query,
            headers,
        } => {
            let options = query
                .into_iter()
                .fold(RequestOptions::new(), |opts, (k, v)| opts.query(k, v));
            let options = headers
                .into_iter()
                .fold(options, |opts, (k, v)| opts.header(k, v));
            let value: Value = auth.client().get_with(&path, &options).await?;
            print_json(&value)?;
        }
        Commands::Post { path, data } => {
            let value: Value = match data {
                Some(raw) => {
                    let body: Value =
                        serde_json::from_str(&raw).context("--data is not valid JSON")?;
                    auth.client().post(&path, &body).await?
                }
                None => auth.client().post_empty(&path).await?,
            };
            print_json(&value)?;
        }
        Commands::Delete { path } => {
            let value: Value = auth.client().delete(&path).await?;
            if !value.is_null() {
                print_json(&value)?;
            }
        }
        Commands::Expenses { action } => expenses(auth.client(), action).await?,
    }
    Ok(ExitCode::SUCCESS)
}

async fn register(auth: &AuthService, args: RegisterArgs) -> anyhow::Result<()> {
    let request = RegisterRequest {
        username: args.username,
        email: args.email,
        password: args.password,
        first_name: args.first_name,
        last_name: args.last_name,
        phone_number: args.phone_number,
    };
    let response = auth.register(&request).await.context("registration failed")?;
    println!("Registered and signed in as {}", response.user.username);
    Ok(())
}

async fn expenses(client: &ApiClient, action: ExpenseAction) -> anyhow::Result<()> {
    match action {
        ExpenseAction::List { status } => {
            let path = match status {
                Some(status) => ApiPaths::expenses_by_status(status),
                None => ApiPaths::collection(Resource::Expenses),
            };
            let list: Vec<Expense> = client.get(&path).await?;
            print_expenses(&list);
        }
        ExpenseAction::Pending => {
            let list: Vec<Expense> = client.get(&ApiPaths::expenses_pending_approvals()).await?;
            print_expenses(&list);
        }
        ExpenseAction::Submit { id } => {
            let expense: Expense = client
                .post_empty(&ApiPaths::expense_submit(&ExpenseId::from(id)))
                .await?;
            println!("{} is now {}", expense.id, expense.status);
        }
        ExpenseAction::Approve { id } => {
            let expense: Expense = client
                .post_empty(&ApiPaths::expense_approve(&ExpenseId::from(id)))
                .await?;
            println!("{} is now {}", expense.id, expense.status);
        }
        ExpenseAction::Reject { id, reason } => {
            if reason.trim().is_empty() {
                bail!("a rejection reason is required");
            }
            let expense: Expense = client
                .post(
                    &ApiPaths::expense_reject(&ExpenseId::from(id)),
                    &RejectExpenseRequest { reason },
                )
                .await?;
            println!("{} is now {}", expense.id, expense.status);
        }
    }
    Ok(())
}

fn print_expenses(list: &[Expense]) {
    if list.is_empty() {
        println!("No expenses");
        return;
    }
    for e in list {
        println!(
            "{:<36}  {:<9}  {:>10.2} {:<3}  {}",
            e.id,
            e.status.to_string(),
            e.total_amount,
            e.currency,
            e.vendor.as_deref().unwrap_or("-")
        );
    }
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
