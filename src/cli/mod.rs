//! CLI module for the Nyx command-line interface.
//!
//! With no subcommand the API server starts. Other subcommands work directly
//! on the local database:
//! - `serve` - Run the HTTP API
//! - `watch <username>` - Run bedtime/alarm reminders for a user
//! - `users list|show|delete` - Account administration
//! - `stats <username>` - Print a sleep summary
//! - `config check` - Validate configuration file

use anyhow::{Context, Result};
use chrono::Local;
use clap::{ArgGroup, Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::db::{self, DbPool, SleepSession, User, UserSettings};
use crate::stats;

/// CLI arguments structure
#[derive(Parser, Debug)]
#[command(name = "nyx")]
#[command(author, version, about = "Sleep tracker with bedtime and alarm reminders", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "NYX_CONFIG", default_value = "nyx.toml")]
    pub config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Subcommand to run (if none, starts the server)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP API server
    Serve,

    /// Run bedtime and alarm reminders for a user until Ctrl+C
    Watch {
        /// Username to watch
        username: String,
    },

    /// User account administration
    #[command(subcommand)]
    Users(UsersCommands),

    /// Print sleep statistics for a user
    Stats {
        /// Username
        username: String,
    },

    /// Configuration commands
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
pub enum UsersCommands {
    /// List all users
    List,
    /// Show a user with their session totals and settings
    Show {
        /// User ID
        id: i64,
    },
    /// Delete a user and all of their data
    #[command(group(
        ArgGroup::new("target")
            .required(true)
            .args(["id", "username", "email"])
    ))]
    Delete {
        /// User ID
        id: Option<i64>,
        /// Select the user by username
        #[arg(long)]
        username: Option<String>,
        /// Select the user by email
        #[arg(long)]
        email: Option<String>,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Validate configuration file
    Check,
}

/// How a user was identified on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserSelector {
    Id(i64),
    Username(String),
    Email(String),
}

impl UserSelector {
    fn from_args(id: Option<i64>, username: Option<&str>, email: Option<&str>) -> Option<Self> {
        id.map(Self::Id)
            .or_else(|| username.map(|u| Self::Username(u.to_string())))
            .or_else(|| email.map(|e| Self::Email(e.to_string())))
    }
}

impl std::fmt::Display for UserSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "ID {}", id),
            Self::Username(u) => write!(f, "username '{}'", u),
            Self::Email(e) => write!(f, "email '{}'", e),
        }
    }
}

pub async fn find_user(db: &DbPool, selector: &UserSelector) -> Result<User> {
    let user = match selector {
        UserSelector::Id(id) => User::find_by_id(db, *id).await?,
        UserSelector::Username(username) => User::find_by_username(db, username).await?,
        UserSelector::Email(email) => User::find_by_email(db, email).await?,
    };
    user.with_context(|| format!("No user with {}", selector))
}

/// Open the database in the configured data directory, creating it if needed
pub async fn open_db(config: &Config) -> Result<DbPool> {
    std::fs::create_dir_all(&config.server.data_dir).with_context(|| {
        format!(
            "Failed to create data directory {}",
            config.server.data_dir.display()
        )
    })?;

    db::init(&config.server.data_dir)
        .await
        .with_context(|| {
            format!(
                "Failed to open database in {}",
                config.server.data_dir.display()
            )
        })
}

/// Run a one-shot CLI command. `serve` and `watch` are handled by the binary.
pub async fn run_command(cli: &Cli, config: &Config) -> Result<()> {
    match &cli.command {
        Some(Commands::Users(cmd)) => {
            let db = open_db(config).await?;
            match cmd {
                UsersCommands::List => cmd_users_list(&db).await,
                UsersCommands::Show { id } => cmd_users_show(&db, *id).await,
                UsersCommands::Delete {
                    id,
                    username,
                    email,
                    yes,
                } => {
                    let selector =
                        UserSelector::from_args(*id, username.as_deref(), email.as_deref())
                            .context("Specify a user ID, --username or --email")?;
                    cmd_users_delete(&db, &selector, *yes).await
                }
            }
        }
        Some(Commands::Stats { username }) => {
            let db = open_db(config).await?;
            cmd_stats(&db, username).await
        }
        Some(Commands::Config(ConfigCommands::Check)) => cmd_config_check(&cli.config),
        Some(Commands::Serve) | Some(Commands::Watch { .. }) | None => Ok(()),
    }
}

async fn cmd_users_list(db: &DbPool) -> Result<()> {
    let users = User::list(db).await?;
    if users.is_empty() {
        println!("No users found.");
        return Ok(());
    }

    println!();
    println!(
        "{:<6}  {:<20}  {:<30}  {:<20}",
        "ID", "USERNAME", "EMAIL", "CREATED"
    );
    println!("{}", "-".repeat(82));
    for user in users {
        println!(
            "{:<6}  {:<20}  {:<30}  {:<20}",
            user.id,
            truncate(&user.username, 20),
            truncate(&user.email, 30),
            user.created_at
        );
    }
    println!();
    Ok(())
}

async fn cmd_users_show(db: &DbPool, id: i64) -> Result<()> {
    let user = find_user(db, &UserSelector::Id(id)).await?;
    print_user_details(db, &user).await
}

async fn print_user_details(db: &DbPool, user: &User) -> Result<()> {
    let summary = User::summary(db, user.id).await?;

    println!();
    println!("=== User: {} ===", user.username);
    println!();
    println!("ID:        {}", user.id);
    println!("Email:     {}", user.email);
    println!("Created:   {}", user.created_at);
    println!("Sessions:  {}", summary.session_count);
    println!("Total:     {:.2} hours", summary.total_hours);

    match UserSettings::get(db, user.id).await? {
        Some(settings) => {
            let r = &settings.reminders;
            println!(
                "Bedtime:   {}:{} {} ({})",
                r.bedtime_hour,
                r.bedtime_minute,
                r.bedtime_ampm,
                on_off(r.bedtime_enabled)
            );
            println!(
                "Alarm:     {}:{} {} ({})",
                r.alarm_hour,
                r.alarm_minute,
                r.alarm_ampm,
                on_off(r.alarm_enabled)
            );
        }
        None => println!("Settings:  none saved"),
    }
    println!();
    Ok(())
}

async fn cmd_users_delete(db: &DbPool, selector: &UserSelector, yes: bool) -> Result<()> {
    let user = find_user(db, selector).await?;
    print_user_details(db, &user).await?;

    if !yes && !confirm(&format!("Delete user '{}' and all their data?", user.username))? {
        println!("Cancelled.");
        return Ok(());
    }

    let summary = delete_user(db, &user).await?;
    println!(
        "[OK] Deleted user {} (ID {}): {} sleep sessions, {} settings",
        user.username,
        user.id,
        summary.session_count,
        if summary.has_settings { 1 } else { 0 }
    );
    Ok(())
}

/// Delete `user`, returning what was removed with them
pub async fn delete_user(db: &DbPool, user: &User) -> Result<db::UserSummary> {
    let summary = User::summary(db, user.id).await?;
    if !User::delete(db, user.id).await? {
        anyhow::bail!("User {} was already deleted", user.id);
    }
    tracing::info!(
        user_id = user.id,
        sessions = summary.session_count,
        "User deleted"
    );
    Ok(summary)
}

async fn cmd_stats(db: &DbPool, username: &str) -> Result<()> {
    let user = find_user(db, &UserSelector::Username(username.to_string())).await?;
    let sessions = SleepSession::list_for_user(db, user.id).await?;
    let summary = stats::summarize(&sessions, Local::now().date_naive());

    println!();
    println!("=== Sleep stats: {} ===", user.username);
    println!();
    match summary.average_hours {
        Some(avg) => println!("Average:     {:.2} hours", avg),
        None => println!("Average:     no data"),
    }
    println!("Sessions:    {}", summary.session_count);
    println!("Total:       {:.2} hours", summary.total_hours);
    println!("This month:  {:.2} hours", summary.month_hours);

    let weekdays = stats::by_weekday(&sessions);
    if !weekdays.is_empty() {
        println!();
        println!("{:<6}  {:>8}  {:>8}", "DAY", "AVG", "COUNT");
        println!("{}", "-".repeat(26));
        for day in weekdays {
            println!(
                "{:<6}  {:>8.2}  {:>8}",
                day.weekday, day.average_hours, day.session_count
            );
        }
    }
    println!();
    Ok(())
}

fn cmd_config_check(config_path: &Path) -> Result<()> {
    println!("Checking configuration file: {}", config_path.display());
    println!();

    if !config_path.exists() {
        println!(
            "[!!] Configuration file not found: {}",
            config_path.display()
        );
        println!();
        println!("Defaults will be used.");
        return Ok(());
    }

    match Config::load(config_path) {
        Ok(config) => {
            println!("[OK] Configuration file is valid!");
            println!();
            println!("Server:");
            println!("  Address:      {}:{}", config.server.host, config.server.port);
            println!("  Data Dir:     {}", config.server.data_dir.display());
            println!();
            println!("Reminders:");
            println!(
                "  Interval:     {}s",
                config.reminders.check_interval_seconds
            );
            println!(
                "  Toast:        {}",
                describe_command(config.reminders.toast_command.as_deref())
            );
            println!(
                "  Alarm:        {}",
                describe_command(config.reminders.alarm_command.as_deref())
            );
            println!();
            println!(
                "Email:          {}",
                if config.email.is_configured() {
                    "Enabled"
                } else {
                    "Disabled"
                }
            );
            println!();

            let warnings = config_warnings(&config);
            if !warnings.is_empty() {
                println!("Warnings:");
                for warning in warnings {
                    println!("  [!] {}", warning);
                }
                println!();
            }
            Ok(())
        }
        Err(e) => {
            println!("[!!] Configuration file is invalid!");
            println!();
            println!("Error: {:#}", e);
            anyhow::bail!("Invalid configuration file");
        }
    }
}

fn config_warnings(config: &Config) -> Vec<&'static str> {
    let mut warnings = Vec::new();
    if !config.email.is_configured() {
        warnings.push("No SMTP server configured - password reset emails cannot be sent");
    }
    if config.reminders.check_interval_seconds > 60 {
        warnings.push("Reminder interval is over 60s - some reminders will be missed");
    }
    if config.reminders.alarm_command.is_none() {
        warnings.push("No alarm command configured - alarms will only be logged");
    }
    warnings
}

fn describe_command(argv: Option<&[String]>) -> String {
    match argv {
        Some(argv) if !argv.is_empty() => argv.join(" "),
        _ => "log only".to_string(),
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{} Type 'yes' to confirm: ", prompt);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("Failed to read confirmation")?;
    Ok(answer.trim().eq_ignore_ascii_case("yes"))
}

/// Truncate a string to max length with ellipsis
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
