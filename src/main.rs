//! CLI entry point for `mailwindow`.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use mailwindow::config::Config;
use mailwindow::model::email::ParsedEmail;
use mailwindow::service::{ConfigStatus, FetchOutcome, MailboxService};

#[derive(Parser)]
#[command(name = "mailwindow", version, about = "Show the most recent messages of an IMAP mailbox")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch and list the most recent messages
    Recent {
        /// Number of messages (defaults to fetch.default_limit)
        #[arg(short = 'n', long)]
        limit: Option<u32>,
        #[arg(long)]
        json: bool,
    },
    /// Show whether IMAP credentials are configured
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Decode a single .eml file offline
    Decode {
        path: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = mailwindow::config::load_config();

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Recent { limit, json } => cmd_recent(&config, limit, json).await,
        Commands::Status { json } => cmd_status(&config, json),
        Commands::Decode { path, json } => cmd_decode(&path, json),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = mailwindow::config::log_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mailwindow.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mailwindow", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

/// Fetch recent messages and print them.
async fn cmd_recent(config: &Config, limit: Option<u32>, json: bool) -> anyhow::Result<()> {
    let limit = limit.unwrap_or(config.fetch.default_limit);
    let service = MailboxService::from_config(config);

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .expect("valid template"),
    );
    pb.set_message(format!("Fetching from {}", config.imap.host));
    pb.enable_steady_tick(Duration::from_millis(100));

    let start = Instant::now();
    let outcome = service.fetch_recent(limit).await;
    pb.finish_and_clear();
    let elapsed = start.elapsed();

    if json {
        print_recent_json(&outcome, &service.config_status())
    } else {
        print_recent_table(&outcome, elapsed);
        Ok(())
    }
}

/// Show configuration state without revealing credentials.
fn cmd_status(config: &Config, json: bool) -> anyhow::Result<()> {
    let status = MailboxService::from_config(config).config_status();
    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!();
    println!("  {:<14} {}", "Configured", if status.configured { "yes" } else { "no" });
    println!("  {:<14} {}:{}", "Server", status.host, status.port);
    println!("  {:<14} {}", "Mailbox", status.mailbox);
    if let Some(user) = &status.masked_user {
        println!("  {:<14} {}", "User", user);
    }
    if let Some(path) = mailwindow::config::config_file_path() {
        println!("  {:<14} {}", "Config file", path.display());
    }
    println!();
    Ok(())
}

/// Decode one .eml file and print the record.
fn cmd_decode(path: &Path, json: bool) -> anyhow::Result<()> {
    let email = mailwindow::parser::eml::decode_eml_file(path)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&email)?);
        return Ok(());
    }

    println!();
    println!("  {:<10} {}", "From", email.from);
    println!("  {:<10} {}", "To", email.to);
    println!("  {:<10} {}", "Subject", email.subject);
    println!("  {:<10} {}", "Date", email.date.format("%Y-%m-%d %H:%M"));
    if email.attachment_count > 0 {
        println!("  {:<10} {}", "Attached", email.attachment_count);
    }
    if email.degraded {
        println!("  {:<10} partial decode", "Note");
    }
    println!();
    println!("{}", email.body);
    println!();
    Ok(())
}

/// Print fetched messages as a human-readable table.
fn print_recent_table(outcome: &FetchOutcome, elapsed: Duration) {
    println!();
    match outcome {
        FetchOutcome::NotConfigured => {
            println!("  IMAP credentials are not configured.");
            println!("  Set MAILWINDOW_IMAP_USER and MAILWINDOW_IMAP_PASSWORD or edit the config file.");
        }
        FetchOutcome::Unavailable {
            attempts,
            last_error,
        } => {
            println!("  Mailbox unavailable after {attempts} attempt(s): {last_error}");
        }
        FetchOutcome::Empty => println!("  No messages ({elapsed:.2?})"),
        FetchOutcome::Messages(list) => print_messages(list, elapsed),
    }
    println!();
}

fn print_messages(list: &[ParsedEmail], elapsed: Duration) {
    println!("  {} message(s) ({:.2?})", list.len(), elapsed);
    println!();
    println!(
        "  {:<4} {:<17} {:<25} {:<40} {:>3}",
        "#", "Date", "From", "Subject", "Att"
    );
    println!("  {}", "-".repeat(93));

    for (i, email) in list.iter().enumerate() {
        let date = email.date.format("%Y-%m-%d %H:%M").to_string();
        let from_trunc: String = email.from.chars().take(24).collect();
        let subj_trunc: String = email.subject.chars().take(39).collect();
        println!(
            "  {:<4} {:<17} {:<25} {:<40} {:>3}",
            i + 1,
            date,
            from_trunc,
            subj_trunc,
            email.attachment_count
        );
        println!("       {}", email.preview);
    }
}

/// Print fetched messages as JSON.
fn print_recent_json(outcome: &FetchOutcome, status: &ConfigStatus) -> anyhow::Result<()> {
    let error = match outcome {
        FetchOutcome::Unavailable { last_error, .. } => Some(last_error.to_string()),
        _ => None,
    };
    let data: &[ParsedEmail] = match outcome {
        FetchOutcome::Messages(list) => list,
        _ => &[],
    };

    let output = serde_json::json!({
        "success": true,
        "status": outcome.status(),
        "error": error,
        "count": data.len(),
        "data": data,
        "config": status,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
