//! CLI entry point for `mailtriage`.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use mailtriage::classify;
use mailtriage::config::{self, Config, SourceKind};
use mailtriage::model::mail::{Category, NormalizedEmail};
use mailtriage::pipeline::Session;
use mailtriage::reply::ReplyGenerator;
use mailtriage::source;
use mailtriage::store::DraftStore;
use mailtriage::worker::{SharedSource, Worker, WorkerEvent};

#[derive(Parser)]
#[command(
    name = "mailtriage",
    version,
    about = "Triage unread mail by priority and draft replies"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// MBOX file or Maildir directory (overrides the configured mailbox)
    #[arg(short, long, global = true, value_name = "PATH", env = "MAILTRIAGE_MAILBOX")]
    mailbox: Option<PathBuf>,

    /// Configuration file to use instead of the default location
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch unread messages and list them with their category
    Fetch {
        /// Maximum number of messages (defaults to the configured limit)
        #[arg(short, long)]
        limit: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// Show one message with its category keywords highlighted
    Show {
        /// Message identifier as listed by `fetch`
        id: String,
    },
    /// Draft a reply to one message
    Reply {
        id: String,
        /// Use this reply text instead of generating one
        #[arg(short, long)]
        text: Option<String>,
        /// Append the reply to the draft store
        #[arg(short, long)]
        save: bool,
    },
    /// List saved drafts
    Drafts {
        #[arg(long)]
        json: bool,
    },
    /// Write the default configuration file
    InitConfig,
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = config::load_config(cli.config.as_deref());

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.clone(),
        1 => "info".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    setup_logging(&log_level, &config);

    if let Some(path) = &cli.mailbox {
        config.source.kind = if path.is_dir() {
            SourceKind::Maildir
        } else {
            SourceKind::Mbox
        };
    }

    match cli.command {
        Commands::Fetch { limit, json } => {
            let limit = limit.unwrap_or(config.source.fetch_limit);
            cmd_fetch(&config, cli.mailbox, limit, json)
        }
        Commands::Show { id } => cmd_show(&config, cli.mailbox, &id),
        Commands::Reply { id, text, save } => cmd_reply(&config, cli.mailbox, &id, text, save),
        Commands::Drafts { json } => cmd_drafts(&config, json),
        Commands::InitConfig => cmd_init_config(&config, cli.config.as_deref()),
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

    let log_dir = config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mailtriage.log");
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

/// Spinner shown on stderr while a background job runs.
fn spinner(message: &str) -> anyhow::Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

/// Block until the worker reports back.
fn wait_for_event(worker: &Worker) -> WorkerEvent {
    loop {
        if let Some(event) = worker.recv_timeout(Duration::from_millis(250)) {
            return event;
        }
    }
}

/// Run one fetch cycle on the worker and classify the batch.
fn fetch_session(
    config: &Config,
    mailbox: Option<PathBuf>,
    limit: usize,
    worker: &Worker,
) -> anyhow::Result<Session> {
    let source: SharedSource = Arc::new(Mutex::new(source::open_source(&config.source, mailbox)?));
    let description = source
        .lock()
        .map(|s| s.describe())
        .unwrap_or_else(|_| "mailbox".to_string());

    let pb = spinner(&format!("Fetching unread mail from {description}"))?;
    worker.spawn_fetch(source, limit, config.extract.body_cap)?;

    let mut session = Session::new(config.extract.body_cap);
    loop {
        match wait_for_event(worker) {
            WorkerEvent::Fetched(result) => {
                pb.finish_and_clear();
                session.replace_batch(result?);
                break;
            }
            WorkerEvent::Generated { .. } => continue,
        }
    }
    session.classify_all();
    Ok(session)
}

/// Fetch, classify and list unread messages.
fn cmd_fetch(
    config: &Config,
    mailbox: Option<PathBuf>,
    limit: usize,
    json: bool,
) -> anyhow::Result<()> {
    let worker = Worker::new(ReplyGenerator::template_only());
    let start = Instant::now();
    let session = fetch_session(config, mailbox, limit, &worker)?;
    tracing::info!(count = session.len(), elapsed = ?start.elapsed(), "Fetch cycle complete");

    if json {
        print_batch_json(session.emails())
    } else {
        print_batch_table(session.emails());
        Ok(())
    }
}

/// Show one message in full.
fn cmd_show(config: &Config, mailbox: Option<PathBuf>, id: &str) -> anyhow::Result<()> {
    let worker = Worker::new(ReplyGenerator::template_only());
    let session = fetch_session(config, mailbox, config.source.fetch_limit, &worker)?;
    let email = session.get(id)?;
    let color = std::io::stdout().is_terminal();
    let category = email.category();

    println!();
    println!("  {:<12} {}", "From", email.sender_display);
    println!("  {:<12} {}", "Subject", highlight(&email.subject, category, color));
    println!("  {:<12} {}", "Date", email.received_at);
    println!("  {:<12} {}", "Category", category);
    println!();
    for line in highlight(&email.body_text, category, color).lines() {
        println!("  {line}");
    }
    println!();
    Ok(())
}

/// Generate (or take) a reply and optionally save it as a draft.
fn cmd_reply(
    config: &Config,
    mailbox: Option<PathBuf>,
    id: &str,
    text: Option<String>,
    save: bool,
) -> anyhow::Result<()> {
    let generator = match text {
        Some(_) => ReplyGenerator::template_only(),
        None => ReplyGenerator::from_config(&config.generation),
    };
    let via = if generator.backend_available() {
        "the generation backend"
    } else {
        "the reply template"
    };
    let worker = Worker::new(generator);
    let session = fetch_session(config, mailbox, config.source.fetch_limit, &worker)?;
    let email = session.get(id)?;

    let reply = match text {
        Some(text) => text,
        None => {
            let pb = spinner(&format!("Drafting a reply to {} with {via}", email.sender_name))?;
            worker.spawn_generate(email)?;
            let reply = loop {
                if let WorkerEvent::Generated { identifier, reply } = wait_for_event(&worker) {
                    if identifier == email.identifier {
                        break reply;
                    }
                }
            };
            pb.finish_and_clear();
            reply
        }
    };

    println!();
    println!("  {:<12} {}", "To", email.sender_display);
    println!("  {:<12} Re: {}", "Subject", email.subject);
    println!();
    for line in reply.lines() {
        println!("  {line}");
    }
    println!();

    if save {
        let draft = session.draft_for(id, &reply)?;
        let store = DraftStore::new(config::drafts_path(config));
        store.append(&draft)?;
        println!("  Draft saved to {}", store.path().display());
    }
    Ok(())
}

/// List saved drafts.
fn cmd_drafts(config: &Config, json: bool) -> anyhow::Result<()> {
    let store = DraftStore::new(config::drafts_path(config));
    let drafts = store.load();

    if json {
        println!("{}", serde_json::to_string_pretty(&drafts)?);
        return Ok(());
    }

    println!();
    println!("  {} draft(s) in {}", drafts.len(), store.path().display());
    println!();
    if drafts.is_empty() {
        return Ok(());
    }

    println!("  {:<4} {:<20} {:<14} {:<25} {:<35}", "#", "Saved", "Category", "From", "Subject");
    println!("  {}", "-".repeat(100));
    for (i, draft) in drafts.iter().enumerate() {
        let saved: String = draft.saved_at.chars().take(19).collect();
        let from: String = draft.sender_display.chars().take(24).collect();
        let subject: String = draft.subject.chars().take(34).collect();
        println!(
            "  {:<4} {:<20} {:<14} {:<25} {:<35}",
            i + 1,
            saved,
            draft.category.label(),
            from,
            subject
        );
    }
    println!();
    Ok(())
}

/// Write the effective configuration to `--config`, or the standard location.
fn cmd_init_config(config: &Config, path: Option<&Path>) -> anyhow::Result<()> {
    let written = config::save_config(config, path)?;
    println!("  Configuration written to {}", written.display());
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mailtriage", &mut std::io::stdout());
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

/// Print the batch as a human-readable table.
fn print_batch_table(emails: &[NormalizedEmail]) {
    println!();
    println!("  {} unread message(s)", emails.len());
    println!();

    if emails.is_empty() {
        return;
    }

    println!(
        "  {:<10} {:<14} {:<25} {:<45}",
        "ID", "Category", "From", "Subject"
    );
    println!("  {}", "-".repeat(96));

    for email in emails {
        let id: String = email.identifier.chars().take(9).collect();
        let from: String = email.sender_name.chars().take(24).collect();
        let subject: String = email.subject.chars().take(44).collect();
        println!(
            "  {:<10} {:<14} {:<25} {:<45}",
            id,
            email.category().label(),
            from,
            subject
        );
    }
    println!();
}

/// Print the batch as JSON.
fn print_batch_json(emails: &[NormalizedEmail]) -> anyhow::Result<()> {
    let items: Vec<serde_json::Value> = emails
        .iter()
        .map(|e| {
            serde_json::json!({
                "id": e.identifier,
                "from": e.sender_display,
                "name": e.sender_name,
                "subject": e.subject,
                "date": e.received_at,
                "category": e.category(),
                "body": e.body_text,
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&items)?);
    Ok(())
}

/// Wrap the category's keywords in bold yellow when `color` is set.
fn highlight(text: &str, category: Category, color: bool) -> String {
    if !color {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for range in classify::keyword_matches(category, text) {
        out.push_str(&text[last..range.start]);
        out.push_str("\x1b[1;33m");
        out.push_str(&text[range.clone()]);
        out.push_str("\x1b[0m");
        last = range.end;
    }
    out.push_str(&text[last..]);
    out
}
