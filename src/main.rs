//! Binary entry point for guildlore.
//!
//! Operator CLI over the knowledge file: teach, inspect, recall and delete
//! taught responses without going through a chat front-end.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow unnecessary_wraps for consistent command function signatures
#![allow(clippy::unnecessary_wraps)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use clap::{Parser, Subcommand};
use guildlore::services::{resolve_teacher_filter, spawn_reload_task};
use guildlore::storage::KnowledgeStore;
use guildlore::{
    BrowseSession, BrowseState, DeleteOutcome, Entry, GuildloreConfig, JsonFileBackend,
    KnowledgeService, RecallService, observability,
};
use std::collections::BTreeSet;
use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Guildlore - guild-scoped keyword/response knowledge for chat bots.
#[derive(Parser)]
#[command(name = "guildlore")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Knowledge file to operate on (overrides configuration).
    #[arg(short, long, global = true, env = "GUILDLORE_DATA_FILE")]
    data_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Teach a response for a keyword.
    Teach {
        /// Guild to teach in.
        #[arg(short, long)]
        guild: Option<String>,

        /// Who is teaching.
        #[arg(short, long)]
        teacher: String,

        /// Trigger keyword.
        keyword: String,

        /// Response to give.
        response: String,
    },

    /// List what was taught.
    List {
        /// Guild to list.
        #[arg(short, long)]
        guild: Option<String>,

        /// Only this teacher, across all guilds (`name`, `@name` or a mention).
        #[arg(short, long)]
        teacher: Option<String>,
    },

    /// Page through what was taught, with delete controls, reading actions from stdin.
    Browse {
        /// Guild to list.
        #[arg(short, long)]
        guild: Option<String>,

        /// Only this teacher, across all guilds.
        #[arg(short, long)]
        teacher: Option<String>,

        /// User driving the session.
        #[arg(long = "as")]
        user: String,
    },

    /// Show the responses stored for a keyword.
    Lookup {
        /// Guild to look in.
        #[arg(short, long)]
        guild: Option<String>,

        /// Exact keyword.
        keyword: String,
    },

    /// Answer a message the way the bot would.
    Recall {
        /// Guild the message was sent in.
        #[arg(short, long)]
        guild: Option<String>,

        /// The full message text, including the trigger prefix.
        message: String,
    },

    /// Delete responses taught by a user.
    Delete {
        /// Guild holding the records.
        #[arg(short, long)]
        guild: String,

        /// Keyword holding the records.
        #[arg(short, long)]
        keyword: String,

        /// Teacher of the records.
        #[arg(short, long)]
        teacher: String,

        /// User requesting the delete.
        #[arg(long = "as")]
        requester: String,

        /// Responses to delete.
        #[arg(required = true)]
        responses: Vec<String>,
    },

    /// Show status.
    Status,

    /// Load the knowledge file, migrating and healing it, and report what changed.
    Migrate,

    /// Keep reloading the knowledge file until interrupted.
    Watch {
        /// Reload period in seconds (defaults to the configured interval).
        #[arg(short, long)]
        interval: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };
    let config = match cli.data_file.clone() {
        Some(path) => config.with_data_file(path),
        None => config,
    };

    if let Err(e) = observability::init_from_env(cli.verbose) {
        eprintln!("Failed to initialize observability: {e}");
        return ExitCode::FAILURE;
    }

    match run_command(cli.command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

async fn run_command(command: Commands, config: GuildloreConfig) -> CliResult {
    if matches!(command, Commands::Migrate) {
        return cmd_migrate(&config);
    }

    let service = Arc::new(open_service(&config)?);

    match command {
        Commands::Teach {
            guild,
            teacher,
            keyword,
            response,
        } => cmd_teach(&service, guild, teacher, keyword, response),

        Commands::List { guild, teacher } => cmd_list(&service, guild, teacher),

        Commands::Browse {
            guild,
            teacher,
            user,
        } => cmd_browse(&service, &config, guild, teacher, user),

        Commands::Lookup { guild, keyword } => cmd_lookup(&service, guild, keyword),

        Commands::Recall { guild, message } => cmd_recall(&service, &config, guild, message),

        Commands::Delete {
            guild,
            keyword,
            teacher,
            requester,
            responses,
        } => cmd_delete(&service, guild, keyword, teacher, requester, responses),

        Commands::Status => cmd_status(&service, &config),

        Commands::Watch { interval } => cmd_watch(service, &config, interval).await,

        Commands::Migrate => Ok(()),
    }
}

/// Loads configuration.
fn load_config(path: Option<&str>) -> Result<GuildloreConfig, Box<dyn std::error::Error>> {
    if let Some(config_path) = path {
        return GuildloreConfig::load_from_file(std::path::Path::new(config_path))
            .map(GuildloreConfig::with_env_overrides)
            .map_err(Into::into);
    }

    if let Ok(config_path) = std::env::var("GUILDLORE_CONFIG_PATH") {
        if !config_path.trim().is_empty() {
            return GuildloreConfig::load_from_file(std::path::Path::new(&config_path))
                .map(GuildloreConfig::with_env_overrides)
                .map_err(Into::into);
        }
    }

    Ok(GuildloreConfig::load_default().with_env_overrides())
}

fn open_service(config: &GuildloreConfig) -> Result<KnowledgeService, Box<dyn std::error::Error>> {
    let backend = Arc::new(JsonFileBackend::new(&config.data_file));
    Ok(KnowledgeService::open(backend, config.policy.clone())?)
}

/// Teach command.
fn cmd_teach(
    service: &KnowledgeService,
    guild: Option<String>,
    teacher: String,
    keyword: String,
    response: String,
) -> CliResult {
    service.teach(guild.as_deref(), &keyword, &response, &teacher)?;
    println!("Taught '{keyword}' -> '{response}' (by {teacher})");
    Ok(())
}

fn list_entries(
    service: &KnowledgeService,
    guild: Option<&str>,
    teacher: Option<&str>,
) -> Result<Vec<Entry>, Box<dyn std::error::Error>> {
    // No gateway to resolve mentions from the command line.
    let filter = teacher.and_then(|raw| resolve_teacher_filter(raw, |_| None));
    Ok(service.list_knowledge(guild, filter.as_deref())?)
}

/// List command.
fn cmd_list(service: &KnowledgeService, guild: Option<String>, teacher: Option<String>) -> CliResult {
    let entries = list_entries(service, guild.as_deref(), teacher.as_deref())?;
    if entries.is_empty() {
        println!("Nothing has been taught yet.");
        return Ok(());
    }

    let total = entries.len();
    for (i, entry) in entries.iter().enumerate() {
        print_entry(i, total, entry);
    }
    Ok(())
}

fn print_entry(index: usize, total: usize, entry: &Entry) {
    println!("[{}/{total}] guild {}", index + 1, entry.guild_id);
    println!("  {} (taught by {})", entry.keyword, entry.teacher);
    for response in &entry.responses {
        println!("    - {response}");
    }
}

/// Browse command.
fn cmd_browse(
    service: &Arc<KnowledgeService>,
    config: &GuildloreConfig,
    guild: Option<String>,
    teacher: Option<String>,
    user: String,
) -> CliResult {
    let entries = list_entries(service, guild.as_deref(), teacher.as_deref())?;
    let mut session = BrowseSession::new(Arc::clone(service), user.clone(), entries)
        .with_selection_timeout(config.selection_timeout);

    println!("Actions: next, prev, delete, select <a|b|...>, confirm, cancel, quit");
    show_page(&session);

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let (action, rest) = line.trim().split_once(' ').unwrap_or((line.trim(), ""));
        session.expire_idle_selection(std::time::Instant::now());

        let result = match action {
            "" => continue,
            "n" | "next" => session.next(&user).map(|()| show_page(&session)),
            "p" | "prev" => session.previous(&user).map(|()| show_page(&session)),
            "d" | "delete" => session.delete_current(&user).map(|outcome| match outcome {
                DeleteOutcome::Deleted { keyword, removed, .. } => {
                    println!("Deleted {removed} response(s) for '{keyword}'");
                    show_page(&session);
                },
                DeleteOutcome::Stale => {
                    println!("Already deleted");
                    show_page(&session);
                },
                DeleteOutcome::SelectionOpened { options } => {
                    println!("Select responses to delete:");
                    for option in options {
                        println!("    - {option}");
                    }
                },
            }),
            "s" | "select" => session.select(&user, rest.split('|').map(str::trim)),
            "c" | "confirm" => session.confirm(&user).map(|outcome| {
                println!("Deleted {} response(s) for '{}'", outcome.removed, outcome.keyword);
                show_page(&session);
            }),
            "cancel" => session.cancel(&user).map(|()| println!("Cancelled")),
            "q" | "quit" => {
                session.close();
                break;
            },
            other => {
                println!("Unknown action '{other}'");
                continue;
            },
        };

        if let Err(e) = result {
            println!("{e}");
        }
    }

    if session.state() != BrowseState::Terminal {
        session.close();
    }
    Ok(())
}

fn show_page(session: &BrowseSession) {
    match session.page() {
        Some(page) => print_entry(page.index, page.total, page.entry),
        None => println!("Nothing has been taught yet."),
    }
}

/// Lookup command.
fn cmd_lookup(service: &KnowledgeService, guild: Option<String>, keyword: String) -> CliResult {
    let groups = service.lookup(guild.as_deref(), &keyword)?;
    if groups.is_empty() {
        println!("No responses for '{keyword}'");
        return Ok(());
    }

    for group in groups {
        println!("{} taught:", group.teacher);
        for response in group.responses {
            println!("  - {response}");
        }
    }
    Ok(())
}

/// Recall command.
fn cmd_recall(
    service: &Arc<KnowledgeService>,
    config: &GuildloreConfig,
    guild: Option<String>,
    message: String,
) -> CliResult {
    let recall = RecallService::new(Arc::clone(service), config.recall_prefix.clone());
    match recall.recall(guild.as_deref(), &message, &mut rand::rng())? {
        Some(reply) => {
            println!("{}", reply.response);
            if let Some(teacher) = reply.teacher {
                println!("  (taught by {teacher})");
            }
        },
        None => println!("(no reply)"),
    }
    Ok(())
}

/// Delete command.
fn cmd_delete(
    service: &KnowledgeService,
    guild: String,
    keyword: String,
    teacher: String,
    requester: String,
    responses: Vec<String>,
) -> CliResult {
    let removed = if let [response] = responses.as_slice() {
        service.delete_one(&requester, &guild, &keyword, &teacher, response)?
    } else {
        let selected: BTreeSet<String> = responses.into_iter().collect();
        service.delete_many(&requester, &guild, &keyword, &teacher, &selected)?
    };
    println!("Deleted {removed} response(s) for '{keyword}'");
    Ok(())
}

/// Status command.
fn cmd_status(service: &KnowledgeService, config: &GuildloreConfig) -> CliResult {
    let status = service.status();

    println!("Guildlore Status");
    println!("================");
    println!();
    println!("Version: {}", env!("CARGO_PKG_VERSION"));
    println!("Knowledge file: {}", status.location);
    println!("  Guilds: {}", status.guilds);
    println!("  Keywords: {}", status.keywords);
    println!("  Records: {}", status.records);
    if status.pending_legacy > 0 {
        println!(
            "  Legacy records awaiting a guild: {}",
            status.pending_legacy
        );
    }
    println!();
    println!("Recall prefix: '{}'", config.recall_prefix);
    println!(
        "Privileged users: {}",
        config
            .policy
            .privileged_users()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(())
}

/// Migrate command.
fn cmd_migrate(config: &GuildloreConfig) -> CliResult {
    let store = KnowledgeStore::new(Arc::new(JsonFileBackend::new(&config.data_file)));
    let outcome = store.load()?;

    println!("Knowledge file: {}", store.location());
    println!("  Format: {}", outcome.format.as_str());
    if let Some(stats) = outcome.migration {
        println!(
            "  Migrated {} record(s) from {} legacy key(s) ({} dropped)",
            stats.migrated, stats.keys, stats.dropped
        );
    }
    if outcome.report.coerced > 0 || outcome.report.has_malformed() {
        println!(
            "  Coerced {} value(s), dropped {} entr(ies)",
            outcome.report.coerced,
            outcome.report.discarded()
        );
    }
    println!(
        "  {}",
        if outcome.rewritten {
            "Rewritten"
        } else {
            "Unchanged"
        }
    );
    Ok(())
}

/// Watch command.
async fn cmd_watch(
    service: Arc<KnowledgeService>,
    config: &GuildloreConfig,
    interval: Option<u64>,
) -> CliResult {
    let period = interval
        .map(Duration::from_secs)
        .or(config.reload_interval)
        .ok_or("no reload interval configured; pass --interval")?;

    println!("Reloading {} every {period:?}", service.status().location);
    let handle = spawn_reload_task(Arc::clone(&service), period);
    tokio::signal::ctrl_c().await?;
    handle.abort();
    Ok(())
}
