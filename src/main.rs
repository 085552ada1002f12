//! Appraise - interview assessment records from the command line
//!
//! Submits assessment forms, manages the autosaved draft and gives the
//! admin views (list, statistics, export) over the shared database.

use anyhow::{bail, Context};
use appraise_core::{
    assessment, export, AppraiseConfig, AppraiseError, Assessment, Autosaver, Dashboard,
    DashboardView, DraftStore, FormInput, InterviewId, KeyValueBackend, RecordFilter,
    RecordStore, Recommendation, SessionStore, SortOrder, SqliteBackend,
};
use chrono::{Local, NaiveDate, TimeZone, Utc};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn, Level};
use tracing_subscriber::{self, EnvFilter};

/// Get the database path from CLI arg, env var, config, or default
fn get_db_path(cli_path: Option<PathBuf>, config: &AppraiseConfig) -> PathBuf {
    cli_path
        .or_else(|| std::env::var("APPRAISE_DB_PATH").ok().map(PathBuf::from))
        .unwrap_or_else(|| config.database_path())
}

#[derive(Parser)]
#[command(name = "appraise")]
#[command(about = "Interview assessment records", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Set log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Database path (overrides APPRAISE_DB_PATH env var and config)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true, env = "APPRAISE_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List interviews
    List {
        /// Case-insensitive substring of the applicant name
        #[arg(short, long)]
        name: Option<String>,

        /// Recommendation (strongly-recommend, recommend, consider, not-recommend)
        #[arg(short, long)]
        recommendation: Option<Recommendation>,

        /// Interview day (YYYY-MM-DD, UTC)
        #[arg(short, long)]
        date: Option<NaiveDate>,

        /// Sort order: date|name|score followed by -asc or -desc
        #[arg(short, long, default_value = "date-desc")]
        sort: SortOrder,

        /// Output format (text or json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show one interview as JSON
    Show {
        /// Interview id (INT-...)
        id: String,
    },

    /// Dashboard statistics
    Stats {
        /// Output format (text or json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Delete an interview (requires an admin session)
    Delete {
        /// Interview id (INT-...)
        id: String,

        /// Confirm the deletion
        #[arg(short, long)]
        yes: bool,
    },

    /// Export one interview or all of them as JSON files
    Export {
        /// Only this interview
        #[arg(long)]
        id: Option<String>,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },

    /// Validate and save a filled-in form
    Submit {
        /// Form input JSON file
        input: PathBuf,

        /// Also write a copy of the saved assessment into this directory
        #[arg(long)]
        copy_to: Option<PathBuf>,
    },

    /// Show the live score summary for a form
    Score {
        /// Form input JSON file
        input: PathBuf,
    },

    /// Manage the autosaved draft
    Draft {
        #[command(subcommand)]
        action: DraftAction,
    },

    /// Refresh the dashboard periodically until Ctrl-C
    Watch {
        /// Refresh interval in seconds (defaults to config)
        #[arg(short, long)]
        interval: Option<u64>,
    },

    /// Manage the admin session
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Start an admin session
    Login {
        username: String,
    },

    /// End the admin session
    Logout,

    /// Show whether the admin session is still valid
    Status,
}

#[derive(Subcommand)]
enum DraftAction {
    /// Save a form as the current draft
    Save {
        /// Form input JSON file
        input: PathBuf,
    },

    /// Print the current draft as form input
    Show,

    /// Discard the current draft
    Clear,

    /// Autosave form states read from stdin, one JSON object per line
    Stream {
        /// Submit the last form state at end of input
        #[arg(long)]
        submit: bool,
    },
}

fn read_form(path: &Path) -> anyhow::Result<FormInput> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read form input {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse form input {}", path.display()))
}

/// Feed stdin form states to the autosaver until end of input
async fn stream_drafts(autosaver: &mut Autosaver) -> anyhow::Result<Option<FormInput>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut last = None;

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<FormInput>(&line) {
            Ok(form) => {
                autosaver.record_change(assessment::build_draft(&form));
                last = Some(form);
            }
            Err(e) => warn!("Skipping unreadable form state: {}", e),
        }
    }
    Ok(last)
}

fn print_records(records: &[Assessment]) {
    if records.is_empty() {
        println!("No interviews found");
        return;
    }

    println!(
        "{:<18} {:<28} {:<12} {:>5}  {}",
        "ID", "APPLICANT", "DATE", "SCORE", "RECOMMENDATION"
    );
    for record in records {
        println!(
            "{:<18} {:<28} {:<12} {:>5}  {}",
            record.id.as_ref().map(|id| id.as_str()).unwrap_or("-"),
            record.canonical_name(),
            record.basic_info.date,
            record.scores().total,
            Recommendation::label_or_unspecified(record.recommendation()),
        );
    }
}

fn print_view(view: &DashboardView) {
    if let Some(warning) = &view.warning {
        eprintln!("Warning: {}", warning);
    }
    let stats = &view.statistics;
    println!(
        "Total: {}  Recommended: {}  This month: {}  Average score: {}",
        stats.count, stats.recommended, stats.this_month, stats.avg_score
    );
    print_records(&view.records);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::new(format!(
        "appraise={},appraise_core={}",
        level.as_str().to_lowercase(),
        level.as_str().to_lowercase()
    ));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr) // Write logs to stderr, not stdout
        .init();

    debug!("Appraise v{} starting...", env!("CARGO_PKG_VERSION"));

    let config_path = cli.config.clone().unwrap_or_else(AppraiseConfig::default_path);
    let config = AppraiseConfig::load(&config_path)?;

    let db_path = get_db_path(cli.db.clone(), &config);
    debug!("Using database: {}", db_path.display());

    let backend: Arc<dyn KeyValueBackend> = Arc::new(SqliteBackend::open(&db_path)?);
    let records = RecordStore::with_key(backend.clone(), config.storage.records_key.clone());
    let drafts = DraftStore::with_key(backend.clone(), config.storage.draft_key.clone());
    let session = SessionStore::with_ttl(backend, config.session_ttl());

    match cli.command {
        Commands::List {
            name,
            recommendation,
            date,
            sort,
            format,
        } => {
            let filter = RecordFilter {
                name,
                recommendation,
                date,
            };
            let view = Dashboard::new(records)
                .with_filter(filter)
                .with_order(sort)
                .snapshot()?;

            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                if let Some(warning) = &view.warning {
                    eprintln!("Warning: {}", warning);
                }
                print_records(&view.records);
            }
        }

        Commands::Show { id } => {
            let id = InterviewId::from(id.as_str());
            let record = records
                .get(&id)?
                .ok_or_else(|| AppraiseError::NotFound(id.to_string()))?;
            println!("{}", export::record_json(&record)?);
        }

        Commands::Stats { format } => {
            let stats = records.aggregate_statistics()?;
            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("Total interviews:  {}", stats.count);
                println!("Recommended:       {}", stats.recommended);
                println!("This month:        {}", stats.this_month);
                println!("Average score:     {}", stats.avg_score);
            }
        }

        Commands::Delete { id, yes } => {
            if !session.is_valid_at(Utc::now().timestamp_millis())? {
                bail!("Admin session missing or expired; run `appraise admin login` first");
            }
            if !yes {
                bail!("Refusing to delete {} without --yes", id);
            }
            let id = InterviewId::from(id.as_str());
            if records.remove(&id)? {
                println!("Deleted {}", id);
            } else {
                println!("No interview with id {}", id);
            }
        }

        Commands::Export { id, out } => {
            let path = match id {
                Some(id) => {
                    let id = InterviewId::from(id.as_str());
                    let record = records
                        .get(&id)?
                        .ok_or_else(|| AppraiseError::NotFound(id.to_string()))?;
                    export::write_record(&out, &record)?
                }
                None => {
                    let all = records.list_all()?;
                    export::write_all_records(&out, &all, Local::now().date_naive())?
                }
            };
            println!("Exported to {}", path.display());
        }

        Commands::Submit { input, copy_to } => {
            let form = read_form(&input)?;
            let saved = assessment::submit(&form, &records, &drafts)?;
            println!(
                "Saved {} for {} (total score {})",
                saved.id.as_ref().map(|id| id.as_str()).unwrap_or("-"),
                saved.canonical_name(),
                saved.scores().total
            );

            if let Some(dir) = copy_to {
                std::fs::create_dir_all(&dir)
                    .with_context(|| format!("Failed to create {}", dir.display()))?;
                let path = dir.join(export::submission_file_name(&saved, Utc::now()));
                std::fs::write(&path, export::record_json(&saved)?)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                info!("Wrote submission copy to {}", path.display());
            }
        }

        Commands::Score { input } => {
            let summary = assessment::summarize(&read_form(&input)?);
            println!(
                "Administrative: {}/50 ({}%)",
                summary.administrative, summary.administrative_percent
            );
            println!(
                "Financial:      {}/50 ({}%)",
                summary.financial, summary.financial_percent
            );
            println!(
                "Overall:        {}/100 ({}%, {})",
                summary.total,
                summary.total_percent,
                summary.band()
            );
        }

        Commands::Draft { action } => match action {
            DraftAction::Save { input } => {
                let draft = assessment::build_draft(&read_form(&input)?);
                drafts.save_draft(&draft)?;
                println!("Draft saved for {}", draft.canonical_name());
            }
            DraftAction::Show => match drafts.load_draft()? {
                Some(draft) => {
                    let form = FormInput::from(&draft);
                    println!("{}", serde_json::to_string_pretty(&form)?);
                }
                None => println!("No draft saved"),
            },
            DraftAction::Clear => {
                drafts.clear_draft()?;
                println!("Draft cleared");
            }
            DraftAction::Stream { submit } => {
                let mut autosaver = Autosaver::new(drafts, config.debounce());
                match (stream_drafts(&mut autosaver).await?, submit) {
                    (Some(form), true) => {
                        let saved =
                            assessment::submit_autosaved(&form, &records, &mut autosaver)?;
                        println!(
                            "Saved {} for {}",
                            saved.id.as_ref().map(|id| id.as_str()).unwrap_or("-"),
                            saved.canonical_name()
                        );
                    }
                    (Some(_), false) => {
                        autosaver.flush()?;
                        println!("Draft saved");
                    }
                    (None, _) => println!("No form input received"),
                }
            }
        },

        Commands::Admin { action } => match action {
            AdminAction::Login { username } => {
                session.begin(&username, Utc::now().timestamp_millis())?;
                println!(
                    "Logged in as {} for {} hours",
                    username,
                    session.ttl().num_hours()
                );
            }
            AdminAction::Logout => {
                session.end()?;
                println!("Logged out");
            }
            AdminAction::Status => {
                let current = session.load()?;
                let now = Utc::now().timestamp_millis();
                if session.is_valid_at(now)? {
                    let since = current
                        .login_time_ms
                        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
                        .map(|ts| ts.to_rfc3339())
                        .unwrap_or_default();
                    println!(
                        "Logged in as {} since {}",
                        current.username.as_deref().unwrap_or("-"),
                        since
                    );
                } else {
                    println!("Not logged in");
                }
            }
        },

        Commands::Watch { interval } => {
            let period = interval
                .map(std::time::Duration::from_secs)
                .unwrap_or_else(|| config.refresh_interval());

            let (mut poller, mut rx) = Dashboard::new(records).spawn_refresh(period);
            print_view(&rx.borrow_and_update());

            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        info!("Stopping dashboard refresh");
                        break;
                    }
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        println!();
                        print_view(&rx.borrow_and_update());
                    }
                }
            }

            poller.stop().await?;
        }
    }

    Ok(())
}
