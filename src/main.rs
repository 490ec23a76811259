use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use vitrine::catalog::{BrokenSourceReport, ContentKind, ContentRecord, PlaybackTarget};
use vitrine::config::Config;
use vitrine::feed::{detail, Browser, Screen};
use vitrine::history::{HistoryTracker, WatchOutcome};
use vitrine::storage::{import, Database, DatabaseError};
use vitrine::store::{ContentStore, PreferenceScope};
use vitrine::util::{fit_to_width, strip_control_chars, truncate_to_width};

const TITLE_WIDTH: usize = 40;

/// Get the config directory path (~/.config/vitrine/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("vitrine"))
}

#[derive(Parser, Debug)]
#[command(name = "vitrine", about = "Browse a local streaming catalog")]
struct Args {
    /// Reset database (delete and recreate)
    #[arg(long)]
    reset_db: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import a JSON catalog bundle into the database
    Import {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Show the home sections
    Home,
    /// Page through the grid
    Browse {
        /// movie or series; all kinds when omitted
        #[arg(long)]
        kind: Option<ContentKind>,
        /// Category tab (0 = all)
        #[arg(long, default_value_t = 0)]
        tab: usize,
        /// Pages to fetch
        #[arg(long, default_value_t = 1)]
        pages: usize,
    },
    /// Start or stop a viewing session
    Watch {
        #[command(subcommand)]
        action: WatchAction,
    },
    /// List recently watched titles
    History,
    /// Search titles
    Search { query: String },
    /// Show a title with its sources, seasons or saga and recommendations
    Detail { id: String },
    /// Report a playback source as broken
    Report {
        id: String,
        /// Source label as shown by `detail`
        server: String,
    },
    /// List recent broken-source reports
    Reports {
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
}

#[derive(Subcommand, Debug)]
enum WatchAction {
    Start { id: String },
    Stop,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
        eprintln!("Created config directory: {}", config_dir.display());
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = std::fs::set_permissions(&config_dir, std::fs::Permissions::from_mode(0o700)) {
            tracing::warn!(
                path = %config_dir.display(),
                error = %e,
                "Failed to set config directory permissions to 0700"
            );
        }
    }

    let config = Config::load(&config_dir.join("config.toml")).context("Failed to load config")?;
    let db_path = config_dir.join("catalog.db");

    if args.reset_db && db_path.exists() {
        std::fs::remove_file(&db_path).context("Failed to delete database")?;
        eprintln!("Database reset.");
    }

    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!("Error: The catalog database is locked by another process.");
            std::process::exit(1);
        }
        Err(e) => return Err(anyhow::anyhow!("Failed to open database: {}", e)),
    };

    let history = Arc::new(HistoryTracker::new(
        PreferenceScope::new(db.clone(), "history"),
        config.history_settings(),
    ));
    let store = Arc::new(db.clone());

    match args.command {
        Command::Import { file } => {
            let canonical = file
                .canonicalize()
                .with_context(|| format!("Failed to resolve import file: {}", file.display()))?;
            let summary = import::import_file(&db, &canonical)
                .await
                .with_context(|| format!("Failed to import {}", canonical.display()))?;
            println!(
                "Imported {} titles ({} episodes)",
                summary.imported, summary.episodes
            );
        }
        Command::Home => {
            let mut browser = Browser::new(store, history, config.feed_settings(), Screen::All);
            browser.load_home_sections().await;
            browser.settle().await;

            print_section("Recently watched", browser.recently_watched());
            print_section("Trending", browser.trending());
            print_section("New releases", browser.new_releases());
            print_section("Catalog", browser.items());
        }
        Command::Browse { kind, tab, pages } => {
            let screen = kind.map_or(Screen::All, Screen::Kind);
            let mut browser = Browser::new(store, history, config.feed_settings(), screen);
            if !browser.select_tab(tab) {
                anyhow::bail!(
                    "Tab {} does not exist (0..={})",
                    tab,
                    browser.categories().len()
                );
            }
            browser.settle().await;

            for _ in 1..pages {
                if !browser.has_more() {
                    break;
                }
                browser.load_more();
                browser.settle().await;
            }

            let heading = browser.current_category().unwrap_or("All").to_string();
            print_section(&heading, browser.items());
            if !browser.has_more() {
                println!("(end of catalog)");
            }
        }
        Command::Watch { action } => match action {
            WatchAction::Start { id } => {
                history.start_watching(&id).await?;
                println!("Watching {}", id);
            }
            WatchAction::Stop => match history.stop_watching_and_save().await? {
                WatchOutcome::NoSession => println!("No viewing session in progress"),
                WatchOutcome::Malformed => println!("Discarded an unreadable viewing session"),
                WatchOutcome::Recorded {
                    content_id,
                    elapsed_ms,
                } => println!("Added {} to history after {}s", content_id, elapsed_ms / 1000),
                WatchOutcome::TooShort {
                    content_id,
                    elapsed_ms,
                } => println!(
                    "{} watched for {}s, not added to history",
                    content_id,
                    elapsed_ms / 1000
                ),
                WatchOutcome::Expired { content_id, .. } => {
                    println!("Session for {} was too old, not added to history", content_id)
                }
            },
        },
        Command::History => {
            history.check_pending_history().await?;
            let ids = history.history().await?;
            let browser = Browser::new(store, history, config.feed_settings(), Screen::All);
            print_section("Recently watched", &browser.load_id_list(&ids).await);
        }
        Command::Search { query } => {
            let results = detail::search_titles(&db, &query).await?;
            print_section(&format!("Results for \"{}\"", query), &results);
        }
        Command::Detail { id } => {
            let record = find_record(&db, &id).await?;
            print_detail(&db, &record, config.recommendation_limit).await?;
        }
        Command::Report { id, server } => {
            let record = find_record(&db, &id).await?;
            let entry = record
                .ordered_sources()
                .into_iter()
                .find(|entry| entry.key.display_label().eq_ignore_ascii_case(&server))
                .with_context(|| format!("No source labelled '{}' on {}", server, record.title))?;
            let report = BrokenSourceReport {
                content_id: record.id.clone(),
                content_title: record.title.clone(),
                server_name: entry.key.display_label(),
                reported_url: entry.locator.clone(),
                timestamp: Utc::now(),
            };
            ContentStore::report_broken_source(&db, &report).await?;
            println!("Reported {} on {}", report.server_name, record.title);
        }
        Command::Reports { limit } => {
            let reports = db.get_broken_source_reports(limit).await?;
            println!("== Broken sources ({}) ==", reports.len());
            for report in &reports {
                println!(
                    "  {}  {}  {}  {}",
                    report.timestamp.format("%Y-%m-%d %H:%M"),
                    fit_to_width(&strip_control_chars(&report.content_title), TITLE_WIDTH),
                    report.server_name,
                    report.reported_url
                );
            }
        }
    }

    Ok(())
}

async fn find_record(db: &Database, id: &str) -> Result<ContentRecord> {
    db.get_by_ids(&[id.to_string()])
        .await?
        .into_iter()
        .next()
        .with_context(|| format!("No title with id '{}'", id))
}

fn print_section(heading: &str, records: &[ContentRecord]) {
    println!("== {} ({}) ==", heading, records.len());
    for record in records {
        println!(
            "  {}  {:<6}  {}",
            fit_to_width(&strip_control_chars(&record.title), TITLE_WIDTH),
            record.kind.as_str(),
            record.id
        );
    }
    println!();
}

async fn print_detail(db: &Database, record: &ContentRecord, recommendation_limit: usize) -> Result<()> {
    println!("{} [{}]", record.title, record.kind);
    if record.year > 0 {
        println!("Year: {}", record.year);
    }
    if !record.rating_imdb.is_empty() || !record.rating_rotten.is_empty() {
        println!("IMDb: {}  Rotten Tomatoes: {}", record.rating_imdb, record.rating_rotten);
    }
    if !record.categories.is_empty() {
        let categories: Vec<&str> = record.categories.iter().map(String::as_str).collect();
        println!("Categories: {}", categories.join(", "));
    }
    if !record.description.is_empty() {
        println!("{}", truncate_to_width(&record.description, 200));
    }

    println!("Sources:");
    for entry in record.ordered_sources() {
        let target = match PlaybackTarget::parse(&entry.locator) {
            Ok(PlaybackTarget::Url(url)) => url.to_string(),
            Ok(PlaybackTarget::Embed(_)) => "(embedded player)".to_string(),
            Err(e) => format!("(unplayable: {})", e),
        };
        println!("  {}: {}", entry.key.display_label(), target);
    }

    match record.kind {
        ContentKind::SeriesSeason => {
            let series = detail::series_detail(db, record).await?;
            println!();
            println!("Seasons of {}:", record.series_title);
            for season in &series.seasons {
                let marker = if season.id == record.id { "*" } else { " " };
                println!(" {} Season {} ({})", marker, season.season_number, season.id);
            }
            println!("Episodes:");
            for episode in &series.episodes {
                println!("  {:>3}. {}", episode.episode_number, episode.title);
            }
        }
        ContentKind::Movie => {
            if let Some(saga) = &record.saga_id {
                let movies = detail::saga_movies(db, saga).await?;
                println!();
                println!("Saga:");
                for movie in &movies {
                    println!("  {}  {}", movie.year, movie.title);
                }
            }
        }
    }

    let recommended = detail::recommendations(db, record, recommendation_limit).await?;
    println!();
    print_section("You may also like", &recommended);
    Ok(())
}
