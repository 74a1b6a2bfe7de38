//! CLI smoke entry point.
//!
//! # Responsibility
//! - Drive `skynote_core` end to end from a terminal: notes CRUD/search and
//!   one weather lookup.
//! - Print results as JSON so runs are easy to diff.
//!
//! # Invariants
//! - Every command waits on the published live state, never on return values.
//! - Waits are bounded by `--wait-secs`.

use clap::{Parser, Subcommand};
use log::{error, info};
use skynote_core::{
    core_version, init_logging_from_config, App, AppConfig, Note, NoteId, WeatherState,
};
use std::error::Error;
use std::process::ExitCode;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::timeout;

#[derive(Debug, Parser)]
#[command(name = "skynote", version, about = "Notes and current weather on one local store")]
struct Cli {
    /// Upper bound for waiting on live state.
    #[arg(long, default_value_t = 15)]
    wait_secs: u64,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the core crate version.
    Version,
    /// Manage notes.
    #[command(subcommand)]
    Notes(NotesCommand),
    /// Fetch current weather for a city.
    Weather {
        city: String,
        /// Store a successful report as a note.
        #[arg(long)]
        save_note: bool,
    },
}

#[derive(Debug, Subcommand)]
enum NotesCommand {
    List,
    Add { title: String, content: String },
    Delete { id: NoteId },
    Search { query: String },
}

type CliResult<T = ()> = Result<T, Box<dyn Error>>;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_run module=cli status=error error={err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> CliResult {
    if let Command::Version = cli.command {
        println!("skynote_core version={}", core_version());
        return Ok(());
    }

    let config = AppConfig::from_env()?;
    if let Err(err) = init_logging_from_config(&config) {
        eprintln!("warning: logging disabled: {err}");
    }
    info!("event=cli_start module=cli status=ok config={config:?}");

    let app = App::start(&config)?;
    let wait = Duration::from_secs(cli.wait_secs);

    match cli.command {
        Command::Version => Ok(()),
        Command::Notes(command) => run_notes(&app, command, wait).await,
        Command::Weather { city, save_note } => {
            run_weather(&app, &config, &city, save_note, wait).await
        }
    }
}

async fn run_notes(app: &App, command: NotesCommand, wait: Duration) -> CliResult {
    let notes = app.notes();
    let mut all = notes.subscribe_all_notes();

    match command {
        NotesCommand::List => {
            // The first snapshot lands once the initial live query ran.
            let stored = app.store().list_notes()?;
            let listed = wait_for(&mut all, wait, |list| *list == stored).await?;
            print_json(&listed)
        }
        NotesCommand::Add { title, content } => {
            let note = Note::new(title, content);
            let (title, timestamp) = (note.title.clone(), note.timestamp);
            notes.insert(note);
            let listed = wait_for(&mut all, wait, |list| {
                list.iter()
                    .any(|n| n.title == title && n.timestamp == timestamp)
            })
            .await?;
            let added = listed
                .into_iter()
                .find(|n| n.title == title && n.timestamp == timestamp);
            print_json(&added)
        }
        NotesCommand::Delete { id } => {
            let Some(note) = app.store().get_note(id)? else {
                return Err(format!("note {id} does not exist").into());
            };
            notes.delete(&note)?;
            wait_for(&mut all, wait, |list| list.iter().all(|n| n.id != id)).await?;
            print_json(&note)
        }
        NotesCommand::Search { query } => {
            let stored = app.store().search_notes(&query)?;
            let mut results = notes.subscribe_search_results();
            notes.search(query);
            let found = wait_for(&mut results, wait, |list| *list == stored).await?;
            print_json(&found)
        }
    }
}

async fn run_weather(
    app: &App,
    config: &AppConfig,
    city: &str,
    save_note: bool,
    wait: Duration,
) -> CliResult {
    let weather = app.weather();

    // Let the restore watcher see the stored slot first so the explicit
    // request below is the latest one.
    let stored = app.store().get_last_city()?;
    let mut last_city = weather.subscribe_last_city();
    wait_for(&mut last_city, wait, |slot| *slot == stored).await?;
    tokio::task::yield_now().await;

    let mut state = weather.subscribe_weather_state();
    weather.fetch_weather(city, &config.api_key, &config.language_code);
    let settled = wait_for(&mut state, wait, |s| match s {
        WeatherState::Success(report) => report.city == city.trim(),
        WeatherState::Error(_) => true,
        WeatherState::Loading => false,
    })
    .await?;

    match settled {
        WeatherState::Success(report) => {
            println!(
                "{}: {}, {}, wind {}",
                report.city,
                report.display_temperature(),
                report.description,
                report.display_wind()
            );
            if save_note {
                let mut all = app.notes().subscribe_all_notes();
                let title = report.to_note().title;
                weather.save_as_note(app.notes());
                wait_for(&mut all, wait, |list| list.iter().any(|n| n.title == title)).await?;
                println!("saved note `{title}`");
            }
            Ok(())
        }
        WeatherState::Error(message) => Err(message.into()),
        WeatherState::Loading => Err("weather lookup did not settle".into()),
    }
}

async fn wait_for<T: Clone>(
    rx: &mut watch::Receiver<T>,
    wait: Duration,
    pred: impl FnMut(&T) -> bool,
) -> CliResult<T> {
    match timeout(wait, rx.wait_for(pred)).await {
        Ok(Ok(value)) => Ok(value.clone()),
        Ok(Err(_)) => Err("live state closed".into()),
        Err(_) => Err(format!("no matching live state within {wait:?}").into()),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
