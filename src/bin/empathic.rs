//! Empathic CLI - Command-line interface for Empathic Core
//!
//! Commands:
//! - run: Replay a session event stream from stdin (streaming mode)
//! - catalog: Print the built-in pattern/topic catalogs
//! - validate: Validate a catalog JSON file

use clap::{Parser, Subcommand, ValueEnum};
use std::cell::RefCell;
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;

use empathic_core::{
    AgentConfig, EmotionSnapshot, EngineError, PatternCatalog, SessionAgent, SessionEvent,
    TopicCatalog, TranscriptFragment, CORE_VERSION,
};

/// Empathic - in-session decision-support engine for emotion-aware therapy assistance
#[derive(Parser)]
#[command(name = "empathic")]
#[command(version = CORE_VERSION)]
#[command(about = "Turn emotion and transcript streams into clinician suggestions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a session event stream from stdin (streaming mode)
    Run {
        /// Agent configuration file (JSON); defaults apply when omitted
        #[arg(long)]
        config: Option<PathBuf>,

        /// Session id; generated when omitted
        #[arg(long)]
        session_id: Option<String>,

        /// What to emit per processed event
        #[arg(long, default_value = "events")]
        output: OutputMode,

        /// Print the final session report to stderr as pretty JSON
        #[arg(long)]
        report: bool,
    },

    /// Print the built-in pattern/topic catalogs
    Catalog {
        /// Catalog to print
        #[arg(value_enum)]
        which: CatalogKind,
    },

    /// Validate a catalog JSON file
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Catalog kind expected in the file
        #[arg(value_enum)]
        which: CatalogKind,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputMode {
    /// Newline-delimited JSON of agent events as they fire
    Events,
    /// Newline-delimited JSON of the active-suggestion list after each event
    Active,
}

#[derive(Clone, Copy, ValueEnum)]
enum CatalogKind {
    /// Clinical pattern catalog
    Patterns,
    /// Topic catalog
    Topics,
}

/// One line of the input stream: an emotion snapshot or a transcript
/// fragment, tagged by type.
#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamEvent {
    Snapshot(EmotionSnapshot),
    Transcript(TranscriptFragment),
}

impl StreamEvent {
    fn timestamp(&self) -> chrono::DateTime<chrono::Utc> {
        match self {
            StreamEvent::Snapshot(s) => s.timestamp,
            StreamEvent::Transcript(f) => f.timestamp,
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliErrorReport::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Run {
            config,
            session_id,
            output,
            report,
        } => cmd_run(config.as_deref(), session_id, output, report),
        Commands::Catalog { which } => cmd_catalog(which),
        Commands::Validate { input, which } => cmd_validate(&input, which),
    }
}

fn cmd_run(
    config_path: Option<&std::path::Path>,
    session_id: Option<String>,
    output: OutputMode,
    print_report: bool,
) -> Result<(), CliError> {
    let config = match config_path {
        Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
        None => AgentConfig::default(),
    };

    let stdin = io::stdin();
    let stdout = Rc::new(RefCell::new(io::stdout()));

    let mut agent: Option<SessionAgent> = None;
    let mut last_timestamp = None;

    for line in stdin.lock().lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let event: StreamEvent = serde_json::from_str(trimmed)
            .map_err(|e| CliError::ParseError(format!("Failed to parse event: {e}")))?;
        last_timestamp = Some(event.timestamp());

        // The session starts at the first event's timestamp.
        if agent.is_none() {
            let mut fresh = SessionAgent::new(config.clone(), event.timestamp());
            if matches!(output, OutputMode::Events) {
                let sink = Rc::clone(&stdout);
                fresh.subscribe(move |event| {
                    if let Ok(json) = serde_json::to_string(event) {
                        let _ = writeln!(sink.borrow_mut(), "{json}");
                    }
                });
            }
            fresh.start(session_id.clone(), event.timestamp());
            agent = Some(fresh);
        }
        let Some(agent) = agent.as_mut() else {
            continue;
        };

        match event {
            StreamEvent::Snapshot(snapshot) => {
                let active = agent.handle_snapshot(&snapshot);
                if matches!(output, OutputMode::Active) {
                    let json = serde_json::to_string(active)?;
                    writeln!(stdout.borrow_mut(), "{json}")?;
                }
            }
            StreamEvent::Transcript(fragment) => {
                agent.handle_transcript(&fragment);
            }
        }
        stdout.borrow_mut().flush()?;
    }

    if let (Some(mut agent), Some(ts)) = (agent, last_timestamp) {
        let report = agent.end(ts);
        if print_report {
            eprintln!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

fn cmd_catalog(which: CatalogKind) -> Result<(), CliError> {
    let json = match which {
        CatalogKind::Patterns => serde_json::to_string_pretty(&PatternCatalog::default())?,
        CatalogKind::Topics => serde_json::to_string_pretty(&TopicCatalog::default())?,
    };
    println!("{json}");
    Ok(())
}

fn cmd_validate(input: &PathBuf, which: CatalogKind) -> Result<(), CliError> {
    let data = if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(input)?
    };

    let entries = match which {
        CatalogKind::Patterns => PatternCatalog::from_json(&data)?.len(),
        CatalogKind::Topics => TopicCatalog::from_json(&data)?.len(),
    };
    println!("OK: {entries} entries");
    Ok(())
}

// Error types

#[derive(Debug)]
enum CliError {
    Io(io::Error),
    Json(serde_json::Error),
    Engine(EngineError),
    ParseError(String),
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        CliError::Io(e)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Json(e)
    }
}

impl From<EngineError> for CliError {
    fn from(e: EngineError) -> Self {
        CliError::Engine(e)
    }
}

#[derive(serde::Serialize)]
struct CliErrorReport {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<CliError> for CliErrorReport {
    fn from(e: CliError) -> Self {
        match e {
            CliError::Io(e) => CliErrorReport {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            CliError::Json(e) => CliErrorReport {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            CliError::Engine(e) => CliErrorReport {
                code: "ENGINE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'empathic validate' against custom catalogs".to_string()),
            },
            CliError::ParseError(msg) => CliErrorReport {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Each input line must be a snapshot or transcript event".to_string()),
            },
        }
    }
}
