mod console;
mod demo;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use quiz_core::model::{CourseId, QuizConfigDraft};
use services::{BackendConfig, Clock, HttpBackend, QuizEngine};
use storage::repository::{
    AUTH_TOKEN_KEY, InMemoryQuestionBank, KeyValueStore, QuestionBank, RecordingBackend,
    ResultBackend,
};
use storage::sqlite::SqliteRepository;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::console::{Console, Outcome};

const DEFAULT_QUESTION_COUNT: u32 = 10;
const DEFAULT_TIME_PER_QUESTION: u32 = 20;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidNumber { flag: &'static str, raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidNumber { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn parse_number<T: std::str::FromStr>(raw: String, flag: &'static str) -> Result<T, ArgsError> {
    raw.trim()
        .parse()
        .map_err(|_| ArgsError::InvalidNumber { flag, raw })
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --course <id>     course to draw questions from");
    eprintln!("  --title <text>    course title shown in the header");
    eprintln!("  --count <n>       questions per batch (default {DEFAULT_QUESTION_COUNT})");
    eprintln!("  --time <secs>     seconds per question (default {DEFAULT_TIME_PER_QUESTION})");
    eprintln!("  --api <url>       platform API; without it the built-in demo course is used");
    eprintln!("  --db <url>        local store (default sqlite://quiz.sqlite3)");
    eprintln!("  --token <token>   save an auth token so results are recorded");
    eprintln!("  --shuffle         shuffle the fetched questions");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZ_API_URL, QUIZ_DB_URL, QUIZ_COURSE_ID, QUIZ_COURSE_TITLE,");
    eprintln!("  QUIZ_QUESTION_COUNT, QUIZ_TIME_PER_QUESTION, RUST_LOG");
}

struct Args {
    db_url: String,
    api: Option<BackendConfig>,
    course_id: Option<CourseId>,
    course_title: Option<String>,
    question_count: u32,
    time_per_question: u32,
    token: Option<String>,
    shuffle: bool,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut parsed = Self {
            db_url: env_var("QUIZ_DB_URL")
                .map_or_else(|| "sqlite://quiz.sqlite3".into(), normalize_sqlite_url),
            api: BackendConfig::from_env(),
            course_id: env_var("QUIZ_COURSE_ID")
                .map(|raw| parse_number::<u64>(raw, "QUIZ_COURSE_ID").map(CourseId::new))
                .transpose()?,
            course_title: env_var("QUIZ_COURSE_TITLE"),
            question_count: env_var("QUIZ_QUESTION_COUNT")
                .map(|raw| parse_number(raw, "QUIZ_QUESTION_COUNT"))
                .transpose()?
                .unwrap_or(DEFAULT_QUESTION_COUNT),
            time_per_question: env_var("QUIZ_TIME_PER_QUESTION")
                .map(|raw| parse_number(raw, "QUIZ_TIME_PER_QUESTION"))
                .transpose()?
                .unwrap_or(DEFAULT_TIME_PER_QUESTION),
            token: None,
            shuffle: false,
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    parsed.db_url = normalize_sqlite_url(value);
                }
                "--api" => {
                    let value = require_value(args, "--api")?;
                    parsed.api = Some(BackendConfig::new(value.trim()));
                }
                "--course" => {
                    let value = require_value(args, "--course")?;
                    parsed.course_id = Some(CourseId::new(parse_number(value, "--course")?));
                }
                "--title" => parsed.course_title = Some(require_value(args, "--title")?),
                "--count" => {
                    parsed.question_count = parse_number(require_value(args, "--count")?, "--count")?;
                }
                "--time" => {
                    parsed.time_per_question = parse_number(require_value(args, "--time")?, "--time")?;
                }
                "--token" => parsed.token = Some(require_value(args, "--token")?),
                "--shuffle" => parsed.shuffle = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(parsed)
    }

    fn draft(&self) -> QuizConfigDraft {
        QuizConfigDraft {
            question_count: self.question_count,
            time_per_question: self.time_per_question,
            course_id: self.course_id,
            course_title: self.course_title.clone(),
        }
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

/// Question bank and result backend for this run.
fn collaborators(
    args: &mut Args,
) -> Result<(Arc<dyn QuestionBank>, Arc<dyn ResultBackend>), Box<dyn std::error::Error>> {
    if let Some(config) = args.api.clone() {
        tracing::info!(api = %config.base_url, "using platform API");
        let http = Arc::new(HttpBackend::new(config));
        let bank: Arc<dyn QuestionBank> = http.clone();
        let backend: Arc<dyn ResultBackend> = http;
        return Ok((bank, backend));
    }

    tracing::info!("no API configured, playing the demo course offline");
    let bank = InMemoryQuestionBank::new();
    bank.insert_course(demo::course_id(), demo::questions()?)?;
    if args.course_id.is_none() {
        args.course_id = Some(demo::course_id());
        args.course_title
            .get_or_insert_with(|| demo::DEMO_COURSE_TITLE.to_string());
    }
    Ok((Arc::new(bank), Arc::new(RecordingBackend::new())))
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);
    let mut args = Args::parse(&mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    prepare_sqlite_file(&args.db_url)?;
    let store: Arc<dyn KeyValueStore> = Arc::new(SqliteRepository::open(&args.db_url).await?);
    if let Some(token) = &args.token {
        store.set(AUTH_TOKEN_KEY, token).await?;
    }

    let (bank, backend) = collaborators(&mut args)?;
    let mut engine = QuizEngine::new(Clock::default_clock(), bank, store, backend)
        .with_shuffle(args.shuffle);

    if let Err(err) = engine.configure(args.draft()) {
        if err.is_missing_course() {
            eprintln!("Missing course data: pass --course <id> or set QUIZ_COURSE_ID.");
        }
        return Err(err.into());
    }

    if let Some(title) = &args.course_title {
        println!("== {title} ==");
    }
    if let Err(err) = engine.start().await {
        eprintln!("Could not load questions.");
        return Err(err.into());
    }

    Console::print_help();
    let mut console = Console::new(Duration::from_secs(u64::from(args.time_per_question)));
    let outcome = console.run(&mut engine).await;

    match &outcome {
        Ok(Outcome::Completed(bundle)) => {
            let summary = &bundle.summary;
            println!(
                "Score: {}/{} ({}%), time used {}%.",
                summary.correct, summary.total, summary.score_percent, summary.time_used_percent
            );
        }
        Ok(Outcome::Abandoned) => println!("Back to the course page."),
        Ok(Outcome::Quit) => println!("Quiz left unfinished."),
        Err(_) => {}
    }

    engine.teardown().settle().await;
    outcome.map(drop).map_err(Into::into)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
