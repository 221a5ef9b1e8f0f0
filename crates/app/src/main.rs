use std::collections::VecDeque;
use std::fmt;

use chrono::NaiveDate;
use services::{Clock, ProblemService};
use storage::repository::Storage;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tracker_core::SortKey;
use tracker_core::calendar;
use tracker_core::model::{ProblemDraft, ProblemEdit, ProblemId, SlotIndex};
use tracker_core::time::parse_date;

mod config;
mod render;

use config::{AppConfig, Backend};

const DEFAULT_LOG_FILTER: &str = "app=info,services=info,storage=warn";

#[derive(Debug, PartialEq, Eq)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingArg { what: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    InvalidValue { what: &'static str, raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingArg { what } => write!(f, "missing {what}"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown subcommand: {cmd}"),
            ArgsError::InvalidValue { what, raw } => write!(f, "invalid {what}: {raw}"),
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

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  app today                     # problems with a review due (default)");
    eprintln!("  app week                      # problems solved this week");
    eprintln!("  app all [--sort solved|difficulty|id] [--search <text>]");
    eprintln!("  app add --id <id> --name <name> [--difficulty <d>] [--category <c>]");
    eprintln!("          [--link <url>] [--solved YYYY-MM-DD]");
    eprintln!("  app edit <id> [--name <n>] [--difficulty <d>] [--category <c>] [--link <url>]");
    eprintln!("  app done <id> <slot 1-5>");
    eprintln!("  app delete <id>");
    eprintln!("  app calendar [YYYY-MM]");
    eprintln!("  app day YYYY-MM-DD");
    eprintln!("  app stats");
    eprintln!();
    eprintln!("Every subcommand accepts --db <url-or-path>.");
    eprintln!();
    eprintln!("Configuration (highest priority first):");
    eprintln!("  --db flag, config.toml, environment / .env, defaults");
    eprintln!("  REVIEW_DB_URL, REVIEW_BACKEND (sqlite|json|memory),");
    eprintln!("  REVIEW_TOGGLE_MODE (complete-only|flip), RUST_LOG");
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Today,
    Week,
    All { sort: SortKey, search: Option<String> },
    Add(ProblemDraft),
    Edit { id: ProblemId, edit: ProblemEdit },
    Done { id: ProblemId, slot: SlotIndex },
    Delete { id: ProblemId },
    Calendar { month: Option<(i32, u32)> },
    Day { date: NaiveDate },
    Stats,
}

#[derive(Debug, PartialEq, Eq)]
struct Args {
    db_url: Option<String>,
    command: Command,
}

#[derive(Debug, PartialEq, Eq)]
enum Invocation {
    Help,
    Run(Args),
}

/// Flag values and positionals of one subcommand.
struct Flags {
    values: Vec<(&'static str, String)>,
    positionals: VecDeque<String>,
}

impl Flags {
    /// Collects `args`; every flag in `allowed` (plus `--db`) takes one value.
    fn collect(
        args: &mut impl Iterator<Item = String>,
        allowed: &[&'static str],
    ) -> Result<Self, ArgsError> {
        let mut values = Vec::new();
        let mut positionals = VecDeque::new();
        while let Some(arg) = args.next() {
            if let Some(flag) = allowed
                .iter()
                .chain(&["--db"])
                .copied()
                .find(|flag| *flag == arg)
            {
                let value = require_value(args, flag)?;
                values.push((flag, value));
            } else if arg.starts_with("--") {
                return Err(ArgsError::UnknownArg(arg));
            } else {
                positionals.push_back(arg);
            }
        }
        Ok(Self {
            values,
            positionals,
        })
    }

    /// Last value given for `flag`.
    fn take(&mut self, flag: &str) -> Option<String> {
        let idx = self.values.iter().rposition(|(f, _)| *f == flag)?;
        Some(self.values.remove(idx).1)
    }

    fn required(&mut self, flag: &'static str) -> Result<String, ArgsError> {
        self.take(flag).ok_or(ArgsError::MissingArg { what: flag })
    }

    fn positional(&mut self, what: &'static str) -> Result<String, ArgsError> {
        self.positionals
            .pop_front()
            .ok_or(ArgsError::MissingArg { what })
    }

    fn finish(mut self) -> Result<Option<String>, ArgsError> {
        if let Some(extra) = self.positionals.pop_front() {
            return Err(ArgsError::UnknownArg(extra));
        }
        let db_url = self.take("--db");
        if let Some(raw) = &db_url {
            if raw.trim().is_empty() {
                return Err(ArgsError::InvalidDbUrl { raw: raw.clone() });
            }
        }
        Ok(db_url)
    }
}

fn parse_id(raw: String) -> Result<ProblemId, ArgsError> {
    ProblemId::new(&raw).map_err(|_| ArgsError::InvalidValue { what: "id", raw })
}

fn parse_slot(raw: String) -> Result<SlotIndex, ArgsError> {
    raw.trim()
        .parse::<u8>()
        .ok()
        .and_then(|n| SlotIndex::new(n).ok())
        .ok_or(ArgsError::InvalidValue { what: "slot", raw })
}

fn parse_month(raw: String) -> Result<(i32, u32), ArgsError> {
    let parsed = raw.trim().split_once('-').and_then(|(y, m)| {
        let year = y.parse::<i32>().ok()?;
        let month = m.parse::<u32>().ok()?;
        (1..=12).contains(&month).then_some((year, month))
    });
    parsed.ok_or(ArgsError::InvalidValue { what: "month", raw })
}

fn parse_day(raw: String) -> Result<NaiveDate, ArgsError> {
    parse_date(&raw).map_err(|_| ArgsError::InvalidValue { what: "date", raw })
}

impl Args {
    fn parse(argv: impl IntoIterator<Item = String>) -> Result<Invocation, ArgsError> {
        let argv: Vec<String> = argv.into_iter().collect();
        if argv.iter().any(|a| a == "--help" || a == "-h") {
            return Ok(Invocation::Help);
        }

        let mut iter = argv.into_iter().peekable();
        // No subcommand (or only flags) means `today`.
        let cmd = match iter.peek() {
            Some(first) if !first.starts_with("--") => iter.next().unwrap_or_default(),
            _ => "today".to_owned(),
        };

        let (command, db_url) = match cmd.as_str() {
            "today" | "week" | "stats" => {
                let flags = Flags::collect(&mut iter, &[])?;
                let command = match cmd.as_str() {
                    "today" => Command::Today,
                    "week" => Command::Week,
                    _ => Command::Stats,
                };
                (command, flags.finish()?)
            }
            "all" => {
                let mut flags = Flags::collect(&mut iter, &["--sort", "--search"])?;
                let sort = match flags.take("--sort") {
                    Some(raw) => raw.parse::<SortKey>().map_err(|_| ArgsError::InvalidValue {
                        what: "--sort",
                        raw,
                    })?,
                    None => SortKey::default(),
                };
                let search = flags
                    .take("--search")
                    .map(|raw| raw.trim().to_owned())
                    .filter(|query| !query.is_empty());
                (Command::All { sort, search }, flags.finish()?)
            }
            "add" => {
                let mut flags = Flags::collect(
                    &mut iter,
                    &[
                        "--id",
                        "--name",
                        "--difficulty",
                        "--category",
                        "--link",
                        "--solved",
                    ],
                )?;
                let id = flags.required("--id")?;
                let name = flags.required("--name")?;
                let mut draft = ProblemDraft::new(id, name);
                if let Some(value) = flags.take("--difficulty") {
                    draft = draft.with_difficulty(value);
                }
                if let Some(value) = flags.take("--category") {
                    draft = draft.with_category(value);
                }
                if let Some(value) = flags.take("--link") {
                    draft = draft.with_link(value);
                }
                if let Some(value) = flags.take("--solved") {
                    draft = draft.solved_on(value);
                }
                (Command::Add(draft), flags.finish()?)
            }
            "edit" => {
                let mut flags = Flags::collect(
                    &mut iter,
                    &["--name", "--difficulty", "--category", "--link"],
                )?;
                let id = parse_id(flags.positional("problem id")?)?;
                let edit = ProblemEdit {
                    name: flags.take("--name"),
                    difficulty: flags.take("--difficulty"),
                    category: flags.take("--category"),
                    link: flags.take("--link"),
                };
                (Command::Edit { id, edit }, flags.finish()?)
            }
            "done" => {
                let mut flags = Flags::collect(&mut iter, &[])?;
                let id = parse_id(flags.positional("problem id")?)?;
                let slot = parse_slot(flags.positional("slot")?)?;
                (Command::Done { id, slot }, flags.finish()?)
            }
            "delete" => {
                let mut flags = Flags::collect(&mut iter, &[])?;
                let id = parse_id(flags.positional("problem id")?)?;
                (Command::Delete { id }, flags.finish()?)
            }
            "calendar" => {
                let mut flags = Flags::collect(&mut iter, &[])?;
                let month = flags.positionals.pop_front().map(parse_month).transpose()?;
                (Command::Calendar { month }, flags.finish()?)
            }
            "day" => {
                let mut flags = Flags::collect(&mut iter, &[])?;
                let date = parse_day(flags.positional("date")?)?;
                (Command::Day { date }, flags.finish()?)
            }
            other => return Err(ArgsError::UnknownCommand(other.to_owned())),
        };

        Ok(Invocation::Run(Self { db_url, command }))
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

async fn open_storage(config: &AppConfig) -> Result<Storage, Box<dyn std::error::Error>> {
    let storage = match config.backend {
        Backend::Sqlite => {
            let db_url = normalize_sqlite_url(config.location().to_owned());
            // Create the file up front; sqlx will not.
            prepare_sqlite_file(&db_url)?;
            Storage::sqlite(&db_url).await?
        }
        Backend::Json => Storage::json_file(config.location())?,
        Backend::Memory => Storage::in_memory(),
    };
    tracing::debug!(backend = %config.backend, "storage ready");
    Ok(storage)
}

async fn execute(
    service: &mut ProblemService,
    command: Command,
) -> Result<(), Box<dyn std::error::Error>> {
    let today = service.today();
    match command {
        Command::Today => {
            println!("Due today ({today}):");
            print!("{}", render::problems(&service.due_today(), today));
        }
        Command::Week => {
            println!("Solved this week:");
            print!("{}", render::problems(&service.due_this_week(), today));
        }
        Command::All { sort, search } => {
            let sorted = service.sorted(sort);
            let shown: Vec<_> = match search.as_deref() {
                Some(query) => {
                    let matches = service.search(query);
                    sorted
                        .into_iter()
                        .filter(|p| matches.iter().any(|m| m.id() == p.id()))
                        .collect()
                }
                None => sorted,
            };
            print!("{}", render::problems(&shown, today));
        }
        Command::Add(draft) => {
            let added = service.add(draft).await?;
            println!("added {} ({})", added.id(), added.name());
            print!("{}", render::problems(&[&added], today));
        }
        Command::Edit { id, edit } => {
            if edit.is_empty() {
                println!("nothing to change for {id}");
                return Ok(());
            }
            let edited = service.edit(&id, edit).await?;
            print!("{}", render::problems(&[&edited], today));
        }
        Command::Done { id, slot } => {
            let done = service.toggle(&id, slot).await?;
            let state = if done { "done" } else { "open" };
            println!("{id} {slot}: {state}");
        }
        Command::Delete { id } => {
            let removed = service.delete(&id).await?;
            println!("deleted {} ({})", removed.id(), removed.name());
        }
        Command::Calendar { month } => {
            let (year, month) = month.unwrap_or_else(|| calendar::shift_month(today, 0));
            print!("{}", render::month(&service.month_view(year, month)?));
        }
        Command::Day { date } => {
            print!("{}", render::day(date, &service.reviews_on(date)));
        }
        Command::Stats => {
            print!("{}", render::stats(&service.stats(), &service.completions()));
        }
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = match Args::parse(std::env::args().skip(1)) {
        Ok(Invocation::Help) => {
            print_usage();
            return Ok(());
        }
        Ok(Invocation::Run(args)) => args,
        Err(e) => {
            eprintln!("{e}");
            print_usage();
            return Err(e.into());
        }
    };

    let mut config = AppConfig::load()?;
    if let Some(db_url) = args.db_url {
        config.location = Some(db_url);
    }

    // Storage is opened in the binary glue so core/services stay backend-agnostic.
    let storage = open_storage(&config).await?;
    let mut service = ProblemService::open(&storage, Clock::local(), config.policy()).await?;
    execute(&mut service, args.command).await
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
