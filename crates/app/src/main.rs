mod telemetry;

use std::fmt;
use std::num::IntErrorKind;

use hundred_core::model::{ChallengeOutcome, ChallengeState, CourseId, GameMode, UserId};
use services::{AppServices, Clock, Recommendation};
use tracing::info;

#[derive(Debug, PartialEq, Eq)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingCommand,
    MissingOperand { command: &'static str, operand: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    ExtraOperand(String),
    InvalidUserId { raw: String },
    InvalidCourseId { raw: String },
    InvalidLength { raw: String },
    InvalidResult { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingCommand => write!(f, "no command given"),
            ArgsError::MissingOperand { command, operand } => {
                write!(f, "{command} requires <{operand}>")
            }
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown command: {cmd}"),
            ArgsError::ExtraOperand(arg) => write!(f, "unexpected operand: {arg}"),
            ArgsError::InvalidUserId { raw } => write!(f, "invalid user id: {raw}"),
            ArgsError::InvalidCourseId { raw } => write!(f, "invalid course id: {raw}"),
            ArgsError::InvalidLength { raw } => write!(f, "invalid result length: {raw}"),
            ArgsError::InvalidResult { raw } => {
                write!(f, "invalid result (expected clear or fail): {raw}")
            }
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

fn require_operand(
    operands: &mut impl Iterator<Item = String>,
    command: &'static str,
    operand: &'static str,
) -> Result<String, ArgsError> {
    operands
        .next()
        .ok_or(ArgsError::MissingOperand { command, operand })
}

fn parse_user(raw: String) -> Result<UserId, ArgsError> {
    raw.parse().map_err(|_| ArgsError::InvalidUserId { raw })
}

/// Integers too large for `i64` saturate; the gate clamps them like any other
/// out-of-range length.
fn parse_length(raw: String) -> Result<i64, ArgsError> {
    match raw.parse::<i64>() {
        Ok(length) => Ok(length),
        Err(e) => match e.kind() {
            IntErrorKind::PosOverflow => Ok(i64::MAX),
            IntErrorKind::NegOverflow => Ok(i64::MIN),
            _ => Err(ArgsError::InvalidLength { raw }),
        },
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Start { user: UserId },
    Record { user: UserId, course: CourseId, success: bool },
    Status { user: UserId },
    Recommend { user: UserId, length: i64, tokens: Vec<String> },
    Clear { user: UserId },
}

impl Command {
    fn from_operands(operands: Vec<String>) -> Result<Self, ArgsError> {
        let mut operands = operands.into_iter();
        let name = operands.next().ok_or(ArgsError::MissingCommand)?;

        let command = match name.as_str() {
            "start" => Command::Start {
                user: parse_user(require_operand(&mut operands, "start", "user")?)?,
            },
            "record" => {
                let user = parse_user(require_operand(&mut operands, "record", "user")?)?;
                let raw = require_operand(&mut operands, "record", "course")?;
                let course = raw
                    .parse()
                    .map_err(|_| ArgsError::InvalidCourseId { raw })?;
                let success = match require_operand(&mut operands, "record", "result")?.as_str() {
                    "clear" => true,
                    "fail" => false,
                    other => {
                        return Err(ArgsError::InvalidResult {
                            raw: other.to_string(),
                        });
                    }
                };
                Command::Record {
                    user,
                    course,
                    success,
                }
            }
            "status" => Command::Status {
                user: parse_user(require_operand(&mut operands, "status", "user")?)?,
            },
            "recommend" => {
                let user = parse_user(require_operand(&mut operands, "recommend", "user")?)?;
                let length = parse_length(require_operand(&mut operands, "recommend", "length")?)?;
                // Filter tokens are free-form; the gate decides what they mean.
                return Ok(Command::Recommend {
                    user,
                    length,
                    tokens: operands.collect(),
                });
            }
            "clear" => Command::Clear {
                user: parse_user(require_operand(&mut operands, "clear", "user")?)?,
            },
            _ => return Err(ArgsError::UnknownCommand(name)),
        };

        match operands.next() {
            Some(extra) => Err(ArgsError::ExtraOperand(extra)),
            None => Ok(command),
        }
    }
}

#[derive(Debug)]
struct Args {
    db_url: String,
    command: Command,
}

impl Args {
    /// Parse everything after the program name. `--db` may appear anywhere.
    fn parse(args: impl IntoIterator<Item = String>, default_db_url: String) -> Result<Self, ArgsError> {
        let mut db_url = default_db_url;
        let mut operands = Vec::new();

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                flag if flag.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
                _ => operands.push(arg),
            }
        }

        Ok(Self {
            db_url,
            command: Command::from_operands(operands)?,
        })
    }
}

fn default_db_url() -> String {
    std::env::var("HUNDRED_DB_URL")
        .ok()
        .map_or_else(|| "sqlite://hundred.sqlite3".into(), normalize_sqlite_url)
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- [--db <sqlite_url>] <command>");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  start <user>                          Enter the 100-attempt challenge");
    eprintln!("  record <user> <course> <clear|fail>   Report one course play");
    eprintln!("  status <user>                         Show challenge progress");
    eprintln!("  recommend <user> <length> [tokens..]  Search recommended courses");
    eprintln!("  clear <user>                          Leave the challenge");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite://hundred.sqlite3");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  HUNDRED_DB_URL, LOG_LEVEL, LOG_FORMAT");
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim();
    let path_str = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    let path = std::path::Path::new(path_str);
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

fn outcome_name(outcome: ChallengeOutcome) -> &'static str {
    match outcome {
        ChallengeOutcome::Active => "active",
        ChallengeOutcome::Won => "won",
        ChallengeOutcome::Lost => "lost",
    }
}

fn describe(user: UserId, state: &ChallengeState) -> String {
    format!(
        "user {user}: mode={} lives={} cleared={}/{} last={} outcome={}",
        state.mode(),
        state.lives_remaining(),
        state.courses_cleared(),
        state.courses_attempted(),
        if state.last_result() { "clear" } else { "fail" },
        outcome_name(state.outcome()),
    )
}

async fn execute(services: &AppServices, command: Command) -> Result<(), Box<dyn std::error::Error>> {
    let manager = services.manager();
    let store = services.store();

    match command {
        Command::Start { user } => {
            let state = manager.create_state(user, GameMode::HundredAttempt);
            services.persistence().persist_user(&store, user).await?;
            println!("{}", describe(user, &state));
        }
        Command::Record {
            user,
            course,
            success,
        } => {
            if !manager.on_course_play_initiated(user, course) {
                println!("user {user}: no lives left, play refused");
                return Ok(());
            }
            match manager.on_course_play_completed(user, course, success) {
                Some(_) => {
                    services.persistence().persist_user(&store, user).await?;
                    if let Some(state) = manager.state(user) {
                        println!("{}", describe(user, &state));
                    }
                }
                None => println!("user {user}: not in a challenge, nothing recorded"),
            }
        }
        Command::Status { user } => match manager.state(user) {
            Some(state) => println!("{}", describe(user, &state)),
            None => println!("user {user}: not in a challenge"),
        },
        Command::Recommend {
            user,
            length,
            tokens,
        } => match services.recommendations().recommend(user, length, tokens.as_slice()).await? {
            Recommendation::Courses(courses) => {
                println!("{} course(s)", courses.len());
                for course in courses {
                    println!(
                        "{}\t{}\tfailure_rate={}",
                        course.data_id, course.name, course.ranking_value
                    );
                }
            }
            Recommendation::NotFound => println!("not found: user {user} has no lives left"),
        },
        Command::Clear { user } => {
            let removed = manager.delete_state(user);
            services.persistence().persist_user(&store, user).await?;
            match removed {
                Some(_) => println!("user {user}: challenge cleared"),
                None => println!("user {user}: not in a challenge"),
            }
        }
    }

    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let parsed = Args::parse(std::env::args().skip(1), default_db_url()).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    telemetry::init_tracing();

    prepare_sqlite_file(&parsed.db_url)?;
    let services = AppServices::new_sqlite(&parsed.db_url, Clock::system()).await?;
    info!(target: "hundred", db_url = %parsed.db_url, sessions = services.store().len(), "Sessions restored");

    execute(&services, parsed.command).await?;

    let saved = services
        .persistence()
        .checkpoint(&services.store())
        .await?;
    info!(target: "hundred", saved, "Shutting down");
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, ArgsError> {
        Args::parse(
            args.iter().map(|s| (*s).to_string()),
            "sqlite://default.sqlite3".into(),
        )
    }

    #[test]
    fn parses_record_with_db_flag_anywhere() {
        let args = parse(&["record", "7", "--db", "sqlite:///tmp/h.sqlite3", "42", "fail"]).unwrap();
        assert_eq!(args.db_url, "sqlite:///tmp/h.sqlite3");
        assert_eq!(
            args.command,
            Command::Record {
                user: UserId::new(7),
                course: CourseId::new(42),
                success: false,
            }
        );
    }

    #[test]
    fn recommend_keeps_tokens_and_negative_length() {
        let args = parse(&["recommend", "3", "-3", "1", "0", "34", "0", "0"]).unwrap();
        assert_eq!(args.db_url, "sqlite://default.sqlite3");
        assert_eq!(
            args.command,
            Command::Recommend {
                user: UserId::new(3),
                length: -3,
                tokens: vec!["1".into(), "0".into(), "34".into(), "0".into(), "0".into()],
            }
        );
    }

    #[test]
    fn oversized_recommend_length_saturates() {
        let args = parse(&["recommend", "3", "99999999999999999999"]).unwrap();
        assert!(matches!(
            args.command,
            Command::Recommend { length: i64::MAX, .. }
        ));
        assert_eq!(services::clamp_result_length(i64::MAX), 25);

        let args = parse(&["recommend", "3", "-99999999999999999999"]).unwrap();
        assert!(matches!(
            args.command,
            Command::Recommend { length: i64::MIN, .. }
        ));

        assert_eq!(
            parse(&["recommend", "3", "ten"]).unwrap_err(),
            ArgsError::InvalidLength { raw: "ten".into() }
        );
    }

    #[test]
    fn rejects_bad_operands() {
        assert_eq!(parse(&[]).unwrap_err(), ArgsError::MissingCommand);
        assert_eq!(
            parse(&["start"]).unwrap_err(),
            ArgsError::MissingOperand {
                command: "start",
                operand: "user"
            }
        );
        assert_eq!(
            parse(&["status", "abc"]).unwrap_err(),
            ArgsError::InvalidUserId { raw: "abc".into() }
        );
        assert_eq!(
            parse(&["record", "1", "2", "maybe"]).unwrap_err(),
            ArgsError::InvalidResult {
                raw: "maybe".into()
            }
        );
        assert_eq!(
            parse(&["clear", "1", "2"]).unwrap_err(),
            ArgsError::ExtraOperand("2".into())
        );
        assert_eq!(
            parse(&["launch", "1"]).unwrap_err(),
            ArgsError::UnknownCommand("launch".into())
        );
        assert_eq!(
            parse(&["--verbose"]).unwrap_err(),
            ArgsError::UnknownArg("--verbose".into())
        );
    }

    #[test]
    fn relative_sqlite_paths_become_absolute() {
        let url = normalize_sqlite_url("sqlite:data/h.sqlite3".into());
        assert!(url.starts_with("sqlite:///"), "{url}");
        assert!(url.ends_with("data/h.sqlite3"), "{url}");
        assert_eq!(normalize_sqlite_url("sqlite::memory:".into()), "sqlite::memory:");
    }

    #[test]
    fn describe_reports_progress() {
        let mut state = ChallengeState::new(GameMode::HundredAttempt);
        state.apply_result(true);
        assert_eq!(
            describe(UserId::new(5), &state),
            "user 5: mode=100Man lives=100 cleared=1/1 last=clear outcome=active"
        );
    }
}
