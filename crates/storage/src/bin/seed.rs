use std::fmt;

use chrono::{DateTime, Duration, Utc};
use hundred_core::model::{CourseId, UserId};
use storage::repository::{NewCourseRecord, RankedCourse};
use storage::sqlite::SqliteRepository;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    courses: u32,
    first_data_id: u64,
    owner: UserId,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidCourses { raw: String },
    InvalidDataId { raw: String },
    InvalidOwner { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidCourses { raw } => write!(f, "invalid --courses value: {raw}"),
            ArgsError::InvalidDataId { raw } => write!(f, "invalid --first-data-id value: {raw}"),
            ArgsError::InvalidOwner { raw } => write!(f, "invalid --owner value: {raw}"),
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
            }
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

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("HUNDRED_DB_URL").unwrap_or_else(|_| "sqlite:hundred.sqlite3".into());
        let mut courses = std::env::var("HUNDRED_SEED_COURSES")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(40);
        let mut first_data_id = 1_u64;
        let mut owner = UserId::new(1_000);
        let mut now: Option<DateTime<Utc>> = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--courses" => {
                    let value = require_value(&mut args, "--courses")?;
                    courses = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidCourses { raw: value.clone() })?;
                }
                "--first-data-id" => {
                    let value = require_value(&mut args, "--first-data-id")?;
                    first_data_id = value
                        .parse::<u64>()
                        .map_err(|_| ArgsError::InvalidDataId { raw: value.clone() })?;
                }
                "--owner" => {
                    let value = require_value(&mut args, "--owner")?;
                    owner = value
                        .parse::<UserId>()
                        .map_err(|_| ArgsError::InvalidOwner { raw: value.clone() })?;
                }
                "--now" => {
                    let value = require_value(&mut args, "--now")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidNow { raw: value.clone() })?
                        .with_timezone(&Utc);
                    now = Some(parsed);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            courses,
            first_data_id,
            owner,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:hundred.sqlite3)");
    eprintln!("  --courses <n>             Number of courses to insert (default: 40)");
    eprintln!("  --first-data-id <id>      Data id of the first inserted course (default: 1)");
    eprintln!("  --owner <pid>             Owner pid for every course (default: 1000)");
    eprintln!("  --now <rfc3339>           Fixed current time for deterministic seeding");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  HUNDRED_DB_URL, HUNDRED_SEED_COURSES");
}

/// Spread failure rates across 0..=100 so every difficulty bucket gets courses.
fn failure_rate_for(index: u32) -> i64 {
    i64::from(index.wrapping_mul(37) % 101)
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let repo = SqliteRepository::connect(&args.db_url).await?;
    repo.migrate().await?;
    let now = args.now.unwrap_or_else(Utc::now);

    for i in 0..args.courses {
        let data_id = args.first_data_id + u64::from(i);
        let created = now - Duration::days(i64::from(i));
        let course = RankedCourse {
            data_id: CourseId::new(data_id),
            owner: args.owner,
            size: 40_000 + i * 16,
            name: format!("Seed Course {data_id}"),
            data_type: 1,
            meta_binary: Vec::new(),
            permission: 0,
            permission_recipients: Vec::new(),
            delete_permission: 3,
            delete_permission_recipients: Vec::new(),
            period: 64_306,
            refer_data_id: 0,
            flag: 256,
            tags: Vec::new(),
            creation_date: created,
            update_date: created,
            ranking_value: failure_rate_for(i),
        };
        repo.insert_course(&NewCourseRecord::published(course)).await?;
    }

    println!(
        "Seeded {} courses starting at data id {} into {}",
        args.courses, args.first_data_id, args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
