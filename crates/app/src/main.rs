use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use interview_core::model::{InterviewMode, SessionId, TaskId, TaskLevel};
use services::{
    ChatReply, GradingSandbox, InterviewConfig, InterviewService, OpenAiAdvisor, SandboxConfig,
    SubmissionReply, TaskOffer,
};
use storage::{InMemoryCatalog, Storage};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidSessionId { raw: String },
    InvalidMode { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidSessionId { raw } => write!(f, "invalid --session value: {raw}"),
            ArgsError::InvalidMode { raw } => write!(f, "invalid --mode value: {raw}"),
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
    eprintln!("  interviewer [--session <uuid>] [--mode <TECH|HR>] [--catalog <tasks.json>]");
    eprintln!();
    eprintln!("Commands inside the session:");
    eprintln!("  /submit <task_id> <file>   grade a solution file");
    eprintln!("  /tasks                     list the task catalog");
    eprintln!("  /task <id>                 show one task");
    eprintln!("  /random [level]            draw a random task");
    eprintln!("  /mode <TECH|HR>            switch interview mode");
    eprintln!("  /reset                     start over");
    eprintln!("  /quit");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  INTERVIEW_SESSION_ID, INTERVIEW_MODE, INTERVIEW_CATALOG");
    eprintln!("  INTERVIEW_AI_API_KEY, INTERVIEW_AI_BASE_URL, INTERVIEW_AI_MODEL,");
    eprintln!("  INTERVIEW_AI_TIMEOUT_SECS, INTERVIEW_AI_RETRIES");
    eprintln!("  INTERVIEW_SANDBOX_PYTHON, INTERVIEW_SANDBOX_TIMEOUT_SECS, INTERVIEW_SANDBOX_MEMORY_MB");
    eprintln!("  INTERVIEW_SECRET_PHRASE, INTERVIEW_SESSION_IDLE_MINS, RUST_LOG");
}

#[derive(Debug, PartialEq, Eq)]
struct Args {
    session: SessionId,
    mode: InterviewMode,
    catalog: Option<PathBuf>,
}

impl Args {
    fn parse(
        args: &mut impl Iterator<Item = String>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ArgsError> {
        let mut session = match env("INTERVIEW_SESSION_ID") {
            Some(raw) => parse_session(raw)?,
            None => SessionId::new(),
        };
        let mut mode = match env("INTERVIEW_MODE") {
            Some(raw) => parse_mode(raw)?,
            None => InterviewMode::default(),
        };
        let mut catalog = env("INTERVIEW_CATALOG").map(PathBuf::from);

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--session" => session = parse_session(require_value(args, "--session")?)?,
                "--mode" => mode = parse_mode(require_value(args, "--mode")?)?,
                "--catalog" => catalog = Some(PathBuf::from(require_value(args, "--catalog")?)),
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            session,
            mode,
            catalog,
        })
    }
}

fn parse_session(raw: String) -> Result<SessionId, ArgsError> {
    raw.trim()
        .parse()
        .map_err(|_| ArgsError::InvalidSessionId { raw })
}

fn parse_mode(raw: String) -> Result<InterviewMode, ArgsError> {
    raw.parse().map_err(|_| ArgsError::InvalidMode { raw })
}

const DEFAULT_IDLE_MINS: i64 = 60;

/// Idle window after which stored sessions are dropped.
fn idle_window(raw: Option<String>) -> chrono::Duration {
    let mins = raw
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .filter(|mins| *mins > 0)
        .unwrap_or(DEFAULT_IDLE_MINS);
    chrono::Duration::minutes(mins)
}

/// One line typed at the prompt.
#[derive(Debug, PartialEq, Eq)]
enum Input {
    Chat(String),
    Submit { task_id: TaskId, path: PathBuf },
    Tasks,
    Task(TaskId),
    Random(Option<TaskLevel>),
    Mode(String),
    Reset,
    Help,
    Quit,
}

impl Input {
    fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let Some(command) = line.strip_prefix('/') else {
            return Ok(Self::Chat(line.to_owned()));
        };

        let mut parts = command.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let rest: Vec<&str> = parts.collect();
        match (name, rest.as_slice()) {
            ("quit" | "exit", []) => Ok(Self::Quit),
            ("help", []) => Ok(Self::Help),
            ("tasks", []) => Ok(Self::Tasks),
            ("reset", []) => Ok(Self::Reset),
            ("task", [id]) => task_id(id).map(Self::Task),
            ("random", []) => Ok(Self::Random(None)),
            ("random", [level]) => TaskLevel::from_digit(level)
                .map(|level| Self::Random(Some(level)))
                .ok_or_else(|| format!("level must be 1-4, got {level}")),
            ("mode", [mode]) => Ok(Self::Mode((*mode).to_owned())),
            ("submit", [id, path]) => Ok(Self::Submit {
                task_id: task_id(id)?,
                path: PathBuf::from(path),
            }),
            _ => Err(format!("unknown or malformed command: /{command} (try /help)")),
        }
    }
}

fn task_id(raw: &str) -> Result<TaskId, String> {
    TaskId::new(raw).ok_or_else(|| "task id must not be empty".to_owned())
}

fn print_offer(offer: &TaskOffer) {
    println!("\n[next task: {}]", offer.task_id);
    if !offer.description.is_empty() {
        println!("{}", offer.description);
    }
    if !offer.template.is_empty() {
        println!("```python\n{}\n```", offer.template);
    }
}

fn print_chat(reply: &ChatReply) {
    println!("{}", reply.answer);
    if let Some(offer) = &reply.next_task {
        print_offer(offer);
    }
    if let Some(assessment) = &reply.assessment {
        println!("\n[overall: {}% - {}]", assessment.overall(), assessment.band().label());
    }
    if reply.is_final {
        println!("\n[interview finished, session reset]");
    }
}

fn print_submission(reply: &SubmissionReply) {
    let status = if reply.success { "passed" } else { "failed" };
    println!("Tests {status}:");
    for line in &reply.results {
        println!("  {line}");
    }
    println!("\n{}", reply.llm_feedback);
    if let Some(offer) = &reply.next_task {
        print_offer(offer);
    }
    if let Some(assessment) = &reply.assessment {
        println!("\n[overall: {}% - {}]", assessment.overall(), assessment.band().label());
    }
    if reply.is_final {
        println!("\n[interview finished, session reset]");
    }
}

async fn dispatch(
    service: &InterviewService,
    args: &Args,
    input: Input,
) -> Result<bool, Box<dyn std::error::Error>> {
    let id = args.session;
    match input {
        Input::Quit => return Ok(false),
        Input::Help => print_usage(),
        Input::Chat(message) if message.is_empty() => {}
        Input::Chat(message) => print_chat(&service.chat(id, &message, None).await?),
        Input::Submit { task_id, path } => {
            let code = tokio::fs::read_to_string(&path).await?;
            print_submission(&service.submit_code(id, &code, &task_id).await?);
        }
        Input::Tasks => {
            for task in service.list_tasks().await? {
                println!("[{}] {:<28} {}", task.level.value(), task.id, task.title);
            }
        }
        Input::Task(task_id) => {
            let task = service.task(&task_id).await?;
            println!("{} ({}, level {})", task.title(), task.id(), task.level().value());
            println!("{}", task.description());
            println!("```python\n{}\n```", task.template());
        }
        Input::Random(level) => match service.random_task(level).await? {
            Some(task) => println!("{} ({}): {}", task.id(), task.level().name(), task.title()),
            None => println!("no task available"),
        },
        Input::Mode(name) => {
            let mode = service.set_mode(id, &name).await?;
            println!("mode set to {}", mode.as_str());
        }
        Input::Reset => {
            service.reset(id).await?;
            service.set_mode(id, args.mode.as_str()).await?;
            println!("session reset");
        }
    }
    Ok(true)
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);
    let args = Args::parse(&mut argv, |key| std::env::var(key).ok()).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let catalog = match &args.catalog {
        Some(path) => InMemoryCatalog::from_json(&tokio::fs::read_to_string(path).await?)?,
        None => InMemoryCatalog::builtin()?,
    };
    tracing::info!(tasks = catalog.len(), "catalog loaded");
    let storage = Storage::with_catalog(catalog);

    let advisor = OpenAiAdvisor::from_env();
    if !advisor.enabled() {
        tracing::warn!("INTERVIEW_AI_API_KEY is not set; advisor replies will fail");
    }
    let service = InterviewService::new(
        storage,
        Arc::new(advisor),
        GradingSandbox::new(SandboxConfig::from_env()),
    )
    .with_config(InterviewConfig::from_env());
    service.set_mode(args.session, args.mode.as_str()).await?;
    let max_idle = idle_window(std::env::var("INTERVIEW_SESSION_IDLE_MINS").ok());

    eprintln!("session {} ({}); /help for commands", args.session, args.mode.as_str());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let input = match Input::parse(&line) {
            Ok(input) => input,
            Err(message) => {
                eprintln!("{message}");
                continue;
            }
        };
        match dispatch(&service, &args, input).await {
            Ok(true) => {}
            Ok(false) => break,
            // The session survives a failed turn; report and keep reading.
            Err(err) => eprintln!("error: {err}"),
        }
        if let Err(err) = service.evict_idle(max_idle).await {
            tracing::warn!(error = %err, "idle eviction failed");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn args_read_flags_over_env() {
        let id = SessionId::new();
        let env = |key: &str| (key == "INTERVIEW_MODE").then(|| "hr".to_owned());
        let mut argv = vec!["--session".to_owned(), id.to_string()].into_iter();

        let args = Args::parse(&mut argv, env).unwrap();
        assert_eq!(args.session, id);
        assert_eq!(args.mode, InterviewMode::Hr);
        assert_eq!(args.catalog, None);

        let mut argv = vec!["--mode".to_owned(), "TECH".to_owned()].into_iter();
        assert_eq!(Args::parse(&mut argv, env).unwrap().mode, InterviewMode::Tech);
    }

    #[test]
    fn args_reject_bad_values() {
        let mut argv = vec!["--session".to_owned(), "nope".to_owned()].into_iter();
        assert!(matches!(
            Args::parse(&mut argv, no_env),
            Err(ArgsError::InvalidSessionId { .. })
        ));

        let mut argv = vec!["--mode".to_owned()].into_iter();
        assert!(matches!(
            Args::parse(&mut argv, no_env),
            Err(ArgsError::MissingValue { flag: "--mode" })
        ));

        let mut argv = vec!["--verbose".to_owned()].into_iter();
        assert!(matches!(Args::parse(&mut argv, no_env), Err(ArgsError::UnknownArg(_))));
    }

    #[test]
    fn idle_window_falls_back_to_an_hour() {
        assert_eq!(idle_window(None), chrono::Duration::minutes(60));
        assert_eq!(idle_window(Some(" 15 ".into())), chrono::Duration::minutes(15));
        assert_eq!(idle_window(Some("0".into())), chrono::Duration::minutes(60));
        assert_eq!(idle_window(Some("soon".into())), chrono::Duration::minutes(60));
    }

    #[test]
    fn input_commands() {
        assert_eq!(Input::parse("  hello "), Ok(Input::Chat("hello".into())));
        assert_eq!(Input::parse("/quit"), Ok(Input::Quit));
        assert_eq!(
            Input::parse("/submit sum_array ./solution.py"),
            Ok(Input::Submit {
                task_id: TaskId::new("sum_array").unwrap(),
                path: PathBuf::from("./solution.py"),
            })
        );
        assert_eq!(
            Input::parse("/random 3"),
            Ok(Input::Random(TaskLevel::try_from(3).ok()))
        );
        assert_eq!(Input::parse("/mode hr"), Ok(Input::Mode("hr".into())));
        assert!(Input::parse("/random 9").is_err());
        assert!(Input::parse("/submit only_id").is_err());
        assert!(Input::parse("/dance").is_err());
    }
}
