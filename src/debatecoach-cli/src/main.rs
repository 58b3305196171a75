//! DebateCoach CLI - reading debate tutor
//!
//! Debate a book topic against an AI over six rounds, generate debate topics
//! and reading quizzes, and get feedback on reading essays.

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use debatecoach_core::book::Book;
use debatecoach_core::{
    Config, DebateError, DebateEvent, DebateOrchestrator, DebateState, OpenAiCompletion,
    SessionStore, Side, Speaker, default_config, feedback, quiz, topics,
};
use std::env;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

/// The CLI drives a single user context.
const SESSION_ID: &str = "cli";

type InputLines = Lines<BufReader<Stdin>>;

#[derive(Parser)]
#[command(
    name = "debatecoach",
    version,
    about = "Reading debate tutor - argue a book topic against an AI",
    long_about = "A CLI reading tutor: six-round debates, debate topics, quizzes and essay feedback using OpenAI-compatible APIs."
)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Debate a topic over six rounds, then get a 100-point verdict
    Debate(DebateArgs),
    /// Suggest debate topics for a book
    Topics(BookArgs),
    /// Take a generated reading quiz
    Quiz(BookArgs),
    /// Get feedback on a reading essay
    Feedback(FeedbackArgs),
}

#[derive(Args)]
struct DebateArgs {
    /// The topic to debate (generated from --title when omitted)
    #[arg(value_name = "TOPIC")]
    topic: Option<String>,

    /// The side you argue
    #[arg(short, long, value_enum, default_value = "pro")]
    side: SideArg,

    /// Book to draw a topic from when no TOPIC is given
    #[arg(long, value_name = "TITLE")]
    title: Option<String>,

    /// File containing the book synopsis
    #[arg(long, value_name = "FILE")]
    synopsis_file: Option<PathBuf>,

    /// Write the transcript as JSON when the debate ends
    #[arg(long, value_name = "FILE")]
    save: Option<PathBuf>,
}

#[derive(Args)]
struct BookArgs {
    /// Book title
    #[arg(long, value_name = "TITLE")]
    title: String,

    /// File containing the book synopsis
    #[arg(long, value_name = "FILE")]
    synopsis_file: Option<PathBuf>,
}

#[derive(Args)]
struct FeedbackArgs {
    /// Book title
    #[arg(long, value_name = "TITLE")]
    title: Option<String>,

    /// File containing the book synopsis
    #[arg(long, value_name = "FILE")]
    synopsis_file: Option<PathBuf>,

    /// File containing the essay
    #[arg(long, value_name = "FILE")]
    essay_file: PathBuf,
}

#[derive(Clone, Copy, ValueEnum)]
enum SideArg {
    Pro,
    Con,
}

impl From<SideArg> for Side {
    fn from(side: SideArg) -> Self {
        match side {
            SideArg::Pro => Side::Pro,
            SideArg::Con => Side::Con,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => default_config(),
    };

    // Get API configuration from environment
    let api_base = env::var("OPENAI_API_BASE")
        .or_else(|_| env::var("OPENAI_BASE_URL"))
        .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());

    let api_key = env::var("OPENAI_API_KEY").unwrap_or_else(|_| {
        eprintln!(
            "{}",
            "Warning: OPENAI_API_KEY not set. API calls may fail.".yellow()
        );
        String::new()
    });

    tracing::info!(model = %config.completion.model, api_base = %api_base, "using completion service");
    let service = Arc::new(OpenAiCompletion::new(api_base, api_key, &config.completion)?);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    match cli.command {
        Command::Debate(args) => run_debate(args, &config, service, &mut lines).await,
        Command::Topics(args) => {
            let book = load_book(args.title, args.synopsis_file)?;
            let proposed = topics::generate_topics(service.as_ref(), &config, &book).await?;
            println!("{} {}", "Debate topics for".bold(), book.title.bright_white());
            for topic in proposed {
                println!("  - {}", topic);
            }
            Ok(())
        }
        Command::Quiz(args) => run_quiz(args, &config, service.as_ref(), &mut lines).await,
        Command::Feedback(args) => {
            let essay = fs::read_to_string(&args.essay_file)?;
            let book = match args.title {
                Some(title) => Some(load_book(title, args.synopsis_file)?),
                None => {
                    println!(
                        "{}",
                        "No book selected; feedback will cover the essay only.".dimmed()
                    );
                    None
                }
            };
            let text =
                feedback::essay_feedback(service.as_ref(), &config, book.as_ref(), &essay)
                    .await?;
            print_heading("Feedback");
            print_wrapped(&text);
            Ok(())
        }
    }
}

async fn run_debate(
    args: DebateArgs,
    config: &Config,
    service: Arc<OpenAiCompletion>,
    lines: &mut InputLines,
) -> Result<(), Box<dyn std::error::Error>> {
    let topic = match (args.topic, args.title) {
        (Some(topic), _) => topic,
        (None, Some(title)) => {
            let book = load_book(title, args.synopsis_file)?;
            let proposed = topics::generate_topics(service.as_ref(), config, &book).await?;
            proposed.into_iter().next().ok_or(DebateError::NoTopics)?
        }
        (None, None) => return Err("Give a TOPIC or a book --title to draw one from.".into()),
    };

    let orchestrator =
        DebateOrchestrator::new(service, config).with_callback(create_console_callback());
    let store = SessionStore::new(orchestrator);
    store.start(SESSION_ID, &topic, args.side.into()).await?;
    println!("{}", "Type /reset to abandon the debate.".dimmed());

    loop {
        let Some(session) = store.snapshot(SESSION_ID).await else {
            break;
        };

        match session.state() {
            DebateState::ActiveRound(round) if session.awaiting_user() => {
                print!("{} ", format!("[{}] >", round).bright_green().bold());
                std::io::stdout().flush()?;

                let Some(line) = lines.next_line().await? else {
                    store.reset(SESSION_ID).await;
                    break;
                };
                if line.trim() == "/reset" {
                    store.reset(SESSION_ID).await;
                    println!("{}", "Debate reset.".yellow());
                    return Ok(());
                }

                match store.advance(SESSION_ID, Some(&line)).await {
                    Ok(_) => {}
                    Err(e @ DebateError::MissingStatement { .. }) => {
                        println!("{}", e.to_string().yellow());
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            DebateState::ActiveRound(_) => {
                if let Err(e) = store.advance(SESSION_ID, None).await {
                    if !confirm_retry(&e, lines).await? {
                        return Err(e.into());
                    }
                }
            }
            DebateState::Evaluating => {
                println!("{}", "  ... scoring the debate".dimmed());
                if let Err(e) = store.evaluate(SESSION_ID).await {
                    if !confirm_retry(&e, lines).await? {
                        return Err(e.into());
                    }
                }
            }
            DebateState::Evaluated | DebateState::NotStarted => break,
        }
    }

    if let (Some(path), Some(session)) = (args.save, store.snapshot(SESSION_ID).await) {
        fs::write(&path, serde_json::to_string_pretty(&session)?)?;
        println!("{} {}", "Transcript saved to".dimmed(), path.display());
    }

    Ok(())
}

async fn run_quiz(
    args: BookArgs,
    config: &Config,
    service: &OpenAiCompletion,
    lines: &mut InputLines,
) -> Result<(), Box<dyn std::error::Error>> {
    let book = load_book(args.title, args.synopsis_file)?;
    let generated = quiz::generate_quiz(service, config, &book).await?;

    print_heading(&format!("Reading quiz: {}", book.title));
    let mut answers = Vec::with_capacity(generated.items.len());
    for (i, item) in generated.items.iter().enumerate() {
        println!("{} {}", format!("Question {}:", i + 1).bold(), item.question);
        for (j, option) in item.options.iter().enumerate() {
            println!("  {}. {}", j + 1, option);
        }
        print!("{} ", "Your answer (number) >".bright_green());
        std::io::stdout().flush()?;

        let line = lines.next_line().await?.unwrap_or_default();
        let answer = line
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|n| item.options.get(n))
            .cloned()
            .unwrap_or_else(|| line.trim().to_string());
        answers.push(answer);
        println!();
    }

    println!(
        "{} {}/{}",
        "Correct:".bold(),
        generated.correct_count(&answers),
        generated.items.len()
    );
    let grading = quiz::grade_quiz(service, config, &generated, &answers).await?;
    print_heading("Marking and feedback");
    print_wrapped(&grading);
    Ok(())
}

/// Ask whether to retry after an upstream failure.
async fn confirm_retry(
    error: &DebateError,
    lines: &mut InputLines,
) -> Result<bool, Box<dyn std::error::Error>> {
    if !error.is_retryable() {
        return Ok(false);
    }
    eprintln!("{} {}", "Error:".red().bold(), error);
    print!("{} ", "Retry? [Y/n] >".yellow());
    std::io::stdout().flush()?;

    let answer = lines.next_line().await?.unwrap_or_default();
    Ok(!answer.trim().eq_ignore_ascii_case("n"))
}

fn load_book(title: String, synopsis_file: Option<PathBuf>) -> Result<Book, std::io::Error> {
    let mut book = Book::new(title);
    if let Some(path) = synopsis_file {
        book = book.with_synopsis(fs::read_to_string(path)?);
    }
    Ok(book)
}

/// Setup logging based on verbosity level
fn setup_logging(verbosity: u8) {
    use tracing_subscriber::EnvFilter;

    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();
}

/// Create a callback that prints debate events to the console.
fn create_console_callback() -> Box<dyn Fn(DebateEvent) + Send + Sync> {
    Box::new(move |event| match event {
        DebateEvent::DebateStart {
            topic,
            user_side,
            bot_side,
        } => {
            println!();
            println!("{}", "═".repeat(70).bright_blue());
            println!("{}", "  DebateCoach - Six-Round Debate".bright_blue().bold());
            println!("{}", "═".repeat(70).bright_blue());
            println!();
            println!("{} {}", "Topic:".bold(), topic.bright_white());
            println!(
                "{} {}   {} {}",
                "You:".bold(),
                user_side.display_name().yellow(),
                "AI:".bold(),
                bot_side.display_name().yellow()
            );
            println!("{}", "─".repeat(70).dimmed());
        }
        DebateEvent::RoundStart {
            round,
            speaker: Speaker::Bot,
        } => {
            println!("{}", format!("  ... {} is being prepared", round).dimmed());
        }
        DebateEvent::RoundStart { .. } => {}
        DebateEvent::TurnAppended {
            speaker: Speaker::Bot,
            round,
            content,
        } => {
            println!();
            println!(
                "{} {}",
                "▶".bright_cyan(),
                format!("AI - {}", round).bright_cyan().bold()
            );
            print_wrapped(&content);
            println!();
        }
        DebateEvent::TurnAppended { .. } => {
            // The user's own words are already on screen
        }
        DebateEvent::Evaluated { content } => {
            print_heading("Verdict");
            print_wrapped(&content);
        }
    })
}

fn print_heading(title: &str) {
    println!();
    println!("{}", "═".repeat(70).bright_magenta());
    println!("{}", format!("  {}", title).bright_magenta().bold());
    println!("{}", "═".repeat(70).bright_magenta());
    println!();
}

fn print_wrapped(text: &str) {
    for paragraph in text.lines() {
        for line in textwrap(paragraph, 66).lines() {
            println!("  {}", line);
        }
    }
}

/// Simple text wrapping function.
fn textwrap(text: &str, width: usize) -> String {
    let mut result = String::new();
    let mut current_line_len = 0;

    for word in text.split_whitespace() {
        if current_line_len + word.len() + 1 > width && current_line_len > 0 {
            result.push('\n');
            current_line_len = 0;
        }
        if current_line_len > 0 {
            result.push(' ');
            current_line_len += 1;
        }
        result.push_str(word);
        current_line_len += word.len();
    }

    result
}
