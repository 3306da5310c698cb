//! Group Chat CLI - AI group discussion in the terminal
//!
//! Asks a question to a roster of LLM participants, prints each turn as it
//! arrives and finishes with the moderator's summary.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use groupchat_core::probe::probe_roster;
use groupchat_core::{
    parse_rounds, CompletionClient, Config, DiscussionEvent, DiscussionOrchestrator,
    DiscussionRequest, GroupChatError, OpenAiCompletionClient, Roster, Turn, TurnKind,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "groupchat",
    version,
    about = "AI Group Chat - let several LLMs discuss your question",
    long_about = "Runs a round-based discussion between LLM participants on an OpenAI-compatible API and closes with a moderator summary."
)]
struct Cli {
    /// The question to discuss (prompted for if omitted)
    #[arg(value_name = "QUESTION")]
    question: Option<String>,

    /// Number of discussion rounds (prompted for if omitted; empty input uses the default)
    #[arg(short, long, value_name = "ROUNDS")]
    rounds: Option<String>,

    /// Path to a TOML config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Send a one-line prompt to every participant's model and exit
    #[arg(long)]
    probe: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::resolve(cli.config.as_deref())?;
    let roster = config.roster()?;

    let client = match OpenAiCompletionClient::with_retries(
        &config.backend,
        config.discussion.strip_reasoning,
    ) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    };

    if cli.probe {
        return run_probe(client.as_ref(), &roster, &config.prompts.probe).await;
    }

    print_banner(&roster);

    let question = match cli.question {
        Some(q) => q,
        None => prompt_line("\nQuestion for the group: ")?,
    };
    let rounds_input = match cli.rounds {
        Some(r) => r,
        None => prompt_line(&format!(
            "How many rounds? (Enter for {}): ",
            config.discussion.default_rounds
        ))?,
    };
    let rounds = parse_rounds(Some(&rounds_input), config.discussion.default_rounds);

    let orchestrator = DiscussionOrchestrator::from_config(client, &config)?;
    let session = match orchestrator.start(DiscussionRequest::new(question, rounds)) {
        Ok(session) => session,
        Err(GroupChatError::InvalidInput(msg)) => {
            eprintln!("{} {}", "Error:".red().bold(), msg);
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    // Ctrl-C stops the discussion after the current call; turns so far stay printed.
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping discussion");
            on_interrupt.cancel();
        }
    });

    info!(rounds, "discussion started");
    let mut session = session.with_cancellation(cancel);
    while let Some(event) = session.next_event().await {
        print_event(&orchestrator, event);
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// Print `prompt` and read one trimmed line from stdin.
fn prompt_line(prompt: &str) -> io::Result<String> {
    print!("{}", prompt.bold());
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

async fn run_probe(
    client: &dyn CompletionClient,
    roster: &Roster,
    prompt: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", "Probing participant models...".bold());
    println!();

    let outcomes = probe_roster(client, roster, prompt).await;
    for outcome in &outcomes {
        let p = &outcome.participant;
        match &outcome.result {
            Ok(text) => println!(
                "  {} {} ({}): {}",
                "✔".bright_green(),
                p.name.bright_cyan(),
                p.model.dimmed(),
                text
            ),
            Err(e) => println!(
                "  {} {} ({}): {}",
                "✘".bright_red(),
                p.name.bright_cyan(),
                p.model.dimmed(),
                e.to_string().red()
            ),
        }
    }

    let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
    println!();
    if failed == 0 {
        println!("{}", "All models responded.".bright_green().bold());
        Ok(())
    } else {
        Err(format!("{} of {} models failed", failed, outcomes.len()).into())
    }
}

fn print_banner(roster: &Roster) {
    println!();
    println!("{}", "═".repeat(60).bright_blue());
    println!("{}", "  AI Group Chat".bright_blue().bold());
    println!("{}", "═".repeat(60).bright_blue());
    println!();
    println!("{}", "Participants:".bold());
    for (i, p) in roster.participants().iter().enumerate() {
        println!("  {}. {} - using {}", i + 1, p.label().bright_cyan(), p.model.dimmed());
    }
}

fn print_event(orchestrator: &DiscussionOrchestrator, event: DiscussionEvent) {
    match event {
        DiscussionEvent::RoundStarted { round, total } => {
            println!();
            println!("{}", "═".repeat(60).bright_magenta());
            println!(
                "{}",
                format!("  📢 Round {} of {}", round, total).bright_magenta().bold()
            );
            println!("{}", "═".repeat(60).bright_magenta());
        }
        DiscussionEvent::Composing { speaker, .. } => {
            println!();
            println!("{}", format!("{} is thinking...", speaker).dimmed());
        }
        DiscussionEvent::Summarizing { .. } => {
            println!();
            println!("{}", "═".repeat(60).bright_yellow());
            println!("{}", "  📋 Summary".bright_yellow().bold());
            println!("{}", "═".repeat(60).bright_yellow());
        }
        DiscussionEvent::Turn(turn) => print_turn(orchestrator, &turn),
        DiscussionEvent::Cancelled => {
            println!();
            println!("{}", "  Discussion cancelled.".yellow().bold());
        }
        DiscussionEvent::Finished => {
            println!();
            println!("{}", "═".repeat(60).bright_blue());
            println!("{}", "  Discussion concluded.".bright_green().bold());
            println!("{}", "═".repeat(60).bright_blue());
            println!();
        }
    }
}

fn print_turn(orchestrator: &DiscussionOrchestrator, turn: &Turn) {
    let emoji = orchestrator
        .presentation_for(turn)
        .and_then(|p| p.emoji.as_deref())
        .unwrap_or(match turn.kind {
            TurnKind::User => "👤",
            _ => "",
        });
    let label = if emoji.is_empty() {
        turn.speaker.clone()
    } else {
        format!("{} {}", emoji, turn.speaker)
    };

    if turn.kind == TurnKind::User {
        println!();
    }
    println!("{}：", label.bright_cyan().bold());
    for line in turn_lines(turn, 66) {
        println!("  {}", line);
    }
}

/// Wrap the turn's text to `width` columns, then color each line.
fn turn_lines(turn: &Turn, width: usize) -> Vec<String> {
    textwrap(&turn.text, width)
        .lines()
        .map(|line| {
            if turn.kind.is_failure() {
                line.red().to_string()
            } else if turn.kind == TurnKind::Summary {
                line.bright_white().to_string()
            } else {
                line.to_string()
            }
        })
        .collect()
}

/// Wrap on whitespace, or at character count for text without spaces (e.g. Chinese).
fn textwrap(text: &str, width: usize) -> String {
    let mut result = String::new();
    for (n, paragraph) in text.lines().enumerate() {
        if n > 0 {
            result.push('\n');
        }
        let mut current_line_len = 0;
        for word in paragraph.split_whitespace() {
            let word_len = word.chars().count();
            if current_line_len + word_len + 1 > width && current_line_len > 0 {
                result.push('\n');
                current_line_len = 0;
            }
            if current_line_len > 0 {
                result.push(' ');
                current_line_len += 1;
            }
            for ch in word.chars() {
                if current_line_len >= width {
                    result.push('\n');
                    current_line_len = 0;
                }
                result.push(ch);
                current_line_len += 1;
            }
        }
    }
    result
}
