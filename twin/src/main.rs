//! `twin`: talk to the profile agent from the terminal.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use twin::bootstrap::{
    Overrides, TwinAgent, build_agent, build_sink, load_profile_for, load_settings,
};
use twin::exit_codes;
use twin::io::config::DEFAULT_CONFIG_FILE;
use twin::io::init::{InitOptions, init_workspace};
use twin::logging;
use twin::session::{LeadNotice, Session, TurnOutcome, TurnReply};

#[derive(Parser)]
#[command(
    name = "twin",
    version,
    about = "Recruiter-facing agent that answers from a structured profile"
)]
struct Cli {
    /// Path to the config file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Override the configured model name.
    #[arg(long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default config and a sample profile.
    Init {
        /// Overwrite existing files.
        #[arg(short, long)]
        force: bool,
    },
    /// Validate the config and profile, then list what the agent can answer from.
    Check,
    /// Answer a single message and exit.
    Ask {
        /// The message, as one or more words.
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
    },
    /// Interactive conversation on stdin.
    Chat,
}

fn main() {
    logging::init();
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let overrides = Overrides {
        model: cli.model.clone(),
    };
    match cli.command {
        Command::Init { force } => cmd_init(&cli.config, force),
        Command::Check => cmd_check(&cli.config, &overrides),
        Command::Ask { message } => cmd_ask(&cli.config, &overrides, &message.join(" ")),
        Command::Chat => cmd_chat(&cli.config, &overrides),
    }
}

fn cmd_init(config_path: &Path, force: bool) -> Result<i32> {
    let paths = init_workspace(config_path, &InitOptions { force })?;
    println!("wrote {}", paths.config_path.display());
    println!("profile {}", paths.profile_path.display());
    Ok(exit_codes::OK)
}

fn cmd_check(config_path: &Path, overrides: &Overrides) -> Result<i32> {
    let config = load_settings(config_path, overrides)?;
    let profile = load_profile_for(config_path, &config)?;
    let sink = build_sink(config_path, &config)?;
    println!("model: {} at {}", config.model.name, config.model.endpoint);
    println!("leads: {}", sink.describe());
    println!("sections: {}", profile.section_names().join(", "));
    println!("projects: {}", profile.project_names().join(", "));
    Ok(exit_codes::OK)
}

fn cmd_ask(config_path: &Path, overrides: &Overrides, message: &str) -> Result<i32> {
    let agent = load_agent(config_path, overrides)?;
    let mut session = Session::new();
    let reply = agent.run_turn(&mut session, message);
    print_reply(&reply);
    Ok(match reply.outcome {
        TurnOutcome::Done => exit_codes::OK,
        TurnOutcome::Aborted => exit_codes::ABORTED,
    })
}

fn cmd_chat(config_path: &Path, overrides: &Overrides) -> Result<i32> {
    let agent = load_agent(config_path, overrides)?;
    let mut session = Session::new();
    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("you> ");
        std::io::stdout().flush().context("flush stdout")?;
        let Some(line) = lines.next() else {
            break;
        };
        let line = line.context("read stdin")?;
        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if matches!(message, "/quit" | "/exit") {
            break;
        }
        let reply = agent.run_turn(&mut session, message);
        print_reply(&reply);
    }
    Ok(exit_codes::OK)
}

fn load_agent(config_path: &Path, overrides: &Overrides) -> Result<TwinAgent> {
    let config = load_settings(config_path, overrides)?;
    build_agent(config_path, &config)
}

fn print_reply(reply: &TurnReply) {
    println!("{}", reply.text);
    match &reply.lead {
        Some(LeadNotice::Captured { lead }) => {
            eprintln!("lead captured: {} ({}, {})", lead.name, lead.company, lead.role);
        }
        Some(LeadNotice::CaptureFailed { reason }) => {
            eprintln!("lead capture failed: {reason}");
        }
        None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_init_force() {
        let cli = Cli::parse_from(["twin", "init", "--force"]);
        assert!(matches!(cli.command, Command::Init { force: true }));
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_FILE));
    }

    #[test]
    fn parse_ask_joins_words_and_global_flags() {
        let cli = Cli::parse_from([
            "twin",
            "ask",
            "--config",
            "/tmp/twin.toml",
            "--model",
            "mistral",
            "what",
            "do",
            "you",
            "build?",
        ]);
        let Command::Ask { message } = cli.command else {
            panic!("expected ask");
        };
        assert_eq!(message.join(" "), "what do you build?");
        assert_eq!(cli.config, PathBuf::from("/tmp/twin.toml"));
        assert_eq!(cli.model.as_deref(), Some("mistral"));
    }

    #[test]
    fn ask_requires_a_message() {
        assert!(Cli::try_parse_from(["twin", "ask"]).is_err());
    }
}
