//! Podlens CLI
//!
//! Sends natural-language questions about cluster resource usage to the
//! podlens query service and prints the answers.

mod client;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use client::QueryClient;
use output::Spinner;
use tokio::io::{AsyncBufReadExt, BufReader};

const EXIT_COMMAND: &str = "exit";

/// Podlens CLI
#[derive(Parser)]
#[command(name = "podlens")]
#[command(author, version, about = "Ask questions about pod resource usage", long_about = None)]
struct Cli {
    /// Query service URL
    #[arg(long, env = "PODLENS_URL", default_value = "http://localhost:30010")]
    url: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Ask a single question and exit
    Ask {
        /// The question, e.g. "which pod uses the most memory"
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },

    /// Ask questions interactively (default)
    Repl,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = QueryClient::new(&cli.url)?;

    match cli.command.unwrap_or(Command::Repl) {
        Command::Ask { question } => {
            if !ask(&client, &question.join(" ")).await {
                std::process::exit(1);
            }
        }
        Command::Repl => repl(&client).await?,
    }

    Ok(())
}

/// Ask one question, printing the answer or the error
async fn ask(client: &QueryClient, question: &str) -> bool {
    let spinner = Spinner::start("Retrieving output");
    let result = client.ask(question).await;
    spinner.stop().await;

    match result {
        Ok(answer) => {
            output::print_answer(&answer);
            true
        }
        Err(e) => {
            output::print_error(&e.to_string());
            false
        }
    }
}

async fn repl(client: &QueryClient) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        println!();
        output::print_prompt(&format!("Enter query ('{}' to leave):", EXIT_COMMAND));

        let line = match lines.next_line().await? {
            Some(line) => line,
            None => break,
        };
        let question = line.trim();

        if question == EXIT_COMMAND {
            break;
        }
        if question.is_empty() {
            continue;
        }

        ask(client, question).await;
    }

    output::print_info("Goodbye.");
    Ok(())
}
