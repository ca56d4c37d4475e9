//! tutor – terminal client for tutor-server.
//!
//! Asks one question when given on the command line, otherwise runs a
//! line-oriented REPL.  Answers stream to stdout as they arrive; with
//! `--html` the whole conversation is also rendered to an HTML file after
//! every turn.

mod client;
mod transcript;

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;
use tutor_types::{Conversation, ConversationError, NETWORK_ERROR_MESSAGE};

use crate::client::{ClientError, SolveClient, read_frames};

#[derive(Debug, Parser)]
#[command(name = "tutor", version, about = "Ask tutor-server for worked solutions")]
struct Args {
    /// Base URL of tutor-server.
    #[arg(long, env = "TUTOR_SERVER", default_value = "http://127.0.0.1:3000")]
    server: String,

    /// Write the rendered conversation to this HTML file after each answer.
    #[arg(long)]
    html: Option<PathBuf>,

    /// Connection timeout in seconds.
    #[arg(long, default_value_t = 10)]
    connect_timeout: u64,

    /// Ask this question and exit instead of starting the REPL.
    question: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let client = SolveClient::new(&args.server, Duration::from_secs(args.connect_timeout))?;
    let mut conversation = Conversation::new();

    if let Some(question) = &args.question {
        let ok = ask(&client, &mut conversation, question).await;
        save_transcript(&args, &conversation)?;
        if !ok {
            std::process::exit(1);
        }
        return Ok(());
    }

    eprintln!("質問を入力してください。/clear で履歴を消去、/quit で終了します。");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        eprint!("> ");
        std::io::stderr().flush().ok();

        let Some(line) = lines.next_line().await.context("reading stdin")? else {
            break;
        };
        match line.trim() {
            "/quit" | "/exit" => break,
            "/clear" => {
                conversation.clear();
                eprintln!("(履歴を消去しました)");
            }
            _ => {
                ask(&client, &mut conversation, &line).await;
                save_transcript(&args, &conversation)?;
            }
        }
    }
    Ok(())
}

/// Run one question through the conversation.  Returns `false` on failure.
async fn ask(client: &SolveClient, conversation: &mut Conversation, question: &str) -> bool {
    let ticket = match conversation.submit(question) {
        Ok(ticket) => ticket,
        Err(ConversationError::EmptyQuestion) => return true,
        Err(e @ ConversationError::Busy) => {
            eprintln!("{e}");
            return false;
        }
    };

    let result = async {
        let resp = client.open(question).await?;
        conversation.response_started(ticket);
        eprintln!("考え中...");

        let mut stdout = std::io::stdout();
        let body = std::pin::pin!(resp.bytes_stream());
        read_frames(body, |fragment| {
            if conversation.push_chunk(ticket, fragment) {
                let _ = stdout.write_all(fragment.as_bytes());
                let _ = stdout.flush();
            }
        })
        .await
    }
    .await;

    println!();
    match result {
        Ok(()) => {
            conversation.finish(ticket);
            true
        }
        Err(e) => {
            match &e {
                ClientError::RateLimited { .. } | ClientError::Rejected { .. } => {
                    eprintln!("{e}");
                }
                _ => warn!(error = %e, "solve request failed"),
            }
            conversation.fail(ticket);
            println!("{NETWORK_ERROR_MESSAGE}");
            false
        }
    }
}

fn save_transcript(args: &Args, conversation: &Conversation) -> Result<()> {
    if let Some(path) = &args.html {
        transcript::write(path, conversation.history())
            .with_context(|| format!("writing transcript to {}", path.display()))?;
    }
    Ok(())
}
