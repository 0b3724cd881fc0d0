//! # rostrum
//!
//! Interview session server binary. Loads the question bank, wires the
//! session core to the WebSocket listeners and runs until ctrl-c.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use rostrum_core::questions::QuestionBank;
use rostrum_grader::HeuristicGrader;
use rostrum_server::ServerConfig;
use rostrum_session::SessionController;
use rostrum_telemetry::{init_telemetry, TelemetryConfig};

/// Live technical-interview coordinator.
#[derive(Parser, Debug)]
#[command(name = "rostrum", about = "Live technical-interview coordinator")]
struct Cli {
    /// Host to bind both listeners on.
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Candidate channel port (0 for auto-assign).
    #[arg(long, default_value_t = 9009)]
    candidate_port: u16,

    /// Interviewer channel port (0 for auto-assign).
    #[arg(long, default_value_t = 9008)]
    interviewer_port: u16,

    /// JSON question file. The built-in bank is used when omitted.
    #[arg(long)]
    questions: Option<PathBuf>,

    /// Default log level. `RUST_LOG` takes precedence.
    #[arg(long, default_value = "info")]
    log_level: tracing::Level,

    /// Emit JSON log lines.
    #[arg(long)]
    json_logs: bool,

    /// Disable advisory scoring of candidate answers.
    #[arg(long)]
    no_advisor: bool,
}

fn load_bank(path: Option<&PathBuf>) -> Result<QuestionBank> {
    match path {
        Some(path) => QuestionBank::load(path)
            .with_context(|| format!("Failed to load questions from {}", path.display())),
        None => Ok(QuestionBank::builtin()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let telemetry = init_telemetry(TelemetryConfig {
        log_level: cli.log_level,
        json: cli.json_logs,
        ..TelemetryConfig::default()
    });

    let bank = Arc::new(load_bank(cli.questions.as_ref())?);
    tracing::info!(questions = bank.len(), "question bank loaded");

    let mut controller = SessionController::new(bank);
    if !cli.no_advisor {
        controller = controller.with_advisor(Arc::new(HeuristicGrader::new()));
    }

    let config = ServerConfig {
        host: cli.host,
        candidate_port: cli.candidate_port,
        interviewer_port: cli.interviewer_port,
        ..ServerConfig::default()
    };
    let handle = rostrum_server::start(config, controller, &telemetry)
        .await
        .context("Failed to start server")?;

    tracing::info!(
        candidate_port = handle.candidate_port,
        interviewer_port = handle.interviewer_port,
        advisor = !cli.no_advisor,
        "rostrum ready"
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl+c")?;

    tracing::info!("shutting down");
    handle.shutdown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = Cli::parse_from(["rostrum"]);
        assert_eq!(cli.candidate_port, 9009);
        assert_eq!(cli.interviewer_port, 9008);
        assert_eq!(cli.log_level, tracing::Level::INFO);
        assert!(!cli.no_advisor);
        assert!(cli.questions.is_none());
    }

    #[test]
    fn flags_parse() {
        let cli = Cli::parse_from([
            "rostrum",
            "--candidate-port",
            "0",
            "--log-level",
            "debug",
            "--json-logs",
            "--no-advisor",
            "--questions",
            "bank.json",
        ]);
        assert_eq!(cli.candidate_port, 0);
        assert_eq!(cli.log_level, tracing::Level::DEBUG);
        assert!(cli.json_logs && cli.no_advisor);
        assert_eq!(cli.questions, Some(PathBuf::from("bank.json")));
    }

    #[test]
    fn missing_question_file_is_an_error() {
        let err = load_bank(Some(&PathBuf::from("/nonexistent/rostrum.json"))).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/rostrum.json"));
    }
}
