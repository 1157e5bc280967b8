use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dialoguer::{Input, Select};
use docqa_core::{Answer, Config, Pipeline, RebuildReport};

/// Ask questions about a directory of PDF documents.
#[derive(Parser, Debug)]
#[command(name = "docqa", version, about)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(
        long,
        global = true,
        env = "DOCQA_CONFIG",
        default_value = "config/default.toml"
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load documents, embed them and replace the vector index.
    Rebuild,
    /// Answer one question and print its sources.
    Ask {
        /// Model profile name; defaults to the first configured profile.
        #[arg(long, short)]
        model: Option<String>,
        question: String,
    },
    /// List configured model profiles.
    Models,
    /// Interactive menu.
    Chat,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_subscriber();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?;
    let pipeline = Pipeline::from_config(&config).context("failed to initialise pipeline")?;

    match cli.command.unwrap_or(Command::Chat) {
        Command::Rebuild => {
            let report = pipeline.rebuild().await?;
            print_report(&report);
        }
        Command::Ask { model, question } => {
            let answer = pipeline.ask(&question, model.as_deref()).await?;
            print_answer(&answer);
        }
        Command::Models => print_models(&pipeline),
        Command::Chat => chat(&pipeline).await?,
    }
    Ok(())
}

const ACTIONS: [&str; 3] = ["Ask a question", "Rebuild index", "Quit"];

/// Menu loop. Pipeline errors are printed and the loop continues.
async fn chat(pipeline: &Pipeline) -> anyhow::Result<()> {
    let names: Vec<String> = pipeline
        .models()
        .profiles()
        .map(|p| p.name.clone())
        .collect();

    loop {
        let action = Select::new()
            .with_prompt("What would you like to do?")
            .items(ACTIONS)
            .default(0)
            .interact()?;

        match action {
            0 => {
                let question: String = Input::new().with_prompt("Question").interact_text()?;
                let selected = if names.len() > 1 {
                    Select::new()
                        .with_prompt("Model")
                        .items(&names)
                        .default(0)
                        .interact()?
                } else {
                    0
                };
                match pipeline.ask(&question, names.get(selected).map(String::as_str)).await {
                    Ok(answer) => print_answer(&answer),
                    Err(e) => eprintln!("error: {e}"),
                }
            }
            1 => match pipeline.rebuild().await {
                Ok(report) => print_report(&report),
                Err(e) => eprintln!("error: {e}"),
            },
            _ => return Ok(()),
        }
    }
}

fn print_report(report: &RebuildReport) {
    println!(
        "Indexed {} chunks from {} documents ({} dimensions) into {}",
        report.chunks,
        report.documents,
        report.dimension,
        report.location.display()
    );
}

fn print_answer(answer: &Answer) {
    println!("{}\n", answer.text.trim());
    println!("Sources (answered by {}):", answer.model);
    for (i, source) in answer.sources.iter().enumerate() {
        println!(
            "  {}. {} [{:.3}] {}",
            i + 1,
            source.chunk.document_id,
            source.score,
            source.chunk.metadata.source
        );
    }
}

fn print_models(pipeline: &Pipeline) {
    let default = pipeline.models().default_name();
    for profile in pipeline.models().profiles() {
        let marker = if Some(profile.name.as_str()) == default {
            "*"
        } else {
            " "
        };
        println!(
            "{marker} {}\t{}\t{}\tmax_tokens={}",
            profile.name, profile.provider, profile.model, profile.max_tokens
        );
    }
}

/// Logs go to stderr so answers on stdout stay clean.
fn init_subscriber() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults_to_interactive() {
        let cli = Cli::try_parse_from(["docqa"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn cli_parses_ask_with_model() {
        let cli = Cli::try_parse_from([
            "docqa",
            "--config",
            "custom.toml",
            "ask",
            "--model",
            "llama2",
            "What is B?",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("custom.toml"));
        match cli.command {
            Some(Command::Ask { model, question }) => {
                assert_eq!(model.as_deref(), Some("llama2"));
                assert_eq!(question, "What is B?");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn cli_config_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["docqa", "rebuild", "--config", "x.toml"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Rebuild)));
        assert_eq!(cli.config, PathBuf::from("x.toml"));
    }

    #[test]
    fn cli_ask_requires_question() {
        assert!(Cli::try_parse_from(["docqa", "ask"]).is_err());
    }

    #[test]
    fn cli_verifies() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
