//! Terminal front end: load an image, read its summary, ask questions about it.
//!
//! Usage:
//!   vislens                 probe the default images and start chatting
//!   vislens <path|url>      start with a specific image
//!
//! Lines starting with `/` are commands (see `/help`); anything else is a question.

use anyhow::Context;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;
use vislens::config::AppConfig;
use vislens::conversation::{ConversationController, ConversationEvent};
use vislens::image::{ImageFetcher, ImageLoader, ImageSource};
use vislens::llm::{CompletionConfig, LlmBroker};
use vislens::render;
use vislens::vision::VisionAssistant;

const HELP: &str = "\
Commands:
  /open <path|url>   load another image and analyze it
  /analyze           analyze the current image again
  /tags              show the current tags
  /show              redraw both panes
  /help              this text
  /quit              exit
Anything else is sent as a question about the current image.";

/// Print state changes as they happen, independent of the input loop
fn spawn_event_printer(controller: &ConversationController) -> tokio::task::JoinHandle<()> {
    let mut events = controller.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(ConversationEvent::BusyChanged(true)) => eprintln!("Extracting visual features..."),
                Ok(ConversationEvent::BusyChanged(false)) => {}
                Ok(ConversationEvent::ImageChanged { display_reference }) => {
                    println!("Image: {}", display_reference)
                }
                Ok(ConversationEvent::TurnAppended(turn)) => println!("{}", render::render_turn(&turn)),
                Ok(ConversationEvent::AnalysisUpdated(summary)) => {
                    let chips = render::tag_chips(Some(&summary));
                    if !chips.is_empty() {
                        println!("Tags: {}", chips.join(", "));
                    }
                }
                Ok(ConversationEvent::InitErrorChanged(Some(notice))) => println!("Notice: {}", notice),
                Ok(ConversationEvent::InitErrorChanged(None)) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!("Event printer skipped {} events", skipped)
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

async fn open_image(
    controller: &ConversationController,
    loader: &ImageLoader,
    location: &str,
) -> anyhow::Result<()> {
    let source = ImageSource::parse(location);
    let image = loader
        .fetch(&source)
        .await
        .with_context(|| format!("could not load {}", source))?;
    controller.replace_image(image).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = AppConfig::from_env()?;
    tracing::info!("Using {:?} backend with model {}", config.backend, config.model);

    let broker = LlmBroker::new(config.model.clone(), config.backend.gateway()?);
    let mut assistant = VisionAssistant::new(broker).with_history(config.history);
    if let Some(temperature) = config.temperature {
        assistant = assistant.with_completion_config(CompletionConfig {
            temperature,
            ..Default::default()
        });
    }

    let loader = Arc::new(ImageLoader::new()?);
    let controller = ConversationController::builder(Arc::new(assistant))
        .fetcher(loader.clone())
        .default_sources(config.default_images.clone())
        .build()?;

    let printer = spawn_event_printer(&controller);

    match std::env::args().nth(1) {
        Some(location) => {
            if let Err(e) = open_image(&controller, &loader, &location).await {
                eprintln!("{:#}", e);
                controller.bootstrap().await?;
            }
        }
        None => {
            controller.bootstrap().await?;
        }
    }

    if controller.snapshot().await.turns.is_empty() {
        println!("{}", render::EMPTY_TRANSCRIPT_HINT);
    }
    println!("Type /help for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (command, argument) = match line.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };

        match command {
            "/quit" | "/exit" => break,
            "/help" => println!("{}", HELP),
            "/show" => print!("{}", render::render(&controller.snapshot().await)),
            "/tags" => {
                let snapshot = controller.snapshot().await;
                let chips = render::tag_chips(snapshot.analysis.as_ref());
                if chips.is_empty() {
                    println!("No tags yet.");
                } else {
                    let chips: Vec<String> = chips.iter().map(|tag| format!("[{}]", tag)).collect();
                    println!("{}", chips.join(" "));
                }
            }
            "/analyze" => match controller.reanalyze().await {
                Ok(vislens::conversation::OperationState::Idle) => {
                    println!("No image loaded. Use /open <path|url>.")
                }
                Ok(_) => {}
                Err(e) => eprintln!("{}", e),
            },
            "/open" if argument.is_empty() => println!("Usage: /open <path|url>"),
            "/open" => {
                if let Err(e) = open_image(&controller, &loader, argument).await {
                    eprintln!("{:#}", e);
                }
            }
            _ if command.starts_with('/') => println!("Unknown command {}. Try /help.", command),
            _ => {
                if controller.snapshot().await.current_image.is_none() {
                    println!("No image loaded. Use /open <path|url>.");
                    continue;
                }
                controller.submit_user_message(line).await;
            }
        }
    }

    drop(controller);
    let _ = printer.await;
    Ok(())
}
