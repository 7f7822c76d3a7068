//! Echo Bot Example
//!
//! A small NestGram bot:
//!
//! - `/start` greets the user
//! - `/survey` opens the `survey` scope, which asks for a name and an age
//!   before closing itself again
//! - `/cancel` leaves the survey early
//! - any other text is echoed back
//!
//! Every update passes through a module-wide logging middleware first.
//!
//! # Usage
//!
//! ```bash
//! NESTGRAM_TOKEN=123:abc cargo run --package echo-bot
//! cargo run --package echo-bot -- --config nestgram.toml --profile dev
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use dashmap::DashMap;
use nestgram::prelude::*;
use tracing::info;

#[derive(Parser)]
#[command(about = "NestGram echo bot")]
struct Args {
    /// Configuration file; nestgram.toml in the current directory otherwise.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration profile, e.g. "dev" loads nestgram.dev.toml first.
    #[arg(short, long)]
    profile: Option<String>,
}

// ============================================================================
// Controllers
// ============================================================================

struct Greeter;

fn greeter() -> Controller<Greeter> {
    Controller::new(Greeter)
        .route(
            Route::message("start", |_this: Arc<Greeter>, _update: Arc<Update>, answer: Answer| async move {
                answer
                    .send("Hi! Send me anything and I will echo it. /survey starts a short survey.")
                    .await?;
                Ok::<_, BoxError>(())
            })
            .command("start")
            .block(true),
        )
        .route(
            Route::message("survey", |_this: Arc<Greeter>, _update: Arc<Update>, answer: Answer| async move {
                answer.enter_scope("survey")?;
                answer.send("What is your name?").await?;
                Ok::<_, BoxError>(())
            })
            .command("survey")
            .block(true),
        )
        .route(
            Route::message("echo", |_this: Arc<Greeter>, update: Arc<Update>, answer: Answer| async move {
                if let Some(text) = filter::text(&update) {
                    answer.reply(text).await?;
                }
                Ok::<_, BoxError>(())
            })
            .check(|update: &Update| predicate::command_of(update).is_none()),
        )
}

/// Answers collected so far, per user.
#[derive(Default)]
struct Survey {
    names: DashMap<i64, String>,
}

fn survey() -> Controller<Survey> {
    Controller::new(Survey::default())
        .route(
            Route::message("cancel", |this: Arc<Survey>, update: Arc<Update>, answer: Answer| async move {
                if let Some(user_id) = filter::user_id(&update) {
                    this.names.remove(&user_id);
                }
                answer.exit_scope()?;
                answer.send("Survey cancelled.").await?;
                Ok::<_, BoxError>(())
            })
            .command("cancel")
            .block(true),
        )
        .route(Route::message("answer", |this: Arc<Survey>, update: Arc<Update>, answer: Answer| async move {
            let (Some(user_id), Some(text)) = (filter::user_id(&update), filter::text(&update)) else {
                return Ok(());
            };

            let Some((_, name)) = this.names.remove(&user_id) else {
                this.names.insert(user_id, text.to_string());
                answer.send(format!("Nice to meet you, {text}! How old are you?")).await?;
                return Ok(());
            };

            match text.trim().parse::<u8>() {
                Ok(age) => {
                    answer.exit_scope()?;
                    answer.send(format!("Thanks, {name} ({age}). Survey complete.")).await?;
                }
                Err(_) => {
                    this.names.insert(user_id, name);
                    answer.send("Please send your age as a number.").await?;
                }
            }
            Ok::<_, BoxError>(())
        }))
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let app = Module::new("echo")
        .middleware(|update: Arc<Update>, _answer: Answer| async move {
            info!(
                update_id = update.update_id,
                kind = %update.update_type(),
                user_id = ?filter::user_id(&update),
                text = ?filter::text(&update),
                "Incoming update"
            );
            Ok::<_, BoxError>(Flow::Continue)
        })
        .controller(greeter())
        .scope("survey", survey());

    let mut builder = NestGram::builder().module(app);
    if let Some(path) = args.config {
        builder = builder.config_file(path);
    }
    if let Some(profile) = args.profile {
        builder = builder.profile(profile);
    }

    // Run until Ctrl+C
    builder.build()?.run().await?;

    Ok(())
}
