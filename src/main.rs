mod api;
mod cli;
mod config;
mod error;
mod polling;
mod ui;
mod wizard;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde_json::json;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api::{ApiClient, StatusSource};
use cli::{Cli, Command, CustomizeArgs, LibraryAction};
use config::NocomelonConfig;
use error::NocomelonError;
use polling::{JobPoller, PollOptions, PollOutcome};
use ui::StepProgress;
use wizard::{AnalysisEdit, FileStore, Wizard, WizardFlow, current_step};

type Flow = WizardFlow<ApiClient, FileStore, StepProgress>;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = NocomelonConfig::load().context("failed to load configuration")?;
    if let Some(url) = &cli.api_url {
        config.api_base_url = url.clone();
    }
    if let Some(user) = &cli.user {
        config.user_id = user.clone();
    }
    if let Some(ms) = cli.poll_interval {
        config.poll_interval_ms = ms;
    }
    config.validate()?;

    if let Err(err) = run(cli.command, config).await {
        report(&err);
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

// RUST_LOG tem precedência; senão info, ou debug com --verbose.
fn init_logging(verbose: bool) {
    let default = if verbose { "nocomelon=debug" } else { "nocomelon=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn report(err: &NocomelonError) {
    if let Some(step) = err.redirect() {
        ui::print_redirect(step);
        return;
    }
    ui::failure(&err.to_string());
    if err.is_retryable() {
        let step = match err {
            NocomelonError::JobFailed { step, .. } | NocomelonError::MissingResult { step } => {
                Some(*step)
            }
            _ => None,
        };
        ui::print_retry_hint(step);
    }
}

async fn run(command: Command, config: NocomelonConfig) -> Result<(), NocomelonError> {
    if config.user_id.is_empty() {
        return Err(NocomelonError::MissingUser);
    }
    let client = Arc::new(ApiClient::new(&config.api_base_url, config.request_timeout())?);
    info!(api = %client.base_url(), user = %config.user_id, "nocomelon ready");

    let store = FileStore::new(&config.state_dir());
    debug!(path = %store.path().display(), "wizard state file");
    let mut flow: Flow = WizardFlow::new(
        Arc::clone(&client),
        Wizard::open(store),
        config.user_id.clone(),
        PollOptions::with_interval(config.poll_interval()),
        StepProgress::new(),
    );

    match command {
        Command::Upload { image } => upload(&mut flow, &image).await,
        Command::EditAnalysis {
            subject,
            setting,
            mood,
        } => {
            flow.edit_analysis(AnalysisEdit {
                subject,
                setting,
                mood,
            })?;
            if let Some(analysis) = &flow.state().analysis {
                ui::print_analysis(analysis);
            }
            Ok(())
        }
        Command::Customize(args) => {
            flow.customize(args.into_patch())?;
            ui::print_state(flow.state(), current_step(flow.state()));
            Ok(())
        }
        Command::Script {
            regenerate,
            scene,
            text,
        } => {
            if let (Some(number), Some(text)) = (scene, text) {
                flow.edit_scene(number, text)?;
            }
            let script = if regenerate {
                flow.regenerate_script().await?
            } else {
                flow.script().await?
            };
            ui::print_script(&script);
            Ok(())
        }
        Command::Preview => preview(&mut flow).await,
        Command::Save { title } => save(&mut flow, title).await,
        Command::Discard => {
            flow.discard();
            ui::success("Wizard cleared");
            Ok(())
        }
        Command::Run {
            image,
            customize,
            title,
        } => run_all(&mut flow, &image, customize, title).await,
        Command::Status { json } => status(&flow, client.as_ref(), json).await,
        Command::Resume => {
            if flow.resume().await {
                ui::success("Recovered progress from the last job");
            } else {
                ui::success("Nothing to recover");
            }
            ui::print_state(flow.state(), current_step(flow.state()));
            Ok(())
        }
        Command::Watch { run_id } => watch(client, run_id, &config).await,
        Command::Library { action } => match action {
            LibraryAction::List => {
                ui::print_library(&flow.library().await?);
                Ok(())
            }
            LibraryAction::Delete { id } => {
                flow.delete_from_library(&id).await?;
                ui::success(&format!("Removed {id}"));
                Ok(())
            }
        },
        Command::Url { key } => {
            let url = flow.media_url(&key).await?;
            println!("{}", url.url);
            Ok(())
        }
    }
}

async fn upload(flow: &mut Flow, image: &Path) -> Result<(), NocomelonError> {
    flow.upload(image).await?;
    let analysis = flow.recognize().await?;
    ui::print_analysis(&analysis);
    Ok(())
}

async fn preview(flow: &mut Flow) -> Result<(), NocomelonError> {
    let video = flow.preview().await?;
    let url = match flow.media_url(&video.video_key).await {
        Ok(url) => Some(url.url),
        Err(err) => {
            warn!(error = %err, "could not resolve video url");
            None
        }
    };
    ui::print_video(&video, url.as_deref());
    Ok(())
}

async fn save(flow: &mut Flow, title: Option<String>) -> Result<(), NocomelonError> {
    let entry = flow.save_to_library(title).await?;
    ui::success(&format!("Saved \"{}\" ({})", entry.title, entry.id));
    Ok(())
}

async fn run_all(
    flow: &mut Flow,
    image: &Path,
    customize: CustomizeArgs,
    title: Option<String>,
) -> Result<(), NocomelonError> {
    upload(flow, image).await?;
    flow.customize(customize.into_patch())?;
    let script = flow.script().await?;
    ui::print_script(&script);
    preview(flow).await?;
    save(flow, title).await
}

async fn status(flow: &Flow, source: &ApiClient, as_json: bool) -> Result<(), NocomelonError> {
    let state = flow.state();
    let job = match &state.run_id {
        Some(run_id) => match source.job_status(run_id, flow.user_id()).await {
            Ok(job) => Some(job),
            Err(err) => {
                warn!(%run_id, error = %err, "could not fetch job status");
                None
            }
        },
        None => None,
    };

    if as_json {
        let out = json!({
            "step": current_step(state).to_string(),
            "wizard": state,
            "job": job,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    ui::print_state(state, current_step(state));
    if let Some(job) = &job {
        ui::print_job(job);
    }
    Ok(())
}

async fn watch(
    client: Arc<ApiClient>,
    run_id: String,
    config: &NocomelonConfig,
) -> Result<(), NocomelonError> {
    let options = PollOptions::with_interval(config.poll_interval())
        .on_complete(|status| info!(run_id = %status.run_id, "job complete"))
        .on_error(|message| warn!(%message, "job failed"));
    let mut poller = JobPoller::new(
        client,
        Some(run_id.clone()),
        Some(config.user_id.clone()),
        options,
    );
    poller.start_polling();

    let label = poller.run_id().unwrap_or(&run_id).to_string();
    let pb = ui::spinner(format!("Watching {label}"));
    let outcome = poller
        .wait(|snap| {
            pb.set_message(format!(
                "{label}: {} {} (poll {})",
                snap.phase,
                snap.current_stage().unwrap_or("-"),
                snap.attempts
            ));
        })
        .await;
    pb.finish_and_clear();
    poller.stop_polling();

    match outcome {
        Some(PollOutcome::Complete(status)) => {
            ui::print_job(&status);
            Ok(())
        }
        Some(PollOutcome::Failed(message)) => {
            Err(NocomelonError::WatchFailed { run_id, message })
        }
        None => {
            if let Some(last) = poller.status() {
                ui::print_job(&last);
            }
            ui::failure("Polling stopped");
            Ok(())
        }
    }
}
