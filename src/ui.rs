//! Interface de terminal do NoComelon: spinners e saída colorida.
//!
//! Usa as crates `indicatif` para spinners de progresso e `console` para
//! estilização com cores. O [`StepProgress`] acompanha visualmente
//! cada passo de geração do wizard no terminal.

use std::sync::Mutex;
use std::time::Duration;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::api::{DrawingAnalysis, JobState, JobStatus, LibraryEntry, StoryScript, VideoResult};
use crate::wizard::{ProgressReporter, Step, WizardState};

/// Cria um spinner ciano com a mensagem inicial.
pub fn spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Rótulo exibido no spinner: `[n/6] Passo: estágio`.
pub fn step_label(step: Step, stage: &str) -> String {
    format!("[{}/{}] {step}: {stage}", step.number(), Step::ALL.len())
}

/// Duração em `m:ss`.
pub fn format_duration(secs: f64) -> String {
    let total = secs.max(0.0).round() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

/// Indicador visual de progresso para os passos de geração.
///
/// Exibe um spinner animado enquanto o job roda e uma mensagem colorida
/// ao final: verde para sucesso, vermelho para falha.
pub struct StepProgress {
    // Spinner do passo em andamento, se houver.
    pb: Mutex<Option<ProgressBar>>,
    green: Style,
    red: Style,
}

impl StepProgress {
    pub fn new() -> Self {
        Self {
            pb: Mutex::new(None),
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
        }
    }
}

impl Default for StepProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for StepProgress {
    fn started(&self, step: Step) {
        if let Ok(mut slot) = self.pb.lock() {
            *slot = Some(spinner(step_label(step, "starting")));
        }
    }

    fn stage(&self, step: Step, stage: &str) {
        if let Ok(slot) = self.pb.lock() {
            if let Some(pb) = slot.as_ref() {
                pb.set_message(step_label(step, stage));
            }
        }
    }

    fn finished(&self, step: Step, ok: bool) {
        if let Ok(mut slot) = self.pb.lock() {
            if let Some(pb) = slot.take() {
                pb.finish_and_clear();
            }
        }
        if ok {
            println!("  {} {step} done", self.green.apply_to("✓"));
        } else {
            println!("  {} {step} failed", self.red.apply_to("✗"));
        }
    }
}

pub fn success(message: &str) {
    println!("  {} {message}", Style::new().green().bold().apply_to("✓"));
}

pub fn failure(message: &str) {
    eprintln!("  {} {message}", Style::new().red().bold().apply_to("✗"));
}

/// Indica o comando que conclui o passo pendente.
pub fn print_redirect(step: Step) {
    let yellow = Style::new().yellow();
    eprintln!(
        "  {} Finish the {step} step first: nocomelon {}",
        yellow.apply_to("→"),
        step.command()
    );
}

pub fn print_retry_hint(step: Option<Step>) {
    let yellow = Style::new().yellow();
    match step {
        Some(step) => eprintln!(
            "  {} Try again with: nocomelon {}",
            yellow.apply_to("↻"),
            step.command()
        ),
        None => eprintln!("  {} Try again.", yellow.apply_to("↻")),
    }
}

fn header(title: &str) {
    println!();
    println!("{}", Style::new().cyan().bold().apply_to(format!("─── {title} ───")));
}

pub fn print_analysis(analysis: &DrawingAnalysis) {
    header("What we see");
    println!("  Subject: {}", analysis.subject);
    println!("  Setting: {}", analysis.setting);
    println!("  Mood:    {}", analysis.mood);
    if !analysis.details.is_empty() {
        println!("  Details: {}", analysis.details.join(", "));
    }
    if !analysis.colors.is_empty() {
        println!("  Colors:  {}", analysis.colors.join(", "));
    }
}

pub fn print_script(script: &StoryScript) {
    header(script.title.as_deref().unwrap_or("Story"));
    let dim = Style::new().dim();
    for scene in &script.scenes {
        println!("  {} {}", dim.apply_to(format!("{:>2}.", scene.number)), scene.text);
    }
}

pub fn print_video(video: &VideoResult, url: Option<&str>) {
    header("Video");
    println!("  Length:    {}", format_duration(video.duration_sec));
    println!("  Video:     {}", video.video_key);
    println!("  Thumbnail: {}", video.thumbnail_key);
    if let Some(url) = url {
        println!("  Watch:     {url}");
    }
}

pub fn print_library(entries: &[LibraryEntry]) {
    header("Library");
    if entries.is_empty() {
        println!("  No storybooks yet.");
        return;
    }
    let dim = Style::new().dim();
    for entry in entries {
        println!(
            "  {}  {}  {} {}",
            dim.apply_to(&entry.id),
            entry.title,
            format_duration(entry.duration_sec),
            dim.apply_to(format!("({}, {})", entry.style, entry.created_at)),
        );
    }
}

/// Resumo do wizard: passo atual, personalização e resultados já obtidos.
pub fn print_state(state: &WizardState, current: Step) {
    header("Wizard");
    for step in Step::ALL {
        let marker = if step == current {
            Style::new().cyan().bold().apply_to("▶").to_string()
        } else if step.number() < current.number() {
            Style::new().green().apply_to("✓").to_string()
        } else {
            " ".to_string()
        };
        println!("  {marker} {}. {step}", step.number());
    }
    let c = &state.customization;
    println!();
    println!(
        "  Style {} · Theme {} · Voice {} · Age {}",
        c.style, c.theme, c.voice, c.age
    );
    if !c.personal_context.is_empty() {
        println!("  Note: {}", c.personal_context);
    }
    if let Some(run_id) = &state.run_id {
        println!("  Run:  {run_id}");
    }
}

pub fn print_job(status: &JobStatus) {
    let style = match status.status {
        JobState::Complete => Style::new().green().bold(),
        JobState::Error => Style::new().red().bold(),
        JobState::Processing => Style::new().yellow(),
    };
    println!(
        "  Job {}: {} ({})",
        status.run_id,
        style.apply_to(status.status),
        status.current_stage.as_deref().unwrap_or("-")
    );
    if let Some(error) = &status.error {
        println!("  Error: {error}");
    }
}
