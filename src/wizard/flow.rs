//! Step sequencing for the wizard.
//!
//! Each step checks that the earlier steps left what it needs and sends the
//! user back otherwise. The three generation steps (recognize, script,
//! preview) share one lifecycle: kick off a backend job, hand its run id to a
//! [`JobPoller`], and write the result into the [`Wizard`] once the job
//! completes.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, info};

use super::container::Wizard;
use super::state::{AnalysisEdit, CustomizationPatch, Drawing, MAX_AGE, MIN_AGE, WizardState};
use super::store::StateStore;
use crate::api::{
    AsyncJobResponse, Backend, DrawingAnalysis, JobKind, JobStatus, LibraryEntry,
    PipelineRequest, PresignedUrl, StoryRequest, StoryScript, VideoResult,
};
use crate::error::NocomelonError;
use crate::polling::{JobPoller, PollOptions, PollOutcome};

pub const DEFAULT_TITLE: &str = "My Storybook";

/// The wizard steps, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Upload,
    Recognize,
    Customize,
    Script,
    Preview,
    Save,
}

impl Step {
    pub const ALL: [Step; 6] = [
        Step::Upload,
        Step::Recognize,
        Step::Customize,
        Step::Script,
        Step::Preview,
        Step::Save,
    ];

    /// 1-based position, as shown in the progress line.
    pub fn number(self) -> usize {
        Step::ALL.iter().position(|s| *s == self).unwrap_or(0) + 1
    }

    /// The CLI command that performs this step.
    pub fn command(self) -> &'static str {
        match self {
            Step::Upload => "upload <image>",
            Step::Recognize => "upload <image>",
            Step::Customize => "customize",
            Step::Script => "script",
            Step::Preview => "preview",
            Step::Save => "save",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Step::Upload => "Upload",
            Step::Recognize => "Recognize",
            Step::Customize => "Customize",
            Step::Script => "Script",
            Step::Preview => "Preview",
            Step::Save => "Save",
        };
        write!(f, "{label}")
    }
}

/// Checks that `state` holds what `step` needs.
///
/// Returns [`NocomelonError::Redirect`] naming the step to go back to.
pub fn guard(step: Step, state: &WizardState) -> Result<(), NocomelonError> {
    let missing = match step {
        Step::Upload => None,
        Step::Recognize => state.drawing.is_none().then_some(Step::Upload),
        Step::Customize => state.analysis.is_none().then_some(Step::Recognize),
        Step::Script => {
            if state.analysis.is_none() {
                Some(Step::Recognize)
            } else if state.run_id.is_none() {
                Some(Step::Upload)
            } else {
                None
            }
        }
        Step::Preview => {
            if state.script.is_none() {
                Some(Step::Customize)
            } else if state.analysis.is_none() {
                Some(Step::Recognize)
            } else if state.run_id.is_none() {
                Some(Step::Upload)
            } else {
                None
            }
        }
        Step::Save => state.video.is_none().then_some(Step::Preview),
    };
    match missing {
        Some(target) => {
            debug!(%step, %target, "step precondition not met");
            Err(NocomelonError::Redirect(target))
        }
        None => Ok(()),
    }
}

/// Where the user should continue, given what the wizard holds.
pub fn current_step(state: &WizardState) -> Step {
    if state.video.is_some() {
        Step::Save
    } else if state.script.is_some() {
        Step::Preview
    } else if state.analysis.is_some() {
        Step::Customize
    } else if state.drawing.is_some() {
        Step::Recognize
    } else {
        Step::Upload
    }
}

/// Receives progress from the generation steps.
pub trait ProgressReporter {
    fn started(&self, step: Step);
    fn stage(&self, step: Step, stage: &str);
    fn finished(&self, step: Step, ok: bool);
}

/// Drives the wizard steps against a backend.
///
/// Owns the [`Wizard`]; the exclusive borrow each step takes means a step can
/// never have two generation requests in flight.
pub struct WizardFlow<B, S: StateStore, R> {
    backend: Arc<B>,
    wizard: Wizard<S>,
    user_id: String,
    poll: PollOptions,
    reporter: R,
}

impl<B, S, R> WizardFlow<B, S, R>
where
    B: Backend + 'static,
    S: StateStore,
    R: ProgressReporter,
{
    pub fn new(
        backend: Arc<B>,
        wizard: Wizard<S>,
        user_id: String,
        poll: PollOptions,
        reporter: R,
    ) -> Self {
        Self {
            backend,
            wizard,
            user_id,
            poll,
            reporter,
        }
    }

    pub fn state(&self) -> &WizardState {
        self.wizard.state()
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Loads an image as the drawing for a fresh run.
    ///
    /// Results of any previous run are dropped; customization is kept.
    pub async fn upload(&mut self, path: &Path) -> Result<(), NocomelonError> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "drawing".to_string());
        info!(file = %file_name, bytes = bytes.len(), "drawing uploaded");

        self.wizard.set_run_id(None);
        self.wizard.set_analysis(None);
        self.wizard.set_script(None);
        self.wizard.set_video(None);
        self.wizard.set_drawing(Some(Drawing {
            file_name,
            image_base64: STANDARD.encode(&bytes),
        }));
        Ok(())
    }

    /// Runs vision analysis on the uploaded drawing.
    pub async fn recognize(&mut self) -> Result<DrawingAnalysis, NocomelonError> {
        guard(Step::Recognize, self.state())?;
        if let Some(analysis) = &self.state().analysis {
            return Ok(analysis.clone());
        }
        let Some(drawing) = self.state().drawing.clone() else {
            return Err(NocomelonError::Redirect(Step::Upload));
        };

        let backend = Arc::clone(&self.backend);
        let user_id = self.user_id.clone();
        let status = self
            .generate(Step::Recognize, JobKind::Vision, async move {
                backend.analyze_drawing(&drawing.image_base64, &user_id).await
            })
            .await?;

        self.wizard.set_run_id(Some(status.run_id.clone()));
        let analysis = status
            .drawing_analysis
            .ok_or(NocomelonError::MissingResult {
                step: Step::Recognize,
            })?;
        self.wizard.set_analysis(Some(analysis.clone()));
        Ok(analysis)
    }

    /// Corrects the analysis. Later results built on the old one are dropped.
    pub fn edit_analysis(&mut self, edit: AnalysisEdit) -> Result<(), NocomelonError> {
        guard(Step::Customize, self.state())?;
        if !self.wizard.edit_analysis(edit) {
            return Err(NocomelonError::Redirect(Step::Recognize));
        }
        self.wizard.set_script(None);
        self.wizard.set_video(None);
        Ok(())
    }

    pub fn customize(&mut self, patch: CustomizationPatch) -> Result<(), NocomelonError> {
        guard(Step::Customize, self.state())?;
        if let Some(age) = patch.age {
            if !(MIN_AGE..=MAX_AGE).contains(&age) {
                return Err(NocomelonError::InvalidAge { age });
            }
        }
        if patch.is_empty() {
            return Ok(());
        }
        self.wizard.set_customization(patch);
        Ok(())
    }

    /// Generates the story script, or returns the one already in the wizard.
    pub async fn script(&mut self) -> Result<StoryScript, NocomelonError> {
        guard(Step::Script, self.state())?;
        if let Some(script) = &self.state().script {
            debug!("script already present, skipping generation");
            return Ok(script.clone());
        }

        let state = self.state();
        let (Some(analysis), Some(run_id)) = (state.analysis.clone(), state.run_id.clone()) else {
            return Err(NocomelonError::Redirect(Step::Recognize));
        };
        let customization = state.customization.clone();
        let backend = Arc::clone(&self.backend);
        let user_id = self.user_id.clone();

        let status = self
            .generate(Step::Script, JobKind::Story, async move {
                let personal_context = Some(customization.personal_context.trim())
                    .filter(|note| !note.is_empty());
                let req = StoryRequest {
                    drawing: &analysis,
                    theme: customization.theme,
                    voice_type: customization.voice,
                    child_age: customization.age,
                    personal_context,
                    user_id: &user_id,
                    run_id: &run_id,
                };
                backend.generate_story(&req).await
            })
            .await?;

        let script = status.story_script.ok_or(NocomelonError::MissingResult {
            step: Step::Script,
        })?;
        self.wizard.set_script(Some(script.clone()));
        Ok(script)
    }

    /// Drops the current script (and the video made from it) and generates a new one.
    pub async fn regenerate_script(&mut self) -> Result<StoryScript, NocomelonError> {
        guard(Step::Script, self.state())?;
        self.wizard.set_script(None);
        self.wizard.set_video(None);
        self.script().await
    }

    /// Rewrites scene `number` (1-based). The video made from the old text is dropped.
    pub fn edit_scene(&mut self, number: usize, text: String) -> Result<(), NocomelonError> {
        if self.state().script.is_none() {
            return Err(NocomelonError::Redirect(Step::Script));
        }
        if number == 0 || !self.wizard.edit_scene(number - 1, text) {
            return Err(NocomelonError::NoSuchScene { number });
        }
        self.wizard.set_video(None);
        Ok(())
    }

    /// Renders the narrated video, or returns the one already in the wizard.
    pub async fn preview(&mut self) -> Result<VideoResult, NocomelonError> {
        guard(Step::Preview, self.state())?;
        if let Some(video) = &self.state().video {
            return Ok(video.clone());
        }

        let state = self.state();
        let (Some(script), Some(analysis), Some(run_id)) = (
            state.script.clone(),
            state.analysis.clone(),
            state.run_id.clone(),
        ) else {
            return Err(NocomelonError::Redirect(Step::Customize));
        };
        let customization = state.customization.clone();
        let backend = Arc::clone(&self.backend);
        let user_id = self.user_id.clone();

        let status = self
            .generate(Step::Preview, JobKind::Pipeline, async move {
                let req = PipelineRequest {
                    run_id: &run_id,
                    story: &script,
                    drawing: &analysis,
                    style: customization.style,
                    voice_type: customization.voice,
                    user_id: &user_id,
                };
                backend.generate_video(&req).await
            })
            .await?;

        let video = status.video.ok_or(NocomelonError::MissingResult {
            step: Step::Preview,
        })?;
        self.wizard.set_video(Some(video.clone()));
        Ok(video)
    }

    /// Saves the finished storybook to the library and starts the wizard over.
    pub async fn save_to_library(
        &mut self,
        title: Option<String>,
    ) -> Result<LibraryEntry, NocomelonError> {
        guard(Step::Save, self.state())?;
        let state = self.state();
        let Some(video) = state.video.clone() else {
            return Err(NocomelonError::Redirect(Step::Preview));
        };
        let title = title
            .or_else(|| state.script.as_ref().and_then(|s| s.title.clone()))
            .unwrap_or_else(|| DEFAULT_TITLE.to_string());

        let entry = LibraryEntry {
            id: uuid::Uuid::new_v4().to_string(),
            title,
            thumbnail_key: video.thumbnail_key,
            video_key: video.video_key,
            duration_sec: video.duration_sec,
            style: state.customization.style,
            created_at: chrono::Utc::now().to_rfc3339(),
        };

        let saved = self.backend.save_to_library(&entry, &self.user_id).await?;
        info!(id = %saved.id, title = %saved.title, "storybook saved to library");
        self.wizard.reset_wizard();
        Ok(saved)
    }

    /// Throws away the current run.
    pub fn discard(&mut self) {
        self.wizard.reset_wizard();
    }

    /// Pulls step results from the job checkpoint after a restart.
    pub async fn resume(&mut self) -> bool {
        self.wizard
            .recover_from_checkpoint(self.backend.as_ref(), &self.user_id)
            .await
    }

    pub async fn library(&self) -> Result<Vec<LibraryEntry>, NocomelonError> {
        Ok(self.backend.library(&self.user_id).await?)
    }

    pub async fn delete_from_library(&self, id: &str) -> Result<(), NocomelonError> {
        self.backend.delete_from_library(id, &self.user_id).await?;
        info!(%id, "storybook removed from library");
        Ok(())
    }

    /// Turns a storage key into a fetchable URL.
    pub async fn media_url(&self, key: &str) -> Result<PresignedUrl, NocomelonError> {
        Ok(self.backend.presigned_url(key, &self.user_id).await?)
    }

    /// Kicks off a job and polls it to completion.
    ///
    /// Polling is requested before the kickoff returns; the poller starts as
    /// soon as the run id arrives.
    async fn generate(
        &self,
        step: Step,
        kind: JobKind,
        kickoff: impl Future<Output = Result<AsyncJobResponse, crate::api::ApiError>>,
    ) -> Result<JobStatus, NocomelonError> {
        self.reporter.started(step);
        let result = self.run_job(step, kind, kickoff).await;
        self.reporter.finished(step, result.is_ok());
        result
    }

    async fn run_job(
        &self,
        step: Step,
        kind: JobKind,
        kickoff: impl Future<Output = Result<AsyncJobResponse, crate::api::ApiError>>,
    ) -> Result<JobStatus, NocomelonError> {
        let mut poller = JobPoller::new(
            Arc::clone(&self.backend),
            None,
            Some(self.user_id.clone()),
            self.poll.clone(),
        );
        poller.start_polling();

        let job = kickoff.await?;
        info!(%step, run_id = %job.run_id, %kind, "job started");
        self.reporter.stage(step, job.current_stage.as_deref().unwrap_or("queued"));
        poller.set_ids(Some(job.run_id), Some(self.user_id.clone()));

        let mut last_stage: Option<String> = None;
        let outcome = poller
            .wait(|snap| {
                if let Some(stage) = snap.current_stage() {
                    if last_stage.as_deref() != Some(stage) {
                        self.reporter.stage(step, stage);
                        last_stage = Some(stage.to_string());
                    }
                }
            })
            .await;

        match outcome {
            Some(PollOutcome::Complete(status)) if kind.has_result(&status) => Ok(status),
            Some(PollOutcome::Complete(_)) => Err(NocomelonError::MissingResult { step }),
            Some(PollOutcome::Failed(message)) => Err(NocomelonError::JobFailed { step, message }),
            None => Err(NocomelonError::PollingStopped(step)),
        }
    }
}
