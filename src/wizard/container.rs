use tracing::{debug, error, info, warn};

use super::state::{AnalysisEdit, CustomizationPatch, Drawing, WizardState};
use super::store::StateStore;
use crate::api::{DrawingAnalysis, StatusSource, StoryScript, VideoResult};

/// Owns the wizard state and writes it through to a [`StateStore`].
///
/// Every mutating method ends with [`save`](Self::save). The drawing is the
/// one field that never reaches the store.
pub struct Wizard<S: StateStore> {
    state: WizardState,
    store: S,
}

impl<S: StateStore> Wizard<S> {
    /// Restores the previous state, falling back to defaults when the stored
    /// blob is missing or unreadable.
    pub fn open(store: S) -> Self {
        let state = restore(&store);
        Self { state, store }
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    pub fn set_run_id(&mut self, run_id: Option<String>) {
        self.state.run_id = run_id;
        self.save();
    }

    pub fn set_drawing(&mut self, drawing: Option<Drawing>) {
        self.state.drawing = drawing;
        self.save();
    }

    pub fn set_analysis(&mut self, analysis: Option<DrawingAnalysis>) {
        self.state.analysis = analysis;
        self.save();
    }

    pub fn set_customization(&mut self, patch: CustomizationPatch) {
        patch.apply(&mut self.state.customization);
        self.save();
    }

    pub fn set_script(&mut self, script: Option<StoryScript>) {
        self.state.script = script;
        self.save();
    }

    pub fn set_video(&mut self, video: Option<VideoResult>) {
        self.state.video = video;
        self.save();
    }

    /// Applies corrections to the analysis. Returns `false` if there is none.
    pub fn edit_analysis(&mut self, edit: AnalysisEdit) -> bool {
        let Some(analysis) = self.state.analysis.as_mut() else {
            return false;
        };
        edit.apply(analysis);
        self.save();
        true
    }

    /// Replaces the text of one scene. Returns `false` if there is no such scene.
    pub fn edit_scene(&mut self, index: usize, text: String) -> bool {
        let Some(scene) = self
            .state
            .script
            .as_mut()
            .and_then(|script| script.scenes.get_mut(index))
        else {
            return false;
        };
        scene.text = text;
        self.save();
        true
    }

    /// Restores defaults and erases the stored blob.
    pub fn reset_wizard(&mut self) {
        self.state = WizardState::default();
        if let Err(e) = self.store.remove() {
            error!(error = %e, "failed to remove saved wizard state");
        }
        debug!("wizard reset");
    }

    /// Serializes everything except the drawing. Failures are logged, never returned.
    pub fn save(&self) {
        let blob = match serde_json::to_string(&self.state) {
            Ok(blob) => blob,
            Err(e) => {
                error!(error = %e, "failed to serialize wizard state");
                return;
            }
        };
        if let Err(e) = self.store.save(&blob) {
            error!(error = %e, "failed to save wizard state");
        }
    }

    /// Re-hydrates progress from the job-status checkpoint when a run id is
    /// known but no step result is. Best effort: failures are logged and
    /// reported as "nothing restored".
    pub async fn recover_from_checkpoint<B: StatusSource>(
        &mut self,
        source: &B,
        user_id: &str,
    ) -> bool {
        let Some(run_id) = self.state.run_id.clone() else {
            return false;
        };
        if !self.state.has_no_progress() {
            return false;
        }

        let status = match source.job_status(&run_id, user_id).await {
            Ok(status) => status,
            Err(e) => {
                warn!(%run_id, error = %e, "checkpoint recovery failed");
                return false;
            }
        };

        let mut restored = false;
        if let Some(analysis) = status.drawing_analysis {
            self.state.analysis = Some(analysis);
            restored = true;
        }
        if let Some(script) = status.story_script {
            self.state.script = Some(script);
            restored = true;
        }
        if let Some(video) = status.video {
            self.state.video = Some(video);
            restored = true;
        }

        if restored {
            info!(%run_id, stage = status.current_stage.as_deref().unwrap_or("-"), "restored wizard progress from checkpoint");
            self.save();
        }
        restored
    }
}

fn restore<S: StateStore>(store: &S) -> WizardState {
    let blob = match store.load() {
        Ok(Some(blob)) => blob,
        Ok(None) => return WizardState::default(),
        Err(e) => {
            warn!(error = %e, "failed to read saved wizard state, starting fresh");
            return WizardState::default();
        }
    };
    match serde_json::from_str::<WizardState>(&blob) {
        Ok(state) => state,
        Err(e) => {
            warn!(error = %e, "failed to parse saved wizard state, starting fresh");
            WizardState::default()
        }
    }
}
