use std::fmt;

use serde::{Deserialize, Serialize};

use crate::api::{DrawingAnalysis, StoryScript, Style, Theme, VideoResult, VoiceType};

pub const DEFAULT_AGE: u8 = 4;
pub const MIN_AGE: u8 = 3;
pub const MAX_AGE: u8 = 7;

/// The uploaded drawing, already base64-encoded for the vision endpoint.
///
/// Never persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct Drawing {
    pub file_name: String,
    pub image_base64: String,
}

impl fmt::Debug for Drawing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Drawing")
            .field("file_name", &self.file_name)
            .field("encoded_len", &self.image_base64.len())
            .finish()
    }
}

/// Story options picked on the customize step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Customization {
    pub style: Style,
    pub theme: Theme,
    pub voice: VoiceType,
    pub age: u8,
    /// Free-text note about the child, woven into the story.
    #[serde(rename = "personalContext")]
    pub personal_context: String,
}

impl Default for Customization {
    fn default() -> Self {
        Self {
            style: Style::Storybook,
            theme: Theme::Adventure,
            voice: VoiceType::Gentle,
            age: DEFAULT_AGE,
            personal_context: String::new(),
        }
    }
}

/// A partial update merged over the current [`Customization`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomizationPatch {
    pub style: Option<Style>,
    pub theme: Option<Theme>,
    pub voice: Option<VoiceType>,
    pub age: Option<u8>,
    pub personal_context: Option<String>,
}

impl CustomizationPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply(self, target: &mut Customization) {
        if let Some(style) = self.style {
            target.style = style;
        }
        if let Some(theme) = self.theme {
            target.theme = theme;
        }
        if let Some(voice) = self.voice {
            target.voice = voice;
        }
        if let Some(age) = self.age {
            target.age = age;
        }
        if let Some(note) = self.personal_context {
            target.personal_context = note;
        }
    }
}

/// Corrections to the vision result, as typed on the recognize step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisEdit {
    pub subject: Option<String>,
    pub setting: Option<String>,
    pub mood: Option<String>,
}

impl AnalysisEdit {
    pub fn apply(self, target: &mut DrawingAnalysis) {
        if let Some(subject) = self.subject {
            target.subject = subject;
        }
        if let Some(setting) = self.setting {
            target.setting = setting;
        }
        if let Some(mood) = self.mood {
            target.mood = mood;
        }
    }
}

/// Everything the wizard has accumulated so far.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WizardState {
    pub run_id: Option<String>,
    #[serde(skip)]
    pub drawing: Option<Drawing>,
    pub analysis: Option<DrawingAnalysis>,
    pub customization: Customization,
    pub script: Option<StoryScript>,
    pub video: Option<VideoResult>,
}

impl WizardState {
    /// No step has produced a result yet.
    pub fn has_no_progress(&self) -> bool {
        self.analysis.is_none() && self.script.is_none() && self.video.is_none()
    }
}
