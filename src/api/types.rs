//! Tipos de dados trocados com o backend NoComelon.
//!
//! Todas as structs derivam `Serialize` e `Deserialize` para conversão JSON
//! conforme o formato esperado pelos endpoints `/api/v1/*`. Os enums de
//! estilo, tema e voz são serializados em minúsculas, como o backend espera.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Estilo visual das ilustrações geradas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    #[default]
    Storybook,
    Watercolor,
}

/// Tema da história.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Adventure,
    Kindness,
    Bravery,
    Bedtime,
    Friendship,
    Counting,
    Nature,
}

/// Voz do narrador.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceType {
    #[default]
    Gentle,
    Cheerful,
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Style::Storybook => write!(f, "storybook"),
            Style::Watercolor => write!(f, "watercolor"),
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Theme::Adventure => "adventure",
            Theme::Kindness => "kindness",
            Theme::Bravery => "bravery",
            Theme::Bedtime => "bedtime",
            Theme::Friendship => "friendship",
            Theme::Counting => "counting",
            Theme::Nature => "nature",
        };
        write!(f, "{name}")
    }
}

impl fmt::Display for VoiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoiceType::Gentle => write!(f, "gentle"),
            VoiceType::Cheerful => write!(f, "cheerful"),
        }
    }
}

/// Resultado da análise de visão sobre o desenho da criança.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawingAnalysis {
    /// Assunto principal do desenho.
    pub subject: String,
    /// Cenário ou plano de fundo.
    pub setting: String,
    /// Detalhes notáveis.
    #[serde(default)]
    pub details: Vec<String>,
    /// Humor ou emoção aparente.
    pub mood: String,
    /// Cores predominantes.
    #[serde(default)]
    pub colors: Vec<String>,
}

/// Uma cena do roteiro.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    pub number: u32,
    pub text: String,
}

/// Roteiro completo da história, dividido em cenas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryScript {
    /// Título sugerido pelo backend. Ausente em roteiros antigos.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub scenes: Vec<Scene>,
    pub total_scenes: u32,
}

/// Imagem gerada para uma cena, referenciada pela chave de armazenamento.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedImage {
    pub scene_number: u32,
    pub key: String,
}

/// Vídeo final montado pelo pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoResult {
    /// Chave de armazenamento do vídeo.
    pub video_key: String,
    pub duration_sec: f64,
    /// Chave de armazenamento da miniatura.
    pub thumbnail_key: String,
}

/// Um livro salvo na biblioteca do usuário.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryEntry {
    pub id: String,
    pub title: String,
    pub thumbnail_key: String,
    pub video_key: String,
    pub duration_sec: f64,
    pub style: Style,
    /// Timestamp ISO-8601.
    pub created_at: String,
}

/// Estado de um job assíncrono no servidor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Processing,
    Complete,
    Error,
}

impl JobState {
    /// `complete` e `error` encerram o polling.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Complete | JobState::Error)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Processing => write!(f, "processing"),
            JobState::Complete => write!(f, "complete"),
            JobState::Error => write!(f, "error"),
        }
    }
}

/// Resposta imediata dos endpoints que disparam um job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsyncJobResponse {
    pub run_id: String,
    pub status: JobState,
    #[serde(default)]
    pub current_stage: Option<String>,
}

/// Snapshot do progresso de um job, devolvido por `GET /api/v1/jobs/{run_id}/status`.
///
/// Nunca é alterado localmente: cada poll substitui o snapshot anterior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub run_id: String,
    pub user_id: String,
    pub status: JobState,
    /// Rótulo livre da fase atual (ex.: "vision", "story_complete").
    #[serde(default)]
    pub current_stage: Option<String>,
    /// Mensagem de erro, presente apenas quando `status` é `error`.
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub drawing_analysis: Option<DrawingAnalysis>,
    #[serde(default)]
    pub story_script: Option<StoryScript>,
    #[serde(default)]
    pub images: Option<Vec<GeneratedImage>>,
    #[serde(default)]
    pub video: Option<VideoResult>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Os três tipos de job que o backend executa.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Vision,
    Story,
    Pipeline,
}

impl JobKind {
    /// Indica se o snapshot traz o campo de resultado deste tipo de job.
    pub fn has_result(self, status: &JobStatus) -> bool {
        match self {
            JobKind::Vision => status.drawing_analysis.is_some(),
            JobKind::Story => status.story_script.is_some(),
            JobKind::Pipeline => status.video.is_some(),
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::Vision => write!(f, "vision"),
            JobKind::Story => write!(f, "story"),
            JobKind::Pipeline => write!(f, "pipeline"),
        }
    }
}

/// Corpo de `POST /api/v1/vision/analyze`.
#[derive(Debug, Clone, Serialize)]
pub struct VisionRequest<'a> {
    pub image_base64: &'a str,
    pub user_id: &'a str,
}

/// Corpo de `POST /api/v1/story/generate`.
#[derive(Debug, Clone, Serialize)]
pub struct StoryRequest<'a> {
    pub drawing: &'a DrawingAnalysis,
    pub theme: Theme,
    pub voice_type: VoiceType,
    pub child_age: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub personal_context: Option<&'a str>,
    pub user_id: &'a str,
    pub run_id: &'a str,
}

/// Corpo de `POST /api/v1/pipeline/generate`.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineRequest<'a> {
    pub run_id: &'a str,
    pub story: &'a StoryScript,
    pub drawing: &'a DrawingAnalysis,
    pub style: Style,
    pub voice_type: VoiceType,
    pub user_id: &'a str,
}

/// Corpo de `POST /api/v1/storage/presigned-url`.
#[derive(Debug, Clone, Serialize)]
pub struct PresignedUrlRequest<'a> {
    pub s3_key: &'a str,
}

/// URL pré-assinada para baixar uma mídia armazenada.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PresignedUrl {
    pub url: String,
    /// Validade em segundos.
    pub expires_in: u64,
}
