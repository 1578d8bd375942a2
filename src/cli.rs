//! Interface de linha de comando do NoComelon baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (um por passo do wizard,
//! mais biblioteca, status e utilitários) e flags globais
//! (--user, --api-url, --poll-interval, --verbose).

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::api::{Style, Theme, VoiceType};
use crate::wizard::CustomizationPatch;

/// NoComelon: transforma o desenho de uma criança em um livro narrado.
#[derive(Debug, Parser)]
#[command(name = "nocomelon", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Identificador do usuário (sobrescreve NOCOMELON_USER_ID).
    #[arg(long, global = true)]
    pub user: Option<String>,

    /// URL base do backend (sobrescreve NOCOMELON_API_URL).
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Intervalo de polling em milissegundos.
    #[arg(long, global = true)]
    pub poll_interval: Option<u64>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

/// Estilo aceito pela CLI, mapeado para [`Style`] internamente.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StyleArg {
    /// Ilustração clássica de livro infantil.
    Storybook,
    /// Aquarela suave.
    Watercolor,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ThemeArg {
    Adventure,
    Kindness,
    Bravery,
    Bedtime,
    Friendship,
    Counting,
    Nature,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum VoiceArg {
    /// Calma e acolhedora, boa para a hora de dormir.
    Gentle,
    /// Animada, boa para crianças menores.
    Cheerful,
}

impl From<StyleArg> for Style {
    fn from(arg: StyleArg) -> Self {
        match arg {
            StyleArg::Storybook => Style::Storybook,
            StyleArg::Watercolor => Style::Watercolor,
        }
    }
}

impl From<ThemeArg> for Theme {
    fn from(arg: ThemeArg) -> Self {
        match arg {
            ThemeArg::Adventure => Theme::Adventure,
            ThemeArg::Kindness => Theme::Kindness,
            ThemeArg::Bravery => Theme::Bravery,
            ThemeArg::Bedtime => Theme::Bedtime,
            ThemeArg::Friendship => Theme::Friendship,
            ThemeArg::Counting => Theme::Counting,
            ThemeArg::Nature => Theme::Nature,
        }
    }
}

impl From<VoiceArg> for VoiceType {
    fn from(arg: VoiceArg) -> Self {
        match arg {
            VoiceArg::Gentle => VoiceType::Gentle,
            VoiceArg::Cheerful => VoiceType::Cheerful,
        }
    }
}

/// Opções de personalização da história.
#[derive(Debug, Clone, Default, Args)]
pub struct CustomizeArgs {
    /// Estilo visual das ilustrações.
    #[arg(long)]
    pub style: Option<StyleArg>,

    /// Tema da história.
    #[arg(long)]
    pub theme: Option<ThemeArg>,

    /// Voz do narrador.
    #[arg(long)]
    pub voice: Option<VoiceArg>,

    /// Idade da criança (3 a 7).
    #[arg(long)]
    pub age: Option<u8>,

    /// Nota pessoal sobre a criança, incluída na história.
    #[arg(long)]
    pub note: Option<String>,
}

impl CustomizeArgs {
    pub fn into_patch(self) -> CustomizationPatch {
        CustomizationPatch {
            style: self.style.map(Into::into),
            theme: self.theme.map(Into::into),
            voice: self.voice.map(Into::into),
            age: self.age,
            personal_context: self.note,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Envia um desenho e executa a análise de visão.
    Upload {
        /// Caminho da imagem do desenho.
        image: PathBuf,
    },

    /// Corrige o resultado da análise.
    EditAnalysis {
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        setting: Option<String>,
        #[arg(long)]
        mood: Option<String>,
    },

    /// Escolhe estilo, tema, voz, idade e nota pessoal.
    Customize(CustomizeArgs),

    /// Gera (ou mostra) o roteiro da história.
    Script {
        /// Descarta o roteiro atual e gera outro.
        #[arg(long)]
        regenerate: bool,

        /// Número da cena a editar (começa em 1).
        #[arg(long, requires = "text")]
        scene: Option<usize>,

        /// Novo texto da cena.
        #[arg(long, requires = "scene")]
        text: Option<String>,
    },

    /// Gera o vídeo narrado.
    Preview,

    /// Salva o livro na biblioteca e reinicia o wizard.
    Save {
        /// Título do livro; usa o título do roteiro se omitido.
        #[arg(long)]
        title: Option<String>,
    },

    /// Descarta o progresso atual do wizard.
    Discard,

    /// Executa o wizard inteiro a partir de uma imagem.
    Run {
        /// Caminho da imagem do desenho.
        image: PathBuf,

        #[command(flatten)]
        customize: CustomizeArgs,

        /// Título do livro salvo.
        #[arg(long)]
        title: Option<String>,
    },

    /// Mostra o progresso do wizard e o status do job atual.
    Status {
        /// Imprime o status do job em JSON.
        #[arg(long)]
        json: bool,
    },

    /// Recupera o progresso a partir do checkpoint do job.
    Resume,

    /// Acompanha um job até terminar.
    Watch {
        /// Identificador do job.
        run_id: String,
    },

    /// Gerencia a biblioteca de livros salvos.
    Library {
        #[command(subcommand)]
        action: LibraryAction,
    },

    /// Resolve uma chave de armazenamento em uma URL temporária.
    Url {
        /// Chave da mídia (ex.: "user/run/final.mp4").
        key: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum LibraryAction {
    /// Lista os livros salvos.
    List,
    /// Remove um livro da biblioteca.
    Delete {
        /// Identificador do livro.
        id: String,
    },
}
