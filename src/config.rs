//! Configuração do NoComelon carregada a partir de `nocomelon.toml`.
//!
//! A struct [`NocomelonConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! As variáveis de ambiente `NOCOMELON_API_URL` e `NOCOMELON_USER_ID` têm
//! precedência sobre o arquivo.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::client::DEFAULT_BASE_URL;
use crate::error::NocomelonError;

/// Configuração de nível superior carregada de `nocomelon.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct NocomelonConfig {
    /// URL base do backend.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Identificador do usuário, fornecido pelo provedor de identidade.
    #[serde(default)]
    pub user_id: String,

    /// Intervalo entre consultas de status, em milissegundos.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Timeout de cada requisição HTTP, em segundos.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Diretório onde o estado do wizard é salvo.
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
}

// Valor padrão para a URL do backend: servidor local de desenvolvimento.
fn default_api_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

// Valor padrão para o intervalo de polling: 2000ms.
fn default_poll_interval_ms() -> u64 {
    2000
}

// Valor padrão para o timeout de requisição: 30s.
fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for NocomelonConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            user_id: String::new(),
            poll_interval_ms: default_poll_interval_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            state_dir: None,
        }
    }
}

impl NocomelonConfig {
    /// Carrega a configuração de `nocomelon.toml` no diretório atual.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load() -> Result<Self, NocomelonError> {
        let mut config = Self::load_from(Path::new("nocomelon.toml"))?;

        // Variáveis de ambiente têm precedência sobre o arquivo de configuração.
        if let Ok(url) = std::env::var("NOCOMELON_API_URL") {
            if !url.is_empty() {
                config.api_base_url = url;
            }
        }
        if let Ok(user) = std::env::var("NOCOMELON_USER_ID") {
            if !user.is_empty() {
                config.user_id = user;
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Lê um arquivo específico, sem aplicar variáveis de ambiente.
    pub fn load_from(path: &Path) -> Result<Self, NocomelonError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str::<NocomelonConfig>(&contents)?)
    }

    /// Rejeita valores que tornariam o polling inútil.
    pub fn validate(&self) -> Result<(), NocomelonError> {
        if self.poll_interval_ms == 0 {
            return Err(NocomelonError::Config(
                "poll_interval_ms must be greater than zero".into(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(NocomelonError::Config(
                "request_timeout_secs must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Diretório do estado: o configurado, senão `<data_local_dir>/nocomelon`,
    /// senão `.nocomelon` no diretório atual.
    pub fn state_dir(&self) -> PathBuf {
        if let Some(dir) = &self.state_dir {
            return dir.clone();
        }
        dirs::data_local_dir()
            .map(|d| d.join("nocomelon"))
            .unwrap_or_else(|| PathBuf::from(".nocomelon"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = NocomelonConfig::default();
        assert_eq!(config.api_base_url, "http://localhost:8000");
        assert_eq!(config.poll_interval_ms, 2000);
        assert_eq!(config.request_timeout_secs, 30);
        assert!(config.user_id.is_empty());
        assert!(config.state_dir.is_none());
    }

    #[test]
    fn deserialize_partial_toml() {
        let toml_str = r#"
            user_id = "user123"
            poll_interval_ms = 500
        "#;
        let config: NocomelonConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.user_id, "user123");
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.api_base_url, "http://localhost:8000");
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nocomelon.toml");
        std::fs::write(
            &path,
            "api_base_url = \"https://api.nocomelon.example\"\nstate_dir = \"/tmp/wizard\"\n",
        )
        .unwrap();

        let config = NocomelonConfig::load_from(&path).unwrap();
        assert_eq!(config.api_base_url, "https://api.nocomelon.example");
        assert_eq!(config.state_dir(), PathBuf::from("/tmp/wizard"));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = NocomelonConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.poll_interval_ms, 2000);
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nocomelon.toml");
        std::fs::write(&path, "poll_interval_ms = \"fast\"").unwrap();
        assert!(matches!(
            NocomelonConfig::load_from(&path),
            Err(NocomelonError::Toml(_))
        ));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let config = NocomelonConfig {
            poll_interval_ms: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(NocomelonError::Config(_))));
    }
}
