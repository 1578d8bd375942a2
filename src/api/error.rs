//! Tipos de erro para o cliente HTTP do backend NoComelon.
//!
//! Define [`ApiError`] com variantes para respostas HTTP de erro e falhas de
//! rede. Usa `thiserror` para derivar `Display` e `Error` a partir dos
//! atributos `#[error(...)]`.

use thiserror::Error;

/// Erros que podem ocorrer ao chamar o backend.
///
/// - [`Status`](ApiError::Status): o servidor respondeu com 4xx/5xx
/// - [`Network`](ApiError::Network): falha na camada de rede ou no JSON da resposta
/// - [`InvalidUrl`](ApiError::InvalidUrl): a URL base configurada não é válida
#[derive(Debug, Error)]
pub enum ApiError {
    /// Erro retornado pela API (ex.: 404 job inexistente, 500 erro interno).
    /// Contém o código HTTP e o corpo da resposta.
    #[error("API error (status {status}): {message}")]
    Status { status: u16, message: String },

    /// Falha de rede subjacente (DNS, conexão recusada, timeout, corpo inválido).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A URL base não pôde ser combinada com o caminho do endpoint.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_display() {
        let err = ApiError::Status {
            status: 404,
            message: "Job not found".into(),
        };
        assert_eq!(err.to_string(), "API error (status 404): Job not found");
    }

    #[test]
    fn invalid_url_display() {
        let err = ApiError::InvalidUrl("not a url".into());
        assert_eq!(err.to_string(), "invalid URL: not a url");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ApiError>();
    }
}
