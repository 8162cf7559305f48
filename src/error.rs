use thiserror::Error;

use crate::config::Locale;

/// Closed set of failures a prediction fetch can surface to the UI.
///
/// Provider and transport failures never leak past the client: they are
/// reclassified into one of these kinds first.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PredictionError {
    #[error("provider credential is not configured")]
    CredentialMissing,

    #[error("provider rejected the credential")]
    CredentialInvalid,

    #[error("request blocked by provider safety filters")]
    SafetyBlocked,

    #[error("provider returned an empty payload")]
    EmptyResponse,

    #[error("provider payload did not match the declared schema: {0}")]
    MalformedResponse(String),

    #[error("no matches found for the selected date")]
    NoMatchesFound,

    #[error("provider did not answer within the request timeout")]
    Timeout,

    #[error("provider error: {0}")]
    Unknown(String),
}

impl PredictionError {
    pub fn kind_code(&self) -> &'static str {
        match self {
            PredictionError::CredentialMissing => "API_KEY_MISSING",
            PredictionError::CredentialInvalid => "API_KEY_INVALID",
            PredictionError::SafetyBlocked => "SAFETY_BLOCK",
            PredictionError::EmptyResponse => "EMPTY_RESPONSE",
            PredictionError::MalformedResponse(_) => "MALFORMED_RESPONSE",
            PredictionError::NoMatchesFound => "NO_MATCHES_FOUND",
            PredictionError::Timeout => "TIMEOUT",
            PredictionError::Unknown(_) => "UNKNOWN",
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            PredictionError::CredentialMissing | PredictionError::CredentialInvalid
        )
    }
}

/// Maps provider failure text (and the HTTP status when there is one) onto
/// the closed error set.
///
/// This is substring matching on provider-defined messages and will drift
/// whenever the provider rewords its errors. Keep every heuristic here.
pub fn classify_provider_failure(status: Option<u16>, text: &str) -> PredictionError {
    let lower = text.to_ascii_lowercase();
    if text.contains("API_KEY") || lower.contains("api key") || status == Some(401) {
        return PredictionError::CredentialInvalid;
    }
    if lower.contains("safety") {
        return PredictionError::SafetyBlocked;
    }
    let raw = text.trim();
    if raw.is_empty() {
        return match status {
            Some(code) => PredictionError::Unknown(format!("http {code}")),
            None => PredictionError::Unknown("unknown provider failure".to_string()),
        };
    }
    PredictionError::Unknown(raw.to_string())
}

/// Fixed user-facing text for every error kind.
pub fn user_message(error: &PredictionError, locale: Locale) -> String {
    let text = match (locale, error) {
        (Locale::Pt, PredictionError::CredentialMissing) => {
            "Erro de Configuração: A chave de API não foi encontrada no ambiente do servidor."
        }
        (Locale::Pt, PredictionError::CredentialInvalid) => {
            "Erro de Configuração: A chave de API foi recusada pelo provedor. Verifique o valor configurado."
        }
        (Locale::Pt, PredictionError::SafetyBlocked) => {
            "A consulta foi bloqueada pelos filtros de segurança da IA. Tente outra data."
        }
        (Locale::Pt, PredictionError::EmptyResponse) => {
            "A IA não retornou nenhum conteúdo. Tente novamente em instantes."
        }
        (Locale::Pt, PredictionError::MalformedResponse(_)) => {
            "A resposta da IA veio em um formato inesperado. Tente novamente."
        }
        (Locale::Pt, PredictionError::NoMatchesFound) => {
            "Nenhum jogo encontrado para esta data. Tente outra data."
        }
        (Locale::Pt, PredictionError::Timeout) => {
            "A análise demorou demais para responder. Tente novamente."
        }
        (Locale::Pt, PredictionError::Unknown(_)) => {
            "Não foi possível recuperar os dados. Verifique se a API KEY está configurada."
        }
        (Locale::En, PredictionError::CredentialMissing) => {
            "Configuration error: the API key was not found in the environment."
        }
        (Locale::En, PredictionError::CredentialInvalid) => {
            "Configuration error: the provider rejected the API key. Check the configured value."
        }
        (Locale::En, PredictionError::SafetyBlocked) => {
            "The request was blocked by the AI safety filters. Try another date."
        }
        (Locale::En, PredictionError::EmptyResponse) => {
            "The AI returned no content. Try again in a moment."
        }
        (Locale::En, PredictionError::MalformedResponse(_)) => {
            "The AI response had an unexpected format. Try again."
        }
        (Locale::En, PredictionError::NoMatchesFound) => {
            "No matches found for this date. Try another date."
        }
        (Locale::En, PredictionError::Timeout) => "The analysis took too long to answer. Try again.",
        (Locale::En, PredictionError::Unknown(_)) => {
            "Could not retrieve the predictions. Check that the API key is configured."
        }
    };
    text.to_string()
}
