use thiserror::Error;

#[derive(Debug, Error)]
pub enum MpesaApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Could not obtain an access token. Error {status}. {message}")]
    AuthError { status: u16, message: String },
    #[error("Could not derive credential: {0}")]
    CryptoError(String),
    #[error("Invalid request: {0}")]
    ValidationError(String),
    #[error("M-Pesa rejected the request. Error {status}. {message}")]
    ProviderError { status: u16, message: String },
    #[error("Request timed out: {0}")]
    Timeout(String),
    #[error("Could not reach M-Pesa: {0}")]
    TransportError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
}

impl MpesaApiError {
    /// Classifies a transport failure from `reqwest`, keeping timeouts distinct from other network errors.
    pub fn from_transport(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else {
            Self::TransportError(e.to_string())
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid M-Pesa configuration. {}", .0.join(" "))]
pub struct MpesaConfigError(pub Vec<String>);

impl From<MpesaConfigError> for MpesaApiError {
    fn from(e: MpesaConfigError) -> Self {
        Self::ValidationError(e.to_string())
    }
}
