use std::{env, fmt::Display, str::FromStr, time::Duration};

use log::*;
use mpg_common::{helpers::parse_boolean_flag, Secret};
use url::Url;

use crate::MpesaConfigError;

pub const SANDBOX_BASE_URL: &str = "https://sandbox.safaricom.co.ke";
pub const PRODUCTION_BASE_URL: &str = "https://api.safaricom.co.ke";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Sandbox,
    Production,
}

impl Environment {
    pub fn base_url(&self) -> &'static str {
        match self {
            Self::Sandbox => SANDBOX_BASE_URL,
            Self::Production => PRODUCTION_BASE_URL,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sandbox" | "test" | "development" => Ok(Self::Sandbox),
            "production" | "prod" | "live" => Ok(Self::Production),
            _ => Err(format!("'{s}' is not a valid M-Pesa environment. Use 'sandbox' or 'production'")),
        }
    }
}

impl Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sandbox => write!(f, "sandbox"),
            Self::Production => write!(f, "production"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MpesaConfig {
    pub environment: Environment,
    /// Scheme and host that requests are sent to. Defaults to the environment's host; tests point this at a mock
    /// server.
    pub base_url: String,
    pub consumer_key: String,
    pub consumer_secret: Secret<String>,
    /// The paybill or till number used as `BusinessShortCode`/`PartyA`/`ShortCode` in requests.
    pub shortcode: Option<u64>,
    /// Online passkey, needed for STK push requests and queries.
    pub passkey: Secret<String>,
    /// API operator username for B2C, balance, status and reversal calls.
    pub initiator_name: String,
    pub initiator_password: Secret<String>,
    /// A security credential generated ahead of time (e.g. from the developer portal). Takes precedence over
    /// `initiator_password` + the environment's certificate.
    pub security_credential: Option<Secret<String>>,
    /// PEM text of the sandbox public certificate, used to encrypt `initiator_password` against the sandbox.
    pub sandbox_certificate_pem: Option<String>,
    /// PEM text of the production public certificate. Sandbox and production keys are not interchangeable.
    pub production_certificate_pem: Option<String>,
    pub timeout: Duration,
    /// When true, the provider's length limits on push-payment reference and description are enforced locally.
    pub strict_validation: bool,
}

impl Default for MpesaConfig {
    fn default() -> Self {
        Self::new(Environment::Sandbox, "", "")
    }
}

impl MpesaConfig {
    pub fn new(environment: Environment, consumer_key: &str, consumer_secret: &str) -> Self {
        Self {
            environment,
            base_url: environment.base_url().to_string(),
            consumer_key: consumer_key.to_string(),
            consumer_secret: Secret::from(consumer_secret),
            shortcode: None,
            passkey: Secret::default(),
            initiator_name: String::default(),
            initiator_password: Secret::default(),
            security_credential: None,
            sandbox_certificate_pem: None,
            production_certificate_pem: None,
            timeout: DEFAULT_TIMEOUT,
            strict_validation: true,
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_shortcode(mut self, shortcode: u64) -> Self {
        self.shortcode = Some(shortcode);
        self
    }

    pub fn with_passkey(mut self, passkey: &str) -> Self {
        self.passkey = Secret::from(passkey);
        self
    }

    pub fn with_initiator(mut self, name: &str, password: &str) -> Self {
        self.initiator_name = name.to_string();
        self.initiator_password = Secret::from(password);
        self
    }

    pub fn with_security_credential(mut self, credential: &str) -> Self {
        self.security_credential = Some(Secret::from(credential));
        self
    }

    /// Sets the public certificate for `environment`. Only the certificate of the configured environment is ever
    /// used to encrypt the initiator password.
    pub fn with_certificate(mut self, environment: Environment, pem: &str) -> Self {
        let pem = Some(pem.to_string());
        match environment {
            Environment::Sandbox => self.sandbox_certificate_pem = pem,
            Environment::Production => self.production_certificate_pem = pem,
        }
        self
    }

    /// The certificate for the configured environment, if one has been supplied.
    pub fn certificate(&self) -> Option<&str> {
        let pem = match self.environment {
            Environment::Sandbox => self.sandbox_certificate_pem.as_deref(),
            Environment::Production => self.production_certificate_pem.as_deref(),
        };
        pem.filter(|p| !p.trim().is_empty())
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_strict_validation(mut self, strict: bool) -> Self {
        self.strict_validation = strict;
        self
    }

    pub fn from_env_or_default() -> Self {
        let environment = env::var("MPESA_ENVIRONMENT")
            .ok()
            .and_then(|s| {
                s.parse::<Environment>()
                    .map_err(|e| error!("🪛️ {e}. Falling back to the sandbox environment."))
                    .ok()
            })
            .unwrap_or_else(|| {
                warn!("🪛️ MPESA_ENVIRONMENT not set, using sandbox");
                Environment::Sandbox
            });
        let consumer_key = env::var("MPESA_CONSUMER_KEY").unwrap_or_else(|_| {
            warn!("🪛️ MPESA_CONSUMER_KEY not set. Token requests will fail.");
            String::default()
        });
        let consumer_secret = env::var("MPESA_CONSUMER_SECRET").unwrap_or_else(|_| {
            warn!("🪛️ MPESA_CONSUMER_SECRET not set. Token requests will fail.");
            String::default()
        });
        let mut config = Self::new(environment, &consumer_key, &consumer_secret);
        if let Ok(base_url) = env::var("MPESA_BASE_URL") {
            info!("🪛️ Using {base_url} instead of the default {environment} host");
            config = config.with_base_url(&base_url);
        }
        config.shortcode = env::var("MPESA_SHORTCODE").ok().and_then(|s| {
            s.trim()
                .parse::<u64>()
                .map_err(|e| error!("🪛️ {s} is not a valid value for MPESA_SHORTCODE. {e}"))
                .ok()
        });
        config.passkey = Secret::new(env::var("MPESA_PASSKEY").unwrap_or_default());
        config.initiator_name = env::var("MPESA_INITIATOR_NAME").unwrap_or_default();
        config.initiator_password = Secret::new(env::var("MPESA_INITIATOR_PASSWORD").unwrap_or_default());
        config.security_credential = env::var("MPESA_SECURITY_CREDENTIAL").ok().map(Secret::new);
        config.sandbox_certificate_pem = env::var("MPESA_SANDBOX_CERTIFICATE_PEM").ok();
        config.production_certificate_pem = env::var("MPESA_PRODUCTION_CERTIFICATE_PEM").ok();
        config.timeout = env::var("MPESA_TIMEOUT_SECS")
            .ok()
            .and_then(|s| {
                s.parse::<u64>()
                    .map_err(|e| {
                        error!("🪛️ {s} is not a valid timeout for MPESA_TIMEOUT_SECS. {e} Using the default instead.")
                    })
                    .ok()
            })
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT);
        config.strict_validation = parse_boolean_flag(env::var("MPESA_STRICT_VALIDATION").ok(), true);
        config
    }

    /// Checks the fields every operation needs. All problems are reported at once.
    pub fn validate(&self) -> Result<(), MpesaConfigError> {
        let mut errors = vec![];
        if self.consumer_key.trim().is_empty() {
            errors.push("The consumer key is missing.".to_string());
        }
        if self.consumer_secret.is_empty() {
            errors.push("The consumer secret is missing.".to_string());
        }
        match Url::parse(&self.base_url) {
            Ok(url) if self.environment.is_production() && url.scheme() != "https" && !is_loopback(&url) => {
                errors.push(format!("Production requests must use https, not {}.", url.scheme()));
            },
            Ok(_) => (),
            Err(e) => errors.push(format!("'{}' is not a valid base url. {e}.", self.base_url)),
        }
        if self.timeout.is_zero() {
            errors.push("The request timeout must be greater than zero.".to_string());
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(MpesaConfigError(errors))
        }
    }

    /// The shortcode and passkey needed to sign STK push requests.
    pub fn push_credentials(&self) -> Result<(u64, &Secret<String>), MpesaConfigError> {
        let mut errors = vec![];
        if self.shortcode.is_none() {
            errors.push("A business shortcode is required for push payments.".to_string());
        }
        if self.passkey.is_empty() {
            errors.push("A passkey is required for push payments.".to_string());
        }
        match self.shortcode {
            Some(code) if errors.is_empty() => Ok((code, &self.passkey)),
            _ => Err(MpesaConfigError(errors)),
        }
    }

    pub fn require_shortcode(&self) -> Result<u64, MpesaConfigError> {
        self.shortcode.ok_or_else(|| MpesaConfigError(vec!["A business shortcode is required.".to_string()]))
    }

    /// Checks that B2C-class operations (disbursement, balance, status, reversal) can be authorised.
    pub fn validate_initiator(&self) -> Result<(), MpesaConfigError> {
        let mut errors = vec![];
        if self.shortcode.is_none() {
            errors.push("A business shortcode is required.".to_string());
        }
        if self.initiator_name.trim().is_empty() {
            errors.push("An initiator name is required.".to_string());
        }
        let has_credential = self.security_credential.as_ref().is_some_and(|c| !c.is_empty());
        if !has_credential {
            if self.initiator_password.is_empty() {
                errors.push("Either a security credential or an initiator password is required.".to_string());
            }
            if self.certificate().is_none() {
                errors.push(format!(
                    "Either a security credential or the {} certificate is required.",
                    self.environment
                ));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(MpesaConfigError(errors))
        }
    }
}

fn is_loopback(url: &Url) -> bool {
    matches!(url.host_str(), Some("localhost") | Some("127.0.0.1") | Some("[::1]"))
}
