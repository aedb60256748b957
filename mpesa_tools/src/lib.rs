//! A typed async client for the Safaricom M-Pesa "Daraja" API.
//!
//! [`MpesaApi`] wraps each Daraja operation in a method that takes care of access tokens, request passwords and
//! security credentials. Each call makes exactly one HTTP request and returns the provider's acknowledgement; final
//! outcomes are delivered asynchronously and can be parsed with the types in [`callbacks`].

mod api;
pub mod callbacks;
mod config;
mod credentials;
mod data_objects;
mod error;
mod helpers;
mod requests;
mod responses;

pub use api::{
    MpesaApi,
    B2C_PATH,
    BALANCE_PATH,
    REGISTER_URLS_PATH,
    REVERSAL_PATH,
    SIMULATE_PATH,
    STK_PUSH_PATH,
    STK_QUERY_PATH,
    TOKEN_PATH,
    TRANSACTION_STATUS_PATH,
};
pub use callbacks::{C2bNotification, C2bValidationResponse, ResultCallback, StkCallback};
pub use config::{Environment, MpesaConfig, PRODUCTION_BASE_URL, SANDBOX_BASE_URL};
pub use credentials::{derive_password, derive_security_credential, AccessToken, TokenResponse};
pub use data_objects::{CommandId, IdentifierType, ResponseType, TransactionType};
pub use error::{MpesaApiError, MpesaConfigError};
pub use helpers::timestamp;
pub use mpg_common::{Secret, Shillings};
pub use requests::{
    BalanceQueryRequest,
    DisbursementRequest,
    PushPaymentRequest,
    RegisterUrlsRequest,
    ReversalRequest,
    SimulateRequest,
    TransactionStatusRequest,
};
pub use responses::{ConversationResult, PushPaymentResult, PushPaymentStatus, RegisterUrlsResult};
