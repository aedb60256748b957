//! Provider responses and the stable result objects they are mapped to.
//!
//! Daraja responds in PascalCase with inconsistent acronyms (`MerchantRequestID`, `OriginatorCoversationID`). Each
//! operation's result type renames those into camelCase so that callers can store or forward them without caring
//! about the provider's spelling.

use serde::{Deserialize, Serialize};

use crate::helpers::de_string_lenient;

//--------------------------------------   Provider responses   -------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct StkPushResponse {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(default, deserialize_with = "de_string_lenient")]
    pub response_code: String,
    #[serde(default)]
    pub response_description: String,
    #[serde(default)]
    pub customer_message: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct StkQueryResponse {
    #[serde(deserialize_with = "de_string_lenient")]
    pub result_code: String,
    pub result_desc: String,
    #[serde(default, rename = "MerchantRequestID")]
    pub merchant_request_id: String,
    #[serde(default, rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct RegisterUrlsResponse {
    pub response_description: String,
    /// Daraja really does spell it this way on this endpoint.
    #[serde(default, alias = "OriginatorConversationID", rename = "OriginatorCoversationID")]
    pub originator_conversation_id: String,
}

/// The acknowledgement shared by the simulate, B2C, balance, status and reversal endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ConversationResponse {
    #[serde(rename = "ConversationID")]
    pub conversation_id: String,
    #[serde(rename = "OriginatorConversationID", alias = "OriginatorCoversationID")]
    pub originator_conversation_id: String,
    pub response_description: String,
}

//--------------------------------------        Results         -------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushPaymentResult {
    pub merchant_request_id: String,
    pub checkout_request_id: String,
    pub response_code: String,
    pub response_description: String,
    pub customer_message: String,
}

impl From<StkPushResponse> for PushPaymentResult {
    fn from(r: StkPushResponse) -> Self {
        Self {
            merchant_request_id: r.merchant_request_id,
            checkout_request_id: r.checkout_request_id,
            response_code: r.response_code,
            response_description: r.response_description,
            customer_message: r.customer_message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushPaymentStatus {
    pub result_code: String,
    pub result_desc: String,
    pub merchant_request_id: String,
    pub checkout_request_id: String,
}

impl PushPaymentStatus {
    /// `0` means the customer completed the payment. Anything else is a cancellation, timeout or failure.
    pub fn is_success(&self) -> bool {
        self.result_code == "0"
    }
}

impl From<StkQueryResponse> for PushPaymentStatus {
    fn from(r: StkQueryResponse) -> Self {
        Self {
            result_code: r.result_code,
            result_desc: r.result_desc,
            merchant_request_id: r.merchant_request_id,
            checkout_request_id: r.checkout_request_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterUrlsResult {
    pub response_description: String,
    pub originator_conversation_id: String,
}

impl From<RegisterUrlsResponse> for RegisterUrlsResult {
    fn from(r: RegisterUrlsResponse) -> Self {
        Self { response_description: r.response_description, originator_conversation_id: r.originator_conversation_id }
    }
}

/// Returned by every asynchronous operation. The final outcome arrives later at the operation's result URL and can
/// be matched up using `conversation_id` / `originator_conversation_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationResult {
    pub conversation_id: String,
    pub originator_conversation_id: String,
    pub response_description: String,
}

impl From<ConversationResponse> for ConversationResult {
    fn from(r: ConversationResponse) -> Self {
        Self {
            conversation_id: r.conversation_id,
            originator_conversation_id: r.originator_conversation_id,
            response_description: r.response_description,
        }
    }
}
