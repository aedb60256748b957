//! Payloads that M-Pesa posts back to the application.
//!
//! Every operation in [`crate::MpesaApi`] only acknowledges that a request was accepted. The final outcome is
//! delivered later to the callback / result URL given in the request. These types parse those deliveries so the
//! application can reconcile them with the identifiers it stored when the request was made:
//!
//! * [`StkCallback`] carries the `MerchantRequestID` / `CheckoutRequestID` pair returned by
//!   [`crate::MpesaApi::push_payment`].
//! * [`ResultCallback`] carries the `ConversationID` / `OriginatorConversationID` pair returned by disbursements,
//!   balance queries, status queries and reversals.
//! * [`C2bNotification`] is what arrives at the validation and confirmation URLs registered with
//!   [`crate::MpesaApi::register_urls`]; the validation URL answers with a [`C2bValidationResponse`].

use chrono::NaiveDateTime;
use mpg_common::Shillings;
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::{
    helpers::{de_opt_string_lenient, de_string_lenient},
    MpesaApiError,
};

const CALLBACK_DATE_FORMAT: &str = "%Y%m%d%H%M%S";

fn parse_payload<T: DeserializeOwned>(json: &str) -> Result<T, MpesaApiError> {
    serde_json::from_str(json).map_err(|e| MpesaApiError::JsonError(e.to_string()))
}

fn value_as_amount(value: &Value) -> Option<Shillings> {
    match value {
        Value::Number(n) => n.as_f64().and_then(|v| Shillings::try_from(v).ok()),
        Value::String(s) => s.parse::<Shillings>().ok(),
        _ => None,
    }
}

fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Daraja sends a single-element list as a bare object in some result payloads.
fn de_one_or_many<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany<T> {
        Many(Vec<T>),
        One(T),
    }
    match OneOrMany::deserialize(d)? {
        OneOrMany::Many(v) => Ok(v),
        OneOrMany::One(v) => Ok(vec![v]),
    }
}

//--------------------------------------      STK push         --------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StkCallback {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(deserialize_with = "de_string_lenient")]
    pub result_code: String,
    pub result_desc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_metadata: Option<CallbackMetadata>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallbackMetadata {
    #[serde(rename = "Item", default, deserialize_with = "de_one_or_many")]
    pub items: Vec<CallbackItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackItem {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value", default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

#[derive(Deserialize)]
struct StkCallbackEnvelope {
    #[serde(rename = "Body")]
    body: StkCallbackBody,
}

#[derive(Deserialize)]
struct StkCallbackBody {
    #[serde(rename = "stkCallback")]
    stk_callback: StkCallback,
}

impl StkCallback {
    /// Parses the full callback body, `{"Body": {"stkCallback": {...}}}`.
    pub fn from_json(json: &str) -> Result<Self, MpesaApiError> {
        parse_payload::<StkCallbackEnvelope>(json).map(|e| e.body.stk_callback)
    }

    pub fn is_success(&self) -> bool {
        self.result_code == "0"
    }

    pub fn item(&self, name: &str) -> Option<&Value> {
        self.callback_metadata.as_ref()?.items.iter().find(|i| i.name == name)?.value.as_ref()
    }

    pub fn amount(&self) -> Option<Shillings> {
        self.item("Amount").and_then(value_as_amount)
    }

    pub fn receipt_number(&self) -> Option<String> {
        self.item("MpesaReceiptNumber").and_then(value_as_string)
    }

    pub fn phone_number(&self) -> Option<u64> {
        self.item("PhoneNumber").and_then(value_as_string).and_then(|s| s.parse::<u64>().ok())
    }

    /// The completion time, in East Africa Time as reported by M-Pesa.
    pub fn transaction_date(&self) -> Option<NaiveDateTime> {
        self.item("TransactionDate")
            .and_then(value_as_string)
            .and_then(|s| NaiveDateTime::parse_from_str(&s, CALLBACK_DATE_FORMAT).ok())
    }
}

//--------------------------------------   Async results       --------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResultCallback {
    #[serde(default, deserialize_with = "de_string_lenient")]
    pub result_type: String,
    #[serde(deserialize_with = "de_string_lenient")]
    pub result_code: String,
    pub result_desc: String,
    #[serde(rename = "OriginatorConversationID")]
    pub originator_conversation_id: String,
    #[serde(rename = "ConversationID")]
    pub conversation_id: String,
    #[serde(rename = "TransactionID", default, deserialize_with = "de_opt_string_lenient")]
    pub transaction_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_parameters: Option<ResultParameters>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultParameters {
    #[serde(rename = "ResultParameter", default, deserialize_with = "de_one_or_many")]
    pub parameters: Vec<ResultParameter>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultParameter {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Value", default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

#[derive(Deserialize)]
struct ResultEnvelope {
    #[serde(rename = "Result")]
    result: ResultCallback,
}

impl ResultCallback {
    /// Parses the full result body, `{"Result": {...}}`.
    pub fn from_json(json: &str) -> Result<Self, MpesaApiError> {
        parse_payload::<ResultEnvelope>(json).map(|e| e.result)
    }

    pub fn is_success(&self) -> bool {
        self.result_code == "0"
    }

    pub fn parameter(&self, key: &str) -> Option<&Value> {
        self.result_parameters.as_ref()?.parameters.iter().find(|p| p.key == key)?.value.as_ref()
    }

    pub fn transaction_amount(&self) -> Option<Shillings> {
        self.parameter("TransactionAmount").and_then(value_as_amount)
    }
}

//--------------------------------------         C2B           --------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct C2bNotification {
    pub transaction_type: String,
    #[serde(rename = "TransID")]
    pub trans_id: String,
    pub trans_time: String,
    #[serde(deserialize_with = "de_string_lenient")]
    pub trans_amount: String,
    #[serde(deserialize_with = "de_string_lenient")]
    pub business_short_code: String,
    #[serde(default)]
    pub bill_ref_number: String,
    #[serde(default)]
    pub invoice_number: String,
    #[serde(default, deserialize_with = "de_string_lenient")]
    pub org_account_balance: String,
    #[serde(rename = "ThirdPartyTransID", default)]
    pub third_party_trans_id: String,
    #[serde(rename = "MSISDN", deserialize_with = "de_string_lenient")]
    pub msisdn: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub middle_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl C2bNotification {
    pub fn from_json(json: &str) -> Result<Self, MpesaApiError> {
        parse_payload(json)
    }

    pub fn amount(&self) -> Result<Shillings, MpesaApiError> {
        self.trans_amount.parse::<Shillings>().map_err(|e| MpesaApiError::JsonError(e.to_string()))
    }

    pub fn trans_time(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.trans_time, CALLBACK_DATE_FORMAT).ok()
    }
}

/// The body a validation URL returns to accept or reject an incoming C2B payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct C2bValidationResponse {
    pub result_code: String,
    pub result_desc: String,
}

impl C2bValidationResponse {
    pub fn accept() -> Self {
        Self { result_code: "0".to_string(), result_desc: "Accepted".to_string() }
    }

    /// `code` is one of Daraja's rejection codes, e.g. `C2B00012` (invalid account number).
    pub fn reject(code: &str) -> Self {
        Self { result_code: code.to_string(), result_desc: "Rejected".to_string() }
    }
}
