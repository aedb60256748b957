//! Request parameters for each Daraja operation, and the wire bodies they are turned into.
//!
//! Callers fill in the operation-specific parameters; the values that come from configuration (shortcode, initiator,
//! security credential, password and timestamp) are added by [`crate::MpesaApi`] when the body is built. Field
//! names on the wire are dictated by Daraja and are case-sensitive, including its `Occassion` spelling in B2C.

use mpg_common::Shillings;
use serde::Serialize;
use url::Url;

use crate::{
    data_objects::{CommandId, IdentifierType, ResponseType, TransactionType},
    MpesaApiError,
};

const MAX_ACCOUNT_REFERENCE_LEN: usize = 12;
const MAX_TRANSACTION_DESC_LEN: usize = 13;
const MAX_REMARKS_LEN: usize = 100;

//--------------------------------------   Caller parameters   --------------------------------------------------------

/// An STK push: prompts the customer's phone to authorise a payment to the business.
#[derive(Debug, Clone)]
pub struct PushPaymentRequest {
    pub amount: Shillings,
    /// The paying customer, e.g. `254708374149`. Sent as both `PartyA` and `PhoneNumber`.
    pub phone_number: u64,
    pub callback_url: String,
    pub account_reference: String,
    pub transaction_desc: String,
    pub transaction_type: TransactionType,
    /// The receiving party when it differs from the business shortcode (e.g. a till number under a buy-goods
    /// store number).
    pub party_b: Option<u64>,
}

impl PushPaymentRequest {
    pub fn new(amount: Shillings, phone_number: u64, callback_url: &str, account_reference: &str) -> Self {
        Self {
            amount,
            phone_number,
            callback_url: callback_url.to_string(),
            account_reference: account_reference.to_string(),
            transaction_desc: "Payment".to_string(),
            transaction_type: TransactionType::default(),
            party_b: None,
        }
    }

    pub fn with_description(mut self, desc: &str) -> Self {
        self.transaction_desc = desc.to_string();
        self
    }

    pub fn with_transaction_type(mut self, transaction_type: TransactionType) -> Self {
        self.transaction_type = transaction_type;
        self
    }

    pub fn with_party_b(mut self, party_b: u64) -> Self {
        self.party_b = Some(party_b);
        self
    }

    pub fn validate(&self, strict: bool) -> Result<(), MpesaApiError> {
        validate_amount(self.amount)?;
        validate_url("CallBackURL", &self.callback_url)?;
        validate_text("AccountReference", &self.account_reference, strict.then_some(MAX_ACCOUNT_REFERENCE_LEN))?;
        validate_text("TransactionDesc", &self.transaction_desc, strict.then_some(MAX_TRANSACTION_DESC_LEN))?;
        if strict {
            validate_msisdn(self.phone_number)?;
        }
        Ok(())
    }

    pub(crate) fn to_body(&self, shortcode: u64, password: String, timestamp: &str) -> StkPushBody {
        StkPushBody {
            business_short_code: shortcode,
            password,
            timestamp: timestamp.to_string(),
            transaction_type: self.transaction_type,
            amount: self.amount,
            party_a: self.phone_number,
            party_b: self.party_b.unwrap_or(shortcode),
            phone_number: self.phone_number,
            callback_url: self.callback_url.clone(),
            account_reference: self.account_reference.clone(),
            transaction_desc: self.transaction_desc.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RegisterUrlsRequest {
    pub validation_url: String,
    pub confirmation_url: String,
    pub response_type: ResponseType,
}

impl RegisterUrlsRequest {
    pub fn new(validation_url: &str, confirmation_url: &str) -> Self {
        Self {
            validation_url: validation_url.to_string(),
            confirmation_url: confirmation_url.to_string(),
            response_type: ResponseType::default(),
        }
    }

    pub fn with_response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }

    pub fn validate(&self) -> Result<(), MpesaApiError> {
        validate_url("ValidationURL", &self.validation_url)?;
        validate_url("ConfirmationURL", &self.confirmation_url)
    }

    pub(crate) fn to_body(&self, shortcode: u64) -> RegisterUrlsBody {
        RegisterUrlsBody {
            validation_url: self.validation_url.clone(),
            confirmation_url: self.confirmation_url.clone(),
            response_type: self.response_type,
            short_code: shortcode,
        }
    }
}

/// A simulated C2B payment. Only the sandbox accepts these.
#[derive(Debug, Clone)]
pub struct SimulateRequest {
    pub amount: Shillings,
    pub msisdn: u64,
    pub bill_ref_number: String,
    pub command_id: CommandId,
}

impl SimulateRequest {
    pub fn new(amount: Shillings, msisdn: u64, bill_ref_number: &str) -> Self {
        Self {
            amount,
            msisdn,
            bill_ref_number: bill_ref_number.to_string(),
            command_id: CommandId::CustomerPayBillOnline,
        }
    }

    pub fn with_command_id(mut self, command_id: CommandId) -> Self {
        self.command_id = command_id;
        self
    }

    pub fn validate(&self) -> Result<(), MpesaApiError> {
        validate_amount(self.amount)?;
        if !self.command_id.is_customer_payment() {
            return Err(MpesaApiError::ValidationError(format!(
                "{} is not a valid CommandID for a C2B simulation",
                self.command_id
            )));
        }
        Ok(())
    }

    pub(crate) fn to_body(&self, shortcode: u64) -> SimulateBody {
        SimulateBody {
            amount: self.amount,
            bill_ref_number: self.bill_ref_number.clone(),
            command_id: self.command_id,
            msisdn: self.msisdn,
            short_code: shortcode,
        }
    }
}

/// A B2C payment from the business shortcode to a customer's phone.
#[derive(Debug, Clone)]
pub struct DisbursementRequest {
    pub command_id: CommandId,
    pub amount: Shillings,
    pub phone_number: u64,
    pub remarks: String,
    pub queue_timeout_url: String,
    pub result_url: String,
    pub occasion: String,
}

impl DisbursementRequest {
    pub fn new(amount: Shillings, phone_number: u64, result_url: &str, queue_timeout_url: &str) -> Self {
        Self {
            command_id: CommandId::BusinessPayment,
            amount,
            phone_number,
            remarks: "Payment".to_string(),
            queue_timeout_url: queue_timeout_url.to_string(),
            result_url: result_url.to_string(),
            occasion: String::default(),
        }
    }

    pub fn with_command_id(mut self, command_id: CommandId) -> Self {
        self.command_id = command_id;
        self
    }

    pub fn with_remarks(mut self, remarks: &str) -> Self {
        self.remarks = remarks.to_string();
        self
    }

    pub fn with_occasion(mut self, occasion: &str) -> Self {
        self.occasion = occasion.to_string();
        self
    }

    pub fn validate(&self, strict: bool) -> Result<(), MpesaApiError> {
        validate_amount(self.amount)?;
        if !self.command_id.is_disbursement() {
            return Err(MpesaApiError::ValidationError(format!(
                "{} is not a valid CommandID for a B2C payment",
                self.command_id
            )));
        }
        validate_text("Remarks", &self.remarks, strict.then_some(MAX_REMARKS_LEN))?;
        validate_url("QueueTimeOutURL", &self.queue_timeout_url)?;
        validate_url("ResultURL", &self.result_url)?;
        if strict {
            validate_msisdn(self.phone_number)?;
        }
        Ok(())
    }

    pub(crate) fn to_body(&self, shortcode: u64, initiator: &Initiator) -> DisbursementBody {
        DisbursementBody {
            initiator_name: initiator.name.clone(),
            security_credential: initiator.credential.clone(),
            command_id: self.command_id,
            amount: self.amount,
            party_a: shortcode,
            party_b: self.phone_number,
            remarks: self.remarks.clone(),
            queue_timeout_url: self.queue_timeout_url.clone(),
            result_url: self.result_url.clone(),
            occasion: self.occasion.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BalanceQueryRequest {
    pub identifier_type: IdentifierType,
    pub remarks: String,
    pub queue_timeout_url: String,
    pub result_url: String,
}

impl BalanceQueryRequest {
    pub fn new(result_url: &str, queue_timeout_url: &str) -> Self {
        Self {
            identifier_type: IdentifierType::Shortcode,
            remarks: "Account balance".to_string(),
            queue_timeout_url: queue_timeout_url.to_string(),
            result_url: result_url.to_string(),
        }
    }

    pub fn with_identifier_type(mut self, identifier_type: IdentifierType) -> Self {
        self.identifier_type = identifier_type;
        self
    }

    pub fn with_remarks(mut self, remarks: &str) -> Self {
        self.remarks = remarks.to_string();
        self
    }

    pub fn validate(&self, strict: bool) -> Result<(), MpesaApiError> {
        validate_text("Remarks", &self.remarks, strict.then_some(MAX_REMARKS_LEN))?;
        validate_url("QueueTimeOutURL", &self.queue_timeout_url)?;
        validate_url("ResultURL", &self.result_url)
    }

    pub(crate) fn to_body(&self, shortcode: u64, initiator: &Initiator) -> BalanceQueryBody {
        BalanceQueryBody {
            command_id: CommandId::AccountBalance,
            party_a: shortcode,
            identifier_type: self.identifier_type,
            remarks: self.remarks.clone(),
            initiator: initiator.name.clone(),
            security_credential: initiator.credential.clone(),
            queue_timeout_url: self.queue_timeout_url.clone(),
            result_url: self.result_url.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransactionStatusRequest {
    pub transaction_id: String,
    pub identifier_type: IdentifierType,
    /// The party whose transaction is queried. Defaults to the business shortcode.
    pub party_a: Option<u64>,
    pub remarks: String,
    pub occasion: String,
    pub queue_timeout_url: String,
    pub result_url: String,
}

impl TransactionStatusRequest {
    pub fn new(transaction_id: &str, result_url: &str, queue_timeout_url: &str) -> Self {
        Self {
            transaction_id: transaction_id.to_string(),
            identifier_type: IdentifierType::Shortcode,
            party_a: None,
            remarks: "Transaction status".to_string(),
            occasion: String::default(),
            queue_timeout_url: queue_timeout_url.to_string(),
            result_url: result_url.to_string(),
        }
    }

    pub fn with_party(mut self, party_a: u64, identifier_type: IdentifierType) -> Self {
        self.party_a = Some(party_a);
        self.identifier_type = identifier_type;
        self
    }

    pub fn with_remarks(mut self, remarks: &str) -> Self {
        self.remarks = remarks.to_string();
        self
    }

    pub fn with_occasion(mut self, occasion: &str) -> Self {
        self.occasion = occasion.to_string();
        self
    }

    pub fn validate(&self, strict: bool) -> Result<(), MpesaApiError> {
        validate_text("TransactionID", &self.transaction_id, None)?;
        validate_text("Remarks", &self.remarks, strict.then_some(MAX_REMARKS_LEN))?;
        validate_url("QueueTimeOutURL", &self.queue_timeout_url)?;
        validate_url("ResultURL", &self.result_url)
    }

    pub(crate) fn to_body(&self, shortcode: u64, initiator: &Initiator) -> TransactionStatusBody {
        TransactionStatusBody {
            command_id: CommandId::TransactionStatusQuery,
            party_a: self.party_a.unwrap_or(shortcode),
            identifier_type: self.identifier_type,
            remarks: self.remarks.clone(),
            initiator: initiator.name.clone(),
            security_credential: initiator.credential.clone(),
            queue_timeout_url: self.queue_timeout_url.clone(),
            result_url: self.result_url.clone(),
            transaction_id: self.transaction_id.clone(),
            occasion: self.occasion.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReversalRequest {
    pub transaction_id: String,
    pub amount: Shillings,
    /// The organisation that received the transaction. Defaults to the business shortcode.
    pub receiver_party: Option<u64>,
    pub remarks: String,
    pub occasion: String,
    pub queue_timeout_url: String,
    pub result_url: String,
}

impl ReversalRequest {
    pub fn new(transaction_id: &str, amount: Shillings, result_url: &str, queue_timeout_url: &str) -> Self {
        Self {
            transaction_id: transaction_id.to_string(),
            amount,
            receiver_party: None,
            remarks: "Reversal".to_string(),
            occasion: String::default(),
            queue_timeout_url: queue_timeout_url.to_string(),
            result_url: result_url.to_string(),
        }
    }

    pub fn with_receiver_party(mut self, receiver_party: u64) -> Self {
        self.receiver_party = Some(receiver_party);
        self
    }

    pub fn with_remarks(mut self, remarks: &str) -> Self {
        self.remarks = remarks.to_string();
        self
    }

    pub fn with_occasion(mut self, occasion: &str) -> Self {
        self.occasion = occasion.to_string();
        self
    }

    pub fn validate(&self, strict: bool) -> Result<(), MpesaApiError> {
        validate_text("TransactionID", &self.transaction_id, None)?;
        validate_amount(self.amount)?;
        validate_text("Remarks", &self.remarks, strict.then_some(MAX_REMARKS_LEN))?;
        validate_url("QueueTimeOutURL", &self.queue_timeout_url)?;
        validate_url("ResultURL", &self.result_url)
    }

    pub(crate) fn to_body(&self, shortcode: u64, initiator: &Initiator) -> ReversalBody {
        ReversalBody {
            command_id: CommandId::TransactionReversal,
            receiver_party: self.receiver_party.unwrap_or(shortcode),
            receiver_identifier_type: IdentifierType::ReversalReceiver,
            remarks: self.remarks.clone(),
            initiator: initiator.name.clone(),
            security_credential: initiator.credential.clone(),
            queue_timeout_url: self.queue_timeout_url.clone(),
            result_url: self.result_url.clone(),
            transaction_id: self.transaction_id.clone(),
            amount: self.amount,
            occasion: self.occasion.clone(),
        }
    }
}

/// The API operator and its encrypted password, shared by every B2C-class body.
#[derive(Debug, Clone)]
pub(crate) struct Initiator {
    pub name: String,
    pub credential: String,
}

//--------------------------------------     Wire bodies       --------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct StkPushBody {
    pub business_short_code: u64,
    pub password: String,
    pub timestamp: String,
    pub transaction_type: TransactionType,
    pub amount: Shillings,
    pub party_a: u64,
    pub party_b: u64,
    pub phone_number: u64,
    #[serde(rename = "CallBackURL")]
    pub callback_url: String,
    pub account_reference: String,
    pub transaction_desc: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct StkQueryBody {
    pub business_short_code: u64,
    pub password: String,
    pub timestamp: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct RegisterUrlsBody {
    #[serde(rename = "ValidationURL")]
    pub validation_url: String,
    #[serde(rename = "ConfirmationURL")]
    pub confirmation_url: String,
    pub response_type: ResponseType,
    pub short_code: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct SimulateBody {
    pub amount: Shillings,
    pub bill_ref_number: String,
    #[serde(rename = "CommandID")]
    pub command_id: CommandId,
    pub msisdn: u64,
    pub short_code: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct DisbursementBody {
    pub initiator_name: String,
    pub security_credential: String,
    #[serde(rename = "CommandID")]
    pub command_id: CommandId,
    pub amount: Shillings,
    pub party_a: u64,
    pub party_b: u64,
    pub remarks: String,
    #[serde(rename = "QueueTimeOutURL")]
    pub queue_timeout_url: String,
    #[serde(rename = "ResultURL")]
    pub result_url: String,
    #[serde(rename = "Occassion")]
    pub occasion: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct BalanceQueryBody {
    #[serde(rename = "CommandID")]
    pub command_id: CommandId,
    pub party_a: u64,
    pub identifier_type: IdentifierType,
    pub remarks: String,
    pub initiator: String,
    pub security_credential: String,
    #[serde(rename = "QueueTimeOutURL")]
    pub queue_timeout_url: String,
    #[serde(rename = "ResultURL")]
    pub result_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct TransactionStatusBody {
    #[serde(rename = "CommandID")]
    pub command_id: CommandId,
    pub party_a: u64,
    pub identifier_type: IdentifierType,
    pub remarks: String,
    pub initiator: String,
    pub security_credential: String,
    #[serde(rename = "QueueTimeOutURL")]
    pub queue_timeout_url: String,
    #[serde(rename = "ResultURL")]
    pub result_url: String,
    #[serde(rename = "TransactionID")]
    pub transaction_id: String,
    pub occasion: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ReversalBody {
    #[serde(rename = "CommandID")]
    pub command_id: CommandId,
    pub receiver_party: u64,
    pub receiver_identifier_type: IdentifierType,
    pub remarks: String,
    pub initiator: String,
    pub security_credential: String,
    #[serde(rename = "QueueTimeOutURL")]
    pub queue_timeout_url: String,
    #[serde(rename = "ResultURL")]
    pub result_url: String,
    #[serde(rename = "TransactionID")]
    pub transaction_id: String,
    pub amount: Shillings,
    pub occasion: String,
}

//--------------------------------------     Validation        --------------------------------------------------------

fn validate_amount(amount: Shillings) -> Result<(), MpesaApiError> {
    if amount.is_zero() {
        return Err(MpesaApiError::ValidationError("Amount must be at least 1 shilling".to_string()));
    }
    Ok(())
}

fn validate_url(field: &str, url: &str) -> Result<(), MpesaApiError> {
    let parsed =
        Url::parse(url).map_err(|e| MpesaApiError::ValidationError(format!("{field} '{url}' is not a valid URL. {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        s => Err(MpesaApiError::ValidationError(format!("{field} must be an http(s) URL, not {s}"))),
    }
}

fn validate_text(field: &str, value: &str, max_len: Option<usize>) -> Result<(), MpesaApiError> {
    if value.trim().is_empty() {
        return Err(MpesaApiError::ValidationError(format!("{field} cannot be empty")));
    }
    match max_len {
        Some(max) if value.chars().count() > max => {
            Err(MpesaApiError::ValidationError(format!("{field} cannot be longer than {max} characters")))
        },
        _ => Ok(()),
    }
}

/// Safaricom numbers are `254` followed by nine digits.
fn validate_msisdn(msisdn: u64) -> Result<(), MpesaApiError> {
    let s = msisdn.to_string();
    if s.len() == 12 && s.starts_with("254") {
        Ok(())
    } else {
        Err(MpesaApiError::ValidationError(format!("{msisdn} is not a phone number in the 2547XXXXXXXX format")))
    }
}
