use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Provider-defined discriminator that tells Daraja which flavour of an operation is being requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandId {
    TransactionReversal,
    SalaryPayment,
    BusinessPayment,
    PromotionPayment,
    AccountBalance,
    CustomerPayBillOnline,
    CustomerBuyGoodsOnline,
    TransactionStatusQuery,
    CheckIdentity,
    BusinessPayBill,
    BusinessBuyGoods,
    DisburseFundsToBusiness,
    BusinessToBusinessTransfer,
    #[serde(rename = "BusinessTransferFromMMFToUtility")]
    BusinessTransferFromMmfToUtility,
}

impl CommandId {
    /// Command ids accepted by the B2C payment request endpoint.
    pub fn is_disbursement(&self) -> bool {
        matches!(self, Self::SalaryPayment | Self::BusinessPayment | Self::PromotionPayment)
    }

    /// Command ids accepted by the C2B simulate endpoint.
    pub fn is_customer_payment(&self) -> bool {
        matches!(self, Self::CustomerPayBillOnline | Self::CustomerBuyGoodsOnline)
    }
}

impl Display for CommandId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = serde_json::to_value(self).ok().and_then(|v| v.as_str().map(String::from)).unwrap_or_default();
        f.write_str(&s)
    }
}

/// The `TransactionType` of an STK push: paybill or buy-goods (till).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionType {
    #[default]
    CustomerPayBillOnline,
    CustomerBuyGoodsOnline,
}

/// What Daraja should do with a C2B payment when the validation URL cannot be reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseType {
    #[default]
    Completed,
    Cancelled,
}

/// Identifies the kind of party in `PartyA` / `ReceiverParty`. Daraja expects the numeric code as a string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdentifierType {
    #[serde(rename = "1")]
    Msisdn,
    #[serde(rename = "2")]
    TillNumber,
    #[default]
    #[serde(rename = "4")]
    Shortcode,
    #[serde(rename = "11")]
    ReversalReceiver,
}
