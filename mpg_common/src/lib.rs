pub mod helpers;
mod secret;
mod shillings;

pub use secret::Secret;
pub use shillings::{Shillings, ShillingsConversionError, KES_CURRENCY_CODE};
