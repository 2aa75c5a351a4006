mod money;
mod secret;

pub mod helpers;

pub use money::{Money, MoneyConversionError, USD_CURRENCY_CODE, USD_CURRENCY_CODE_LOWER};
pub use secret::Secret;
