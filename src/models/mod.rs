mod account;
mod asset;
mod id;
mod trade;

pub use account::Account;
pub use asset::{normalize_currency_code, normalize_symbol, AssetClass};
pub use id::Id;
pub use trade::{Trade, TradeType};
