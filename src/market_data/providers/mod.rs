pub mod binance;
pub mod exchange;
pub mod fmp;
pub mod gemini;
pub mod twse;

pub use binance::BinanceQuoteClient;
pub use exchange::ExchangeQuoteSource;
pub use fmp::FmpQuoteClient;
pub use gemini::{GeminiPriceSource, DEFAULT_GEMINI_MODEL};
pub use twse::TwseQuoteClient;

/// Taiwan-listed codes are numeric (`2330`, `0050`); US tickers never start
/// with a digit.
pub fn is_taiwan_listed(symbol: &str) -> bool {
    symbol
        .trim_start()
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit())
}
