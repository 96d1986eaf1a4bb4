//! External collaborators: exchange data, LLM narration, notifications

pub mod exchange;
pub mod market_data;
pub mod narrative;
pub mod notify;

pub use exchange::ExchangeRestClient;
pub use market_data::MarketDataProvider;
pub use narrative::NarrativeClient;
pub use notify::TelegramNotifier;
