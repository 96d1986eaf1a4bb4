pub mod redis;

pub use redis::RedisCache;

/// Cache key for a candle window
pub fn candles_key(symbol: &str, timeframe: &str) -> String {
    format!("candles:{}:{}", symbol, timeframe)
}

/// Well-known key holding the persisted threshold state
pub const THRESHOLD_STATE_KEY: &str = "threshold:state";
