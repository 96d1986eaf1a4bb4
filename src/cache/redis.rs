//! Redis cache for hot values: candle windows and the threshold state key

use crate::config;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub struct RedisCache {
    manager: ConnectionManager,
}

impl RedisCache {
    pub async fn new() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let redis_url = config::get_redis_url();
        let client = redis::Client::open(redis_url).map_err(|e| {
            Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                format!("Invalid Redis URL: {}", e),
            )) as Box<dyn std::error::Error + Send + Sync>
        })?;

        let manager = ConnectionManager::new(client).await.map_err(|e| {
            Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                format!("Failed to connect to Redis: {}", e),
            )) as Box<dyn std::error::Error + Send + Sync>
        })?;

        Ok(Self { manager })
    }

    pub async fn get_string(
        &self,
        key: &str,
    ) -> Result<Option<String>, Box<dyn std::error::Error + Send + Sync>> {
        let mut conn = self.manager.clone();
        let value: Option<String> = conn.get(key).await.map_err(|e| {
            Box::new(std::io::Error::other(format!("Redis GET failed: {}", e)))
                as Box<dyn std::error::Error + Send + Sync>
        })?;
        Ok(value)
    }

    pub async fn set_string(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: Option<u64>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut conn = self.manager.clone();
        match ttl_seconds {
            Some(ttl) => {
                let _: () = conn.set_ex(key, value, ttl).await.map_err(|e| {
                    Box::new(std::io::Error::other(format!("Redis SETEX failed: {}", e)))
                        as Box<dyn std::error::Error + Send + Sync>
                })?;
            }
            None => {
                let _: () = conn.set(key, value).await.map_err(|e| {
                    Box::new(std::io::Error::other(format!("Redis SET failed: {}", e)))
                        as Box<dyn std::error::Error + Send + Sync>
                })?;
            }
        }
        Ok(())
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, Box<dyn std::error::Error + Send + Sync>> {
        match self.get_string(key).await? {
            Some(raw) => {
                let value = serde_json::from_str(&raw).map_err(|e| {
                    Box::new(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        format!("Failed to deserialize cached value at {}: {}", key, e),
                    )) as Box<dyn std::error::Error + Send + Sync>
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    pub async fn set_json<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl_seconds: Option<u64>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let raw = serde_json::to_string(value).map_err(|e| {
            Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Failed to serialize value for {}: {}", key, e),
            )) as Box<dyn std::error::Error + Send + Sync>
        })?;
        self.set_string(key, &raw, ttl_seconds).await
    }
}
