use std::time::Duration;

use cabana_common::config::{AppConfig, PoolStrategy};

#[derive(Debug, Clone)]
pub struct PoolOptions {
    /// Steady-state worker count.
    pub size: usize,
    /// Additional workers allowed under load.
    pub max_overflow: usize,
    /// The end of the idle queue that workers are returned to on checkin.
    /// Removal is always from the front, so [`Strategy::Lifo`] keeps
    /// recently used workers warm and [`Strategy::Fifo`] rotates them.
    pub strategy: Strategy,
    /// An optional pool name used in log messages.
    pub name: Option<String>,
    /// The default client-side timeout for blocking calls.
    pub checkout_timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Lifo,
    Fifo,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            size: 5,
            max_overflow: 10,
            strategy: Strategy::Lifo,
            name: None,
            checkout_timeout: Duration::from_secs(5),
        }
    }
}

impl From<&AppConfig> for PoolOptions {
    fn from(config: &AppConfig) -> Self {
        let strategy = match config.pool.strategy {
            PoolStrategy::Lifo => Strategy::Lifo,
            PoolStrategy::Fifo => Strategy::Fifo,
        };
        Self {
            size: config.pool.size,
            max_overflow: config.pool.max_overflow,
            strategy,
            name: config.pool.name.clone(),
            checkout_timeout: Duration::from_secs(config.pool.checkout_timeout_secs),
        }
    }
}
