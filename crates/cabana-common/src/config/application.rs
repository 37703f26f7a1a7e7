use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::config::loader::deserialize_non_empty_string;
use crate::error::{CommonError, CommonResult};

const DEFAULT_CONFIG: &str = include_str!("default.toml");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub pool: PoolConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Steady-state worker count.
    pub size: usize,
    /// Additional workers allowed under load.
    pub max_overflow: usize,
    /// The end of the idle queue that workers are returned to on checkin.
    pub strategy: PoolStrategy,
    /// An optional pool name used in log messages.
    #[serde(default, deserialize_with = "deserialize_non_empty_string")]
    pub name: Option<String>,
    /// The default client-side timeout for blocking calls.
    pub checkout_timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolStrategy {
    Lifo,
    Fifo,
}

impl AppConfig {
    pub fn load() -> CommonResult<Self> {
        Figment::from(Toml::string(DEFAULT_CONFIG))
            .merge(Env::prefixed("CABANA_").map(|p| p.as_str().replace("__", ".").into()))
            .extract()
            .map_err(|e| CommonError::InvalidArgument(e.to_string()))
    }
}
