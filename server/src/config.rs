use std::env;
use std::time::Duration;

use image_suite_core::removal::cache::DEFAULT_CACHE_CAPACITY;
use image_suite_core::removal::rembg::DEFAULT_REMBG_URL;

use crate::state::DEFAULT_SESSION_CAPACITY;

/// Server settings, read from `IMAGE_SUITE_*` environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address
    pub addr: String,
    /// Base URL of the rembg server
    pub rembg_url: String,
    /// Timeout for one cutout request
    pub rembg_timeout: Duration,
    /// Maximum upload body size in bytes
    pub body_limit: usize,
    /// Entries kept in the cutout cache
    pub cache_capacity: usize,
    /// Sessions kept before the least recently used is dropped
    pub session_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:3000".to_string(),
            rembg_url: DEFAULT_REMBG_URL.to_string(),
            rembg_timeout: Duration::from_secs(120),
            body_limit: 200 * 1024 * 1024,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            session_capacity: DEFAULT_SESSION_CAPACITY,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unparsable values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        Self {
            addr: lookup("IMAGE_SUITE_ADDR").unwrap_or(defaults.addr),
            rembg_url: lookup("IMAGE_SUITE_REMBG_URL").unwrap_or(defaults.rembg_url),
            rembg_timeout: parsed("IMAGE_SUITE_REMBG_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.rembg_timeout),
            body_limit: parsed("IMAGE_SUITE_BODY_LIMIT_MB")
                .map(|mb| mb as usize * 1024 * 1024)
                .unwrap_or(defaults.body_limit),
            cache_capacity: parsed("IMAGE_SUITE_CACHE_CAPACITY")
                .map(|n| n as usize)
                .unwrap_or(defaults.cache_capacity),
            session_capacity: parsed("IMAGE_SUITE_MAX_SESSIONS")
                .map(|n| n as usize)
                .unwrap_or(defaults.session_capacity),
        }
    }
}
