//! Process configuration, read once from `FRONTDESK_*` environment
//! variables at startup. Unset or unparseable values fall back to
//! defaults.

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub bind: String,
    pub data_dir: String,
    pub metrics_port: Option<u16>,
    pub compact_threshold: u64,
    pub session_ttl_secs: u64,
    pub page_size: usize,
    pub max_page_size: usize,
    /// When set and no employees exist yet, an `admin` account in the
    /// operator group is seeded with this password.
    pub admin_password: Option<String>,
}

fn var_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: var_or("FRONTDESK_PORT", 8000),
            bind: std::env::var("FRONTDESK_BIND").unwrap_or_else(|_| "0.0.0.0".into()),
            data_dir: std::env::var("FRONTDESK_DATA_DIR").unwrap_or_else(|_| "./data".into()),
            metrics_port: std::env::var("FRONTDESK_METRICS_PORT")
                .ok()
                .and_then(|s| s.parse().ok()),
            compact_threshold: var_or("FRONTDESK_COMPACT_THRESHOLD", 1000),
            session_ttl_secs: var_or("FRONTDESK_SESSION_TTL_SECS", 28_800),
            page_size: var_or("FRONTDESK_PAGE_SIZE", 50),
            max_page_size: var_or("FRONTDESK_MAX_PAGE_SIZE", 200),
            admin_password: std::env::var("FRONTDESK_ADMIN_PASSWORD").ok(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8000,
            bind: "0.0.0.0".into(),
            data_dir: "./data".into(),
            metrics_port: None,
            compact_threshold: 1000,
            session_ttl_secs: 28_800,
            page_size: 50,
            max_page_size: 200,
            admin_password: None,
        }
    }
}
