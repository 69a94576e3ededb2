use std::{env, path::PathBuf, str::FromStr, time::Duration};

const DEFAULT_MASTER_URL: &str = "http://localhost:8080";
const DEFAULT_APP: &str = "wc";
const DEFAULT_BACKOFF_MS: u64 = 1000;
const DEFAULT_RPC_RETRIES: u32 = 3;
const DEFAULT_RPC_TIMEOUT_MS: u64 = 5000;

/// Configuración del worker, leída de variables de entorno.
/// - En Docker: MASTER_URL=http://coordinator:8080, MR_DATA_DIR=/data
/// - Sin variables: coordinator local y directorio actual
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    pub master_url: String,
    pub data_dir: PathBuf,
    pub app: String,
    /// Espera ante WAIT y entre reintentos de RPC.
    pub backoff: Duration,
    pub rpc_retries: u32,
    pub rpc_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            master_url: DEFAULT_MASTER_URL.to_string(),
            data_dir: PathBuf::from("."),
            app: DEFAULT_APP.to_string(),
            backoff: Duration::from_millis(DEFAULT_BACKOFF_MS),
            rpc_retries: DEFAULT_RPC_RETRIES,
            rpc_timeout: Duration::from_millis(DEFAULT_RPC_TIMEOUT_MS),
        }
    }
}

impl WorkerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Igual que `from_env` pero con una fuente de variables arbitraria.
    /// Valores que no parsean se reemplazan por el default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            master_url: lookup("MASTER_URL").unwrap_or(defaults.master_url),
            data_dir: lookup("MR_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            app: lookup("MR_APP").unwrap_or(defaults.app),
            backoff: Duration::from_millis(parse_or(&lookup, "WORKER_BACKOFF_MS", DEFAULT_BACKOFF_MS)),
            rpc_retries: parse_or(&lookup, "RPC_RETRIES", DEFAULT_RPC_RETRIES).max(1),
            rpc_timeout: Duration::from_millis(parse_or(
                &lookup,
                "RPC_TIMEOUT_MS",
                DEFAULT_RPC_TIMEOUT_MS,
            )),
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(key)
        .and_then(|s| s.trim().parse::<T>().ok())
        .unwrap_or(default)
}
