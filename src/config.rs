use std::env;
use std::path::PathBuf;

use crate::errors::ConfigError;
use crate::run_context::RunContext;
use crate::services::webdav::WebDAVConfig;

/// Values given directly by the caller; each one wins over its environment variable
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub workers: Option<usize>,
    pub use_slurm: bool,
    pub job_id: Option<String>,
    pub ledger_dir: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub webdav: WebDAVConfig,
    pub run: RunContext,
    pub ledger_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::resolve(ConfigOverrides::default())
    }

    /// Merge `overrides` with the process environment (and `.env`, if present)
    pub fn resolve(overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::resolve_with(overrides, |key| env::var(key).ok())
    }

    pub(crate) fn resolve_with<F>(overrides: ConfigOverrides, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Empty values count as missing
        let pick = |direct: Option<String>, key: &str| {
            direct
                .filter(|v| !v.is_empty())
                .or_else(|| lookup(key).filter(|v| !v.is_empty()))
                .unwrap_or_default()
        };

        let webdav = WebDAVConfig::new(
            pick(overrides.url, "WEBDAV_URL"),
            pick(overrides.username, "WEBDAV_USERNAME"),
            pick(overrides.password, "WEBDAV_PASSWORD"),
        );
        webdav.validate()?;

        let mut run = if overrides.use_slurm {
            let mut run = RunContext::from_slurm_vars(&lookup)?;
            if let Some(workers) = overrides.workers {
                run.worker_budget = workers.max(1);
            }
            run
        } else {
            RunContext::local(overrides.workers)
        };
        if let Some(job_id) = overrides.job_id.filter(|id| !id.is_empty()) {
            run = run.with_job_id(job_id);
        }

        let dir = |direct: Option<PathBuf>, key: &str| {
            direct
                .or_else(|| lookup(key).filter(|v| !v.is_empty()).map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from("."))
        };

        Ok(Config {
            webdav,
            run,
            ledger_dir: dir(overrides.ledger_dir, "DAVMIRROR_LEDGER_DIR"),
            log_dir: dir(overrides.log_dir, "DAVMIRROR_LOG_DIR"),
        })
    }
}
