use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::ConfigError;

pub const DEFAULT_JOB_ID: &str = "no_job";
pub const DEFAULT_NODE_NAME: &str = "local";

/// Where the run was launched from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionEnvironment {
    /// Inside a SLURM allocation; identity and CPU budget come from the scheduler
    Slurm,
    Local,
}

impl ExecutionEnvironment {
    pub fn label(&self) -> &'static str {
        match self {
            ExecutionEnvironment::Slurm => "slurm",
            ExecutionEnvironment::Local => "local",
        }
    }
}

/// Identity and resource budget of one engine run.
///
/// Built once before the engine starts and never mutated afterwards. The job id
/// namespaces temporary files and the failure ledger; the node name tags log lines.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: Uuid,
    pub job_id: String,
    pub node_name: String,
    pub worker_budget: usize,
    pub environment: ExecutionEnvironment,
}

impl RunContext {
    pub fn new(
        job_id: impl Into<String>,
        node_name: impl Into<String>,
        worker_budget: usize,
        environment: ExecutionEnvironment,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            job_id: job_id.into(),
            node_name: node_name.into(),
            worker_budget: worker_budget.max(1),
            environment,
        }
    }

    /// Local run; without an explicit budget every available core is used
    pub fn local(worker_budget: Option<usize>) -> Self {
        let budget = worker_budget.unwrap_or_else(Self::detect_total_cores);
        Self::new(DEFAULT_JOB_ID, DEFAULT_NODE_NAME, budget, ExecutionEnvironment::Local)
    }

    /// Run inside a SLURM allocation, reading `SLURM_CPUS_PER_TASK`,
    /// `SLURM_NODENAME` and `SLURM_JOB_ID`
    pub fn from_slurm_env() -> Result<Self, ConfigError> {
        Self::from_slurm_vars(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_slurm_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let worker_budget = match lookup("SLURM_CPUS_PER_TASK") {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(cpus) if cpus > 0 => cpus,
                _ => return Err(ConfigError::InvalidWorkerBudget { value: raw }),
            },
            None => 1,
        };
        let node_name = lookup("SLURM_NODENAME").unwrap_or_else(|| DEFAULT_NODE_NAME.to_string());
        let job_id = lookup("SLURM_JOB_ID").unwrap_or_else(|| DEFAULT_JOB_ID.to_string());

        Ok(Self::new(job_id, node_name, worker_budget, ExecutionEnvironment::Slurm))
    }

    /// Replace the job id, keeping everything else
    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = job_id.into();
        self
    }

    fn detect_total_cores() -> usize {
        match std::thread::available_parallelism() {
            Ok(cores) => cores.get(),
            Err(e) => {
                warn!("⚠️  Failed to detect CPU cores, falling back to 1 worker: {}", e);
                1
            }
        }
    }

    /// Temporary path for a download: the destination suffixed with the job id
    /// and run id. A requeued job or two local runs sharing the default job id
    /// still never write the same temporary file.
    pub fn temp_path_for(&self, local_path: &Path) -> PathBuf {
        let mut name = OsString::from(local_path.as_os_str());
        name.push(format!(".{}.{}.temp", self.job_id, self.run_id));
        PathBuf::from(name)
    }

    pub fn ledger_file_name(&self) -> String {
        format!("failed_downloads_{}.txt", self.job_id)
    }

    pub fn log_file_name(&self) -> String {
        format!(
            "download_{}_node_{}_job_{}.log",
            self.environment.label(),
            self.node_name,
            self.job_id
        )
    }

    /// HTTP connection pool size: twice the worker budget so the pool never
    /// becomes the bottleneck
    pub fn connection_pool_size(&self) -> usize {
        self.worker_budget * 2
    }

    pub fn log_allocation(&self) {
        info!(
            "Initializing WebDAV mirror on node {} with {} workers ({} job {}, run {})",
            self.node_name,
            self.worker_budget,
            self.environment.label(),
            self.job_id,
            self.run_id
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_slurm_vars_are_read() {
        let ctx = RunContext::from_slurm_vars(lookup_from(&[
            ("SLURM_CPUS_PER_TASK", "16"),
            ("SLURM_NODENAME", "gpu-07"),
            ("SLURM_JOB_ID", "4242"),
        ]))
        .unwrap();

        assert_eq!(ctx.worker_budget, 16);
        assert_eq!(ctx.node_name, "gpu-07");
        assert_eq!(ctx.job_id, "4242");
        assert_eq!(ctx.environment, ExecutionEnvironment::Slurm);
    }

    #[test]
    fn test_slurm_defaults_when_unset() {
        let ctx = RunContext::from_slurm_vars(lookup_from(&[])).unwrap();
        assert_eq!(ctx.worker_budget, 1);
        assert_eq!(ctx.node_name, DEFAULT_NODE_NAME);
        assert_eq!(ctx.job_id, DEFAULT_JOB_ID);
    }

    #[test]
    fn test_invalid_slurm_cpus_rejected() {
        let err = RunContext::from_slurm_vars(lookup_from(&[("SLURM_CPUS_PER_TASK", "lots")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidWorkerBudget { .. }));

        let err = RunContext::from_slurm_vars(lookup_from(&[("SLURM_CPUS_PER_TASK", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidWorkerBudget { .. }));
    }

    #[test]
    fn test_worker_budget_never_zero() {
        let ctx = RunContext::new("j", "n", 0, ExecutionEnvironment::Local);
        assert_eq!(ctx.worker_budget, 1);
        assert_eq!(ctx.connection_pool_size(), 2);
    }

    #[test]
    fn test_local_detects_cores() {
        let ctx = RunContext::local(None);
        assert!(ctx.worker_budget >= 1);
        assert_eq!(ctx.job_id, DEFAULT_JOB_ID);
        assert_eq!(RunContext::local(Some(3)).worker_budget, 3);
    }

    #[test]
    fn test_artifact_names() {
        let ctx = RunContext::new("77", "node-a", 4, ExecutionEnvironment::Slurm);
        assert_eq!(ctx.ledger_file_name(), "failed_downloads_77.txt");
        assert_eq!(ctx.log_file_name(), "download_slurm_node_node-a_job_77.log");
        assert_eq!(
            ctx.temp_path_for(Path::new("/out/sub/b.txt")),
            PathBuf::from(format!("/out/sub/b.txt.77.{}.temp", ctx.run_id))
        );
    }

    #[test]
    fn test_runs_sharing_a_job_id_get_distinct_temp_paths() {
        let first = RunContext::local(Some(2));
        let second = RunContext::local(Some(2));
        assert_eq!(first.job_id, second.job_id);

        let target = Path::new("/out/a.txt");
        assert_ne!(first.temp_path_for(target), second.temp_path_for(target));

        let requeued = RunContext::new("4242", "gpu-07", 4, ExecutionEnvironment::Slurm);
        let again = RunContext::new("4242", "gpu-07", 4, ExecutionEnvironment::Slurm);
        assert_ne!(requeued.temp_path_for(target), again.temp_path_for(target));
    }
}
