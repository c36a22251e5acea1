use std::time::Duration;

use envconfig::Envconfig;

#[derive(Envconfig, Clone, Debug)]
pub struct OperatorConfig {
    #[envconfig(from = "HTTP_PORT", default = "8081")]
    pub http_port: u16,

    /// Restrict all watches to one namespace. Watches cluster-wide when unset.
    /// Env: NSO_OPERATOR_WATCH_NAMESPACE
    #[envconfig(from = "NSO_OPERATOR_WATCH_NAMESPACE")]
    pub watch_namespace: Option<String>,

    #[envconfig(nested)]
    pub reconcile: ReconcileConfig,

    #[envconfig(nested)]
    pub downloader: DownloaderConfig,
}

#[derive(Envconfig, Clone, Debug)]
pub struct ReconcileConfig {
    /// Delay before re-polling a PackageBundle whose download is in flight.
    /// Env: NSO_OPERATOR_POLL_INTERVAL_SECS
    #[envconfig(from = "NSO_OPERATOR_POLL_INTERVAL_SECS", default = "30")]
    pub poll_interval_secs: u64,

    /// Attempts for a status write that keeps hitting resourceVersion conflicts.
    /// Env: NSO_OPERATOR_STATUS_RETRY_ATTEMPTS
    #[envconfig(from = "NSO_OPERATOR_STATUS_RETRY_ATTEMPTS", default = "5")]
    pub status_retry_attempts: u32,

    /// Env: NSO_OPERATOR_ERROR_REQUEUE_SECS
    #[envconfig(from = "NSO_OPERATOR_ERROR_REQUEUE_SECS", default = "15")]
    pub error_requeue_secs: u64,
}

#[derive(Envconfig, Clone, Debug)]
pub struct DownloaderConfig {
    /// Image running `git clone` inside the fetch Job.
    /// Env: NSO_OPERATOR_DOWNLOADER_IMAGE
    #[envconfig(from = "NSO_OPERATOR_DOWNLOADER_IMAGE", default = "alpine/git")]
    pub image: String,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
            status_retry_attempts: 5,
            error_requeue_secs: 15,
        }
    }
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            image: "alpine/git".to_string(),
        }
    }
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            http_port: 8081,
            watch_namespace: None,
            reconcile: ReconcileConfig::default(),
            downloader: DownloaderConfig::default(),
        }
    }
}

impl ReconcileConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn error_requeue(&self) -> Duration {
        Duration::from_secs(self.error_requeue_secs)
    }

    /// Never fewer than one attempt, even when configured as zero.
    pub fn status_attempts(&self) -> u32 {
        self.status_retry_attempts.max(1)
    }
}
