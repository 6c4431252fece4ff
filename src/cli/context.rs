use std::path::{Path, PathBuf};
use std::sync::Arc;

use autoheal_locator::AutoHealConfiguration;

use super::output::OutputFormat;

pub struct CliContext {
    config: Arc<AutoHealConfiguration>,
    config_path: PathBuf,
    config_from_file: bool,
    output: OutputFormat,
    metrics_port: u16,
}

impl CliContext {
    pub fn new(
        config: AutoHealConfiguration,
        config_path: PathBuf,
        config_from_file: bool,
        output: OutputFormat,
        metrics_port: u16,
    ) -> Self {
        Self {
            config: Arc::new(config),
            config_path,
            config_from_file,
            output,
            metrics_port,
        }
    }

    pub fn config(&self) -> &AutoHealConfiguration {
        self.config.as_ref()
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// False when the configuration came from defaults.
    pub fn config_from_file(&self) -> bool {
        self.config_from_file
    }

    pub fn output(&self) -> OutputFormat {
        self.output
    }

    pub fn metrics_port(&self) -> u16 {
        self.metrics_port
    }
}
