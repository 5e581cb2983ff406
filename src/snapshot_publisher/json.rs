use async_trait::async_trait;
use eyre::{Result, WrapErr};

use crate::snapshot_publisher::{MonitoringReport, SnapshotPublisher};

pub const DIRECTORY_PATH: &str = "snapshots";

pub struct JsonFileSnapshotPublisher {
    directory_path: String,
}

impl JsonFileSnapshotPublisher {
    pub fn new(directory_path: Option<String>) -> Result<JsonFileSnapshotPublisher> {
        // Create directory if it doesn't exist yet
        let directory_path = match directory_path {
            Some(path) => path,
            None => String::from(DIRECTORY_PATH),
        };
        std::fs::create_dir_all(&directory_path)
            .wrap_err_with(|| format!("Failed to create {}", directory_path))?;
        Ok(JsonFileSnapshotPublisher { directory_path })
    }

    fn write_file(&self, report: &MonitoringReport) -> Result<()> {
        let file_name = format!(
            "{}/{}_{}.json",
            self.directory_path, report.metrics.timestamp, report.round
        );
        log::debug!("Writing report to file: {}", file_name);
        let file = std::fs::File::create(file_name)?;
        serde_json::to_writer_pretty(file, report)?;
        Ok(())
    }
}

#[async_trait]
impl SnapshotPublisher for JsonFileSnapshotPublisher {
    async fn publish(&self, report: &MonitoringReport) -> Result<()> {
        self.write_file(report)
    }
}
