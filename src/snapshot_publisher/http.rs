use async_trait::async_trait;
use eyre::Result;

use crate::snapshot_publisher::{MonitoringReport, SnapshotPublisher};

pub struct HttpSnapshotPublisher {
    server_url: String,
    client: reqwest::Client,
}

impl HttpSnapshotPublisher {
    pub fn new(server_url: String) -> HttpSnapshotPublisher {
        HttpSnapshotPublisher {
            server_url,
            client: reqwest::Client::new(),
        }
    }

    async fn send_request(&self, report: &MonitoringReport) -> Result<()> {
        log::debug!("Sending report to server at: {:}", self.server_url);
        let response = self
            .client
            .post(&self.server_url)
            .json(report)
            .send()
            .await
            .map_err(|e| eyre::eyre!("Error sending report: {}", e))?;
        log::debug!("Response: {:?}", response);
        if response.status().is_success() {
            Ok(())
        } else {
            Err(eyre::eyre!(
                "Non-Success response when submitting report: {:?}",
                response
            ))
        }
    }
}

#[async_trait]
impl SnapshotPublisher for HttpSnapshotPublisher {
    async fn publish(&self, report: &MonitoringReport) -> Result<()> {
        self.send_request(report).await
    }
}
