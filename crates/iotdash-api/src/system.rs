// Backend status endpoints
//
// Liveness, schema check, advertised address, and host statistics.

use tracing::debug;

use crate::client::ApiClient;
use crate::error::Error;
use crate::models::{HealthReport, ModelStatus, ServerInfo, SystemStats};

impl ApiClient {
    /// Backend liveness and database reachability.
    ///
    /// `GET /health`, falling back to `GET /api/health` on agents that
    /// only expose the API-prefixed route.
    pub async fn health(&self) -> Result<HealthReport, Error> {
        match self.get("health").await {
            Err(e) if e.is_not_found() => {
                debug!("no /health route, trying /api/health");
                self.get("api/health").await
            }
            other => other,
        }
    }

    /// `GET /api/model_status`
    pub async fn model_status(&self) -> Result<ModelStatus, Error> {
        self.get("api/model_status").await
    }

    /// `GET /api/server_info`
    pub async fn server_info(&self) -> Result<ServerInfo, Error> {
        self.get("api/server_info").await
    }

    /// Host CPU, memory, disk, network and temperature snapshot.
    ///
    /// `GET /api/system/stats`, falling back to the older `GET /api/stats`.
    pub async fn system_stats(&self) -> Result<SystemStats, Error> {
        match self.get("api/system/stats").await {
            Err(e) if e.is_not_found() => {
                debug!("no /api/system/stats route, trying /api/stats");
                self.get("api/stats").await
            }
            other => other,
        }
    }
}
