// Motion sensor and alert endpoints

use tracing::debug;

use crate::client::ApiClient;
use crate::error::Error;
use crate::listing::decode_listing;
use crate::models::{MotionAlert, MotionSensor, MotionSensorPayload, ResourceId};

impl ApiClient {
    // ── Sensors ──────────────────────────────────────────────────────

    /// `GET /api/motion_sensors`
    pub async fn list_motion_sensors(&self) -> Result<Vec<MotionSensor>, Error> {
        let body = self.get_text("api/motion_sensors").await?;
        decode_listing(&body, "motion_sensors")
    }

    /// `GET /api/devices/{id}/motion_sensors`
    pub async fn list_device_motion_sensors(
        &self,
        device_id: &ResourceId,
    ) -> Result<Vec<MotionSensor>, Error> {
        let body = self
            .get_text(&format!("api/devices/{device_id}/motion_sensors"))
            .await?;
        decode_listing(&body, "motion_sensors")
    }

    /// `POST /api/devices/{id}/motion_sensors`
    pub async fn create_motion_sensor(
        &self,
        device_id: &ResourceId,
        payload: &MotionSensorPayload,
    ) -> Result<Option<MotionSensor>, Error> {
        debug!(%device_id, name = %payload.name, "creating motion sensor");
        self.post(
            &format!("api/devices/{device_id}/motion_sensors"),
            payload,
            "motion_sensor",
        )
        .await
    }

    /// `PUT /api/motion_sensors/{id}`
    pub async fn update_motion_sensor(
        &self,
        id: &ResourceId,
        payload: &MotionSensorPayload,
    ) -> Result<Option<MotionSensor>, Error> {
        debug!(%id, "updating motion sensor");
        self.put(&format!("api/motion_sensors/{id}"), payload, "motion_sensor")
            .await
    }

    /// `DELETE /api/motion_sensors/{id}`
    pub async fn delete_motion_sensor(&self, id: &ResourceId) -> Result<(), Error> {
        debug!(%id, "deleting motion sensor");
        self.delete(&format!("api/motion_sensors/{id}")).await
    }

    /// Simulate a detection. Any resulting alert shows up on the next
    /// alert-feed refresh, not in the response.
    ///
    /// `POST /api/motion_sensors/{id}/test`
    pub async fn test_motion_sensor(&self, id: &ResourceId) -> Result<(), Error> {
        debug!(%id, "triggering motion sensor test");
        self.post_no_response::<()>(&format!("api/motion_sensors/{id}/test"), None)
            .await
    }

    // ── Alerts ───────────────────────────────────────────────────────

    /// `GET /api/motion_alerts`
    pub async fn list_motion_alerts(&self) -> Result<Vec<MotionAlert>, Error> {
        let body = self.get_text("api/motion_alerts").await?;
        decode_listing(&body, "alerts")
    }

    /// `POST /api/motion_alerts/clear`
    pub async fn clear_motion_alerts(&self) -> Result<(), Error> {
        debug!("clearing motion alerts");
        self.post_no_response::<()>("api/motion_alerts/clear", None)
            .await
    }
}
