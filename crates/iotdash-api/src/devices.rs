// Device endpoints
//
// Registration and maintenance of controller boards on the central server.

use tracing::debug;

use crate::client::ApiClient;
use crate::error::Error;
use crate::listing::decode_listing;
use crate::models::{Device, DevicePayload, DeviceToken, ResourceId};

impl ApiClient {
    /// List every registered device.
    ///
    /// `GET /api/devices`
    pub async fn list_devices(&self) -> Result<Vec<Device>, Error> {
        let body = self.get_text("api/devices").await?;
        decode_listing(&body, "devices")
    }

    /// Register a new device. Returns the record the backend echoes, if any.
    ///
    /// `POST /api/devices`
    pub async fn create_device(&self, payload: &DevicePayload) -> Result<Option<Device>, Error> {
        debug!(name = %payload.name, "creating device");
        self.post("api/devices", payload, "device").await
    }

    /// Replace a device's editable fields.
    ///
    /// `PUT /api/devices/{id}`
    pub async fn update_device(
        &self,
        id: &ResourceId,
        payload: &DevicePayload,
    ) -> Result<Option<Device>, Error> {
        debug!(%id, "updating device");
        self.put(&format!("api/devices/{id}"), payload, "device").await
    }

    /// Remove a device. The backend cascades to its relays and sensors.
    ///
    /// `DELETE /api/devices/{id}`
    pub async fn delete_device(&self, id: &ResourceId) -> Result<(), Error> {
        debug!(%id, "deleting device");
        self.delete(&format!("api/devices/{id}")).await
    }

    /// Issue an auth token for an agent to report in as this device.
    ///
    /// `GET /api/devices/{id}/token`
    pub async fn device_token(&self, id: &ResourceId) -> Result<DeviceToken, Error> {
        debug!(%id, "requesting device token");
        self.get(&format!("api/devices/{id}/token")).await
    }
}
