// Relay endpoints
//
// Relay state belongs to the hardware. Every call here only reports whether
// the backend accepted the request; callers re-fetch to learn the outcome.

use tracing::debug;

use crate::client::ApiClient;
use crate::error::Error;
use crate::listing::{decode_listing, decode_relays};
use crate::models::{
    Relay, RelayAction, RelayInvoke, RelayPayload, RelayStatePayload, ResourceId,
};

impl ApiClient {
    /// List relays across all devices.
    ///
    /// `GET /api/relays`
    ///
    /// Accepts both relay records and the agent's `{"relays": {id: bool}}`
    /// state map.
    pub async fn list_relays(&self) -> Result<Vec<Relay>, Error> {
        let body = self.get_text("api/relays").await?;
        decode_relays(&body)
    }

    /// List the relays wired to one device.
    ///
    /// `GET /api/devices/{id}/relays`
    pub async fn list_device_relays(&self, device_id: &ResourceId) -> Result<Vec<Relay>, Error> {
        let body = self.get_text(&format!("api/devices/{device_id}/relays")).await?;
        let mut relays: Vec<Relay> = decode_listing(&body, "relays")?;
        relays.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(relays)
    }

    /// `POST /api/devices/{id}/relays`
    pub async fn create_relay(
        &self,
        device_id: &ResourceId,
        payload: &RelayPayload,
    ) -> Result<Option<Relay>, Error> {
        debug!(%device_id, name = %payload.name, "creating relay");
        self.post(&format!("api/devices/{device_id}/relays"), payload, "relay")
            .await
    }

    /// `PUT /api/relays/{id}`
    pub async fn update_relay(
        &self,
        id: &ResourceId,
        payload: &RelayPayload,
    ) -> Result<Option<Relay>, Error> {
        debug!(%id, "updating relay");
        self.put(&format!("api/relays/{id}"), payload, "relay").await
    }

    /// Request a state change through the central server.
    ///
    /// `PUT /api/relays/{id}` with `{"status": bool}`
    pub async fn set_relay_state(&self, id: &ResourceId, status: bool) -> Result<(), Error> {
        debug!(%id, status, "setting relay state");
        let _: Option<Relay> = self
            .put(&format!("api/relays/{id}"), &RelayStatePayload { status }, "relay")
            .await?;
        Ok(())
    }

    /// Fire an on/off action at an agent-managed relay.
    ///
    /// `POST /api/relays/{id}` with `{"action": "on" | "off"}`
    pub async fn invoke_relay(&self, id: &ResourceId, action: RelayAction) -> Result<(), Error> {
        debug!(%id, %action, "invoking relay action");
        self.post_no_response(&format!("api/relays/{id}"), Some(&RelayInvoke { action }))
            .await
    }

    /// `DELETE /api/relays/{id}`
    pub async fn delete_relay(&self, id: &ResourceId) -> Result<(), Error> {
        debug!(%id, "deleting relay");
        self.delete(&format!("api/relays/{id}")).await
    }
}
