//! Device command handlers.

use secrecy::ExposeSecret;
use tabled::Tabled;

use iotdash_core::projection::{DeviceCard, device_list};
use iotdash_core::{CollectionKind, Device, DevicePayload, Mutation, MutationResult, SyncController};

use crate::cli::{DevicesArgs, DevicesCommand, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output::{self, Painter};

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "IP")]
    ip: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Relays")]
    relays: usize,
    #[tabled(rename = "Sensors")]
    sensors: usize,
    #[tabled(rename = "Last seen")]
    last_seen: String,
}

fn row(card: &DeviceCard, painter: Painter) -> DeviceRow {
    DeviceRow {
        id: card.id.to_string(),
        name: card.name.clone(),
        ip: util::or_dash(card.ip_address.as_deref()),
        status: painter.state(card.status_label, card.active),
        relays: card.relay_count,
        sensors: card.sensor_count,
        last_seen: util::fmt_time(card.last_seen),
    }
}

fn detail(d: &Device) -> String {
    [
        format!("ID:          {}", d.id),
        format!("Name:        {}", d.name),
        format!("IP:          {}", util::or_dash(d.ip_address.as_deref())),
        format!("Description: {}", util::or_dash(d.description.as_deref())),
        format!("Active:      {}", if d.is_active { "yes" } else { "no" }),
    ]
    .join("\n")
}

fn find(controller: &SyncController, id: &str) -> Result<Device, CliError> {
    let wanted = util::parse_id(id);
    controller
        .devices_snapshot()
        .and_then(|all| all.iter().find(|d| d.id == wanted).cloned())
        .ok_or_else(|| util::not_found("device", id, "devices list"))
}

fn report(result: &MutationResult, verb: &str, global: &GlobalOpts) -> Result<(), CliError> {
    match result {
        MutationResult::Device(Some(device)) => {
            let out = output::render_single(global.output, device, detail, |d| d.id.to_string())?;
            output::print_output(&out, global.quiet);
        }
        MutationResult::AlreadyGone => output::note("Device was already gone", global.quiet),
        _ => output::note(&format!("Device {verb}"), global.quiet),
    }
    Ok(())
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    controller: &SyncController,
    args: DevicesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        DevicesCommand::List => {
            // Relay and sensor counts are joined in when the backend omits them
            let (devices, _, _) = tokio::join!(
                util::load(controller, CollectionKind::Devices),
                util::load(controller, CollectionKind::Relays),
                util::load(controller, CollectionKind::MotionSensors),
            );
            devices?;

            let all = controller.devices_snapshot().unwrap_or_default();
            let relays = controller.relays_snapshot();
            let sensors = controller.motion_sensors_snapshot();
            let view = device_list(
                &all,
                relays.as_deref().map(Vec::as_slice),
                sensors.as_deref().map(Vec::as_slice),
            );

            if let (Some(empty), OutputFormat::Table) = (&view.empty, global.output) {
                output::note(
                    &format!(
                        "{}. {}: iotdash devices create --name <NAME>",
                        empty.title, empty.action
                    ),
                    global.quiet,
                );
                return Ok(());
            }

            let painter = Painter::new(global.color);
            let out = output::render_list(
                global.output,
                &view.cards,
                |c| row(c, painter),
                |c| c.id.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        DevicesCommand::Create {
            name,
            ip,
            description,
            inactive,
        } => {
            let payload = DevicePayload {
                name,
                ip_address: ip,
                description,
                is_active: !inactive,
            };
            let result = util::execute(controller, Mutation::CreateDevice(payload), global).await?;
            report(&result, "created", global)
        }

        DevicesCommand::Update {
            id,
            name,
            ip,
            description,
            active,
        } => {
            util::load(controller, CollectionKind::Devices).await?;
            let current = find(controller, &id)?;
            let payload = DevicePayload {
                name: name.unwrap_or(current.name),
                ip_address: ip.or(current.ip_address),
                description: description.or(current.description),
                is_active: active.unwrap_or(current.is_active),
            };
            let result = util::execute(
                controller,
                Mutation::UpdateDevice {
                    id: current.id,
                    payload,
                },
                global,
            )
            .await?;
            report(&result, "updated", global)
        }

        DevicesCommand::Delete { id } => {
            let prompt = format!("Delete device {id} with all of its relays and sensors?");
            if !util::confirm(&prompt, "devices delete", global)? {
                return Ok(());
            }
            let result = util::execute(
                controller,
                Mutation::DeleteDevice {
                    id: util::parse_id(&id),
                },
                global,
            )
            .await?;
            report(&result, "deleted", global)
        }

        DevicesCommand::Token { id, reveal } => {
            let token = controller
                .client()
                .device_token(&util::parse_id(&id))
                .await
                .map_err(iotdash_core::CoreError::from)?;
            let secret = token.token.expose_secret();
            let shown = if reveal {
                secret.to_owned()
            } else {
                mask(secret)
            };
            output::print_output(&shown, global.quiet);
            Ok(())
        }
    }
}

/// Keep the last four characters.
fn mask(secret: &str) -> String {
    let visible: String = secret
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("****{visible}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_keeps_tail() {
        assert_eq!(mask("abcdef123456"), "****3456");
        assert_eq!(mask("ab"), "****ab");
    }
}
