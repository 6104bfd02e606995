//! Relay command handlers.

use tabled::Tabled;

use iotdash_core::projection::{RelayCard, relay_cards};
use iotdash_core::{
    CollectionKind, Mutation, MutationResult, Relay, RelayAction, RelayPayload, SyncController,
};

use crate::cli::{GlobalOpts, RelaysArgs, RelaysCommand, SwitchArgs};
use crate::error::CliError;
use crate::output::{self, Painter};

use super::util;

#[derive(Tabled)]
struct RelayRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Device")]
    device: String,
    #[tabled(rename = "GPIO")]
    pin: String,
    #[tabled(rename = "State")]
    state: String,
}

fn row(card: &RelayCard, painter: Painter) -> RelayRow {
    RelayRow {
        id: card.id.to_string(),
        name: card.name.clone(),
        device: util::or_dash(card.device_id.as_ref()),
        pin: util::or_dash(card.gpio_pin),
        state: painter.state(card.state_label, card.on),
    }
}

fn detail(r: &Relay) -> String {
    [
        format!("ID:     {}", r.id),
        format!("Name:   {}", r.name),
        format!("Device: {}", util::or_dash(r.device_id.as_ref())),
        format!("GPIO:   {}", util::or_dash(r.gpio_pin)),
        format!("State:  {}", if r.status { "ON" } else { "OFF" }),
    ]
    .join("\n")
}

fn find(controller: &SyncController, id: &str) -> Result<Relay, CliError> {
    let wanted = util::parse_id(id);
    controller
        .relays_snapshot()
        .and_then(|all| all.iter().find(|r| r.id == wanted).cloned())
        .ok_or_else(|| util::not_found("relay", id, "relays list"))
}

fn report(result: &MutationResult, verb: &str, global: &GlobalOpts) -> Result<(), CliError> {
    match result {
        MutationResult::Relay(Some(relay)) => {
            let out = output::render_single(global.output, relay, detail, |r| r.id.to_string())?;
            output::print_output(&out, global.quiet);
        }
        MutationResult::AlreadyGone => output::note("Relay was already gone", global.quiet),
        _ => output::note(&format!("Relay {verb}"), global.quiet),
    }
    Ok(())
}

pub async fn handle(
    controller: &SyncController,
    args: RelaysArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        RelaysCommand::List { device } => {
            util::load(controller, CollectionKind::Relays).await?;
            let all = controller.relays_snapshot().unwrap_or_default();
            let mut cards = relay_cards(&all);
            if let Some(device) = device {
                let owner = util::parse_id(&device);
                cards.retain(|c| c.device_id.as_ref() == Some(&owner));
            }

            let painter = Painter::new(global.color);
            let out = output::render_list(
                global.output,
                &cards,
                |c| row(c, painter),
                |c| c.id.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        RelaysCommand::Create { device, name, pin } => {
            let payload = RelayPayload {
                name,
                gpio_pin: pin,
                status: false,
            };
            let result = util::execute(
                controller,
                Mutation::CreateRelay {
                    device_id: util::parse_id(&device),
                    payload,
                },
                global,
            )
            .await?;
            report(&result, "created", global)
        }

        RelaysCommand::Update { id, name, pin } => {
            util::load(controller, CollectionKind::Relays).await?;
            let current = find(controller, &id)?;
            let payload = RelayPayload {
                name: name.unwrap_or(current.name),
                gpio_pin: pin.or(current.gpio_pin),
                status: current.status,
            };
            let result = util::execute(
                controller,
                Mutation::UpdateRelay {
                    id: current.id,
                    payload,
                },
                global,
            )
            .await?;
            report(&result, "updated", global)
        }

        RelaysCommand::On(args) => switch(controller, &args, true, global).await,
        RelaysCommand::Off(args) => switch(controller, &args, false, global).await,

        RelaysCommand::Delete { id } => {
            if !util::confirm(&format!("Delete relay {id}?"), "relays delete", global)? {
                return Ok(());
            }
            let result = util::execute(
                controller,
                Mutation::DeleteRelay {
                    id: util::parse_id(&id),
                },
                global,
            )
            .await?;
            report(&result, "deleted", global)
        }
    }
}

/// Switch, then report the state the backend came back with. The refetch
/// after the mutation is the only source of truth for `status`.
async fn switch(
    controller: &SyncController,
    args: &SwitchArgs,
    on: bool,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let id = util::parse_id(&args.id);
    let mutation = if args.invoke {
        Mutation::InvokeRelay {
            id,
            action: RelayAction::from(on),
        }
    } else {
        Mutation::SetRelayState { id, on }
    };
    util::execute(controller, mutation, global).await?;

    let relay = find(controller, &args.id)?;
    if relay.status != on {
        tracing::warn!(relay = %relay.id, requested = on, "relay did not report the requested state");
        output::note(
            &format!(
                "Relay {} still reports {}",
                relay.name,
                if relay.status { "ON" } else { "OFF" }
            ),
            global.quiet,
        );
    }
    let out = output::render_single(global.output, &relay, detail, |r| r.id.to_string())?;
    output::print_output(&out, global.quiet);
    Ok(())
}
