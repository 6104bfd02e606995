//! Motion sensor command handlers.

use chrono::{NaiveTime, Utc};
use tabled::Tabled;

use iotdash_core::projection::{MotionSensorCard, motion_sensor_cards};
use iotdash_core::{
    CollectionKind, MotionSensor, MotionSensorPayload, Mutation, MutationResult, Sensitivity,
    SyncController, TriggerMode,
};

use crate::cli::{GlobalOpts, SensitivityArg, SensorSettings, SensorsArgs, SensorsCommand, TriggerArg};
use crate::error::CliError;
use crate::output::{self, Painter};

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct SensorRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Device")]
    device: String,
    #[tabled(rename = "GPIO")]
    pin: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Schedule")]
    schedule: String,
    #[tabled(rename = "Sensitivity")]
    sensitivity: String,
    #[tabled(rename = "Delay")]
    delay: String,
    #[tabled(rename = "Motions")]
    motions: u64,
    #[tabled(rename = "Last motion")]
    last_motion: String,
}

fn row(card: &MotionSensorCard, painter: Painter) -> SensorRow {
    let armed = card.armed_at(Utc::now());
    let status = if card.active && !armed {
        painter.state("Idle", false)
    } else {
        painter.state(card.status_label, card.active)
    };
    SensorRow {
        id: card.id.to_string(),
        name: card.name.clone(),
        device: util::or_dash(card.device_id.as_ref()),
        pin: util::or_dash(card.gpio_pin),
        status,
        schedule: card.schedule_label.clone(),
        sensitivity: card.sensitivity.to_string(),
        delay: card.delay_label.clone(),
        motions: card.motion_count,
        last_motion: util::fmt_time(card.last_motion),
    }
}

fn detail(s: &MotionSensor) -> String {
    [
        format!("ID:          {}", s.id),
        format!("Name:        {}", s.name),
        format!("Device:      {}", util::or_dash(s.device_id.as_ref())),
        format!("GPIO:        {}", util::or_dash(s.gpio_pin)),
        format!("Active:      {}", if s.is_active { "yes" } else { "no" }),
        format!("Schedule:    {}", s.schedule().summary()),
        format!("Timezone:    {}", s.timezone),
        format!("Sensitivity: {}", s.sensitivity),
        format!("Delay:       {}s", s.delay_time),
        format!("Trigger:     {}", s.trigger_mode),
    ]
    .join("\n")
}

fn find(controller: &SyncController, id: &str) -> Result<MotionSensor, CliError> {
    let wanted = util::parse_id(id);
    controller
        .motion_sensors_snapshot()
        .and_then(|all| all.iter().find(|s| s.id == wanted).cloned())
        .ok_or_else(|| util::not_found("motion sensor", id, "sensors list"))
}

fn report(result: &MutationResult, verb: &str, global: &GlobalOpts) -> Result<(), CliError> {
    match result {
        MutationResult::MotionSensor(Some(sensor)) => {
            let out = output::render_single(global.output, sensor, detail, |s| s.id.to_string())?;
            output::print_output(&out, global.quiet);
        }
        MutationResult::AlreadyGone => output::note("Motion sensor was already gone", global.quiet),
        _ => output::note(&format!("Motion sensor {verb}"), global.quiet),
    }
    Ok(())
}

// ── Payload building ────────────────────────────────────────────────

fn parse_time(field: &str, raw: &str) -> Result<NaiveTime, CliError> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M").map_err(|_| CliError::Validation {
        field: field.into(),
        reason: format!("expected HH:MM, got {raw:?}"),
    })
}

impl From<SensitivityArg> for Sensitivity {
    fn from(arg: SensitivityArg) -> Self {
        match arg {
            SensitivityArg::Low => Self::Low,
            SensitivityArg::Medium => Self::Medium,
            SensitivityArg::High => Self::High,
        }
    }
}

impl From<TriggerArg> for TriggerMode {
    fn from(arg: TriggerArg) -> Self {
        match arg {
            TriggerArg::Single => Self::Single,
            TriggerArg::Repeat => Self::Repeat,
        }
    }
}

fn payload_from(sensor: &MotionSensor) -> MotionSensorPayload {
    MotionSensorPayload {
        name: sensor.name.clone(),
        gpio_pin: sensor.gpio_pin,
        is_active: sensor.is_active,
        enable_scheduling: sensor.enable_scheduling,
        start_time: sensor.start_time,
        end_time: sensor.end_time,
        timezone: sensor.timezone.clone(),
        weekday_monitoring: sensor.weekday_monitoring,
        weekend_monitoring: sensor.weekend_monitoring,
        sensitivity: sensor.sensitivity,
        delay_time: sensor.delay_time,
        trigger_mode: sensor.trigger_mode,
    }
}

/// Layer the flags that were given over `base`.
fn apply(mut base: MotionSensorPayload, settings: SensorSettings) -> Result<MotionSensorPayload, CliError> {
    if let Some(name) = settings.name {
        base.name = name;
    }
    if settings.pin.is_some() {
        base.gpio_pin = settings.pin;
    }
    if let Some(active) = settings.active {
        base.is_active = active;
    }
    if let (Some(start), Some(end)) = (&settings.start, &settings.end) {
        base.start_time = Some(parse_time("start", start)?);
        base.end_time = Some(parse_time("end", end)?);
        base.enable_scheduling = true;
    }
    if settings.always {
        base.enable_scheduling = false;
        base.start_time = None;
        base.end_time = None;
    }
    if let Some(weekdays) = settings.weekdays {
        base.weekday_monitoring = weekdays;
    }
    if let Some(weekends) = settings.weekends {
        base.weekend_monitoring = weekends;
    }
    if let Some(tz) = settings.timezone {
        base.timezone = tz;
    }
    if let Some(sensitivity) = settings.sensitivity {
        base.sensitivity = sensitivity.into();
    }
    if let Some(delay) = settings.delay {
        base.delay_time = delay;
    }
    if let Some(trigger) = settings.trigger {
        base.trigger_mode = trigger.into();
    }

    if base.name.trim().is_empty() {
        return Err(CliError::Validation {
            field: "name".into(),
            reason: "a motion sensor needs a name (--name)".into(),
        });
    }
    Ok(base)
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    controller: &SyncController,
    args: SensorsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        SensorsCommand::List => {
            util::load(controller, CollectionKind::MotionSensors).await?;
            let all = controller.motion_sensors_snapshot().unwrap_or_default();
            let cards = motion_sensor_cards(&all);
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

        SensorsCommand::Create { device, settings } => {
            let payload = apply(MotionSensorPayload::default(), settings)?;
            let result = util::execute(
                controller,
                Mutation::CreateMotionSensor {
                    device_id: util::parse_id(&device),
                    payload,
                },
                global,
            )
            .await?;
            report(&result, "created", global)
        }

        SensorsCommand::Update { id, settings } => {
            util::load(controller, CollectionKind::MotionSensors).await?;
            let current = find(controller, &id)?;
            let payload = apply(payload_from(&current), settings)?;
            let result = util::execute(
                controller,
                Mutation::UpdateMotionSensor {
                    id: current.id,
                    payload,
                },
                global,
            )
            .await?;
            report(&result, "updated", global)
        }

        SensorsCommand::Delete { id } => {
            if !util::confirm(&format!("Delete motion sensor {id}?"), "sensors delete", global)? {
                return Ok(());
            }
            let result = util::execute(
                controller,
                Mutation::DeleteMotionSensor {
                    id: util::parse_id(&id),
                },
                global,
            )
            .await?;
            report(&result, "deleted", global)
        }

        SensorsCommand::Test { id } => {
            util::execute(
                controller,
                Mutation::TestMotionSensor {
                    id: util::parse_id(&id),
                },
                global,
            )
            .await?;
            let alerts = controller
                .motion_alerts_snapshot()
                .map_or(0, |a| a.len());
            output::note(
                &format!("Test alert sent; {alerts} alert(s) on record"),
                global.quiet,
            );
            Ok(())
        }
    }
}
