use tabled::Tabled;

use iotdash_core::projection::alert_badge;
use iotdash_core::{CollectionKind, MotionAlert, Mutation, SyncController};

use crate::cli::{AlertsArgs, AlertsCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct AlertRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Sensor")]
    sensor: String,
    #[tabled(rename = "Device")]
    device: String,
    #[tabled(rename = "Message")]
    message: String,
}

fn row(a: &MotionAlert) -> AlertRow {
    AlertRow {
        id: a.id.to_string(),
        time: util::fmt_time(a.timestamp),
        sensor: util::or_dash(a.motion_sensor_id.as_ref()),
        device: util::or_dash(a.device_id.as_ref()),
        message: a.message.clone(),
    }
}

pub async fn handle(
    controller: &SyncController,
    args: &AlertsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        AlertsCommand::List { limit } => {
            util::load(controller, CollectionKind::MotionAlerts).await?;
            let mut alerts = controller
                .motion_alerts_snapshot()
                .map(|a| a.as_ref().clone())
                .unwrap_or_default();
            // Newest first
            alerts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
            let total = alerts.len();
            if let Some(limit) = limit {
                alerts.truncate(limit);
            }

            let out = output::render_list(global.output, &alerts, row, |a| a.id.to_string())?;
            output::print_output(&out, global.quiet);
            if let Some(badge) = alert_badge(total) {
                output::note(&format!("{badge} alert(s)"), global.quiet);
            }
            Ok(())
        }

        AlertsCommand::Clear => {
            if !util::confirm("Delete every motion alert?", "alerts clear", global)? {
                return Ok(());
            }
            util::execute(controller, Mutation::ClearMotionAlerts, global).await?;
            output::note("Motion alerts cleared", global.quiet);
            Ok(())
        }
    }
}
