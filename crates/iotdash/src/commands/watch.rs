//! Live summary: keeps a full controller running and prints a line per
//! change until interrupted.

use std::future::Future;

use chrono::Local;

use iotdash_core::projection::{Projector, alert_badge, connection_indicator, load_status};
use iotdash_core::{ConnectionState, SyncConfig, SyncController};

use crate::cli::{GlobalOpts, WatchArgs};
use crate::error::CliError;
use crate::output::{self, Painter};

pub async fn handle(
    mut sync_config: SyncConfig,
    args: &WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if args.no_push {
        sync_config.push = None;
    }
    let push_configured = sync_config.push.is_some();

    let controller = SyncController::new(sync_config)?;
    controller.start().await?;

    run(
        &controller,
        args.count,
        push_configured,
        global,
        tokio::signal::ctrl_c(),
    )
    .await;
    controller.shutdown().await;
    Ok(())
}

async fn run(
    controller: &SyncController,
    limit: Option<u64>,
    push_configured: bool,
    global: &GlobalOpts,
    stop: impl Future,
) {
    // Polled across iterations so an interrupt during printing is kept
    tokio::pin!(stop);

    let mut devices = controller.devices();
    let mut relays = controller.relays();
    let mut sensors = controller.motion_sensors();
    let mut alerts = controller.motion_alerts();
    let mut stats = controller.system_stats();
    let mut poll = controller.poll_state();
    let mut push = controller.push_state();

    let projector = Projector::new();
    let painter = Painter::new(global.color);
    let mut printed: u64 = 0;

    output::print_output(&summary(controller, &projector, painter, push_configured), global.quiet);
    printed += 1;

    while limit.is_none_or(|n| printed < n) {
        let open = tokio::select! {
            biased;
            _ = &mut stop => break,
            d = devices.changed() => d.is_some(),
            r = relays.changed() => r.is_some(),
            s = sensors.changed() => s.is_some(),
            a = alerts.changed() => a.is_some(),
            s = stats.changed() => s.is_some(),
            p = poll.changed() => p.is_ok(),
            p = push.changed() => p.is_ok(),
        };
        if !open {
            break;
        }
        output::print_output(&summary(controller, &projector, painter, push_configured), global.quiet);
        printed += 1;
    }
}

fn summary(
    controller: &SyncController,
    projector: &Projector,
    painter: Painter,
    push_configured: bool,
) -> String {
    let poll = *controller.poll_state().borrow();
    let push: Option<ConnectionState> =
        push_configured.then(|| *controller.push_state().borrow());
    let indicator = connection_indicator(poll, push);

    let mut parts = vec![
        Local::now().format("%H:%M:%S").to_string(),
        painter.tone(indicator.label, indicator.tone),
    ];

    let relays = controller.relays_snapshot();
    let sensors = controller.motion_sensors_snapshot();
    match controller.devices_snapshot() {
        Some(devices) => {
            let view = projector.devices(&devices, relays.as_ref(), sensors.as_ref());
            let stale = load_status(&controller.devices().latest()).stale;
            parts.push(format!(
                "devices {}{}",
                view.cards.len(),
                if stale { " (stale)" } else { "" }
            ));
        }
        None => parts.push("devices -".into()),
    }
    if let Some(relays) = &relays {
        let on = projector.relays(relays).iter().filter(|r| r.on).count();
        parts.push(format!("relays {on}/{} on", relays.len()));
    }
    if let Some(sensors) = &sensors {
        let now = chrono::Utc::now();
        let armed = projector
            .motion_sensors(sensors)
            .iter()
            .filter(|s| s.armed_at(now))
            .count();
        parts.push(format!("sensors {armed}/{} armed", sensors.len()));
    }
    if let Some(badge) = controller
        .motion_alerts_snapshot()
        .and_then(|a| alert_badge(a.len()))
    {
        parts.push(format!("alerts {badge}"));
    }
    if let Some(stats) = controller.system_stats_snapshot() {
        let view = projector.stats(&stats);
        parts.push(format!(
            "cpu {} mem {}",
            painter.level(&view.cpu.label, view.cpu.level),
            painter.level(&view.memory.label, view.memory.level)
        ));
    }
    parts.join("  ")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use clap::Parser;
    use iotdash_core::PollIntervals;
    use url::Url;

    use super::*;
    use crate::cli::Cli;

    fn idle_controller() -> SyncController {
        let mut config = SyncConfig::new(Url::parse("http://127.0.0.1:9").unwrap());
        config.poll = PollIntervals::disabled();
        config.prefetch = false;
        config.push = None;
        SyncController::new(config).unwrap()
    }

    fn quiet_global() -> GlobalOpts {
        Cli::try_parse_from(["iotdash", "--quiet", "--color", "never", "watch"])
            .unwrap()
            .global
    }

    #[tokio::test]
    async fn stop_signal_ends_an_unbounded_watch() {
        let controller = idle_controller();
        let global = quiet_global();

        // Nothing ever changes, so only the stop future can end the loop
        tokio::time::timeout(
            Duration::from_secs(5),
            run(&controller, None, false, &global, std::future::ready(())),
        )
        .await
        .unwrap();
    }
}
