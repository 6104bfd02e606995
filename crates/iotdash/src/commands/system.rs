//! Host statistics and backend health.

use serde::Serialize;

use iotdash_core::models::{ModelStatus, ServerInfo};
use iotdash_core::projection::format::fmt_pct_bar;
use iotdash_core::projection::{Gauge, StatsView, stats_view};
use iotdash_core::{CollectionKind, CoreError, HealthReport, SyncController};

use crate::cli::{GlobalOpts, HealthArgs};
use crate::error::CliError;
use crate::output::{self, Painter};

use super::util;

const BAR_WIDTH: u16 = 20;

fn gauge_line(name: &str, gauge: &Gauge, painter: Painter) -> String {
    let (filled, empty) = fmt_pct_bar(gauge.percent, BAR_WIDTH);
    format!(
        "{:<8} {}{} {:>6}  {}",
        name,
        painter.level(&filled, gauge.level),
        empty,
        painter.level(&gauge.label, gauge.level),
        gauge.detail
    )
}

fn stats_detail(view: &StatsView, painter: Painter) -> String {
    let mut lines = vec![
        painter.heading("System"),
        gauge_line("CPU", &view.cpu, painter),
        gauge_line("Memory", &view.memory, painter),
        gauge_line("Disk", &view.disk, painter),
        format!(
            "{:<8} sent {}, received {}",
            "Network", view.network_sent, view.network_recv
        ),
    ];
    if let Some(temp) = &view.temperature {
        lines.push(format!(
            "{:<8} {} ({})",
            "Temp",
            painter.level(&temp.value, temp.level),
            temp.sensor
        ));
    }
    lines.push(format!(
        "Updated  {}",
        view.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    lines.join("\n")
}

pub async fn stats(controller: &SyncController, global: &GlobalOpts) -> Result<(), CliError> {
    util::load(controller, CollectionKind::SystemStats).await?;
    let Some(stats) = controller.system_stats_snapshot() else {
        return Err(CliError::Backend {
            message: "no statistics returned".into(),
        });
    };
    let view = stats_view(&stats);
    let painter = Painter::new(global.color);
    let out = output::render_single(
        global.output,
        &view,
        |v| stats_detail(v, painter),
        |v| v.cpu.label.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

// ── Health ──────────────────────────────────────────────────────────

#[derive(Serialize)]
struct HealthDetails {
    #[serde(flatten)]
    health: HealthReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    model_status: Option<ModelStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    server: Option<ServerInfo>,
}

fn health_detail(d: &HealthDetails, painter: Painter) -> String {
    let ok = d.health.is_ok();
    let mut lines = vec![format!(
        "Status:   {}",
        painter.state(&d.health.status, ok)
    )];
    if let Some(db) = &d.health.db {
        lines.push(format!("Database: {}", painter.state(db, db == "ok")));
    }
    if let Some(err) = &d.health.error {
        lines.push(format!("Error:    {err}"));
    }
    if let Some(model) = &d.model_status {
        let broken: Vec<&str> = model
            .tables
            .iter()
            .filter(|(_, ok)| !**ok)
            .map(|(name, _)| name.as_str())
            .collect();
        let summary = if model.all_ok {
            painter.state("all tables present", true)
        } else {
            painter.state(&format!("missing: {}", broken.join(", ")), false)
        };
        lines.push(format!("Schema:   {summary}"));
    }
    if let Some(server) = &d.server {
        lines.push(format!("Address:  {}:{}", server.ip, server.port));
    }
    lines.join("\n")
}

pub async fn health(
    controller: &SyncController,
    args: &HealthArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    util::load(controller, CollectionKind::Health).await?;
    let Some(report) = controller.health_snapshot() else {
        return Err(CliError::Backend {
            message: "no health report returned".into(),
        });
    };

    let (model_status, server) = if args.details {
        let client = controller.client();
        let (model, server) = tokio::join!(client.model_status(), client.server_info());
        (
            Some(model.map_err(CoreError::from)?),
            Some(server.map_err(CoreError::from)?),
        )
    } else {
        (None, None)
    };

    let details = HealthDetails {
        health: report.as_ref().clone(),
        model_status,
        server,
    };
    let painter = Painter::new(global.color);
    let out = output::render_single(
        global.output,
        &details,
        |d| health_detail(d, painter),
        |d| d.health.status.clone(),
    )?;
    output::print_output(&out, global.quiet);

    if details.health.is_ok() {
        Ok(())
    } else {
        Err(CliError::Backend {
            message: details
                .health
                .error
                .unwrap_or_else(|| format!("backend reports {}", details.health.status)),
        })
    }
}
