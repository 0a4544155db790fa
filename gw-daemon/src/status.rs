//! Periodic status output.
//!
//! Logs the application summary every interval and, when configured,
//! rewrites the network view file: one object per device holding only the
//! delivery fields.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use gw_core::Device;
use gw_service::Gateway;
use serde_json::{Map, Value};
use tokio::time::interval;

use crate::config::StatusConfig;

/// Network view of `devices` restricted to `fields`.
///
/// Fields a device does not have are left out.
pub fn network_view(devices: &[Device], fields: &[String]) -> Value {
    let view = devices
        .iter()
        .filter_map(|device| match serde_json::to_value(device.snapshot()) {
            Ok(Value::Object(full)) => Some(full),
            _ => None,
        })
        .map(|full| {
            let filtered: Map<String, Value> = fields
                .iter()
                .filter_map(|field| full.get(field).map(|v| (field.clone(), v.clone())))
                .collect();
            Value::Object(filtered)
        })
        .collect();
    Value::Array(view)
}

/// Write one status round.
pub async fn write_status(gateway: &Gateway, config: &StatusConfig) -> std::io::Result<()> {
    let summary = gateway.app_summary().await;
    let metrics = gateway.metrics();
    tracing::info!(
        "Status: {} devices, {} lines, {} relayed, coordinator {} {}",
        summary.device_count,
        metrics.lines_total.load(Ordering::Relaxed),
        metrics.relays_sent.load(Ordering::Relaxed),
        summary.coordinator.firmware.name,
        summary.coordinator.firmware.version
    );

    let Some(path) = &config.snapshot_path else {
        return Ok(());
    };
    let view = network_view(&gateway.devices().await, &config.delivery_fields);
    let mut content = serde_json::to_string_pretty(&view)?;
    content.push('\n');
    tokio::fs::write(path, content).await?;
    tracing::debug!("Network view written to {}", path.display());
    Ok(())
}

/// Spawn the background status task.
///
/// Returns a handle that can be used to abort the task.
pub fn spawn_status_task(
    gateway: Arc<Gateway>,
    config: StatusConfig,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let interval_secs = config.interval_secs.max(1);
        tracing::info!("Status task started (interval: {}s)", interval_secs);

        let mut timer = interval(Duration::from_secs(interval_secs));
        loop {
            timer.tick().await;
            if let Err(e) = write_status(&gateway, &config).await {
                tracing::error!("Status error: {}", e);
            }
        }
    })
}
