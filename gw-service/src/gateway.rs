//! The gateway pipeline.
//!
//! fragment → channel buffer → lines → decode → resolve/update → provision
//! → relay
//!
//! Locking:
//! - one lock per channel, held while a fragment and all its lines are
//!   processed, so lines of a channel are handled in order
//! - one lock per device UID, held from resolution to relay of one record,
//!   so a device is never provisioned twice
//! - the state lock, held only for short synchronous sections and never
//!   across a provisioning or relay call

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use gw_core::{
    decode, AppSummary, Change, ConfigPool, Device, DeviceRecord, GatewayState, ProvisioningPlan,
    ProvisioningStatus, Record, DEFAULT_MAX_PENDING,
};
use gw_types::{ChannelId, Uid};
use tokio::sync::Mutex;

use crate::dispatch::{
    DispatchOutcome, RelayDispatcher, DEFAULT_OUTPUT_CHANNEL, DEFAULT_RELAY_TIMEOUT,
};
use crate::identity::IdentityService;
use crate::ingest::{ChannelHub, SerialLog};
use crate::provisioning::{
    ProvisioningDriver, DEFAULT_IDENTITY_MODULE, DEFAULT_PROVISIONING_TIMEOUT,
    DEFAULT_PROVISION_METHOD,
};
use crate::relay::RelayClient;
use crate::GatewayError;

/// Tunables of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewaySettings {
    /// Output channel for relayed changes.
    pub output_channel: String,
    /// Module hosting the identity service.
    pub identity_module: String,
    /// Provisioning method name.
    pub provision_method: String,
    /// Timeout of one provisioning call.
    pub provisioning_timeout: Duration,
    /// Timeout of one relay send.
    pub relay_timeout: Duration,
    /// Bound of each channel's unterminated tail, in bytes.
    pub max_pending_bytes: usize,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            output_channel: DEFAULT_OUTPUT_CHANNEL.to_string(),
            identity_module: DEFAULT_IDENTITY_MODULE.to_string(),
            provision_method: DEFAULT_PROVISION_METHOD.to_string(),
            provisioning_timeout: DEFAULT_PROVISIONING_TIMEOUT,
            relay_timeout: DEFAULT_RELAY_TIMEOUT,
            max_pending_bytes: DEFAULT_MAX_PENDING,
        }
    }
}

/// Operational counters.
///
/// All counters are monotonically increasing (reset only on restart).
#[derive(Debug, Default)]
pub struct GatewayMetrics {
    /// Raw fragments received.
    pub fragments_total: AtomicU64,
    /// Complete lines processed.
    pub lines_total: AtomicU64,
    /// Lines dropped as undecodable.
    pub decode_errors: AtomicU64,
    /// Records dropped (malformed kind, bad identity, mismatch).
    pub records_rejected: AtomicU64,
    /// Channel buffers that overflowed.
    pub overflows: AtomicU64,
    /// Devices created.
    pub devices_created: AtomicU64,
    /// Device updates applied.
    pub devices_updated: AtomicU64,
    /// Successful provisioning calls.
    pub provisioning_succeeded: AtomicU64,
    /// Failed provisioning calls.
    pub provisioning_failed: AtomicU64,
    /// Changes handed to the relay client.
    pub relays_sent: AtomicU64,
    /// Changes the relay client failed to send.
    pub relays_failed: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// What happened to one device record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceReport {
    /// Device the record resolved to.
    pub uid: Uid,
    /// Whether the device was created by this record.
    pub created: bool,
    /// Provisioning status after the record.
    pub provisioning: ProvisioningStatus,
    /// Relay result.
    pub dispatch: DispatchOutcome,
}

/// Device-state core of the edge gateway.
pub struct Gateway {
    state: Mutex<GatewayState>,
    hub: ChannelHub,
    device_locks: DashMap<Uid, Arc<Mutex<()>>>,
    driver: ProvisioningDriver,
    dispatcher: RelayDispatcher,
    serial_log: Arc<dyn SerialLog>,
    metrics: GatewayMetrics,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("driver", &self.driver)
            .field("dispatcher", &self.dispatcher)
            .field("channels", &self.hub.channel_count())
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

impl Gateway {
    /// Create a gateway.
    pub fn new(
        pool: ConfigPool,
        identity: Arc<dyn IdentityService>,
        relay: Arc<dyn RelayClient>,
        serial_log: Arc<dyn SerialLog>,
        settings: GatewaySettings,
    ) -> Self {
        let driver = ProvisioningDriver::new(identity)
            .with_method(settings.identity_module, settings.provision_method)
            .with_timeout(settings.provisioning_timeout);
        let dispatcher = RelayDispatcher::new(relay)
            .with_output_channel(settings.output_channel)
            .with_timeout(settings.relay_timeout);
        Self {
            state: Mutex::new(GatewayState::new(pool)),
            hub: ChannelHub::new(settings.max_pending_bytes),
            device_locks: DashMap::new(),
            driver,
            dispatcher,
            serial_log,
            metrics: GatewayMetrics::default(),
        }
    }

    /// Get access to the operational metrics.
    pub fn metrics(&self) -> &GatewayMetrics {
        &self.metrics
    }

    /// Feed a raw fragment from `channel`.
    ///
    /// The fragment is mirrored to the serial log, then any completed lines
    /// are processed in order. Per-line and per-record errors are logged and
    /// contained; only a buffer overflow is returned.
    pub async fn feed(
        &self,
        channel: &ChannelId,
        fragment: &[u8],
    ) -> Result<Vec<DeviceReport>, GatewayError> {
        bump(&self.metrics.fragments_total);
        if let Err(e) = self.serial_log.append(channel, fragment) {
            tracing::warn!("Serial log for {} failed: {}", channel, e);
        }

        let buffer = self.hub.buffer(channel);
        let mut buffer = buffer.lock().await;

        let lines = match buffer.feed(fragment) {
            Ok(lines) => lines,
            Err(e) => {
                bump(&self.metrics.overflows);
                tracing::warn!("Channel {}: {}", channel, e);
                return Err(e.into());
            }
        };

        let mut reports = Vec::new();
        for line in lines {
            match self.process_line(&line).await {
                Ok(mut line_reports) => reports.append(&mut line_reports),
                Err(e) => tracing::error!("Channel {}: dropped line: {}", channel, e),
            }
        }
        Ok(reports)
    }

    /// Process one complete line.
    ///
    /// Fails only when the line cannot be decoded. Records that cannot be
    /// applied are logged and skipped.
    pub async fn process_line(&self, line: &str) -> Result<Vec<DeviceReport>, GatewayError> {
        if line.trim().is_empty() {
            tracing::debug!("Skipping blank line");
            return Ok(Vec::new());
        }
        bump(&self.metrics.lines_total);
        tracing::debug!("Decode line '{}'", line);

        let decoded = decode(line).map_err(|e| {
            bump(&self.metrics.decode_errors);
            e
        })?;

        for rejected in &decoded.rejected {
            bump(&self.metrics.records_rejected);
            tracing::warn!("Rejected {} record: {}", rejected.kind, rejected.reason);
        }

        let epoch = decoded.epoch;
        let mut reports = Vec::new();
        for record in decoded.records {
            match record {
                Record::DeviceStatus(status) => {
                    if let Some(report) = self.contain(self.handle_device(&status, epoch).await) {
                        reports.push(report);
                    }
                }
                Record::NetworkTopology(topology) => {
                    for entry in &topology.devices {
                        if let Some(report) = self.contain(self.handle_device(entry, epoch).await) {
                            reports.push(report);
                        }
                    }
                }
                Record::FirmwareInfo(firmware) => {
                    self.state.lock().await.apply_firmware(&firmware);
                    tracing::info!(
                        "Coordinator firmware: {} {}",
                        firmware.name.as_deref().unwrap_or("-"),
                        firmware.version.as_deref().unwrap_or("-")
                    );
                }
                Record::ClockInfo(clock) => {
                    self.state.lock().await.apply_clock(&clock);
                    tracing::debug!(
                        "Coordinator clock: {} {}",
                        clock.date.as_deref().unwrap_or("-"),
                        clock.time.as_deref().unwrap_or("-")
                    );
                }
            }
        }
        Ok(reports)
    }

    fn contain(&self, result: Result<DeviceReport, GatewayError>) -> Option<DeviceReport> {
        match result {
            Ok(report) => Some(report),
            Err(e) => {
                bump(&self.metrics.records_rejected);
                tracing::warn!("Dropped record: {}", e);
                None
            }
        }
    }

    fn device_lock(&self, uid: &Uid) -> Arc<Mutex<()>> {
        self.device_locks
            .entry(uid.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the lock of `uid` unless another task still holds or awaits it.
    fn release_device_lock(&self, uid: &Uid) {
        self.device_locks
            .remove_if(uid, |_, lock| Arc::strong_count(lock) == 1);
    }

    async fn handle_device<R>(&self, record: &R, epoch: i64) -> Result<DeviceReport, GatewayError>
    where
        R: DeviceRecord + Sync,
    {
        let mut key = self.state.lock().await.resolve(record)?.uid().clone();

        // Take the device lock, then confirm the record still resolves to the
        // same UID; another channel may have created or re-addressed it.
        // A lock whose record was not applied is released again, so records
        // that never create a device leave no entry behind.
        let (_device_guard, update) = loop {
            let guard = self.device_lock(&key).lock_owned().await;
            let mut state = self.state.lock().await;
            let step = match state.resolve(record).map(|r| r.uid().clone()) {
                Ok(current) if current != key => Err(Ok(current)),
                Ok(_) => state.apply(record, epoch).map_err(Err),
                Err(e) => Err(Err(e)),
            };
            match step {
                Ok(update) => break (guard, update),
                Err(retry) => {
                    drop(state);
                    drop(guard);
                    self.release_device_lock(&key);
                    key = retry?;
                }
            }
        };

        let created = matches!(update.change, Change::Created);
        if created {
            bump(&self.metrics.devices_created);
            tracing::info!(
                "New device {} '{}' at {}",
                key,
                update.device.name(),
                update.device.address()
            );
        } else {
            bump(&self.metrics.devices_updated);
        }

        let mut device = update.device;
        match update.plan {
            ProvisioningPlan::Required(profile) => {
                let succeeded = match self.driver.provision(&profile).await {
                    Ok(()) => {
                        bump(&self.metrics.provisioning_succeeded);
                        tracing::info!("Provisioned {} as {}", key, profile.device_id);
                        true
                    }
                    Err(e) => {
                        bump(&self.metrics.provisioning_failed);
                        tracing::error!("Provisioning error for {}: {}", key, e);
                        false
                    }
                };
                if let Some(committed) = self
                    .state
                    .lock()
                    .await
                    .commit_provisioning(key.as_str(), succeeded)
                {
                    device = committed;
                }
            }
            ProvisioningPlan::NoProfile => {
                tracing::debug!("No provisioning profile for {}", key);
            }
            ProvisioningPlan::AlreadySettled(_) => {}
        }

        let delta = update.change.into_delta(&device);
        let physical_id = self.state.lock().await.physical_id(key.as_str());
        let dispatch = self
            .dispatcher
            .dispatch(&device, Some(&delta), physical_id.as_deref())
            .await;
        match &dispatch {
            DispatchOutcome::Sent => bump(&self.metrics.relays_sent),
            DispatchOutcome::Failed(_) => bump(&self.metrics.relays_failed),
            DispatchOutcome::Skipped(_) => {}
        }

        Ok(DeviceReport {
            uid: key,
            created,
            provisioning: device.provisioning(),
            dispatch,
        })
    }

    /// All devices, ordered by sequence id.
    pub async fn devices(&self) -> Vec<Device> {
        self.state
            .lock()
            .await
            .registry()
            .devices()
            .into_iter()
            .cloned()
            .collect()
    }

    /// Look up one device.
    pub async fn device(&self, uid: &str) -> Option<Device> {
        self.state.lock().await.registry().get(uid).cloned()
    }

    /// Application summary.
    pub async fn app_summary(&self) -> AppSummary {
        self.state.lock().await.app_summary()
    }

    /// Number of input channels seen.
    pub fn channel_count(&self) -> usize {
        self.hub.channel_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::MockIdentityService;
    use crate::ingest::MemorySerialLog;
    use crate::relay::MockRelayClient;
    use gw_types::{PoolEntry, ProvisioningProfile};
    use std::collections::BTreeMap;

    fn configured_pool(uid: &str) -> ConfigPool {
        let mut entries = BTreeMap::new();
        entries.insert(
            uid.to_string(),
            PoolEntry {
                name: Some("Boiler".into()),
                provisioning: Some(ProvisioningProfile {
                    id_scope: "scope".into(),
                    device_id: "dev-1".into(),
                    primary_key: "key".into(),
                    device_template_id: "tmpl".into(),
                    device_physical_id: "phys-1".into(),
                }),
            },
        );
        ConfigPool::new(entries)
    }

    struct Harness {
        gateway: Gateway,
        identity: MockIdentityService,
        relay: MockRelayClient,
        serial: MemorySerialLog,
    }

    fn harness(pool: ConfigPool) -> Harness {
        let identity = MockIdentityService::new();
        let relay = MockRelayClient::new();
        let serial = MemorySerialLog::new();
        let gateway = Gateway::new(
            pool,
            Arc::new(identity.clone()),
            Arc::new(relay.clone()),
            Arc::new(serial.clone()),
            GatewaySettings::default(),
        );
        Harness {
            gateway,
            identity,
            relay,
            serial,
        }
    }

    #[tokio::test]
    async fn fragments_are_mirrored_and_reassembled() {
        let h = harness(ConfigPool::default());
        let channel = ChannelId::from("ttyUSB0");

        let first = h
            .gateway
            .feed(&channel, b"{\"DevSts\":{\"UID\":\"AABB")
            .await
            .unwrap();
        assert!(first.is_empty());
        assert!(h.gateway.devices().await.is_empty());

        let reports = h
            .gateway
            .feed(&channel, b"CCDD\",\"ZbAddr\":\"1234\"}}\n")
            .await
            .unwrap();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].created);

        assert_eq!(h.serial.entries().len(), 2);
        assert_eq!(h.gateway.metrics().fragments_total.load(Ordering::Relaxed), 2);
        assert_eq!(h.gateway.channel_count(), 1);
    }

    #[tokio::test]
    async fn malformed_line_is_dropped_and_stream_continues() {
        let h = harness(ConfigPool::default());
        let channel = ChannelId::generic();

        let reports = h
            .gateway
            .feed(
                &channel,
                b"{not json}\n{\"DevSts\":{\"UID\":\"AABBCCDD\",\"ZbAddr\":\"1\"}}\n",
            )
            .await
            .unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(h.gateway.metrics().decode_errors.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn process_line_reports_decode_error() {
        let h = harness(ConfigPool::default());
        assert!(matches!(
            h.gateway.process_line("[1]").await,
            Err(GatewayError::Decode(_))
        ));
        assert!(h.gateway.process_line("   ").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_identity_is_contained() {
        let h = harness(ConfigPool::default());
        let reports = h
            .gateway
            .process_line(r#"{"DevSts":{"UID":"SHORT","ZbAddr":"1"}}"#)
            .await
            .unwrap();
        assert!(reports.is_empty());
        assert!(h.gateway.devices().await.is_empty());
        assert_eq!(
            h.gateway.metrics().records_rejected.load(Ordering::Relaxed),
            1
        );
    }

    #[tokio::test]
    async fn configured_device_is_provisioned_once() {
        let h = harness(configured_pool("AABBCCDD"));
        let line = r#"{"DevSts":{"UID":"AABBCCDD","ZbAddr":"1234"}}"#;

        let first = h.gateway.process_line(line).await.unwrap();
        assert_eq!(first[0].provisioning, ProvisioningStatus::Provisioned);
        let second = h.gateway.process_line(line).await.unwrap();
        assert_eq!(second[0].provisioning, ProvisioningStatus::Provisioned);

        assert_eq!(h.identity.call_count(), 1);
        assert_eq!(h.relay.sent_count(), 2);
    }

    #[tokio::test]
    async fn topology_records_apply_per_entry() {
        let h = harness(ConfigPool::default());
        let line = r#"{"ZbNet":{"Devices":[
            {"UID":"11111111","ZbAddr":"0001","RSSI":-40},
            {"UID":"BAD","ZbAddr":"0002"},
            {"UID":"22222222","ZbAddr":"0003","ZbPrntAddr":"0001"}
        ]}}"#;
        let reports = h.gateway.process_line(line).await.unwrap();
        assert_eq!(reports.len(), 2);

        let devices = h.gateway.devices().await;
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].rssi(), -40);
        assert_eq!(devices[1].parent(), "0001");
    }

    #[tokio::test]
    async fn records_without_device_leave_no_lock_behind() {
        let h = harness(ConfigPool::default());
        for i in 0..1000u32 {
            let line = format!(r#"{{"DevSts":{{"UID":"{i:08X}","CbM":1}}}}"#);
            assert!(h.gateway.process_line(&line).await.unwrap().is_empty());
        }
        assert!(h.gateway.devices().await.is_empty());
        assert_eq!(h.gateway.device_locks.len(), 0);

        h.gateway
            .process_line(r#"{"DevSts":{"UID":"AABBCCDD","ZbAddr":"1234"}}"#)
            .await
            .unwrap();
        assert_eq!(h.gateway.device_locks.len(), 1);
    }

    #[tokio::test]
    async fn overflow_is_reported() {
        let identity = MockIdentityService::new();
        let gateway = Gateway::new(
            ConfigPool::default(),
            Arc::new(identity),
            Arc::new(MockRelayClient::new()),
            Arc::new(MemorySerialLog::new()),
            GatewaySettings {
                max_pending_bytes: 4,
                ..Default::default()
            },
        );
        let channel = ChannelId::generic();
        let err = gateway.feed(&channel, b"0123456789").await.unwrap_err();
        assert!(matches!(err, GatewayError::Reassembly(_)));

        // Next complete line still goes through.
        let reports = gateway
            .feed(&channel, b"{\"DevSts\":{\"UID\":\"AABBCCDD\",\"ZbAddr\":\"1\"}}\n")
            .await
            .unwrap();
        assert_eq!(reports.len(), 1);
    }
}
