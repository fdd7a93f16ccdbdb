//! Process-wide application state: every long-lived component wired
//! together once at startup and shared behind `Arc` across handlers.

use operator_core::aurora::AuroraMonitor;
use operator_core::bus::EventBus;
use operator_core::config::Config;
use operator_core::executor::Executor;
use operator_core::hub::enterprise::EnterpriseHub;
use operator_core::hub::HubRegistry;
use operator_core::planner::Planner;
use operator_core::router::IntentRouter;
use operator_core::session::{RetentionPolicy, SessionStore};
use operator_core::skills::registry::Registry;
use operator_core::skills::builtin;
use std::sync::Arc;

pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<Registry>,
    pub hubs: Arc<HubRegistry>,
    pub router: IntentRouter,
    pub planner: Planner,
    pub aurora: Arc<AuroraMonitor>,
    pub executor: Arc<Executor>,
    pub session: Arc<SessionStore>,
    pub bus: Arc<EventBus>,
    pub started_at_ms: i64,
}

impl AppState {
    pub fn bootstrap(config: Config) -> operator_core::error::Result<Arc<Self>> {
        let config = Arc::new(config);
        let bus = EventBus::new();

        let registry = Arc::new(Registry::new(config.safety_profile));
        builtin::register_all(&registry)?;

        let hubs = Arc::new(HubRegistry::new());
        hubs.register("enterprise", Arc::new(EnterpriseHub));

        let aurora = AuroraMonitor::new(config.clone(), bus.clone());
        let session = Arc::new(SessionStore::new_file_backed(
            config.run_dir.clone(),
            RetentionPolicy::default(),
        )?);

        let recovered = session.recover_crashed()?;
        for execution_id in &recovered {
            tracing::warn!(execution_id, "marked failed(recovered_crash) on startup");
        }

        let executor = Arc::new(Executor::new(
            registry.clone(),
            hubs.clone(),
            aurora.clone(),
            session.clone(),
            bus.clone(),
            &config,
        ));

        spawn_collectors(aurora.clone());

        Ok(Arc::new(Self {
            config,
            registry,
            hubs,
            router: IntentRouter::new(),
            planner: Planner::new(),
            aurora,
            executor,
            session,
            bus,
            started_at_ms: chrono::Utc::now().timestamp_millis(),
        }))
    }

    pub fn uptime_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis() - self.started_at_ms
    }
}

/// Aurora's collector pool (§5): one task per collector, sampling at the
/// default 1s cadence (§4.4) and feeding the live gate.
fn spawn_collectors(aurora: Arc<AuroraMonitor>) {
    let cpu_aurora = aurora.clone();
    tokio::spawn(async move {
        let mut sys = sysinfo::System::new();
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(1));
        loop {
            interval.tick().await;
            sys.refresh_cpu_usage();
            cpu_aurora.record_cpu_sample(sys.global_cpu_info().cpu_usage() as f64, chrono::Utc::now().timestamp_millis());
        }
    });

    let ram_aurora = aurora.clone();
    tokio::spawn(async move {
        let mut sys = sysinfo::System::new();
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(1));
        loop {
            interval.tick().await;
            sys.refresh_memory();
            let total = sys.total_memory();
            let pct = if total == 0 { 0.0 } else { sys.used_memory() as f64 / total as f64 * 100.0 };
            ram_aurora.record_ram_sample(pct, chrono::Utc::now().timestamp_millis());
        }
    });

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(1));
        loop {
            interval.tick().await;
            let disks = sysinfo::Disks::new_with_refreshed_list();
            if let Some(disk) = disks.list().first() {
                let total = disk.total_space();
                let pct = if total == 0 {
                    0.0
                } else {
                    (total - disk.available_space()) as f64 / total as f64 * 100.0
                };
                aurora.record_disk_sample(pct, chrono::Utc::now().timestamp_millis());
            }
        }
    });
}
