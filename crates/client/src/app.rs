use std::sync::Arc;

use domain::ports::{KeyValueStore, QrRenderer, RegistrationBackend};
use domain::services::{AttendanceMarker, QrCodec, RegistrationStore};

use crate::config::Config;
use crate::error::AppError;
use crate::jobs::{JobScheduler, ReconcileJob};
use crate::services::{HttpRegistrationBackend, OfflineBackend, QrCodeRenderer, SymbolFormat};

/// Service graph shared by every command.
#[derive(Clone)]
pub struct App {
    pub config: Arc<Config>,
    pub store: Arc<RegistrationStore>,
    pub marker: AttendanceMarker,
}

impl App {
    /// Builds the services from configuration: configured storage, and the
    /// HTTP backend unless remote sync is disabled.
    pub fn from_config(config: Config) -> Result<Self, AppError> {
        let storage = persistence::open_store(&config.storage)?;
        let backend: Arc<dyn RegistrationBackend> = if config.backend.enabled {
            Arc::new(HttpRegistrationBackend::new(&config.backend)?)
        } else {
            tracing::info!("Remote backend disabled; changes stay queued locally");
            Arc::new(OfflineBackend)
        };
        Self::with_adapters(config, storage, backend)
    }

    /// Builds the services over explicit adapters.
    pub fn with_adapters(
        config: Config,
        storage: Arc<dyn KeyValueStore>,
        backend: Arc<dyn RegistrationBackend>,
    ) -> Result<Self, AppError> {
        let codec = QrCodec::new(config.qr.namespace.clone())?;
        let store = Arc::new(RegistrationStore::load(storage, backend, codec));
        let marker = AttendanceMarker::new(store.clone());
        Ok(Self {
            config: Arc::new(config),
            store,
            marker,
        })
    }

    pub fn renderer(&self, format: SymbolFormat) -> Arc<dyn QrRenderer> {
        Arc::new(QrCodeRenderer::new(format))
    }

    /// Scheduler with the reconciliation job registered when enabled.
    pub fn scheduler(&self) -> JobScheduler {
        let mut scheduler = JobScheduler::new();
        if self.config.reconcile.enabled {
            scheduler.register(ReconcileJob::new(
                self.store.clone(),
                self.config.reconcile.interval_secs,
            ));
        }
        scheduler
    }
}
