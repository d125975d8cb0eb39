use std::sync::Arc;

use sqlx::PgPool;

use crate::core::config::Settings;
use crate::services::grading_gateway::GradingGateway;
use crate::services::shaping::ShapingTables;
use crate::services::storage::StorageService;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    db: PgPool,
    storage: StorageService,
    gateway: GradingGateway,
    shaping: ShapingTables,
}

impl AppState {
    pub(crate) fn new(
        settings: Settings,
        db: PgPool,
        storage: StorageService,
        gateway: GradingGateway,
    ) -> Self {
        Self {
            inner: Arc::new(InnerState {
                settings,
                db,
                storage,
                gateway,
                shaping: ShapingTables::new(),
            }),
        }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn db(&self) -> &PgPool {
        &self.inner.db
    }

    pub(crate) fn storage(&self) -> &StorageService {
        &self.inner.storage
    }

    pub(crate) fn gateway(&self) -> &GradingGateway {
        &self.inner.gateway
    }

    pub(crate) fn shaping(&self) -> &ShapingTables {
        &self.inner.shaping
    }
}
