//! Admin dashboard projection
//!
//! A [`DashboardView`] is recomputed from the store on every snapshot and
//! never cached across refreshes. Statistics always cover the whole
//! collection; the filter and sort only shape the visible list.

use chrono::{DateTime, Local, TimeZone};
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::Duration;
use tracing::{error, warn};

use crate::error::Result;
use crate::records::{
    filter_records, sort_records, RecordFilter, RecordStore, SortOrder, Statistics,
};
use crate::schedule::RefreshPoller;
use crate::types::Assessment;

/// One rendered state of the dashboard
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    /// Filtered, then sorted
    pub records: Vec<Assessment>,
    pub statistics: Statistics,

    /// Set when stored data could not be read and was shown as empty
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Store plus the admin's current filter and sort choice
#[derive(Clone)]
pub struct Dashboard {
    store: RecordStore,
    filter: RecordFilter,
    order: SortOrder,
}

impl Dashboard {
    pub fn new(store: RecordStore) -> Self {
        Self {
            store,
            filter: RecordFilter::default(),
            order: SortOrder::default(),
        }
    }

    pub fn with_filter(mut self, filter: RecordFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    pub fn filter(&self) -> &RecordFilter {
        &self.filter
    }

    pub fn order(&self) -> SortOrder {
        self.order
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Fresh view from the store, as of now
    pub fn snapshot(&self) -> Result<DashboardView> {
        self.snapshot_at(&Local::now())
    }

    pub fn snapshot_at<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<DashboardView> {
        let loaded = self.store.load_checked()?;
        let warning = loaded.parse_error.map(|e| {
            warn!("Dashboard showing empty list: {}", e);
            e.to_string()
        });

        let statistics = Statistics::compute_at(&loaded.records, now);
        let mut records = filter_records(&loaded.records, &self.filter);
        sort_records(&mut records, self.order);

        Ok(DashboardView {
            records,
            statistics,
            warning,
        })
    }

    /// Publish a fresh view every `period` until the poller is stopped
    ///
    /// The receiver starts with a snapshot taken immediately. Failed
    /// refreshes are logged and keep the previous view.
    pub fn spawn_refresh(
        &self,
        period: Duration,
    ) -> (RefreshPoller, watch::Receiver<DashboardView>) {
        let initial = self.snapshot().unwrap_or_else(|e| {
            error!("Initial dashboard load failed: {}", e);
            DashboardView::default()
        });
        let (tx, rx) = watch::channel(initial);

        let dashboard = self.clone();
        let mut poller = RefreshPoller::new(period, move || match dashboard.snapshot() {
            Ok(view) => {
                tx.send_replace(view);
            }
            Err(e) => error!("Dashboard refresh failed: {}", e),
        });
        poller.start();

        (poller, rx)
    }
}
