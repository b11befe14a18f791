//! Repair of User lab report links.
//!
//! Without a transactional store a report can be deleted while the pull from
//! its User fails, or stored while the link to its User fails. This job
//! removes dangling ids and restores missing links. Running it again changes
//! nothing.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use medportal_core::{Document, LabReport, User};
use medportal_storage::{Collection, DynStore, Filter, StorageError};
use serde_json::Value;
use time::OffsetDateTime;
use tokio::task::JoinHandle;

/// Reports younger than this may still be linking; the periodic job leaves
/// them alone.
pub const RELINK_GRACE: Duration = Duration::from_secs(60);

/// What one reconciliation pass changed.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReconcileResult {
    /// Report ids that no longer exist but were still referenced.
    pub dangling: Vec<String>,
    /// User documents updated by removing dangling ids.
    pub users_updated: u64,
    /// Report ids added back to their User's `labReports`.
    pub relinked: Vec<String>,
}

impl ReconcileResult {
    pub fn is_clean(&self) -> bool {
        self.dangling.is_empty() && self.relinked.is_empty()
    }
}

/// Removes dangling report ids from users and links every report older than
/// `relink_after` to its User when the link is missing.
pub async fn reconcile_lab_report_links(
    store: &DynStore,
    relink_after: Duration,
) -> Result<ReconcileResult, StorageError> {
    let users: Collection<User> = Collection::new(store.clone());
    let reports: Collection<LabReport> = Collection::new(store.clone());

    let all_users = users.find(&Filter::all()).await?;
    let all_reports = reports.find(&Filter::all()).await?;
    let report_ids: HashSet<&str> = all_reports.iter().map(|r| r.id.as_str()).collect();

    let mut dangling: Vec<String> = all_users
        .iter()
        .flat_map(|u| u.data.lab_reports.iter())
        .filter(|id| !report_ids.contains(id.as_str()))
        .cloned()
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    dangling.sort();

    let mut result = ReconcileResult::default();
    for id in dangling {
        result.users_updated += store
            .pull_from_array(User::COLLECTION, User::LAB_REPORTS_FIELD, &Value::String(id.clone()))
            .await?;
        result.dangling.push(id);
    }

    let linked: HashMap<&str, &[String]> = all_users
        .iter()
        .map(|u| (u.id.as_str(), u.data.lab_reports.as_slice()))
        .collect();
    let cutoff = OffsetDateTime::now_utc() - relink_after;
    for report in &all_reports {
        if *report.created_at.inner() > cutoff {
            continue;
        }
        // Reports whose User is gone stay unlinked.
        let Some(links) = linked.get(report.data.user_id.as_str()) else {
            continue;
        };
        if links.contains(&report.id) {
            continue;
        }
        users
            .push(&report.data.user_id, User::LAB_REPORTS_FIELD, &report.id)
            .await?;
        result.relinked.push(report.id.clone());
    }
    Ok(result)
}

/// Runs [`reconcile_lab_report_links`] every `every` until the runtime stops.
pub fn spawn_reconciler(store: DynStore, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            match reconcile_lab_report_links(&store, RELINK_GRACE).await {
                Ok(result) if result.is_clean() => {
                    tracing::debug!("lab report links consistent");
                }
                Ok(result) => tracing::info!(
                    dangling = result.dangling.len(),
                    users_updated = result.users_updated,
                    relinked = result.relinked.len(),
                    "repaired lab report links"
                ),
                Err(e) => tracing::warn!(error = %e, "lab report reconciliation failed"),
            }
        }
    })
}
