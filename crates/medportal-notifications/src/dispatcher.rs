use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::event::NotificationEvent;
use crate::notifiers::Notifier;

/// Fans events out to registered notifiers.
#[derive(Clone, Default)]
pub struct NotificationDispatcher {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl NotificationDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatcher with the doctor-facing and patient-facing notifiers.
    pub fn with_default_notifiers() -> Self {
        Self::new()
            .register(Arc::new(crate::notifiers::DoctorNotifier))
            .register(Arc::new(crate::notifiers::PatientNotifier))
    }

    pub fn register(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }

    /// Spawns one task per notifier and returns without waiting.
    ///
    /// Must be called from within a tokio runtime.
    pub fn dispatch(&self, event: NotificationEvent) -> DispatchHandle {
        let event = Arc::new(event);
        let tasks = self
            .notifiers
            .iter()
            .map(|notifier| {
                let notifier = Arc::clone(notifier);
                let event = Arc::clone(&event);
                tokio::spawn(async move {
                    match notifier.notify(&event).await {
                        Ok(()) => tracing::debug!(
                            notifier = notifier.name(),
                            event = event.name(),
                            "notification delivered"
                        ),
                        Err(e) => tracing::warn!(
                            notifier = notifier.name(),
                            event = event.name(),
                            error = %e,
                            "notification failed"
                        ),
                    }
                })
            })
            .collect();
        DispatchHandle { tasks }
    }
}

/// Tasks started by one dispatch. Dropping it detaches them.
pub struct DispatchHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl DispatchHandle {
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Waits for every notifier task to finish.
    pub async fn join(self) {
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "notification task aborted");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NotificationError;
    use crate::event::LabReportUpdated;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct Recording {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Notifier for Recording {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn notify(&self, event: &NotificationEvent) -> Result<(), NotificationError> {
            let NotificationEvent::LabReportUpdated(e) = event;
            self.seen.lock().unwrap().push(e.report_ref.clone());
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl Notifier for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn notify(&self, _event: &NotificationEvent) -> Result<(), NotificationError> {
            Err(NotificationError::SendFailed("boom".into()))
        }
    }

    struct Panicking;

    #[async_trait]
    impl Notifier for Panicking {
        fn name(&self) -> &'static str {
            "panicking"
        }

        async fn notify(&self, _event: &NotificationEvent) -> Result<(), NotificationError> {
            panic!("notifier bug");
        }
    }

    fn event() -> NotificationEvent {
        LabReportUpdated {
            report_id: "r1".into(),
            report_ref: "LR-1".into(),
            patient_identity_id: "patient".into(),
            updated_by: "doctor".into(),
            doctor_names: vec!["Dr. Grey".into()],
            occurred_at: time::OffsetDateTime::now_utc(),
            report: json!({"_id": "r1"}),
        }
        .into()
    }

    #[tokio::test]
    async fn failures_do_not_affect_other_notifiers() {
        let recording = Arc::new(Recording {
            seen: Mutex::new(Vec::new()),
        });
        let dispatcher = NotificationDispatcher::new()
            .register(Arc::new(Failing))
            .register(Arc::new(Panicking))
            .register(recording.clone());

        let handle = dispatcher.dispatch(event());
        assert_eq!(handle.task_count(), 3);
        handle.join().await;

        assert_eq!(*recording.seen.lock().unwrap(), vec!["LR-1".to_string()]);
    }

    #[tokio::test]
    async fn default_notifiers_run() {
        let dispatcher = NotificationDispatcher::with_default_notifiers();
        assert_eq!(dispatcher.len(), 2);
        dispatcher.dispatch(event()).join().await;
    }

    #[tokio::test]
    async fn empty_dispatcher_spawns_nothing() {
        let dispatcher = NotificationDispatcher::new();
        assert!(dispatcher.is_empty());
        assert_eq!(dispatcher.dispatch(event()).task_count(), 0);
    }

    #[test]
    fn event_serializes_with_tag() {
        let value = serde_json::to_value(event()).unwrap();
        assert_eq!(value["event"], "lab_report.updated");
        assert_eq!(value["data"]["reportRef"], "LR-1");
        assert_eq!(value["data"]["doctorNames"][0], "Dr. Grey");
    }
}
