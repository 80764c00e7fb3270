use crate::event::Event;
use crate::types::ElementId;
use serde::{Deserialize, Serialize};
use std::io::Write;

/// The closed set of notification labels emitted by the core.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObserverState {
    BeforeExperiment,
    BeforeReplication,
    Initialized,
    MonteCarlo,
    Update,
    WarmUp,
    TimedUpdate,
    ReplicationEnded,
    AfterReplication,
    AfterExperiment,
    RemovedFromModel,
    ConditionalActionRegistration,
    BeforeEvent,
    AfterEvent,
    ModelElementAdded,
    ModelElementRemoved,
}

/// Receiver of lifecycle and event notifications.
///
/// Callbacks are pure functions of the `(source, label, event)` triple: the
/// notification surface deliberately grants no access to the executive or
/// the model, so an observer cannot mutate simulation state or re-enter the
/// observer lists from inside a notification.
pub trait ModelObserver {
    fn notify(&mut self, source: ElementId, label: ObserverState, event: Option<&Event>);
}

// ─── Trace report ─────────────────────────────────────────────

/// One trace line, as written by [`TraceReport`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TraceRecord {
    pub time: f64,
    pub name: String,
    pub id: u64,
    pub priority: i32,
    pub kind: ObserverState,
    pub owner: ElementId,
}

/// Observer that writes one tab-separated record per dispatched event:
/// `time\tname\tid\tpriority\ttype\towner`.
pub struct TraceReport<W: Write> {
    out: W,
}

impl<W: Write> TraceReport<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ModelObserver for TraceReport<W> {
    fn notify(&mut self, source: ElementId, label: ObserverState, event: Option<&Event>) {
        if label != ObserverState::BeforeEvent {
            return;
        }
        let Some(event) = event else { return };
        let record = TraceRecord {
            time: event.time(),
            name: event.name().to_string(),
            id: event.id(),
            priority: event.priority(),
            kind: label,
            owner: source,
        };
        if let Err(err) = writeln!(
            self.out,
            "{}\t{}\t{}\t{}\t{:?}\t{}",
            record.time, record.name, record.id, record.priority, record.kind, record.owner
        ) {
            tracing::warn!(%err, "trace report write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;

    fn make_event() -> Event {
        Event::new(
            4,
            2.5,
            10,
            "arrival".to_string(),
            1,
            None,
            Box::new(|_, _, _| {}),
        )
    }

    #[test]
    fn trace_report_writes_one_tab_separated_line_per_event() {
        let mut report = TraceReport::new(Vec::new());
        let event = make_event();
        report.notify(1, ObserverState::BeforeEvent, Some(&event));
        report.notify(1, ObserverState::AfterEvent, Some(&event));

        let out = String::from_utf8(report.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 1, "only BeforeEvent produces a record");
        assert_eq!(lines[0], "2.5\tarrival\t4\t10\tBeforeEvent\t1");
    }

    #[test]
    fn non_event_labels_are_ignored() {
        let mut report = TraceReport::new(Vec::new());
        report.notify(0, ObserverState::Initialized, None);
        assert!(report.into_inner().is_empty());
    }

    #[test]
    fn observer_state_serializes_by_name() {
        let json = serde_json::to_string(&ObserverState::WarmUp).unwrap();
        assert_eq!(json, "\"WarmUp\"");
    }
}
