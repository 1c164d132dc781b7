//! Per-table controller: one store, one selector and one sort spec.
//!
//! Everything the table and chart need is derived here from the store;
//! the view never edits records itself.

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tokio::sync::mpsc;

use crate::{
    buckets::{Bucket, bucket_count, bucketize},
    error::{ApiError, FilterError, SortError},
    filter::{Filter, RecordSelector},
    layout::{LayoutEvent, LayoutEvents, LayoutSubscription},
    model::Record,
    sort::{Column, SortDirection, SortSpec, sort},
    store::{Action, Severity, ViewState, reduce},
    traits::Clock,
};

/// Identifies one fetch. Only the most recently issued ticket may apply its
/// response; older ones lost the race and are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FetchTicket(u64);

pub struct RecordView<R> {
    state: ViewState<R>,
    selector: RecordSelector<R>,
    sort: SortSpec,
    clock: Arc<dyn Clock>,
    /// Window that resets fall back to instead of showing everything.
    base_window: Filter,
    latest_request: u64,
    notified_at: Option<DateTime<Utc>>,
    layout_tx: mpsc::UnboundedSender<LayoutEvent>,
    layout_rx: mpsc::UnboundedReceiver<LayoutEvent>,
}

impl<R> RecordView<R>
where
    R: Record + Clone + Send + 'static,
{
    pub fn new(sort: SortSpec, clock: Arc<dyn Clock>) -> Self {
        let (layout_tx, layout_rx) = mpsc::unbounded_channel();
        Self {
            state: ViewState::default(),
            selector: RecordSelector::new(),
            sort,
            clock,
            base_window: Filter::none(),
            latest_request: 0,
            notified_at: None,
            layout_tx,
            layout_rx,
        }
    }

    pub fn state(&self) -> &ViewState<R> {
        &self.state
    }

    pub fn sort_spec(&self) -> &SortSpec {
        &self.sort
    }

    pub fn dispatch(&mut self, action: Action<R>) {
        if matches!(action, Action::Notify { .. }) {
            self.notified_at = Some(self.clock.now_utc());
        }
        self.state = reduce(&self.state, action);
    }

    // ==================== Fetching ====================

    /// Mark a fetch as started and hand out its ticket.
    pub fn begin_fetch(&mut self) -> FetchTicket {
        self.latest_request += 1;
        self.dispatch(Action::Loading(true));
        FetchTicket(self.latest_request)
    }

    /// Apply a fetch result. The data or error lands first, then the loading
    /// flag drops. Returns `false` when the ticket was superseded and the
    /// result was discarded.
    pub fn complete_fetch(&mut self, ticket: FetchTicket, result: Result<Vec<R>, ApiError>) -> bool {
        if ticket.0 != self.latest_request {
            tracing::debug!(
                ticket = ticket.0,
                latest = self.latest_request,
                "Ignoring superseded {} response",
                R::KIND.plural()
            );
            return false;
        }

        match result {
            Ok(records) => {
                tracing::debug!("Loaded {} {}", records.len(), R::KIND.plural());
                self.dispatch(Action::RecordsLoaded(records));
            }
            Err(e) => {
                tracing::warn!("Failed to load {}: {}", R::KIND.plural(), e);
                self.notify(e.user_message(), Severity::Error);
            }
        }
        self.dispatch(Action::Loading(false));
        true
    }

    // ==================== Derived data ====================

    /// Records inside the active filter, in fetch order.
    pub fn visible(&mut self) -> Arc<Vec<R>> {
        self.selector.select(&self.state.records, &self.state.filter)
    }

    /// Visible records in table order.
    pub fn rows(&mut self) -> Vec<R> {
        let visible = self.visible();
        sort(visible.as_slice(), &self.sort).into_iter().cloned().collect()
    }

    /// Hourly chart series over all loaded records.
    pub fn chart(&self) -> Vec<Bucket> {
        bucketize(self.state.records.as_slice())
    }

    /// Size of [`RecordView::chart`] without building it.
    pub fn chart_len(&self) -> usize {
        bucket_count(self.state.records.as_slice())
    }

    pub fn selected(&self) -> Option<&R> {
        let id = self.state.selected.as_deref()?;
        self.state.records.iter().find(|r| r.id() == id)
    }

    // ==================== Interactions ====================

    pub fn set_sort(&mut self, sort: SortSpec) {
        self.sort = sort;
    }

    pub fn click_column(&mut self, column: Column) -> Result<SortDirection, SortError> {
        self.sort.click(column)
    }

    /// Restrict the table to `[start, end]` (chart zoom).
    pub fn zoom(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), FilterError> {
        let filter = Filter::between(start, end)?;
        self.dispatch(Action::SetFilter {
            start: filter.start,
            end: filter.end,
        });
        Ok(())
    }

    /// Drop the zoom, returning to the base window (everything by default).
    pub fn reset_zoom(&mut self) {
        self.dispatch(Action::SetFilter {
            start: self.base_window.start,
            end: self.base_window.end,
        });
    }

    /// Pin `[start, end]` as the window zoom resets return to, and show it.
    pub fn set_base_window(
        &mut self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<(), FilterError> {
        self.base_window = Filter::between(start, end)?;
        self.reset_zoom();
        Ok(())
    }

    pub fn clear_base_window(&mut self) {
        self.base_window = Filter::none();
        self.reset_zoom();
    }

    pub fn toggle_selection(&mut self, id: impl Into<String>) {
        self.dispatch(Action::ToggleSelection(id.into()));
    }

    pub fn notify(&mut self, message: impl Into<String>, severity: Severity) {
        self.dispatch(Action::notify(message, severity));
    }

    pub fn dismiss_notification(&mut self) {
        self.notified_at = None;
        self.dispatch(Action::DismissNotification);
    }

    /// Hide the notification once it has been visible for `timeout`.
    pub fn expire_notification(&mut self, timeout: ChronoDuration) -> bool {
        let Some(shown_at) = self.notified_at else {
            return false;
        };
        if !self.state.notification.visible || self.clock.now_utc() - shown_at < timeout {
            return false;
        }
        self.dismiss_notification();
        true
    }

    // ==================== Layout ====================

    /// Reset the zoom whenever the layout changes, for as long as the
    /// returned subscription is alive. Queued events are applied by
    /// [`RecordView::process_pending`].
    pub fn attach_layout(&self, events: &LayoutEvents) -> LayoutSubscription {
        let tx = self.layout_tx.clone();
        events.subscribe(move |event| {
            if tx.send(*event).is_err() {
                tracing::trace!(?event, "Layout event dropped, view is gone");
            }
        })
    }

    /// Apply layout events queued by subscriptions. Returns how many ran.
    pub fn process_pending(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.layout_rx.try_recv() {
            tracing::debug!(?event, "Layout changed, resetting zoom");
            self.reset_zoom();
            applied += 1;
        }
        applied
    }
}
