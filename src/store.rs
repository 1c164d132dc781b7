//! View state and the actions that move it.
//!
//! `reduce` is a pure function; records sit behind an `Arc` so every new
//! state shares the list with the previous one unless the action replaces it.

use std::{fmt, sync::Arc};

use chrono::{DateTime, Utc};

use crate::filter::Filter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Severity {
    #[default]
    Info,
    Warning,
    Error,
    Success,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Success => "success",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NotificationState {
    pub message: String,
    pub visible: bool,
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewState<R> {
    pub records: Arc<Vec<R>>,
    pub loading: bool,
    pub filter: Filter,
    pub notification: NotificationState,
    /// Id of the record shown in the detail pane.
    pub selected: Option<String>,
}

impl<R> Default for ViewState<R> {
    fn default() -> Self {
        Self {
            records: Arc::new(Vec::new()),
            loading: false,
            filter: Filter::none(),
            notification: NotificationState::default(),
            selected: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action<R> {
    RecordsLoaded(Vec<R>),
    Loading(bool),
    SetFilter {
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    },
    Notify {
        message: String,
        severity: Severity,
    },
    DismissNotification,
    /// Row click: select `id`, or clear the selection if it is already selected.
    ToggleSelection(String),
}

impl<R> Action<R> {
    pub fn clear_filter() -> Self {
        Action::SetFilter {
            start: None,
            end: None,
        }
    }

    pub fn notify(message: impl Into<String>, severity: Severity) -> Self {
        Action::Notify {
            message: message.into(),
            severity,
        }
    }
}

pub fn reduce<R>(state: &ViewState<R>, action: Action<R>) -> ViewState<R> {
    match action {
        Action::RecordsLoaded(data) => ViewState {
            records: Arc::new(data),
            ..shallow(state)
        },
        Action::Loading(loading) => ViewState {
            loading,
            ..shallow(state)
        },
        Action::SetFilter { start, end } => ViewState {
            filter: Filter { start, end },
            ..shallow(state)
        },
        Action::Notify { message, severity } => ViewState {
            notification: NotificationState {
                message,
                visible: true,
                severity,
            },
            ..shallow(state)
        },
        // The message stays so a fading toast can still show its text.
        Action::DismissNotification => ViewState {
            notification: NotificationState {
                visible: false,
                ..state.notification.clone()
            },
            ..shallow(state)
        },
        Action::ToggleSelection(id) => {
            let selected = match &state.selected {
                Some(current) if *current == id => None,
                _ => Some(id),
            };
            ViewState {
                selected,
                ..shallow(state)
            }
        }
    }
}

// Copy of `state` that shares the record list.
fn shallow<R>(state: &ViewState<R>) -> ViewState<R> {
    ViewState {
        records: Arc::clone(&state.records),
        loading: state.loading,
        filter: state.filter,
        notification: state.notification.clone(),
        selected: state.selected.clone(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn loaded(values: Vec<u32>) -> ViewState<u32> {
        reduce(&ViewState::default(), Action::RecordsLoaded(values))
    }

    #[test]
    fn test_records_loaded_replaces_wholesale() {
        let state = loaded(vec![1, 2, 3]);
        let next = reduce(&state, Action::RecordsLoaded(vec![9]));
        assert_eq!(*next.records, vec![9]);
        // Previous state is untouched.
        assert_eq!(*state.records, vec![1, 2, 3]);
    }

    #[test]
    fn test_records_loaded_keeps_filter() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let state = reduce(
            &ViewState::<u32>::default(),
            Action::SetFilter {
                start: Some(start),
                end: Some(start),
            },
        );
        let next = reduce(&state, Action::RecordsLoaded(vec![1]));
        assert_eq!(next.filter, state.filter);
    }

    #[test]
    fn test_other_actions_share_records() {
        let state = loaded(vec![1, 2, 3]);
        let next = reduce(&state, Action::Loading(true));
        assert!(next.loading);
        assert!(Arc::ptr_eq(&state.records, &next.records));
    }

    #[test]
    fn test_set_filter_null_clears() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let state = reduce(
            &ViewState::<u32>::default(),
            Action::SetFilter {
                start: Some(start),
                end: Some(end),
            },
        );
        assert!(state.filter.is_active());

        let cleared = reduce(&state, Action::clear_filter());
        assert_eq!(cleared.filter, Filter::none());
    }

    #[test]
    fn test_dismiss_keeps_message() {
        let state = reduce(
            &ViewState::<u32>::default(),
            Action::notify("x", Severity::Error),
        );
        assert!(state.notification.visible);

        let dismissed = reduce(&state, Action::DismissNotification);
        assert_eq!(dismissed.notification.message, "x");
        assert!(!dismissed.notification.visible);
        assert_eq!(dismissed.notification.severity, Severity::Error);
    }

    #[test]
    fn test_toggle_selection() {
        let state = ViewState::<u32>::default();
        let selected = reduce(&state, Action::ToggleSelection("a".into()));
        assert_eq!(selected.selected.as_deref(), Some("a"));

        let other = reduce(&selected, Action::ToggleSelection("b".into()));
        assert_eq!(other.selected.as_deref(), Some("b"));

        let cleared = reduce(&other, Action::ToggleSelection("b".into()));
        assert_eq!(cleared.selected, None);
    }
}
