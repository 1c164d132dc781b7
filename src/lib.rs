//! IDM Monitor Library
//!
//! Derived-data logic for the local simulation platform dashboard (record
//! filtering, hourly bucketing, sorting, view state) plus the REST client
//! that feeds it.

pub mod api;
pub mod buckets;
pub mod config;
pub mod error;
pub mod export;
pub mod filter;
pub mod layout;
pub mod model;
pub mod monitor;
pub mod sort;
pub mod store;
pub mod summary;
pub mod traits;
pub mod view;

// Re-export commonly used types
pub use api::{LocalApiClient, SimulationQuery, parse_error_body};
pub use buckets::{Bucket, bucketize};
pub use config::AppConfig;
pub use error::{ApiError, FilterError, SortError};
pub use filter::{Filter, RecordSelector, select};
pub use layout::{LayoutEvent, LayoutEvents, LayoutSubscription};
pub use model::{Experiment, Record, RecordKind, Simulation, Status, Timestamped};
pub use monitor::Monitor;
pub use sort::{Column, SortDirection, SortSpec, sort};
pub use store::{Action, NotificationState, Severity, ViewState, reduce};
pub use summary::DashboardSummary;
#[cfg(feature = "desktop")]
pub use traits::SystemNotifier;
pub use traits::{Clock, LogNotifier, MockClock, MockNotifier, Notifier, SystemClock};
pub use view::{FetchTicket, RecordView};
