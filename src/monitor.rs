//! Async driver tying the REST client to the experiment and simulation views.

use std::sync::Arc;

use chrono::Duration as ChronoDuration;

use crate::{
    api::{LocalApiClient, SimulationQuery},
    config::AppConfig,
    error::ApiError,
    model::{Experiment, Simulation},
    sort::SortSpec,
    store::Severity,
    summary::DashboardSummary,
    traits::{Clock, Notifier},
    view::{FetchTicket, RecordView},
};

pub struct Monitor {
    api: LocalApiClient,
    experiments: RecordView<Experiment>,
    simulations: RecordView<Simulation>,
    simulation_query: SimulationQuery,
    notifier: Arc<dyn Notifier>,
    notification_timeout: ChronoDuration,
}

impl Monitor {
    pub fn new(
        api: LocalApiClient,
        config: &AppConfig,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let timeout_secs = i64::try_from(config.notifications.dismiss_after_secs).unwrap_or(i64::MAX);
        Self {
            api,
            experiments: RecordView::new(
                config.table.apply(SortSpec::experiments()),
                Arc::clone(&clock),
            ),
            simulations: RecordView::new(config.table.apply(SortSpec::simulations()), clock),
            simulation_query: SimulationQuery::default(),
            notifier,
            notification_timeout: ChronoDuration::try_seconds(timeout_secs)
                .unwrap_or(ChronoDuration::MAX),
        }
    }

    pub fn experiments(&self) -> &RecordView<Experiment> {
        &self.experiments
    }

    pub fn experiments_mut(&mut self) -> &mut RecordView<Experiment> {
        &mut self.experiments
    }

    pub fn simulations(&self) -> &RecordView<Simulation> {
        &self.simulations
    }

    pub fn simulations_mut(&mut self) -> &mut RecordView<Simulation> {
        &mut self.simulations
    }

    /// Server-side filters applied to every simulation fetch.
    pub fn set_simulation_query(&mut self, query: SimulationQuery) {
        self.simulation_query = query;
    }

    // ==================== Fetching ====================

    pub async fn refresh_experiments(&mut self) -> bool {
        let ticket = self.experiments.begin_fetch();
        let result = self.api.fetch_experiments().await;
        self.complete_experiments(ticket, result)
    }

    pub async fn refresh_simulations(&mut self) -> bool {
        let ticket = self.simulations.begin_fetch();
        let result = self.api.fetch_simulations(&self.simulation_query).await;
        self.complete_simulations(ticket, result)
    }

    /// Fetch both listings concurrently.
    pub async fn refresh_all(&mut self) {
        let experiments_ticket = self.experiments.begin_fetch();
        let simulations_ticket = self.simulations.begin_fetch();

        let (experiments, simulations) = tokio::join!(
            self.api.fetch_experiments(),
            self.api.fetch_simulations(&self.simulation_query)
        );

        self.complete_experiments(experiments_ticket, experiments);
        self.complete_simulations(simulations_ticket, simulations);
    }

    /// Apply an experiment fetch. A failure reaches the notifier only when
    /// the result was applied; superseded results stay silent.
    pub fn complete_experiments(
        &mut self,
        ticket: FetchTicket,
        result: Result<Vec<Experiment>, ApiError>,
    ) -> bool {
        let failure = result.as_ref().err().map(ApiError::user_message);
        let applied = self.experiments.complete_fetch(ticket, result);
        if let Some(message) = failure.filter(|_| applied) {
            self.forward(Severity::Error, &message);
        }
        applied
    }

    /// Simulation counterpart of [`Monitor::complete_experiments`].
    pub fn complete_simulations(
        &mut self,
        ticket: FetchTicket,
        result: Result<Vec<Simulation>, ApiError>,
    ) -> bool {
        let failure = result.as_ref().err().map(ApiError::user_message);
        let applied = self.simulations.complete_fetch(ticket, result);
        if let Some(message) = failure.filter(|_| applied) {
            self.forward(Severity::Error, &message);
        }
        applied
    }

    // ==================== Commands ====================

    /// Delete an experiment, then reload the listing. Nothing is removed
    /// locally until the reload returns.
    pub async fn delete_experiment(&mut self, id: &str, delete_data: bool) -> Result<(), ApiError> {
        match self.api.delete_experiment(id, delete_data).await {
            Ok(()) => {
                tracing::info!("Deleted experiment {}", id);
                self.announce_experiment(Severity::Success, format!("Experiment {id} deleted"));
                self.refresh_experiments().await;
                Ok(())
            }
            Err(e) => {
                tracing::error!("Failed to delete experiment {}: {}", id, e);
                self.announce_experiment(Severity::Error, e.user_message());
                Err(e)
            }
        }
    }

    /// Request cancellation of a simulation, then reload the listing.
    pub async fn cancel_simulation(&mut self, id: &str) -> Result<(), ApiError> {
        match self.api.cancel_simulation(id).await {
            Ok(()) => {
                tracing::info!("Cancel requested for simulation {}", id);
                self.announce_simulation(
                    Severity::Success,
                    format!("Cancellation of simulation {id} requested"),
                );
                self.refresh_simulations().await;
                Ok(())
            }
            Err(e) => {
                tracing::error!("Failed to cancel simulation {}: {}", id, e);
                self.announce_simulation(Severity::Error, e.user_message());
                Err(e)
            }
        }
    }

    // ==================== Housekeeping ====================

    /// Apply queued layout resets and expire old notifications.
    pub fn tick(&mut self) {
        self.experiments.process_pending();
        self.simulations.process_pending();
        self.experiments.expire_notification(self.notification_timeout);
        self.simulations.expire_notification(self.notification_timeout);
    }

    pub fn summary(&self) -> DashboardSummary {
        DashboardSummary::compute(
            &self.experiments.state().records,
            &self.simulations.state().records,
        )
    }

    fn announce_experiment(&mut self, severity: Severity, message: String) {
        self.forward(severity, &message);
        self.experiments.notify(message, severity);
    }

    fn announce_simulation(&mut self, severity: Severity, message: String) {
        self.forward(severity, &message);
        self.simulations.notify(message, severity);
    }

    fn forward(&self, severity: Severity, message: &str) {
        if let Err(e) = self.notifier.notify(severity, message) {
            tracing::warn!("Failed to deliver notification: {}", e);
        }
    }
}
