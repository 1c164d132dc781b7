//! Dashboard headline numbers.

use std::{collections::BTreeMap, fmt};

use crate::model::{Experiment, Simulation, Status};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardSummary {
    pub experiment_count: usize,
    pub simulation_count: usize,
    /// Every status is present, zero when no simulation has it.
    pub simulations_by_status: BTreeMap<Status, usize>,
    /// `(experiment id, progress label)` for experiments still running.
    pub running_experiments: Vec<(String, String)>,
}

impl DashboardSummary {
    pub fn compute(experiments: &[Experiment], simulations: &[Simulation]) -> Self {
        let mut simulations_by_status: BTreeMap<Status, usize> =
            Status::ALL.into_iter().map(|s| (s, 0)).collect();
        for sim in simulations {
            *simulations_by_status.entry(sim.status).or_default() += 1;
        }

        let running_experiments = experiments
            .iter()
            .filter(|e| matches!(e.status, Status::Created | Status::InProgress))
            .map(|e| (e.id.clone(), e.progress_label()))
            .collect();

        Self {
            experiment_count: experiments.len(),
            simulation_count: simulations.len(),
            simulations_by_status,
            running_experiments,
        }
    }

    pub fn count(&self, status: Status) -> usize {
        self.simulations_by_status.get(&status).copied().unwrap_or(0)
    }
}

impl fmt::Display for DashboardSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} experiments, {} simulations",
            self.experiment_count, self.simulation_count
        )?;
        let nonzero: Vec<String> = self
            .simulations_by_status
            .iter()
            .filter(|(_, n)| **n > 0)
            .map(|(status, n)| format!("{status}={n}"))
            .collect();
        if !nonzero.is_empty() {
            write!(f, " ({})", nonzero.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn sim(id: &str, status: Status) -> Simulation {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        Simulation {
            id: id.to_string(),
            experiment_id: "exp".to_string(),
            status,
            created: at,
            updated: at,
            data_path: String::new(),
            tags: Default::default(),
            extra_details: None,
        }
    }

    fn experiment(id: &str, status: Status, progress: &[(&str, u64)]) -> Experiment {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        Experiment {
            id: id.to_string(),
            status,
            created: at,
            updated: at,
            data_path: String::new(),
            tags: Default::default(),
            progress: progress.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        }
    }

    #[test]
    fn test_empty_summary_lists_every_status() {
        let summary = DashboardSummary::compute(&[], &[]);
        assert_eq!(summary.simulations_by_status.len(), Status::ALL.len());
        assert_eq!(summary.count(Status::Done), 0);
        assert_eq!(summary.to_string(), "0 experiments, 0 simulations");
    }

    #[test]
    fn test_counts_simulations_per_status() {
        let sims = vec![
            sim("a", Status::Done),
            sim("b", Status::Done),
            sim("c", Status::Failed),
        ];
        let summary = DashboardSummary::compute(&[], &sims);
        assert_eq!(summary.simulation_count, 3);
        assert_eq!(summary.count(Status::Done), 2);
        assert_eq!(summary.count(Status::Failed), 1);
        assert_eq!(
            summary.to_string(),
            "0 experiments, 3 simulations (done=2, failed=1)"
        );
    }

    #[test]
    fn test_running_experiments_carry_progress() {
        let experiments = vec![
            experiment("run", Status::InProgress, &[("done", 4), ("in_progress", 2)]),
            experiment("old", Status::Done, &[("done", 6)]),
        ];
        let summary = DashboardSummary::compute(&experiments, &[]);
        assert_eq!(summary.experiment_count, 2);
        assert_eq!(
            summary.running_experiments,
            vec![(
                "run".to_string(),
                "Done:4 Created:0 In progress:2".to_string()
            )]
        );
    }
}
