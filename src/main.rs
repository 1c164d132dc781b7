use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use idm_monitor::{
    Column, LayoutEvents, LocalApiClient, LogNotifier, Monitor, Notifier, Record, RecordView,
    Severity, SimulationQuery, SortDirection, SortSpec, Status, SystemClock,
    buckets::{LARGE_SPAN_HOURS, total},
    config::{AppConfig, NotificationConfig},
    export::export_to_csv,
    model::timestamp,
};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(name = "idm-monitor")]
#[command(about = "Monitor for locally executed simulation experiments")]
struct Args {
    /// Override the configured service URL
    #[arg(long, global = true)]
    url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll both listings and log a summary until interrupted
    Watch {
        #[command(flatten)]
        window: WindowArgs,
        #[command(flatten)]
        query: QueryArgs,
    },
    /// List experiments
    Experiments {
        #[command(flatten)]
        table: TableArgs,
    },
    /// List simulations
    Simulations {
        #[command(flatten)]
        table: TableArgs,
        #[command(flatten)]
        query: QueryArgs,
    },
    /// Show one record in detail
    Show {
        #[arg(value_enum)]
        kind: Kind,
        id: String,
    },
    /// Print the hourly creation histogram
    Chart {
        #[arg(value_enum, default_value = "experiments")]
        kind: Kind,
    },
    /// Delete an experiment and its simulations
    Delete {
        id: String,
        /// Also remove the experiment's data directory
        #[arg(long)]
        data: bool,
    },
    /// Ask the backend to cancel a simulation
    Cancel { id: String },
    /// Write the current rows to a CSV file
    Export {
        #[arg(value_enum)]
        kind: Kind,
        /// Output directory (defaults to the configured export directory)
        #[arg(long)]
        dir: Option<PathBuf>,
        #[command(flatten)]
        table: TableArgs,
        #[command(flatten)]
        query: QueryArgs,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Kind {
    Experiments,
    Simulations,
}

#[derive(ClapArgs, Debug, Clone, Default)]
struct WindowArgs {
    /// Only rows created at or after this date (YYYY-MM-DD or RFC 3339)
    #[arg(long, requires = "until")]
    since: Option<String>,
    /// Only rows created at or before this date (YYYY-MM-DD or RFC 3339)
    #[arg(long, requires = "since")]
    until: Option<String>,
}

#[derive(ClapArgs, Debug, Clone, Default)]
struct TableArgs {
    #[command(flatten)]
    window: WindowArgs,
    /// Column to sort by (id, status, experiment_id, created, updated, data_path)
    #[arg(long)]
    sort: Option<String>,
    /// Sort ascending instead of descending
    #[arg(long)]
    asc: bool,
}

#[derive(ClapArgs, Debug, Clone, Default)]
struct QueryArgs {
    /// Only simulations of this experiment
    #[arg(long)]
    experiment: Option<String>,
    /// Only simulations in this status
    #[arg(long)]
    status: Option<Status>,
    /// Tag filter as name=value; repeatable
    #[arg(long = "tag", value_parser = parse_tag)]
    tags: Vec<(String, String)>,
}

impl QueryArgs {
    fn into_query(self) -> SimulationQuery {
        SimulationQuery {
            experiment_id: self.experiment,
            status: self.status,
            tags: self.tags,
        }
    }
}

fn parse_tag(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{s}'"))?;
    Ok((name.trim().to_string(), value.trim().to_string()))
}

/// Date-only values cover the whole day: start of day for the lower bound,
/// last second for the upper one.
fn parse_bound(s: &str, upper: bool) -> Result<DateTime<Utc>> {
    if let Some(at) = timestamp::parse(s) {
        return Ok(at);
    }
    let date = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{s}'"))?;
    let time = if upper {
        NaiveTime::from_hms_opt(23, 59, 59)
    } else {
        NaiveTime::from_hms_opt(0, 0, 0)
    }
    .context("Invalid time of day")?;
    Ok(date.and_time(time).and_utc())
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::builder()
        .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
        .parse_lossy("idm_monitor=debug");

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let mut config = AppConfig::load().context("Failed to load configuration")?;
    if let Some(url) = args.url {
        config.server.base_url = url;
    }

    let rt = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
    rt.block_on(run(args.command, config))
}

fn build_notifier(config: &NotificationConfig) -> Arc<dyn Notifier> {
    if config.desktop {
        #[cfg(feature = "desktop")]
        return Arc::new(idm_monitor::SystemNotifier);
        #[cfg(not(feature = "desktop"))]
        tracing::warn!("Desktop notifications requested but the desktop feature is disabled");
    }
    Arc::new(LogNotifier)
}

async fn run(command: Command, config: AppConfig) -> Result<()> {
    let api = LocalApiClient::new(&config.server.base_url, &config.network)
        .context("Failed to create API client")?;
    tracing::debug!("Using local platform service at {}", config.server.base_url);

    let notifier = build_notifier(&config.notifications);
    let mut monitor = Monitor::new(api, &config, Arc::new(SystemClock), notifier);

    match command {
        Command::Watch { window, query } => {
            monitor.set_simulation_query(query.into_query());
            run_watch(&mut monitor, &config, &window).await
        }
        Command::Experiments { table } => {
            monitor.refresh_experiments().await;
            ensure_loaded(monitor.experiments())?;
            prepare(monitor.experiments_mut(), &table)?;
            print_experiments(monitor.experiments_mut());
            Ok(())
        }
        Command::Simulations { table, query } => {
            monitor.set_simulation_query(query.into_query());
            monitor.refresh_simulations().await;
            ensure_loaded(monitor.simulations())?;
            prepare(monitor.simulations_mut(), &table)?;
            print_simulations(monitor.simulations_mut());
            Ok(())
        }
        Command::Show { kind, id } => match kind {
            Kind::Experiments => {
                monitor.refresh_experiments().await;
                ensure_loaded(monitor.experiments())?;
                let view = monitor.experiments_mut();
                view.toggle_selection(id.as_str());
                let Some(experiment) = view.selected() else {
                    bail!("No experiment with id {id}");
                };
                print_detail(experiment);
                println!("progress:      {}", experiment.progress_label());
                Ok(())
            }
            Kind::Simulations => {
                monitor.refresh_simulations().await;
                ensure_loaded(monitor.simulations())?;
                let view = monitor.simulations_mut();
                view.toggle_selection(id.as_str());
                let Some(simulation) = view.selected() else {
                    bail!("No simulation with id {id}");
                };
                print_detail(simulation);
                if let Some(command) = simulation.command() {
                    println!("command:       {command}");
                }
                Ok(())
            }
        },
        Command::Chart { kind } => {
            let buckets = match kind {
                Kind::Experiments => {
                    monitor.refresh_experiments().await;
                    ensure_loaded(monitor.experiments())?;
                    ensure_chartable(monitor.experiments())?;
                    monitor.experiments().chart()
                }
                Kind::Simulations => {
                    monitor.refresh_simulations().await;
                    ensure_loaded(monitor.simulations())?;
                    ensure_chartable(monitor.simulations())?;
                    monitor.simulations().chart()
                }
            };
            for bucket in &buckets {
                println!(
                    "{}  {:>5}  {}",
                    bucket.hour_start.format("%Y-%m-%d %H:00"),
                    bucket.count,
                    "#".repeat(bucket.count.min(60))
                );
            }
            println!("{} records in {} hours", total(&buckets), buckets.len());
            Ok(())
        }
        Command::Delete { id, data } => {
            monitor
                .delete_experiment(&id, data)
                .await
                .with_context(|| format!("Failed to delete experiment {id}"))?;
            println!("Deleted experiment {id}");
            Ok(())
        }
        Command::Cancel { id } => {
            monitor
                .cancel_simulation(&id)
                .await
                .with_context(|| format!("Failed to cancel simulation {id}"))?;
            println!("Cancellation of simulation {id} requested");
            Ok(())
        }
        Command::Export {
            kind,
            dir,
            table,
            query,
        } => {
            let dir = dir.unwrap_or_else(|| config.export.resolve_directory());
            let path = match kind {
                Kind::Experiments => {
                    monitor.refresh_experiments().await;
                    ensure_loaded(monitor.experiments())?;
                    let view = monitor.experiments_mut();
                    prepare(view, &table)?;
                    export_to_csv(view.rows(), &dir, &SystemClock).await?
                }
                Kind::Simulations => {
                    monitor.set_simulation_query(query.into_query());
                    monitor.refresh_simulations().await;
                    ensure_loaded(monitor.simulations())?;
                    let view = monitor.simulations_mut();
                    prepare(view, &table)?;
                    export_to_csv(view.rows(), &dir, &SystemClock).await?
                }
            };
            println!("{}", path.display());
            Ok(())
        }
    }
}

/// Headless mode: refresh on an interval, log the summary, reset the zoom
/// to the `--since/--until` window when the terminal is resized.
async fn run_watch(monitor: &mut Monitor, config: &AppConfig, window: &WindowArgs) -> Result<()> {
    tracing::info!("Starting IDM Monitor in watch mode");

    let layout = LayoutEvents::new();
    let _experiment_layout = monitor.experiments().attach_layout(&layout);
    let _simulation_layout = monitor.simulations().attach_layout(&layout);
    #[cfg(unix)]
    spawn_resize_listener(layout.clone())?;

    apply_window(monitor.experiments_mut(), window)?;
    apply_window(monitor.simulations_mut(), window)?;

    let interval_secs = config.refresh.poll_interval_secs.max(1);
    tracing::info!("Starting poll loop with interval: {} seconds", interval_secs);

    let mut poll = tokio::time::interval(Duration::from_secs(interval_secs));
    poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut housekeeping = tokio::time::interval(Duration::from_secs(1));
    housekeeping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = poll.tick() => {
                monitor.refresh_all().await;
                let visible_experiments = monitor.experiments_mut().visible().len();
                let visible_simulations = monitor.simulations_mut().visible().len();
                let summary = monitor.summary();
                tracing::info!(visible_experiments, visible_simulations, "{}", summary);
                for (id, progress) in &summary.running_experiments {
                    tracing::info!("Experiment {} running: {}", id, progress);
                }
            }
            _ = housekeeping.tick() => monitor.tick(),
            result = &mut shutdown => {
                result.context("Failed to listen for ctrl-c")?;
                tracing::info!("Shutting down");
                return Ok(());
            }
        }
    }
}

#[cfg(unix)]
fn spawn_resize_listener(events: LayoutEvents) -> Result<()> {
    use idm_monitor::LayoutEvent;
    use tokio::signal::unix::{SignalKind, signal};

    let mut resized =
        signal(SignalKind::window_change()).context("Failed to listen for terminal resizes")?;
    tokio::spawn(async move {
        while resized.recv().await.is_some() {
            events.emit(LayoutEvent::Resized);
        }
    });
    Ok(())
}

fn ensure_loaded<R>(view: &RecordView<R>) -> Result<()>
where
    R: Record + Clone + Send + 'static,
{
    let notification = &view.state().notification;
    if notification.visible && notification.severity == Severity::Error {
        bail!("{}", notification.message);
    }
    Ok(())
}

fn ensure_chartable<R>(view: &RecordView<R>) -> Result<()>
where
    R: Record + Clone + Send + 'static,
{
    let hours = view.chart_len();
    if hours > LARGE_SPAN_HOURS {
        bail!(
            "{} span {} hours, more than the {} a chart can show; check for placeholder creation dates",
            R::KIND.plural(),
            hours,
            LARGE_SPAN_HOURS
        );
    }
    Ok(())
}

fn apply_window<R>(view: &mut RecordView<R>, window: &WindowArgs) -> Result<()>
where
    R: Record + Clone + Send + 'static,
{
    if let (Some(since), Some(until)) = (&window.since, &window.until) {
        view.set_base_window(parse_bound(since, false)?, parse_bound(until, true)?)?;
    }
    Ok(())
}

fn prepare<R>(view: &mut RecordView<R>, table: &TableArgs) -> Result<()>
where
    R: Record + Clone + Send + 'static,
{
    apply_window(view, &table.window)?;
    if let Some(name) = &table.sort {
        let column: Column = name.parse()?;
        let columns: Vec<Column> = view.sort_spec().columns().iter().map(|c| c.column).collect();
        let direction = if table.asc {
            SortDirection::Asc
        } else {
            SortDirection::Desc
        };
        view.set_sort(SortSpec::new(&columns, column, direction)?);
    } else if table.asc {
        let active = view.sort_spec().active().column;
        if view.sort_spec().active().direction == SortDirection::Desc {
            view.click_column(active)?;
        }
    }
    Ok(())
}

fn format_time(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn print_experiments(view: &mut RecordView<idm_monitor::Experiment>) {
    let rows = view.rows();
    println!(
        "{:<36}  {:<11}  {:<19}  {:<19}  {:<32}  DATA PATH",
        "ID", "STATUS", "CREATED", "UPDATED", "PROGRESS"
    );
    for e in &rows {
        println!(
            "{:<36}  {:<11}  {:<19}  {:<19}  {:<32}  {}",
            e.id,
            e.status,
            format_time(e.created),
            format_time(e.updated),
            e.progress_label(),
            e.data_path
        );
    }
    println!("{} of {} experiments", rows.len(), view.state().records.len());
}

fn print_simulations(view: &mut RecordView<idm_monitor::Simulation>) {
    let rows = view.rows();
    println!(
        "{:<36}  {:<36}  {:<11}  {:<19}  {:<19}  DATA PATH",
        "ID", "EXPERIMENT", "STATUS", "CREATED", "UPDATED"
    );
    for s in &rows {
        println!(
            "{:<36}  {:<36}  {:<11}  {:<19}  {:<19}  {}",
            s.id,
            s.experiment_id,
            s.status,
            format_time(s.created),
            format_time(s.updated),
            s.data_path
        );
    }
    println!("{} of {} simulations", rows.len(), view.state().records.len());
}

fn print_detail<R: Record>(record: &R) {
    println!("{:<15}{}", format!("{}:", R::KIND.label()), record.id());
    if let Some(experiment_id) = record.experiment_id() {
        println!("experiment:    {experiment_id}");
    }
    println!("status:        {}", record.status());
    println!("created:       {}", format_time(record.created()));
    println!("updated:       {}", format_time(record.updated()));
    println!("data path:     {}", record.data_path());
    for (name, value) in record.tags() {
        println!("tag:           {name}={value}");
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use idm_monitor::{Experiment, LayoutEvent, MockClock};

    use super::*;

    #[test]
    fn test_parse_bound_date_only() {
        assert_eq!(
            parse_bound("2024-03-01", false).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            parse_bound("2024-03-01", true).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 1, 23, 59, 59).unwrap()
        );
    }

    #[test]
    fn test_parse_bound_rfc3339() {
        assert_eq!(
            parse_bound("2024-03-01T10:30:00Z", true).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 1, 10, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_parse_bound_rejects_garbage() {
        assert!(parse_bound("yesterday", false).is_err());
    }

    #[test]
    fn test_parse_tag() {
        assert_eq!(
            parse_tag("seed = 7").unwrap(),
            ("seed".to_string(), "7".to_string())
        );
        assert!(parse_tag("seed").is_err());
    }

    #[test]
    fn test_cli_parses_simulation_filters() {
        let args = Args::try_parse_from([
            "idm-monitor",
            "simulations",
            "--experiment",
            "E1",
            "--status",
            "in progress",
            "--tag",
            "a=1",
            "--tag",
            "b=2",
        ])
        .unwrap();
        let Command::Simulations { query, .. } = args.command else {
            panic!("expected simulations command");
        };
        let query = query.into_query();
        assert_eq!(query.experiment_id.as_deref(), Some("E1"));
        assert_eq!(query.status, Some(Status::InProgress));
        assert_eq!(query.tags.len(), 2);
    }

    fn experiment(id: &str, created: DateTime<Utc>) -> Experiment {
        Experiment {
            id: id.to_string(),
            status: Status::Done,
            created,
            updated: created,
            data_path: String::new(),
            tags: Default::default(),
            progress: Default::default(),
        }
    }

    fn loaded_view(records: Vec<Experiment>) -> RecordView<Experiment> {
        let clock = MockClock::new(Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap());
        let mut view = RecordView::new(SortSpec::experiments(), Arc::new(clock));
        let ticket = view.begin_fetch();
        view.complete_fetch(ticket, Ok(records));
        view
    }

    #[test]
    fn test_window_survives_terminal_resize() {
        let mut view = loaded_view(vec![
            experiment("feb", Utc.with_ymd_and_hms(2024, 2, 28, 12, 0, 0).unwrap()),
            experiment("mar", Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()),
        ]);
        let layout = LayoutEvents::new();
        let _subscription = view.attach_layout(&layout);
        let window = WindowArgs {
            since: Some("2024-03-01".to_string()),
            until: Some("2024-03-01".to_string()),
        };

        apply_window(&mut view, &window).unwrap();
        assert_eq!(view.visible().len(), 1);

        layout.emit(LayoutEvent::Resized);
        assert_eq!(view.process_pending(), 1);
        let rows = view.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "mar");
    }

    #[test]
    fn test_chart_refuses_placeholder_dates() {
        let view = loaded_view(vec![
            experiment("old", Utc.with_ymd_and_hms(1, 1, 1, 0, 0, 0).unwrap()),
            experiment("new", Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()),
        ]);
        let err = ensure_chartable(&view).unwrap_err();
        assert!(err.to_string().contains("placeholder"));

        let recent = loaded_view(vec![experiment(
            "new",
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        )]);
        assert!(ensure_chartable(&recent).is_ok());
    }

    #[test]
    fn test_cli_window_needs_both_bounds() {
        assert!(Args::try_parse_from(["idm-monitor", "experiments", "--since", "2024-01-01"]).is_err());
    }
}
