// src/pipeline/monitor.rs

//! Run orchestration.
//!
//! One run opens an acquisition session, processes every course with bounded
//! concurrency and closes the session again. Per course the sequence is
//! strictly ordered: read previous, compare, notify, write current. A failing
//! course never affects the others.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;

use crate::error::{AppError, Result};
use crate::models::{ChangeDetail, Config, Course, CourseSnapshot, MonitorConfig};
use crate::services::{Acquisition, AcquisitionSession, HttpAcquisition, Notifier, build_notifier};
use crate::storage::{SnapshotStore, open_store};

use super::diff::DiffCalculator;
use super::normalize::Normalizer;
use super::snapshot::SnapshotBuilder;

/// Tunables for a [`Monitor`].
#[derive(Debug, Clone, Copy)]
pub struct MonitorOptions {
    /// Courses processed at once
    pub max_concurrent: usize,

    /// Change lines per notification before truncation
    pub max_report_lines: usize,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self::from(&MonitorConfig::default())
    }
}

impl From<&MonitorConfig> for MonitorOptions {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            max_concurrent: config.max_concurrent.max(1),
            max_report_lines: config.max_report_lines.max(1),
        }
    }
}

/// What happened to one course during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum CourseOutcome {
    /// First observation; stored without notifying
    Baseline { items: usize },

    /// Content hash matched the stored snapshot
    Unchanged,

    /// Content hash differed; `changes` may be zero if only order changed
    Changed {
        changes: usize,
        notified: bool,
        persisted: bool,
    },

    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseReport {
    pub course_id: String,
    pub course_name: String,
    #[serde(flatten)]
    pub outcome: CourseOutcome,
}

/// Result of one run over all courses, in course order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub reports: Vec<CourseReport>,
}

impl RunSummary {
    fn count(&self, pred: impl Fn(&CourseOutcome) -> bool) -> usize {
        self.reports.iter().filter(|r| pred(&r.outcome)).count()
    }

    pub fn baselines(&self) -> usize {
        self.count(|o| matches!(o, CourseOutcome::Baseline { .. }))
    }

    pub fn unchanged(&self) -> usize {
        self.count(|o| matches!(o, CourseOutcome::Unchanged))
    }

    pub fn changed(&self) -> usize {
        self.count(|o| matches!(o, CourseOutcome::Changed { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, CourseOutcome::Failed { .. }))
    }

    /// Log a one-line summary plus one line per failed course.
    pub fn log(&self) {
        let elapsed = self.finished_at - self.started_at;
        log::info!(
            "Run finished in {:.1}s: {} course(s), {} baseline, {} unchanged, {} changed, {} failed",
            elapsed.num_milliseconds() as f64 / 1000.0,
            self.reports.len(),
            self.baselines(),
            self.unchanged(),
            self.changed(),
            self.failed()
        );
        for report in &self.reports {
            if let CourseOutcome::Failed { error } = &report.outcome {
                log::warn!("  {} ({}): {}", report.course_name, report.course_id, error);
            }
        }
    }
}

/// Change description lines, capped at `max_lines`.
pub fn report_lines(changes: &[ChangeDetail], max_lines: usize) -> Vec<String> {
    let mut lines: Vec<String> = changes.iter().take(max_lines).map(ChangeDetail::describe).collect();
    if changes.len() > max_lines {
        lines.push(format!("... and {} more change(s)", changes.len() - max_lines));
    }
    lines
}

/// Coordinates acquisition, snapshot comparison, notification and storage.
pub struct Monitor {
    store: Arc<dyn SnapshotStore>,
    acquisition: Arc<dyn Acquisition>,
    notifier: Arc<dyn Notifier>,
    builder: SnapshotBuilder,
    differ: DiffCalculator,
    options: MonitorOptions,
    run_lock: Mutex<()>,
}

impl Monitor {
    pub fn new(
        store: Arc<dyn SnapshotStore>,
        acquisition: Arc<dyn Acquisition>,
        notifier: Arc<dyn Notifier>,
        builder: SnapshotBuilder,
        options: MonitorOptions,
    ) -> Self {
        Self {
            store,
            acquisition,
            notifier,
            builder,
            differ: DiffCalculator::new(),
            options,
            run_lock: Mutex::new(()),
        }
    }

    /// Assemble a monitor from configuration: the configured store, the
    /// notifier chosen for it and HTTP acquisition against the portal.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let store = open_store(&config.storage).await?;
        let notifier = build_notifier(&config.telegram, store.as_ref()).await?;
        let acquisition = Arc::new(HttpAcquisition::new(&config.portal)?);
        let builder = SnapshotBuilder::new(Normalizer::new(config.base_url()?));

        Ok(Self::new(
            store,
            acquisition,
            notifier,
            builder,
            MonitorOptions::from(&config.monitor),
        ))
    }

    /// Run once over `courses`.
    ///
    /// Returns [`AppError::RunInProgress`] if another run on this monitor has
    /// not finished. Per-course failures are reported in the summary, not as
    /// an error.
    pub async fn run_once(&self, courses: &[Course]) -> Result<RunSummary> {
        let Ok(_guard) = self.run_lock.try_lock() else {
            return Err(AppError::RunInProgress);
        };

        let started_at = Utc::now();
        log::info!("Starting run over {} course(s)", courses.len());

        let reports = match self.acquisition.open().await {
            Ok(session) => {
                let reports = self.process_all(session.as_ref(), courses).await;
                if let Err(e) = session.close().await {
                    log::warn!("Failed to close acquisition session: {e}");
                }
                reports
            }
            Err(e) => {
                log::error!("Could not open acquisition session: {e}");
                courses
                    .iter()
                    .map(|course| CourseReport {
                        course_id: course.id.clone(),
                        course_name: course.name.clone(),
                        outcome: CourseOutcome::Failed {
                            error: e.to_string(),
                        },
                    })
                    .collect()
            }
        };

        Ok(RunSummary {
            started_at,
            finished_at: Utc::now(),
            reports,
        })
    }

    async fn process_all(&self, session: &dyn AcquisitionSession, courses: &[Course]) -> Vec<CourseReport> {
        let mut indexed: Vec<(usize, CourseReport)> = stream::iter(courses.iter().enumerate())
            .map(|(idx, course)| async move { (idx, self.process_course(session, course).await) })
            .buffer_unordered(self.options.max_concurrent)
            .collect()
            .await;

        indexed.sort_by_key(|(idx, _)| *idx);
        indexed.into_iter().map(|(_, report)| report).collect()
    }

    async fn process_course(&self, session: &dyn AcquisitionSession, course: &Course) -> CourseReport {
        let outcome = match self.observe(session, course).await {
            Ok(outcome) => outcome,
            Err(e) => {
                log::warn!("Course {} ({}) failed: {}", course.name, course.id, e);
                CourseOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };

        CourseReport {
            course_id: course.id.clone(),
            course_name: course.name.clone(),
            outcome,
        }
    }

    async fn observe(&self, session: &dyn AcquisitionSession, course: &Course) -> Result<CourseOutcome> {
        let rows = session.fetch_rows(course).await?;
        let current = self.builder.build_for(course, &rows)?;
        self.compare_and_persist(current).await
    }

    /// Compare a freshly built snapshot with the stored one and act on it.
    ///
    /// A store read failure aborts the course before anything is written. A
    /// failed notification or a failed write after a diff is logged and
    /// reported in the outcome.
    pub async fn compare_and_persist(&self, current: CourseSnapshot) -> Result<CourseOutcome> {
        let Some(previous) = self.store.get_snapshot(&current.course_id).await? else {
            self.store.put_snapshot(&current).await?;
            log::info!(
                "Baseline stored for {} ({} items)",
                current.course_id,
                current.item_count()
            );
            return Ok(CourseOutcome::Baseline {
                items: current.item_count(),
            });
        };

        if previous.content_hash == current.content_hash {
            log::debug!("No change for {}", current.course_id);
            return Ok(CourseOutcome::Unchanged);
        }

        let changes = self.differ.calculate(&previous, &current);
        log::info!("{} change(s) detected for {}", changes.len(), current.course_id);

        let notified = if changes.is_empty() {
            false
        } else {
            let lines = report_lines(&changes, self.options.max_report_lines);
            match self.notifier.notify(&current.course_name, &current.url, &lines).await {
                Ok(()) => true,
                Err(e) => {
                    log::warn!("Notification for {} failed: {}", current.course_id, e);
                    false
                }
            }
        };

        let persisted = match self.store.put_snapshot(&current).await {
            Ok(()) => true,
            Err(e) => {
                log::error!(
                    "Failed to store snapshot for {}; changes will be reported again: {}",
                    current.course_id,
                    e
                );
                false
            }
        };

        Ok(CourseOutcome::Changed {
            changes: changes.len(),
            notified,
            persisted,
        })
    }

    /// Run on a fixed interval until interrupted.
    ///
    /// Runs never overlap: a tick that fires while a run is still going is
    /// skipped. Run errors are logged and the loop continues.
    pub async fn watch(&self, courses: &[Course], interval: Duration, run_on_startup: bool) -> Result<()> {
        let interrupted = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Failed to listen for Ctrl-C: {e}");
                std::future::pending::<()>().await;
            }
            log::info!("Interrupted, stopping watcher");
        };
        self.watch_until(courses, interval, run_on_startup, interrupted).await
    }

    /// Same as [`Monitor::watch`], stopping when `shutdown` completes.
    pub async fn watch_until<F>(
        &self,
        courses: &[Course],
        interval: Duration,
        run_on_startup: bool,
        shutdown: F,
    ) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        if !run_on_startup {
            // the first tick completes immediately
            ticker.tick().await;
        }

        log::info!("Watching {} course(s) every {:?}", courses.len(), interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = &mut shutdown => return Ok(()),
            }

            match self.run_once(courses).await {
                Ok(summary) => summary.log(),
                Err(e) => log::error!("Run failed: {e}"),
            }
        }
    }
}
