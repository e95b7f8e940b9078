//! Cadence-based job scheduler.
//!
//! Jobs are registered once at startup. The host drives time: it calls
//! [`JobScheduler::due`] to learn which cadences have fired and
//! [`JobScheduler::tick`] to run them. Enable flags are read from the
//! [`AutomationConfig`] passed to every tick, never cached.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use pageforge_shared::{AutomationConfig, Cadence, Feature, PageForgeError, Result};

use crate::matrix::MatrixProvisioner;

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

/// Work run when a job fires.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn run(&self, now: DateTime<Utc>) -> Result<()>;
}

/// A named handler bound to a cadence and an optional feature gate.
#[derive(Clone)]
pub struct ScheduledJob {
    pub name: String,
    pub cadence: Cadence,
    /// Feature flag that must be on; `None` means only the global flag applies.
    pub feature: Option<Feature>,
    handler: Arc<dyn JobHandler>,
}

impl ScheduledJob {
    pub fn new(
        name: impl Into<String>,
        cadence: Cadence,
        feature: Option<Feature>,
        handler: Arc<dyn JobHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            cadence,
            feature,
            handler,
        }
    }

    /// Whether the job runs under `config`.
    pub fn enabled(&self, config: &AutomationConfig) -> bool {
        config.enabled && self.feature.is_none_or(|f| config.feature_enabled(f))
    }
}

impl std::fmt::Debug for ScheduledJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduledJob")
            .field("name", &self.name)
            .field("cadence", &self.cadence)
            .field("feature", &self.feature)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tick results
// ---------------------------------------------------------------------------

/// What a tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Jobs whose handler ran and succeeded.
    pub ran: Vec<String>,
    /// Jobs skipped because their feature flag is off.
    pub skipped: Vec<String>,
    /// True when the global flag stopped the whole tick.
    pub automation_disabled: bool,
}

/// A handler error captured during a tick.
#[derive(Debug)]
pub struct JobFailure {
    pub job: String,
    pub error: PageForgeError,
}

/// One or more handlers failed. The remaining jobs of the tick still ran.
#[derive(Debug, thiserror::Error)]
#[error("{} of the {cadence} jobs failed: {}", .failures.len(), failed_names(.failures))]
pub struct SchedulerHandlerFailure {
    pub cadence: Cadence,
    pub failures: Vec<JobFailure>,
    pub report: TickReport,
}

fn failed_names(failures: &[JobFailure]) -> String {
    failures
        .iter()
        .map(|f| f.job.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Pending trigger for one cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trigger {
    pub cadence: Cadence,
    pub next_run: DateTime<Utc>,
}

/// Registry of jobs plus one pending trigger per cadence.
#[derive(Default)]
pub struct JobScheduler {
    jobs: Vec<ScheduledJob>,
    triggers: Mutex<BTreeMap<Cadence, DateTime<Utc>>>,
}

impl JobScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a job. The first job of a cadence arms that cadence's trigger at `now`.
    pub fn register(&mut self, job: ScheduledJob, now: DateTime<Utc>) {
        self.lock_triggers().entry(job.cadence).or_insert(now);
        debug!(job = %job.name, cadence = %job.cadence, "job registered");
        self.jobs.push(job);
    }

    /// Clear all pending triggers. Jobs stay registered but never fire until
    /// re-armed.
    pub fn unregister_all(&self) {
        self.lock_triggers().clear();
        info!("all scheduled triggers cleared");
    }

    /// Re-arm a trigger for every cadence that has jobs and no trigger.
    pub fn rearm(&self, now: DateTime<Utc>) {
        let mut triggers = self.lock_triggers();
        for job in &self.jobs {
            triggers.entry(job.cadence).or_insert(now);
        }
    }

    pub fn jobs(&self) -> &[ScheduledJob] {
        &self.jobs
    }

    pub fn pending_triggers(&self) -> Vec<Trigger> {
        self.lock_triggers()
            .iter()
            .map(|(&cadence, &next_run)| Trigger { cadence, next_run })
            .collect()
    }

    /// Cadences whose trigger is due at `now`.
    ///
    /// Each due trigger advances to its first slot after `now`; missed
    /// periods are not replayed.
    pub fn due(&self, now: DateTime<Utc>) -> Vec<Cadence> {
        let mut fired = Vec::new();
        for (cadence, next_run) in self.lock_triggers().iter_mut() {
            if *next_run > now {
                continue;
            }
            let period = cadence.period();
            while *next_run <= now {
                *next_run += period;
            }
            fired.push(*cadence);
        }
        fired
    }

    /// Run every enabled job of `cadence`.
    ///
    /// Failures are not retried and do not stop later jobs; they are returned
    /// together once the tick finishes.
    #[instrument(skip(self, config), fields(%cadence))]
    pub async fn tick(
        &self,
        cadence: Cadence,
        now: DateTime<Utc>,
        config: &AutomationConfig,
    ) -> std::result::Result<TickReport, SchedulerHandlerFailure> {
        let mut report = TickReport::default();

        if !config.enabled {
            debug!("automation disabled, tick skipped");
            report.automation_disabled = true;
            return Ok(report);
        }

        let mut failures = Vec::new();
        for job in self.jobs.iter().filter(|j| j.cadence == cadence) {
            if !job.enabled(config) {
                debug!(job = %job.name, "feature disabled, job skipped");
                report.skipped.push(job.name.clone());
                continue;
            }

            match job.handler.run(now).await {
                Ok(()) => {
                    debug!(job = %job.name, "job finished");
                    report.ran.push(job.name.clone());
                }
                Err(error) => {
                    warn!(job = %job.name, %error, "job failed");
                    failures.push(JobFailure {
                        job: job.name.clone(),
                        error,
                    });
                }
            }
        }

        info!(
            ran = report.ran.len(),
            skipped = report.skipped.len(),
            failed = failures.len(),
            "tick complete"
        );

        if failures.is_empty() {
            Ok(report)
        } else {
            Err(SchedulerHandlerFailure {
                cadence,
                failures,
                report,
            })
        }
    }

    fn lock_triggers(&self) -> std::sync::MutexGuard<'_, BTreeMap<Cadence, DateTime<Utc>>> {
        self.triggers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// ---------------------------------------------------------------------------
// Built-in jobs
// ---------------------------------------------------------------------------

/// Host-supplied hooks for jobs whose logic lives outside the engine.
#[async_trait]
pub trait AutomationHooks: Send + Sync {
    async fn optimize_revenue(&self) -> Result<()>;
    async fn refresh_dynamic_content(&self) -> Result<()>;
    async fn score_leads(&self) -> Result<()>;
    async fn tune_conversions(&self) -> Result<()>;
}

/// Hooks that only log.
#[derive(Debug, Clone, Default)]
pub struct LoggingHooks;

#[async_trait]
impl AutomationHooks for LoggingHooks {
    async fn optimize_revenue(&self) -> Result<()> {
        info!("revenue optimization hook (no-op)");
        Ok(())
    }

    async fn refresh_dynamic_content(&self) -> Result<()> {
        info!("dynamic content refresh hook (no-op)");
        Ok(())
    }

    async fn score_leads(&self) -> Result<()> {
        info!("lead scoring hook (no-op)");
        Ok(())
    }

    async fn tune_conversions(&self) -> Result<()> {
        info!("conversion tuning hook (no-op)");
        Ok(())
    }
}

struct BlogPostJob(Arc<MatrixProvisioner>);

#[async_trait]
impl JobHandler for BlogPostJob {
    async fn run(&self, _now: DateTime<Utc>) -> Result<()> {
        self.0.provision_blog_post().await.map(|_| ())
    }
}

struct LandingPageJob(Arc<MatrixProvisioner>);

#[async_trait]
impl JobHandler for LandingPageJob {
    async fn run(&self, _now: DateTime<Utc>) -> Result<()> {
        self.0.provision_random_landing().await.map(|_| ())
    }
}

#[derive(Clone, Copy)]
enum Hook {
    Revenue,
    DynamicContent,
    LeadScoring,
    Conversions,
}

struct HookJob {
    hooks: Arc<dyn AutomationHooks>,
    hook: Hook,
}

#[async_trait]
impl JobHandler for HookJob {
    async fn run(&self, _now: DateTime<Utc>) -> Result<()> {
        match self.hook {
            Hook::Revenue => self.hooks.optimize_revenue().await,
            Hook::DynamicContent => self.hooks.refresh_dynamic_content().await,
            Hook::LeadScoring => self.hooks.score_leads().await,
            Hook::Conversions => self.hooks.tune_conversions().await,
        }
    }
}

/// The standard daily and hourly job set.
pub fn default_jobs(
    provisioner: Arc<MatrixProvisioner>,
    hooks: Arc<dyn AutomationHooks>,
) -> Vec<ScheduledJob> {
    let hook = |hook: Hook| -> Arc<dyn JobHandler> {
        Arc::new(HookJob {
            hooks: hooks.clone(),
            hook,
        })
    };

    vec![
        ScheduledJob::new(
            "auto_blog",
            Cadence::Daily,
            Some(Feature::Blog),
            Arc::new(BlogPostJob(provisioner.clone())),
        ),
        ScheduledJob::new(
            "auto_pages",
            Cadence::Daily,
            Some(Feature::Pages),
            Arc::new(LandingPageJob(provisioner)),
        ),
        ScheduledJob::new(
            "revenue_optimization",
            Cadence::Daily,
            Some(Feature::Revenue),
            hook(Hook::Revenue),
        ),
        ScheduledJob::new(
            "dynamic_content_refresh",
            Cadence::Hourly,
            None,
            hook(Hook::DynamicContent),
        ),
        ScheduledJob::new("lead_scoring", Cadence::Hourly, None, hook(Hook::LeadScoring)),
        ScheduledJob::new(
            "conversion_tuning",
            Cadence::Hourly,
            None,
            hook(Hook::Conversions),
        ),
    ]
}
