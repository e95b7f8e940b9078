//! Domain logic for PageForge.
//!
//! This crate ties the content store, renderer, and media fetcher together
//! into the three automation surfaces: matrix provisioning, the cadence
//! scheduler, and the remote tool dispatcher.

pub mod matrix;
pub mod renderer;
pub mod scheduler;
pub mod stats;
pub mod structured_data;
pub mod tools;

#[cfg(test)]
mod testing;

pub use matrix::{LandingOutcome, MatrixProvisioner};
pub use renderer::{ContentRenderer, RenderRequest, TemplateRenderer};
pub use scheduler::{
    AutomationHooks, JobFailure, JobHandler, JobScheduler, LoggingHooks, ScheduledJob,
    SchedulerHandlerFailure, TickReport, Trigger, default_jobs,
};
pub use stats::{ContentStats, collect_stats, monthly_auto_posts};
pub use structured_data::{JSON_LD_META_KEY, encode_json_ld, script_tag, structured_data};
pub use tools::{Dispatched, Dispatcher, SiteLinks, ToolResult, ToolSpec, ToolTable, default_tool_table};
