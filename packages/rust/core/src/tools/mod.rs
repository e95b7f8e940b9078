//! Remote tool surface: schemas, validation, and the content handlers.

pub mod dispatch;
pub mod handlers;
pub mod links;
pub mod registry;

pub use dispatch::{Dispatched, Dispatcher, ToolArgs, ToolHandler, ToolResult, ToolTable};
pub use handlers::{AppendSection, GeneratePage, GenerateSeoPost, default_tool_table};
pub use links::SiteLinks;
pub use registry::{ParamSpec, ParamType, ToolSpec};
