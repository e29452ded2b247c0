//! Incremental static regeneration
//!
//! Computes which front-end pages a content change affects and asks the site
//! to regenerate them. Regeneration is best-effort: failures are logged and
//! never reach the content mutation that caused them.

pub mod content;
pub mod revalidate;
pub mod trigger;

pub use content::{ContentError, ContentSource};
pub use revalidate::{HttpRevalidator, RevalidateError, Revalidator};
pub use trigger::{RegenerationTrigger, TriggerReport, encode_path};
