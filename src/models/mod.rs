//! Data models for the campus sync service.
//!
//! Raw tab rows stay schema-less; typed views are built from them at the ingestion boundary.

mod fetch;
mod notification;
mod resource;
mod rows;

pub use fetch::*;
pub use notification::*;
pub use resource::*;
pub use rows::*;
