//! Tower layers applied inside transport service stacks
//!
//! - [`ContentTypeLayer`] - Supplies a default `Content-Type` header

mod content_type;

pub use content_type::{ContentTypeLayer, ContentTypeService};
