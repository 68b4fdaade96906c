pub mod cache;
pub mod calendar;
pub mod component;
pub mod error;
pub mod expand;
pub mod ingest;
pub mod merge;
pub mod normalize;
pub mod pipeline;
pub mod result;

pub use calendar::{Attendee, CalendarEvent, EventOrigin};
pub use error::{FailureKind, ServiceError, ServiceResult};
pub use pipeline::{CalendarPipeline, ParseOptions};
pub use result::{CalendarMetadata, ParseCounts, ParseResult, ParseWarning, WarningKind};
