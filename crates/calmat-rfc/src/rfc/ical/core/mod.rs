//! Core iCalendar types.

mod component;
mod parameter;
mod property;
mod value;

pub use component::{Component, ComponentKind};
pub use parameter::Parameter;
pub use property::{ContentLine, Property};
pub use value::{Date, DateOrDateTime, DateTime, DateTimeForm, Duration, UtcOffset, Value};
