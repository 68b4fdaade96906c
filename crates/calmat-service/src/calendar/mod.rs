//! Calendar domain model.

pub mod model;

pub use model::{
    Attendee, AttendeeRole, CalendarEvent, EventOrigin, RawComponent, ResponseStatus,
};
