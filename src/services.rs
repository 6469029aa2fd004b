pub mod booking_lifecycle;
pub mod calendar;
pub mod conflict_validator;
pub mod jobs;
pub mod notifications;
pub mod recurrence;
pub mod slot_catalog;
