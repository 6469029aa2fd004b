pub mod availability;
pub mod bookings;
pub mod jobs;
pub mod recurring;
