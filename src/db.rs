pub mod booking_repo;
pub use booking_repo::BookingRepository;
pub mod recurring_repo;
pub use recurring_repo::RecurringRepository;
pub mod slot_repo;
pub use slot_repo::SlotRepository;
