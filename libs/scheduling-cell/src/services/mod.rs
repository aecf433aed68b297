pub mod availability;
pub mod conflict;
pub mod booking;
pub mod schedule;
pub mod lifecycle;

pub use availability::AvailabilityService;
pub use conflict::ConflictService;
pub use booking::BookingService;
pub use schedule::ScheduleService;
pub use lifecycle::AppointmentLifecycleService;
