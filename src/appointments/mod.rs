//! Appointment booking: the record, its status lifecycle, scheduling rules and
//! the owner-scoped store contract.

mod model;
mod schedule;
mod service;
mod store;

pub use model::{Appointment, AppointmentDraft, AppointmentStatus};
pub use schedule::{bookable_hours, AppointmentListing, BookingOptions, HoursWindow, OfficeCalendar};
pub use service::AppointmentService;
pub use store::{AppointmentStore, MemoryAppointmentStore, PgAppointmentStore};
