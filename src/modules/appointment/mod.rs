pub mod model;
pub mod schema;

pub use model::{AppointmentDetails, AppointmentStatus};
pub use schema::{AppointmentLookup, AppointmentStatusReport};
