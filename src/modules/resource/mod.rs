pub mod model;

pub use model::{PollableResource, ResourceId, ResourceStatus};
