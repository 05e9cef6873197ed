pub mod attribution;

pub use attribution::{Attribute, AttributionRecord, UserId};
