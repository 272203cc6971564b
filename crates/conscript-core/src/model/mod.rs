pub mod filter;
pub mod record;

pub use filter::Filter;
pub use record::{Record, RecordId, RecordState, STRUCTURAL_ATTRIBUTES};
