pub mod preview;
pub mod store;

pub use preview::preview;
pub use store::{DatasetInfo, DatasetStore, DatastoreError};
