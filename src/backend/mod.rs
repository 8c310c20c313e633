//! GPU device abstraction layer

pub mod null;
pub mod traits;
pub mod types;

pub use null::{NullDevice, RecordedCommand};
pub use traits::*;
pub use types::*;
