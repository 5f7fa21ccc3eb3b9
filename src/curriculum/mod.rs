pub mod types;
pub mod shift;
pub mod resolve;

pub use types::{chronological, Curriculum, Occurrence, SlotKey};
pub use shift::{ShiftMatch, ShiftRule, SlotDescriptor};
pub use resolve::{Engine, ParityState, Resolution, RunningSet};
