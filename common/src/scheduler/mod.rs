// Scheduler module: live recurring timers and the registry that owns them

pub mod clock;
pub mod registry;
pub mod timer;

pub use clock::{AnchoredClock, Clock, SystemClock};
pub use registry::{JobHandle, JobRegistry, ScheduleOutcome};
pub use timer::{FireCallback, RecurringTimer};
