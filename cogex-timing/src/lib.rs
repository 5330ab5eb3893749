pub mod clock;
pub mod timer;

pub use clock::{Frame, FrameClock};
pub use timer::{FrameTimingStats, HighPrecisionTimer, SimulatedTimer, Timer};
