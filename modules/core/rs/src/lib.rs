pub use progress::{CancellationToken, Monitor, Progress, Silent};

pub mod num;
pub mod progress;
pub mod seq;
