pub mod catalog;
pub mod interval;
pub mod progress;
pub mod run;

pub use interval::Interval;
pub use progress::RunProgress;
pub use run::Run;
