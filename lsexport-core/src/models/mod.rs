pub mod run;
pub mod window;

pub use run::{parse_timestamp, ExportedRun, RunRecord};
pub use window::ExportWindow;
