pub mod curriculum;
pub mod policy;
pub mod reports;
pub mod simulation;
pub mod tester;

pub use curriculum::{CurriculumRun, run_curriculum};
pub use policy::{DriverKind, DriverPolicy};
pub use tester::*;
