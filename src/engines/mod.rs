pub mod generation;
pub mod report;
