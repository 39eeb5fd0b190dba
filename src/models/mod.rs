pub mod dashboard;
pub mod prometheus;
