pub mod maintenance;
pub mod tasks;
