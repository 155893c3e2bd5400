pub mod assignments;
pub mod core;
pub mod deadlines;
pub mod grading;
pub mod groups;
pub mod identity;
