pub mod calendar;
pub mod usage;
