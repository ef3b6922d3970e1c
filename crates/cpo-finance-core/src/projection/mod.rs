pub mod annual;
pub mod monthly;
