pub mod investment;
pub mod operating;
