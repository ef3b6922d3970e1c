pub mod distribution;
pub mod failure;
pub mod rng;
