pub mod engine;
pub mod gate;
