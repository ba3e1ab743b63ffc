pub mod client;
pub mod parse;
pub mod simulator;
