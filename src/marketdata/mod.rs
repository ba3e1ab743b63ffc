pub mod client;
pub mod polymarket;
pub mod simulator;
