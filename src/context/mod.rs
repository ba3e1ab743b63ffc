pub mod aggregator;
pub mod bundle;
pub mod gdelt;
pub mod keywords;
pub mod source;
pub mod twitter;
