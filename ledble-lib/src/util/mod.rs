pub mod adapter;
#[cfg(feature = "btleplug")]
pub mod btle;
pub mod discovery;
pub mod negotiate;
pub mod simulator;
pub mod traits;
