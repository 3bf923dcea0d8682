pub mod color;
pub mod effect;
