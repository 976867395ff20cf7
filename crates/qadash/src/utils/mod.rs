pub mod ratio;
pub mod time;
