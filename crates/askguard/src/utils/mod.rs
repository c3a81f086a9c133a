pub mod hash;
pub mod logging;
pub mod time;
