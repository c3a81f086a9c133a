pub mod app;
pub mod commands;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_RUNTIME_FAILURE: i32 = 1;
pub const EXIT_PIPELINE_FAILURE: i32 = 2;
pub const EXIT_USAGE_ERROR: i32 = 64;
