pub mod fixtures;
pub mod logging;

pub use logging::init_test_logging;
