pub mod logging;

pub use logging::LOG;
