//! Command implementations for ssemon

pub mod console;
pub mod health;
pub mod watch;

pub use console::console;
pub use health::health;
pub use watch::watch;
