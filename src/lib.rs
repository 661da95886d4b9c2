pub mod attach;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod graph;
pub mod grid;
pub mod layout;
pub mod routing;
pub mod session;

#[cfg(feature = "cli")]
pub use cli::run;
