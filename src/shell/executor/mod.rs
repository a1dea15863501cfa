#[allow(clippy::module_inception)]
pub mod executor;
pub mod process;
pub mod redirect;

pub use executor::Executor;
