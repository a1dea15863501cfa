pub mod dependency;
pub mod error;
pub mod executor;
pub mod parser;
pub mod scheduler;

pub use error::{Error, ExecError, Result, SyntaxError, SyntaxErrorKind};
pub use executor::Executor;
pub use parser::{parse_stream, parse_str};
pub use scheduler::Scheduler;
