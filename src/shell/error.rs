use std::fmt;
use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error(transparent)]
    Exec(#[from] ExecError),
    #[error("cannot read {path}: {source}")]
    Script {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("read error: {0}")]
    Io(#[from] io::Error),
}

/// A rejected script. `line` is where the offending command starts, or
/// the exact line for an invalid character.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{line}: syntax error: {kind}")]
pub struct SyntaxError {
    pub line: usize,
    pub kind: SyntaxErrorKind,
}

impl SyntaxError {
    pub fn new(line: usize, kind: SyntaxErrorKind) -> Self {
        Self { line, kind }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyntaxErrorKind {
    InvalidCharacter(char),
    BareAmpersand,
    AdjacentTokens(String, String),
    LeadingToken(String),
    TrailingToken(String),
    UnbalancedParens,
    StrayCloseParen,
    MissingRedirectTarget,
    EmptySubshell,
    DuplicateRedirect(char),
    MissingOperand,
}

impl fmt::Display for SyntaxErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCharacter(c) => write!(f, "invalid character {:?}", c),
            Self::BareAmpersand => write!(f, "`&` must be followed by `&`"),
            Self::AdjacentTokens(a, b) => write!(f, "unexpected `{}` after `{}`", b, a),
            Self::LeadingToken(t) => write!(f, "command cannot start with `{}`", t),
            Self::TrailingToken(t) => write!(f, "command cannot end with `{}`", t),
            Self::UnbalancedParens => write!(f, "unbalanced parentheses"),
            Self::StrayCloseParen => write!(f, "`)` without matching `(`"),
            Self::MissingRedirectTarget => write!(f, "redirection without a file name"),
            Self::EmptySubshell => write!(f, "empty subshell `()`"),
            Self::DuplicateRedirect(c) => write!(f, "more than one `{}` redirection", c),
            Self::MissingOperand => write!(f, "operator is missing an operand"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("fork failed: {0}")]
    Fork(#[source] nix::Error),
    #[error("pipe failed: {0}")]
    Pipe(#[source] nix::Error),
    #[error("cannot duplicate descriptor: {0}")]
    Dup(#[source] io::Error),
    #[error("wait failed: {0}")]
    Wait(#[source] nix::Error),
    #[error("cannot open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("argument contains a NUL byte: {0:?}")]
    InvalidArgument(String),
    #[error("commands {0:?} wait on commands that can never finish")]
    Stalled(Vec<usize>),
    /// A fatal error raised inside a forked child, as the child reported it.
    #[error("{0}")]
    Child(String),
}
