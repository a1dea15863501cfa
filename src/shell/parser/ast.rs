use std::fmt;

/// Binary operators, lowest precedence first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Sequence,
    And,
    Or,
    Pipe,
}

impl Operator {
    pub fn precedence(self) -> u8 {
        match self {
            Operator::Sequence => 1,
            Operator::And | Operator::Or => 2,
            Operator::Pipe => 3,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Sequence => ";",
            Operator::And => "&&",
            Operator::Or => "||",
            Operator::Pipe => "|",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    /// Program name followed by its arguments.
    Simple(Vec<String>),
    And(Box<Command>, Box<Command>),
    Or(Box<Command>, Box<Command>),
    Sequence(Box<Command>, Box<Command>),
    Pipe(Box<Command>, Box<Command>),
    Subshell(Box<Command>),
}

/// A node of a command tree. Every node owns its children.
///
/// `input`/`output` apply to whatever stdin/stdout the node ends up
/// using: the process itself for a simple command, the whole subtree for
/// a subshell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub kind: CommandKind,
    pub input: Option<String>,
    pub output: Option<String>,
    status: Option<i32>,
}

impl Command {
    fn new(kind: CommandKind) -> Self {
        Self {
            kind,
            input: None,
            output: None,
            status: None,
        }
    }

    pub fn simple<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(CommandKind::Simple(words.into_iter().map(Into::into).collect()))
    }

    pub fn binary(op: Operator, left: Command, right: Command) -> Self {
        let (left, right) = (Box::new(left), Box::new(right));
        Self::new(match op {
            Operator::Sequence => CommandKind::Sequence(left, right),
            Operator::And => CommandKind::And(left, right),
            Operator::Or => CommandKind::Or(left, right),
            Operator::Pipe => CommandKind::Pipe(left, right),
        })
    }

    pub fn subshell(inner: Command) -> Self {
        Self::new(CommandKind::Subshell(Box::new(inner)))
    }

    pub fn with_input(mut self, path: impl Into<String>) -> Self {
        self.input = Some(path.into());
        self
    }

    pub fn with_output(mut self, path: impl Into<String>) -> Self {
        self.output = Some(path.into());
        self
    }

    /// Operator and children of a binary node.
    pub fn binary_parts(&self) -> Option<(Operator, &Command, &Command)> {
        match &self.kind {
            CommandKind::Sequence(l, r) => Some((Operator::Sequence, l, r)),
            CommandKind::And(l, r) => Some((Operator::And, l, r)),
            CommandKind::Or(l, r) => Some((Operator::Or, l, r)),
            CommandKind::Pipe(l, r) => Some((Operator::Pipe, l, r)),
            _ => None,
        }
    }

    pub fn operator(&self) -> Option<Operator> {
        self.binary_parts().map(|(op, _, _)| op)
    }

    /// Exit status, `None` until the node has run.
    pub fn status(&self) -> Option<i32> {
        self.status
    }

    pub(crate) fn set_status(&mut self, status: i32) {
        self.status = Some(status);
    }

    fn write_indented(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        match &self.kind {
            CommandKind::Simple(words) => write!(f, "{:indent$}{}", "", words.join(" "))?,
            CommandKind::Subshell(inner) => {
                writeln!(f, "{:indent$}(", "")?;
                inner.write_indented(f, indent + 1)?;
                write!(f, "\n{:indent$})", "")?;
            }
            _ => {
                if let Some((op, left, right)) = self.binary_parts() {
                    let step = |child: &Command| if child.operator() == Some(op) { 0 } else { 2 };
                    left.write_indented(f, indent + step(left))?;
                    writeln!(f, " \\\n{:indent$}{}", "", op.symbol())?;
                    right.write_indented(f, indent + step(right))?;
                }
            }
        }
        if let Some(input) = &self.input {
            write!(f, "<{}", input)?;
        }
        if let Some(output) = &self.output {
            write!(f, ">{}", output)?;
        }
        Ok(())
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_indented(f, 2)
    }
}
