use std::vec::IntoIter;

use super::ast::{Command, CommandKind, Operator};
use super::lexer::{RedirectOp, Token};
use crate::shell::error::{SyntaxError, SyntaxErrorKind};

enum StackOp {
    Open,
    Binary(Operator),
}

/// Builds one command tree from validated tokens with an operand stack
/// and an operator stack. Equal precedence reduces before pushing, so
/// every operator is left-associative.
pub struct Parser {
    tokens: IntoIter<Token>,
    current_token: Token,
    operands: Vec<Command>,
    operators: Vec<StackOp>,
    line: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>, line: usize) -> Self {
        let mut tokens = tokens.into_iter();
        let current_token = tokens.next().unwrap_or(Token::EOF);
        Parser {
            tokens,
            current_token,
            operands: Vec::new(),
            operators: Vec::new(),
            line,
        }
    }

    fn next_token(&mut self) {
        self.current_token = self.tokens.next().unwrap_or(Token::EOF);
    }

    fn error(&self, kind: SyntaxErrorKind) -> SyntaxError {
        SyntaxError::new(self.line, kind)
    }

    pub fn parse_command(mut self) -> Result<Command, SyntaxError> {
        loop {
            match &self.current_token {
                Token::EOF => break,
                Token::Word(_) | Token::Redirect(_) => {
                    let command = self.parse_simple_command()?;
                    self.operands.push(command);
                }
                Token::Open => {
                    self.operators.push(StackOp::Open);
                    self.next_token();
                }
                Token::Close => {
                    self.next_token();
                    self.close_subshell()?;
                }
                token => {
                    let op = match token {
                        Token::Semi => Operator::Sequence,
                        Token::And => Operator::And,
                        Token::Or => Operator::Or,
                        _ => Operator::Pipe,
                    };
                    while let Some(StackOp::Binary(top)) = self.operators.last() {
                        if top.precedence() < op.precedence() {
                            break;
                        }
                        let top = *top;
                        self.operators.pop();
                        self.reduce(top)?;
                    }
                    self.operators.push(StackOp::Binary(op));
                    self.next_token();
                }
            }
        }

        while let Some(op) = self.operators.pop() {
            match op {
                StackOp::Binary(op) => self.reduce(op)?,
                StackOp::Open => return Err(self.error(SyntaxErrorKind::UnbalancedParens)),
            }
        }

        let root = self.operands.pop();
        match root {
            Some(root) if self.operands.is_empty() => Ok(root),
            _ => Err(self.error(SyntaxErrorKind::MissingOperand)),
        }
    }

    /// Pops the two topmost operands (right first) and pushes `left op right`.
    fn reduce(&mut self, op: Operator) -> Result<(), SyntaxError> {
        let right = self.operands.pop();
        let left = self.operands.pop();
        let (Some(left), Some(right)) = (left, right) else {
            return Err(self.error(SyntaxErrorKind::MissingOperand));
        };
        self.operands.push(Command::binary(op, left, right));
        Ok(())
    }

    fn close_subshell(&mut self) -> Result<(), SyntaxError> {
        loop {
            match self.operators.pop() {
                Some(StackOp::Open) => break,
                Some(StackOp::Binary(op)) => self.reduce(op)?,
                None => return Err(self.error(SyntaxErrorKind::StrayCloseParen)),
            }
        }
        let inner = self
            .operands
            .pop()
            .ok_or_else(|| self.error(SyntaxErrorKind::EmptySubshell))?;
        let mut subshell = Command::subshell(inner);
        while let Token::Redirect(op) = self.current_token {
            self.next_token();
            self.parse_redirection(&mut subshell, op)?;
        }
        self.operands.push(subshell);
        Ok(())
    }

    fn parse_simple_command(&mut self) -> Result<Command, SyntaxError> {
        let mut command = Command::simple(Vec::<String>::new());
        let mut words = Vec::new();

        loop {
            match &self.current_token {
                Token::Word(word) => {
                    words.push(word.clone());
                    self.next_token();
                }
                Token::Redirect(op) => {
                    let op = *op;
                    self.next_token();
                    self.parse_redirection(&mut command, op)?;
                }
                _ => break,
            }
        }

        if words.is_empty() {
            return Err(self.error(SyntaxErrorKind::MissingOperand));
        }
        command.kind = CommandKind::Simple(words);
        Ok(command)
    }

    fn parse_redirection(&mut self, command: &mut Command, op: RedirectOp) -> Result<(), SyntaxError> {
        let Token::Word(path) = &self.current_token else {
            return Err(self.error(SyntaxErrorKind::MissingRedirectTarget));
        };
        let (slot, symbol) = match op {
            RedirectOp::Input => (&mut command.input, '<'),
            RedirectOp::Output => (&mut command.output, '>'),
        };
        if slot.is_some() {
            return Err(self.error(SyntaxErrorKind::DuplicateRedirect(symbol)));
        }
        *slot = Some(path.clone());
        self.next_token();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::parser::lexer::Lexer;

    #[allow(clippy::unwrap_used)]
    fn parse(input: &str) -> Command {
        let tokens = Lexer::new(input, 1).tokenize().unwrap();
        Parser::new(tokens, 1).parse_command().unwrap()
    }

    fn simple(word: &str) -> Command {
        Command::simple([word])
    }

    fn bin(op: Operator, left: Command, right: Command) -> Command {
        Command::binary(op, left, right)
    }

    #[test]
    fn test_simple_command() {
        assert_eq!(parse("ls -l /tmp"), Command::simple(["ls", "-l", "/tmp"]));
    }

    #[test]
    fn test_precedence() {
        let expected = bin(
            Operator::Sequence,
            simple("a"),
            bin(
                Operator::And,
                simple("b"),
                bin(Operator::Pipe, simple("c"), simple("d")),
            ),
        );
        assert_eq!(parse("a;b&&c|d"), expected);
        assert_eq!(
            parse("a|b&&c"),
            bin(Operator::And, bin(Operator::Pipe, simple("a"), simple("b")), simple("c"))
        );
    }

    #[test]
    fn test_left_associative() {
        assert_eq!(
            parse("a;b;c"),
            bin(Operator::Sequence, bin(Operator::Sequence, simple("a"), simple("b")), simple("c"))
        );
        assert_eq!(
            parse("a&&b||c"),
            bin(Operator::Or, bin(Operator::And, simple("a"), simple("b")), simple("c"))
        );
        assert_eq!(
            parse("a|b|c"),
            bin(Operator::Pipe, bin(Operator::Pipe, simple("a"), simple("b")), simple("c"))
        );
    }

    #[test]
    fn test_redirection_order_does_not_matter() {
        let expected = Command::simple(["cmd", "arg1"]).with_input("in").with_output("out");
        assert_eq!(parse("cmd arg1<in>out"), expected);
        assert_eq!(parse("cmd<in arg1>out"), expected);
        assert_eq!(parse("cmd>out<in arg1"), expected);
    }

    #[test]
    fn test_parentheses_override_precedence() {
        assert_eq!(
            parse("(a;b)|c"),
            bin(
                Operator::Pipe,
                Command::subshell(bin(Operator::Sequence, simple("a"), simple("b"))),
                simple("c")
            )
        );
    }

    #[test]
    fn test_subshell_wraps_original_tree() {
        for input in ["a", "a;b&&c|d", "a|b<x>y", "(a||b);c"] {
            let inner = parse(input);
            assert_eq!(parse(&format!("({})", input)), Command::subshell(inner));
        }
    }

    #[test]
    fn test_subshell_redirection() {
        assert_eq!(
            parse("(a&&b)<in>out"),
            Command::subshell(bin(Operator::And, simple("a"), simple("b")))
                .with_input("in")
                .with_output("out")
        );
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_duplicate_redirection() {
        let tokens = Lexer::new("a>x>y", 4).tokenize().unwrap_or_default();
        let err = Parser::new(tokens, 4).parse_command().unwrap_err();
        assert_eq!(err, SyntaxError::new(4, SyntaxErrorKind::DuplicateRedirect('>')));
    }
}
