use std::io;

use log::trace;

use super::lexer::{classify, CharClass};
use crate::shell::error::{Result, SyntaxError, SyntaxErrorKind};

/// Pull-one-byte input. `Ok(None)` is end of input.
pub trait ByteSource {
    fn next_byte(&mut self) -> io::Result<Option<u8>>;
}

impl<I> ByteSource for I
where
    I: Iterator<Item = io::Result<u8>>,
{
    fn next_byte(&mut self) -> io::Result<Option<u8>> {
        self.next().transpose()
    }
}

/// One logical top-level command after comment stripping, whitespace
/// collapsing and newline rewriting. `line` is where it starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCommand {
    pub line: usize,
    pub text: String,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum LineState {
    Empty,
    Content,
    CommentOnly,
}

/// Cuts a byte stream into cleaned command buffers.
///
/// A single newline becomes `;`, a blank line ends the command, and a
/// newline after `&&`, `||`, `|`, `;` or `(` (or before `)`) is dropped so
/// the operand can continue on the next line.
pub struct CommandReader<S> {
    source: S,
    line: usize,
    lookahead: Option<u8>,
}

impl<S: ByteSource> CommandReader<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            line: 1,
            lookahead: None,
        }
    }

    fn read_byte(&mut self) -> Result<Option<u8>> {
        if let Some(b) = self.lookahead.take() {
            return Ok(Some(b));
        }
        Ok(self.source.next_byte()?)
    }

    fn skip_comment(&mut self) -> Result<Option<u8>> {
        while let Some(b) = self.read_byte()? {
            if b == b'\n' {
                return Ok(Some(b));
            }
        }
        Ok(None)
    }

    /// Returns the next non-empty command, or `None` at end of input.
    pub fn next_command(&mut self) -> Result<Option<RawCommand>> {
        let mut text = String::new();
        let mut start_line = self.line;
        let mut newlines = 0usize;
        let mut pending_space = false;
        let mut state = LineState::Empty;

        while let Some(mut b) = self.read_byte()? {
            let mut class = classify(b);

            if class == CharClass::Comment {
                if state == LineState::Empty {
                    state = LineState::CommentOnly;
                }
                match self.skip_comment()? {
                    Some(nl) => {
                        b = nl;
                        class = CharClass::Newline;
                    }
                    None => break,
                }
            }

            match class {
                CharClass::Newline => {
                    if state != LineState::CommentOnly && !text.is_empty() {
                        newlines += 1;
                    }
                    self.line += 1;
                    state = LineState::Empty;
                    pending_space = false;
                }
                CharClass::Whitespace => pending_space = true,
                CharClass::Invalid => {
                    return Err(SyntaxError::new(
                        self.line,
                        SyntaxErrorKind::InvalidCharacter(b as char),
                    )
                    .into());
                }
                CharClass::Word | CharClass::Token => {
                    if newlines > 0 {
                        let continues = matches!(text.chars().last(), Some('&' | '|' | ';' | '('))
                            || b == b')';
                        if !continues {
                            if newlines > 1 {
                                self.lookahead = Some(b);
                                break;
                            }
                            text.push(';');
                        }
                        newlines = 0;
                        pending_space = false;
                    }
                    if text.is_empty() {
                        start_line = self.line;
                    }
                    if class == CharClass::Word
                        && pending_space
                        && text.chars().last().is_some_and(|c| classify(c as u8) == CharClass::Word)
                    {
                        text.push(' ');
                    }
                    text.push(b as char);
                    pending_space = false;
                    state = LineState::Content;
                }
                CharClass::Comment => {}
            }
        }

        if text.is_empty() {
            return Ok(None);
        }
        trace!("line {}: read command {:?}", start_line, text);
        Ok(Some(RawCommand {
            line: start_line,
            text,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[allow(clippy::unwrap_used)]
    fn commands(input: &str) -> Vec<String> {
        let mut reader = CommandReader::new(input.as_bytes().bytes());
        let mut out = Vec::new();
        while let Some(cmd) = reader.next_command().unwrap() {
            out.push(cmd.text);
        }
        out
    }

    #[test]
    fn test_whitespace_collapse() {
        assert_eq!(commands("  echo    a   b  "), vec!["echo a b"]);
        assert_eq!(commands("cat  <  in  >  out"), vec!["cat<in>out"]);
        assert_eq!(commands("a  &&  b"), vec!["a&&b"]);
    }

    #[test]
    fn test_single_newline_is_sequence() {
        assert_eq!(commands("a\nb\nc\n"), vec!["a;b;c"]);
    }

    #[test]
    fn test_blank_line_splits_commands() {
        assert_eq!(commands("a\n\nb\n  \n\n\nc"), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_newline_after_operator_is_absorbed() {
        assert_eq!(commands("a &&\nb ||\n\n\nc |\nd ;\ne"), vec!["a&&b||c|d;e"]);
        assert_eq!(commands("(\n a\n b\n)"), vec!["(a;b)"]);
    }

    #[test]
    fn test_comments() {
        assert_eq!(commands("# header\na # trailing\nb"), vec!["a;b"]);
        assert_eq!(commands("a\n# only a comment\nb"), vec!["a;b"]);
        assert_eq!(commands("a\n\n# between\n\nb"), vec!["a", "b"]);
        assert_eq!(commands("# nothing here\n"), Vec::<String>::new());
        assert_eq!(commands("a # no newline at end"), vec!["a"]);
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_start_lines() {
        let mut reader = CommandReader::new("\n\na\nb\n\n\nc".as_bytes().bytes());
        assert_eq!(reader.next_command().unwrap().unwrap().line, 3);
        assert_eq!(reader.next_command().unwrap().unwrap().line, 7);
        assert!(reader.next_command().unwrap().is_none());
    }

    #[test]
    fn test_invalid_character_reports_line() {
        let mut reader = CommandReader::new("a\nb\n\tc".as_bytes().bytes());
        match reader.next_command() {
            Err(crate::shell::error::Error::Syntax(e)) => {
                assert_eq!(e, SyntaxError::new(3, SyntaxErrorKind::InvalidCharacter('\t')));
            }
            other => panic!("expected syntax error, got {:?}", other),
        }
    }
}
