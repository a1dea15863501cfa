use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

use crate::shell::error::{SyntaxError, SyntaxErrorKind};

/// Byte categories of the script grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharClass {
    /// Part of a word: ASCII alphanumerics and `!%+,-./:@^_`.
    Word,
    /// One of `| & ; ( ) < >`.
    Token,
    Newline,
    /// `#`, starts a comment.
    Comment,
    /// A plain space. Tabs are not accepted.
    Whitespace,
    Invalid,
}

pub fn classify(byte: u8) -> CharClass {
    match byte {
        b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' => CharClass::Word,
        b'!' | b'%' | b'+' | b',' | b'-' | b'.' | b'/' | b':' | b'@' | b'^' | b'_' => {
            CharClass::Word
        }
        b'|' | b'&' | b';' | b'(' | b')' | b'<' | b'>' => CharClass::Token,
        b'\n' => CharClass::Newline,
        b'#' => CharClass::Comment,
        b' ' => CharClass::Whitespace,
        _ => CharClass::Invalid,
    }
}

pub fn is_word_char(c: char) -> bool {
    c.is_ascii() && classify(c as u8) == CharClass::Word
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RedirectOp {
    Input,  // <
    Output, // >
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Token {
    Word(String),
    And,
    Or,
    Pipe,
    Semi,
    Redirect(RedirectOp),
    Open,
    Close,
    EOF,
}

impl Token {
    /// `;`, `&&`, `||` or `|`.
    pub fn is_binary_operator(&self) -> bool {
        matches!(self, Token::And | Token::Or | Token::Pipe | Token::Semi)
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self, Token::Redirect(_))
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Word(w) => f.write_str(w),
            Token::And => f.write_str("&&"),
            Token::Or => f.write_str("||"),
            Token::Pipe => f.write_str("|"),
            Token::Semi => f.write_str(";"),
            Token::Redirect(RedirectOp::Input) => f.write_str("<"),
            Token::Redirect(RedirectOp::Output) => f.write_str(">"),
            Token::Open => f.write_str("("),
            Token::Close => f.write_str(")"),
            Token::EOF => f.write_str("end of command"),
        }
    }
}

/// Splits one cleaned command buffer into tokens.
pub struct Lexer<'a> {
    input: Peekable<Chars<'a>>,
    line: usize,
}

impl<'a> Lexer<'a> {
    /// `line` is only used to locate errors.
    pub fn new(input: &'a str, line: usize) -> Self {
        Self {
            input: input.chars().peekable(),
            line,
        }
    }

    pub fn next_token(&mut self) -> Result<Token, SyntaxError> {
        self.skip_whitespace();

        let Some(c) = self.peek_char() else {
            return Ok(Token::EOF);
        };
        let token = match c {
            '|' => {
                self.read_char();
                if self.peek_char() == Some('|') {
                    self.read_char();
                    Token::Or
                } else {
                    Token::Pipe
                }
            }
            '&' => {
                self.read_char();
                if self.peek_char() != Some('&') {
                    return Err(self.error(SyntaxErrorKind::BareAmpersand));
                }
                self.read_char();
                Token::And
            }
            ';' => {
                self.read_char();
                Token::Semi
            }
            '<' => {
                self.read_char();
                Token::Redirect(RedirectOp::Input)
            }
            '>' => {
                self.read_char();
                Token::Redirect(RedirectOp::Output)
            }
            '(' => {
                self.read_char();
                Token::Open
            }
            ')' => {
                self.read_char();
                Token::Close
            }
            c if is_word_char(c) => self.read_word(),
            c => return Err(self.error(SyntaxErrorKind::InvalidCharacter(c))),
        };
        Ok(token)
    }

    /// Collects every token up to, not including, `Token::EOF`.
    pub fn tokenize(mut self) -> Result<Vec<Token>, SyntaxError> {
        let mut tokens = Vec::new();
        loop {
            match self.next_token()? {
                Token::EOF => return Ok(tokens),
                token => tokens.push(token),
            }
        }
    }

    fn error(&self, kind: SyntaxErrorKind) -> SyntaxError {
        SyntaxError::new(self.line, kind)
    }

    fn read_char(&mut self) -> Option<char> {
        self.input.next()
    }

    fn peek_char(&mut self) -> Option<char> {
        self.input.peek().copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char() == Some(' ') {
            self.read_char();
        }
    }

    fn read_word(&mut self) -> Token {
        let mut word = String::new();
        while let Some(c) = self.peek_char() {
            if !is_word_char(c) {
                break;
            }
            word.push(c);
            self.read_char();
        }
        Token::Word(word)
    }
}
