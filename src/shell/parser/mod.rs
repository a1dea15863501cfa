pub mod ast;
pub mod lexer;
#[allow(clippy::module_inception)]
pub mod parser;
pub mod reader;
pub mod stream;
pub mod validate;

use std::io::Read;

use log::debug;

use self::ast::Command;
use self::lexer::Lexer;
use self::parser::Parser;
use self::reader::{ByteSource, CommandReader, RawCommand};
use self::stream::CommandStream;
use crate::shell::dependency;
use crate::shell::error::{Result, SyntaxError};

/// Lexes, validates and builds the tree for one cleaned command.
pub fn parse_command(raw: &RawCommand) -> std::result::Result<Command, SyntaxError> {
    let tokens = Lexer::new(&raw.text, raw.line).tokenize()?;
    validate::validate(&tokens, raw.line)?;
    Parser::new(tokens, raw.line).parse_command()
}

/// Reads the whole input and returns every tree with its dependencies
/// filled in. Stops at the first error; nothing partial is returned.
pub fn parse_stream<S: ByteSource>(source: S) -> Result<CommandStream> {
    let mut reader = CommandReader::new(source);
    let mut stream = CommandStream::new();
    while let Some(raw) = reader.next_command()? {
        debug!("line {}: parsing {:?}", raw.line, raw.text);
        let command = parse_command(&raw)?;
        stream.push(command);
    }
    dependency::analyze(&mut stream);
    Ok(stream)
}

pub fn parse_str(input: &str) -> Result<CommandStream> {
    parse_stream(input.as_bytes().bytes())
}
