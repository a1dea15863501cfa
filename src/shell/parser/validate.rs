use super::lexer::Token;
use crate::shell::error::{SyntaxError, SyntaxErrorKind};

/// Checks one command's tokens before a tree is built from them.
///
/// Invalid characters and bare `&` are already rejected by the lexer;
/// this covers token adjacency, leading/trailing tokens and parenthesis
/// balance, in that order.
pub fn validate(tokens: &[Token], line: usize) -> Result<(), SyntaxError> {
    let err = |kind| Err(SyntaxError::new(line, kind));

    let (Some(first), Some(last)) = (tokens.first(), tokens.last()) else {
        return Ok(());
    };

    for pair in tokens.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        let allowed = match a {
            Token::Word(_) => !matches!(b, Token::Open),
            t if t.is_binary_operator() => matches!(b, Token::Word(_) | Token::Open),
            Token::Redirect(_) => {
                if !matches!(b, Token::Word(_)) {
                    return err(SyntaxErrorKind::MissingRedirectTarget);
                }
                true
            }
            Token::Open => {
                if matches!(b, Token::Close) {
                    return err(SyntaxErrorKind::EmptySubshell);
                }
                matches!(b, Token::Word(_) | Token::Open)
            }
            Token::Close => b.is_binary_operator() || b.is_redirect() || matches!(b, Token::Close),
            _ => true,
        };
        if !allowed {
            return err(SyntaxErrorKind::AdjacentTokens(a.to_string(), b.to_string()));
        }
    }

    if !matches!(first, Token::Word(_) | Token::Open) {
        return err(SyntaxErrorKind::LeadingToken(first.to_string()));
    }
    if !matches!(last, Token::Word(_) | Token::Close) {
        return err(SyntaxErrorKind::TrailingToken(last.to_string()));
    }

    let mut depth = 0usize;
    for token in tokens {
        match token {
            Token::Open => depth += 1,
            Token::Close => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| SyntaxError::new(line, SyntaxErrorKind::StrayCloseParen))?;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return err(SyntaxErrorKind::UnbalancedParens);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::parser::lexer::Lexer;

    fn check(input: &str) -> Result<(), SyntaxError> {
        let tokens = Lexer::new(input, 1).tokenize()?;
        validate(&tokens, 1)
    }

    fn kind(input: &str) -> SyntaxErrorKind {
        match check(input) {
            Err(e) => e.kind,
            Ok(()) => panic!("{:?} should be rejected", input),
        }
    }

    #[test]
    fn test_valid_commands() {
        for input in [
            "a",
            "a b<c>d",
            "a>d<c",
            "a&&b||c|d;e",
            "(a)",
            "((a;b)|c)>out",
            "a&&(b)",
            "a|(b||c)<in",
        ] {
            assert!(check(input).is_ok(), "{} should be accepted", input);
        }
    }

    #[test]
    fn test_missing_operand_between_operators() {
        assert_eq!(
            kind("a&&;b"),
            SyntaxErrorKind::AdjacentTokens("&&".to_string(), ";".to_string())
        );
        assert!(matches!(kind("a|||b"), SyntaxErrorKind::AdjacentTokens(..)));
        assert!(matches!(kind("a;;b"), SyntaxErrorKind::AdjacentTokens(..)));
        assert!(matches!(kind("(;a)"), SyntaxErrorKind::AdjacentTokens(..)));
    }

    #[test]
    fn test_leading_and_trailing_tokens() {
        assert_eq!(kind("|a"), SyntaxErrorKind::LeadingToken("|".to_string()));
        assert_eq!(kind(")|a"), SyntaxErrorKind::LeadingToken(")".to_string()));
        assert_eq!(kind("a&&"), SyntaxErrorKind::TrailingToken("&&".to_string()));
        assert_eq!(kind("a;"), SyntaxErrorKind::TrailingToken(";".to_string()));
        assert_eq!(kind("a;("), SyntaxErrorKind::TrailingToken("(".to_string()));
    }

    #[test]
    fn test_redirect_needs_target() {
        assert_eq!(kind("a<>b"), SyntaxErrorKind::MissingRedirectTarget);
        assert_eq!(kind("a>(b)"), SyntaxErrorKind::MissingRedirectTarget);
        assert_eq!(kind("a>"), SyntaxErrorKind::TrailingToken(">".to_string()));
    }

    #[test]
    fn test_parens() {
        assert_eq!(kind("(a"), SyntaxErrorKind::UnbalancedParens);
        assert_eq!(kind("(a))"), SyntaxErrorKind::StrayCloseParen);
        assert_eq!(kind("()"), SyntaxErrorKind::EmptySubshell);
        assert!(matches!(kind("a(b)"), SyntaxErrorKind::AdjacentTokens(..)));
        assert!(matches!(kind("(a)b"), SyntaxErrorKind::AdjacentTokens(..)));
        assert!(matches!(kind("(a)(b)"), SyntaxErrorKind::AdjacentTokens(..)));
    }
}
