//! Parsing of equation strings into sums of product terms.
//!
//! The grammar is intentionally restricted to what the solvers can give
//! meaning to: an expression is a sum of terms separated by `+`/`-` (with an
//! optional leading or post-operator unary minus), and each term is a product
//! of factors separated by `*`. A factor is either a numeric literal
//! (optionally suffixed with `j` for a pure-imaginary value) or a name. A
//! name with a single trailing underscore refers to the complex conjugate of
//! the named quantity.
//!
//! Parentheses, division, and exponentiation are not part of the grammar and
//! fail with [`ParseError::UnsupportedOperator`]; whatever cannot start a
//! token fails with [`ParseError::UnexpectedCharacter`]. Whitespace is
//! insignificant.
//!
//! Parsing is a pure function of the string: whether a name is a constant or
//! an unknown is decided later, when terms are resolved against the
//! caller-supplied constants.
//!
//! # Example
//!
//! ```
//! use eqsolve::parse::{parse_terms, Factor};
//!
//! let terms = parse_terms("3*x - y").unwrap();
//! assert_eq!(terms.len(), 2);
//! // the minus sign folds into the second term as a factor of -1
//! assert_eq!(terms[1].factors.len(), 2);
//! assert!(matches!(terms[1].factors[1], Factor::Name { ref name, conj: false } if name == "y"));
//! ```

use crate::errors::ParseError;
use crate::value::C64;

/// One multiplicative factor of a term.
#[derive(Debug, Clone, PartialEq)]
pub enum Factor {
    /// A numeric literal; `j`-suffixed literals land here as pure-imaginary
    Number(C64),
    /// A named quantity (constant or unknown, decided at resolution time)
    Name {
        /// Base name with any conjugation marker stripped
        name: String,
        /// True when the name carried a trailing conjugation marker
        conj: bool,
    },
}

/// One additive term: an ordered product of factors.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Term {
    /// Factors in source order
    pub factors: Vec<Factor>,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Plus,
    Minus,
    Star,
    Number(C64),
    Name(String),
}

/// Parses an equation string into its additive terms.
///
/// A leading `-` (or a `-` directly after `+`/`-`) folds into the following
/// term as a numeric factor of −1, mirroring how the terms are consumed by
/// the resolver.
///
/// # Arguments
/// * `expr` - The expression as a string (e.g. `"a*x + 2*y_"`)
///
/// # Returns
/// * `Result<Vec<Term>, ParseError>` - The ordered terms or a grammar error
///
/// # Errors
/// Returns a [`ParseError`] on an empty expression, an unsupported operator
/// (`(`, `)`, `/`, `^`, `**`), a malformed numeric literal, or a dangling
/// operator.
pub fn parse_terms(expr: &str) -> Result<Vec<Term>, ParseError> {
    let tokens = tokenize(expr)?;
    if tokens.is_empty() {
        return Err(ParseError::Empty);
    }

    let mut terms = Vec::new();
    let mut pos = 0usize;
    // a leading '+' sign is permitted
    if let Some((Token::Plus, _)) = tokens.first() {
        pos += 1;
    }
    loop {
        let mut term = Term::default();
        // unary minus in front of a term
        if let Some((Token::Minus, _)) = tokens.get(pos) {
            term.factors.push(Factor::Number(C64::new(-1.0, 0.0)));
            pos += 1;
        }
        pos = parse_product(&tokens, pos, &mut term)?;
        terms.push(term);
        match tokens.get(pos) {
            None => break,
            Some((Token::Plus, _)) => pos += 1,
            // a '-' separator also negates the next term; leave it in place
            // so the unary-minus branch above folds it in
            Some((Token::Minus, _)) => {}
            Some((_, p)) => return Err(ParseError::ExpectedOperator(*p)),
        }
    }
    Ok(terms)
}

/// Consumes `factor ('*' factor)*` starting at `pos`; returns the index of
/// the first token after the term.
fn parse_product(
    tokens: &[(Token, usize)],
    mut pos: usize,
    term: &mut Term,
) -> Result<usize, ParseError> {
    loop {
        match tokens.get(pos) {
            Some((Token::Number(n), _)) => term.factors.push(Factor::Number(*n)),
            Some((Token::Name(s), _)) => term.factors.push(name_factor(s)),
            Some((_, p)) => return Err(ParseError::ExpectedFactor(*p)),
            None => {
                let end = tokens.last().map(|(_, p)| *p + 1).unwrap_or(0);
                return Err(ParseError::ExpectedFactor(end));
            }
        }
        pos += 1;
        match tokens.get(pos) {
            Some((Token::Star, _)) => pos += 1,
            _ => return Ok(pos),
        }
    }
}

/// Splits the conjugation marker off a name.
fn name_factor(s: &str) -> Factor {
    if s.len() > 1 && s.ends_with('_') {
        Factor::Name {
            name: s[..s.len() - 1].to_string(),
            conj: true,
        }
    } else {
        Factor::Name {
            name: s.to_string(),
            conj: false,
        }
    }
}

fn tokenize(expr: &str) -> Result<Vec<(Token, usize)>, ParseError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = expr.chars().collect();
    let mut i = 0usize;
    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '+' => {
                tokens.push((Token::Plus, i));
                i += 1;
            }
            '-' => {
                tokens.push((Token::Minus, i));
                i += 1;
            }
            '*' => {
                if chars.get(i + 1) == Some(&'*') {
                    return Err(ParseError::UnsupportedOperator("**".to_string()));
                }
                tokens.push((Token::Star, i));
                i += 1;
            }
            '(' | ')' | '/' | '^' => {
                return Err(ParseError::UnsupportedOperator(c.to_string()));
            }
            '0'..='9' | '.' => {
                let (tok, next) = scan_number(&chars, i)?;
                tokens.push((tok, i));
                i = next;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push((Token::Name(chars[start..i].iter().collect()), start));
            }
            _ => return Err(ParseError::UnexpectedCharacter(c, i)),
        }
    }
    Ok(tokens)
}

/// Scans a numeric literal: digits and a decimal point, an optional
/// exponent, and an optional `j` suffix marking a pure-imaginary value.
fn scan_number(chars: &[char], start: usize) -> Result<(Token, usize), ParseError> {
    let mut i = start;
    while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
        i += 1;
    }
    // exponent part, only when it is unambiguously numeric ('e' alone could
    // open an identifier in a malformed string like `2ex`)
    if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
        let mut j = i + 1;
        if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
            j += 1;
        }
        if j < chars.len() && chars[j].is_ascii_digit() {
            i = j;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
        }
    }
    let text: String = chars[start..i].iter().collect();
    let mag: f64 = text
        .parse()
        .map_err(|_| ParseError::InvalidNumber(text.clone()))?;
    if i < chars.len() && chars[i] == 'j' {
        Ok((Token::Number(C64::new(0.0, mag)), i + 1))
    } else {
        Ok((Token::Number(C64::new(mag, 0.0)), i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> Factor {
        Factor::Name {
            name: s.to_string(),
            conj: false,
        }
    }

    fn conj(s: &str) -> Factor {
        Factor::Name {
            name: s.to_string(),
            conj: true,
        }
    }

    fn num(x: f64) -> Factor {
        Factor::Number(C64::new(x, 0.0))
    }

    #[test]
    fn test_sum_of_names() {
        let terms = parse_terms("x+y").unwrap();
        assert_eq!(terms.len(), 2);
        assert_eq!(terms[0].factors, vec![name("x")]);
        assert_eq!(terms[1].factors, vec![name("y")]);
    }

    #[test]
    fn test_minus_folds_into_term() {
        let terms = parse_terms("x-y").unwrap();
        assert_eq!(terms[1].factors, vec![num(-1.0), name("y")]);
        let terms = parse_terms("3*x-y").unwrap();
        assert_eq!(terms[0].factors, vec![num(3.0), name("x")]);
        assert_eq!(terms[1].factors, vec![num(-1.0), name("y")]);
    }

    #[test]
    fn test_unary_minus() {
        let terms = parse_terms("-x+y").unwrap();
        assert_eq!(terms[0].factors, vec![num(-1.0), name("x")]);
        assert_eq!(terms[1].factors, vec![name("y")]);
        let terms = parse_terms("-a*x-b*y").unwrap();
        assert_eq!(terms[0].factors, vec![num(-1.0), name("a"), name("x")]);
        assert_eq!(terms[1].factors, vec![num(-1.0), name("b"), name("y")]);
    }

    #[test]
    fn test_multi_factor_products() {
        let terms = parse_terms("a*x+a*b*c*y").unwrap();
        assert_eq!(terms[0].factors, vec![name("a"), name("x")]);
        assert_eq!(
            terms[1].factors,
            vec![name("a"), name("b"), name("c"), name("y")]
        );
    }

    #[test]
    fn test_plus_then_minus() {
        let terms = parse_terms("x+-1*y").unwrap();
        assert_eq!(terms.len(), 2);
        assert_eq!(terms[1].factors, vec![num(-1.0), num(1.0), name("y")]);
    }

    #[test]
    fn test_conjugation_marker() {
        let terms = parse_terms("x_*y").unwrap();
        assert_eq!(terms[0].factors, vec![conj("x"), name("y")]);
        // the marker strips exactly one trailing underscore
        let terms = parse_terms("bl_95_").unwrap();
        assert_eq!(terms[0].factors, vec![conj("bl_95")]);
    }

    #[test]
    fn test_numeric_literals() {
        let terms = parse_terms(".5*x+2e3*y").unwrap();
        assert_eq!(terms[0].factors[0], num(0.5));
        assert_eq!(terms[1].factors[0], num(2000.0));
    }

    #[test]
    fn test_imaginary_literal() {
        let terms = parse_terms("1.0j*z").unwrap();
        assert_eq!(terms[0].factors[0], Factor::Number(C64::new(0.0, 1.0)));
    }

    #[test]
    fn test_whitespace_insignificant() {
        assert_eq!(parse_terms(" a * x + y "), parse_terms("a*x+y"));
    }

    #[test]
    fn test_unsupported_operators() {
        assert_eq!(
            parse_terms("(x+y)"),
            Err(ParseError::UnsupportedOperator("(".to_string()))
        );
        assert_eq!(
            parse_terms("x/y"),
            Err(ParseError::UnsupportedOperator("/".to_string()))
        );
        assert_eq!(
            parse_terms("x^2"),
            Err(ParseError::UnsupportedOperator("^".to_string()))
        );
        assert_eq!(
            parse_terms("x**2"),
            Err(ParseError::UnsupportedOperator("**".to_string()))
        );
    }

    #[test]
    fn test_malformed_expressions() {
        assert_eq!(parse_terms(""), Err(ParseError::Empty));
        assert_eq!(parse_terms("   "), Err(ParseError::Empty));
        assert!(matches!(
            parse_terms("x+"),
            Err(ParseError::ExpectedFactor(_))
        ));
        assert!(matches!(
            parse_terms("2*"),
            Err(ParseError::ExpectedFactor(_))
        ));
        assert!(matches!(
            parse_terms("x++y"),
            Err(ParseError::ExpectedFactor(_))
        ));
        assert!(matches!(
            parse_terms("2 x"),
            Err(ParseError::ExpectedOperator(_))
        ));
        assert!(matches!(
            parse_terms("1.2.3*x"),
            Err(ParseError::InvalidNumber(_))
        ));
        assert!(matches!(
            parse_terms("x + $"),
            Err(ParseError::UnexpectedCharacter('$', _))
        ));
    }
}
