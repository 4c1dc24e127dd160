use std::{collections::BTreeSet, fmt};

use eyre::{Report, Result};
use serde::Serialize;

const UNSUPPORTED: [char; 7] = ['[', ']', '{', '}', '^', '$', '.'];
const EPSILON: char = 'ε';

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Regex {
    Epsilon,
    Literal(char),
    Concat(Vec<Regex>),
    Alternation(Vec<Regex>),
    Star(Box<Regex>),
    Plus(Box<Regex>),
    Optional(Box<Regex>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RegexErrorKind {
    EmptyExpression,
    EmptyAlternative,
    MissingCloseParen,
    UnmatchedCloseParen,
    NothingToRepeat,
    DanglingEscape,
    UnsupportedOperator,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidRegexError {
    /// Character offset into the expression.
    pub position: usize,
    pub fragment: String,
    pub kind: RegexErrorKind,
}

impl fmt::Display for InvalidRegexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self.kind {
            RegexErrorKind::EmptyExpression => "the expression is empty",
            RegexErrorKind::EmptyAlternative => "empty alternative or group",
            RegexErrorKind::MissingCloseParen => "'(' is never closed",
            RegexErrorKind::UnmatchedCloseParen => "')' has no matching '('",
            RegexErrorKind::NothingToRepeat => "quantifier has nothing to repeat",
            RegexErrorKind::DanglingEscape => "'\\' at the end of the expression",
            RegexErrorKind::UnsupportedOperator => "unsupported operator",
        };
        write!(
            f,
            "Error at position {}: {reason} (near {:?})",
            self.position, self.fragment
        )
    }
}

impl std::error::Error for InvalidRegexError {}

struct RegexParser {
    // Significant characters with their offsets, whitespace removed
    chars: Vec<(usize, char)>,
    idx: usize,
    // Offset one past the last character of the source
    end: usize,
}

impl RegexParser {
    fn new(text: &str) -> Self {
        let mut chars = Vec::new();
        let mut escaped = false;
        for (position, c) in text.chars().enumerate() {
            // Escaped whitespace is a literal
            if c.is_whitespace() && !escaped {
                continue;
            }
            escaped = c == '\\' && !escaped;
            chars.push((position, c));
        }
        RegexParser {
            chars,
            idx: 0,
            end: text.chars().count(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.idx).map(|(_, c)| *c)
    }

    fn position(&self) -> usize {
        self.chars
            .get(self.idx)
            .map(|(position, _)| *position)
            .unwrap_or(self.end)
    }

    fn error(&self, kind: RegexErrorKind) -> InvalidRegexError {
        let fragment: String = self.chars[self.idx.min(self.chars.len())..]
            .iter()
            .take(5)
            .map(|(_, c)| *c)
            .collect();
        InvalidRegexError {
            position: self.position(),
            fragment,
            kind,
        }
    }

    fn parse(mut self) -> Result<Regex, InvalidRegexError> {
        if self.chars.is_empty() {
            return Err(self.error(RegexErrorKind::EmptyExpression));
        }
        let regex = self.parse_alternation()?;
        match self.peek() {
            None => Ok(regex),
            Some(')') => Err(self.error(RegexErrorKind::UnmatchedCloseParen)),
            Some(_) => Err(self.error(RegexErrorKind::UnsupportedOperator)),
        }
    }

    fn parse_alternation(&mut self) -> Result<Regex, InvalidRegexError> {
        let mut alternatives = vec![self.parse_concat()?];
        while self.peek() == Some('|') {
            self.idx += 1;
            alternatives.push(self.parse_concat()?);
        }
        Ok(if alternatives.len() == 1 {
            alternatives.remove(0)
        } else {
            Regex::Alternation(alternatives)
        })
    }

    fn parse_concat(&mut self) -> Result<Regex, InvalidRegexError> {
        let mut items = Vec::new();
        while let Some(c) = self.peek() {
            if c == '|' || c == ')' {
                break;
            }
            items.push(self.parse_repeat()?);
        }
        match items.len() {
            0 => Err(self.error(RegexErrorKind::EmptyAlternative)),
            1 => Ok(items.remove(0)),
            _ => Ok(Regex::Concat(items)),
        }
    }

    fn parse_repeat(&mut self) -> Result<Regex, InvalidRegexError> {
        let mut regex = self.parse_atom()?;
        while let Some(c) = self.peek() {
            regex = match c {
                '*' => Regex::Star(Box::new(regex)),
                '+' => Regex::Plus(Box::new(regex)),
                '?' => Regex::Optional(Box::new(regex)),
                _ => break,
            };
            self.idx += 1;
        }
        Ok(regex)
    }

    fn parse_atom(&mut self) -> Result<Regex, InvalidRegexError> {
        let Some(c) = self.peek() else {
            return Err(self.error(RegexErrorKind::EmptyAlternative));
        };

        match c {
            '(' => {
                self.idx += 1;
                let open = self.idx - 1;
                let inner = self.parse_alternation()?;
                if self.peek() != Some(')') {
                    self.idx = open;
                    return Err(self.error(RegexErrorKind::MissingCloseParen));
                }
                self.idx += 1;
                Ok(inner)
            }
            '*' | '+' | '?' => Err(self.error(RegexErrorKind::NothingToRepeat)),
            '\\' => {
                self.idx += 1;
                match self.peek() {
                    Some(escaped) => {
                        self.idx += 1;
                        Ok(Regex::Literal(escaped))
                    }
                    None => {
                        self.idx -= 1;
                        Err(self.error(RegexErrorKind::DanglingEscape))
                    }
                }
            }
            EPSILON => {
                self.idx += 1;
                Ok(Regex::Epsilon)
            }
            c if UNSUPPORTED.contains(&c) => Err(self.error(RegexErrorKind::UnsupportedOperator)),
            c => {
                self.idx += 1;
                Ok(Regex::Literal(c))
            }
        }
    }
}

fn is_special(c: char) -> bool {
    matches!(c, '|' | '*' | '+' | '?' | '(' | ')' | '\\' | EPSILON)
        || UNSUPPORTED.contains(&c)
        || c.is_whitespace()
}

impl Regex {
    pub fn parse(text: &str) -> Result<Regex, InvalidRegexError> {
        RegexParser::new(text).parse()
    }

    // Binding strength used to decide where parentheses are needed
    fn precedence(&self) -> u8 {
        match self {
            Regex::Alternation(_) => 0,
            Regex::Concat(_) => 1,
            Regex::Star(_) | Regex::Plus(_) | Regex::Optional(_) => 2,
            Regex::Epsilon | Regex::Literal(_) => 3,
        }
    }

    /// Input symbols the expression mentions.
    pub fn get_alphabet(&self) -> BTreeSet<String> {
        let mut alphabet = BTreeSet::new();
        self.collect_alphabet(&mut alphabet);
        alphabet
    }

    fn collect_alphabet(&self, alphabet: &mut BTreeSet<String>) {
        match self {
            Regex::Epsilon => {}
            Regex::Literal(c) => {
                alphabet.insert(c.to_string());
            }
            Regex::Concat(items) | Regex::Alternation(items) => {
                for item in items {
                    item.collect_alphabet(alphabet);
                }
            }
            Regex::Star(inner) | Regex::Plus(inner) | Regex::Optional(inner) => {
                inner.collect_alphabet(alphabet)
            }
        }
    }

    // Positions in `input` where a match of `self` starting in `starts` can end
    fn advance(&self, input: &[char], starts: &BTreeSet<usize>) -> BTreeSet<usize> {
        match self {
            Regex::Epsilon => starts.clone(),
            Regex::Literal(c) => starts
                .iter()
                .filter(|idx| input.get(**idx) == Some(c))
                .map(|idx| idx + 1)
                .collect(),
            Regex::Concat(items) => items
                .iter()
                .fold(starts.clone(), |ends, item| item.advance(input, &ends)),
            Regex::Alternation(items) => items
                .iter()
                .flat_map(|item| item.advance(input, starts))
                .collect(),
            Regex::Star(inner) => {
                let mut reached = starts.clone();
                let mut frontier = starts.clone();
                while !frontier.is_empty() {
                    frontier = inner
                        .advance(input, &frontier)
                        .into_iter()
                        .filter(|idx| !reached.contains(idx))
                        .collect();
                    reached.extend(frontier.iter().copied());
                }
                reached
            }
            Regex::Plus(inner) => {
                let once = inner.advance(input, starts);
                Regex::Star(inner.clone()).advance(input, &once)
            }
            Regex::Optional(inner) => {
                let mut ends = starts.clone();
                ends.extend(inner.advance(input, starts));
                ends
            }
        }
    }

    /// Whole-string match, computed straight from the syntax tree.
    pub fn matches(&self, input: &str) -> bool {
        let chars: Vec<char> = input.chars().collect();
        self.advance(&chars, &BTreeSet::from([0]))
            .contains(&chars.len())
    }

    fn fmt_child(&self, f: &mut fmt::Formatter<'_>, child: &Regex, min: u8) -> fmt::Result {
        if child.precedence() < min {
            write!(f, "({child})")
        } else {
            write!(f, "{child}")
        }
    }
}

// Canonical text: no whitespace, only the parentheses precedence requires
impl fmt::Display for Regex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Regex::Epsilon => write!(f, "{EPSILON}"),
            Regex::Literal(c) if is_special(*c) => write!(f, "\\{c}"),
            Regex::Literal(c) => write!(f, "{c}"),
            Regex::Concat(items) => {
                for item in items {
                    self.fmt_child(f, item, 2)?;
                }
                Ok(())
            }
            Regex::Alternation(items) => {
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        write!(f, "|")?;
                    }
                    self.fmt_child(f, item, 1)?;
                }
                Ok(())
            }
            Regex::Star(inner) => {
                self.fmt_child(f, inner, 3)?;
                write!(f, "*")
            }
            Regex::Plus(inner) => {
                self.fmt_child(f, inner, 3)?;
                write!(f, "+")
            }
            Regex::Optional(inner) => {
                self.fmt_child(f, inner, 3)?;
                write!(f, "?")
            }
        }
    }
}

pub fn parse_regex(text: &str) -> Result<Regex> {
    Regex::parse(text).map_err(Report::new)
}

#[cfg(test)]
mod regex_test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lit(c: char) -> Regex {
        Regex::Literal(c)
    }

    fn invalid(text: &str) -> InvalidRegexError {
        Regex::parse(text).unwrap_err()
    }

    #[test]
    fn test_precedence() {
        let regex = Regex::parse("a(b|c)*").unwrap();
        assert_eq!(
            regex,
            Regex::Concat(vec![
                lit('a'),
                Regex::Star(Box::new(Regex::Alternation(vec![lit('b'), lit('c')]))),
            ])
        );

        let regex = Regex::parse("ab|c+").unwrap();
        assert_eq!(
            regex,
            Regex::Alternation(vec![
                Regex::Concat(vec![lit('a'), lit('b')]),
                Regex::Plus(Box::new(lit('c'))),
            ])
        );
    }

    #[test]
    fn test_whitespace_and_escapes() {
        assert_eq!(Regex::parse(" a  b ").unwrap(), Regex::parse("ab").unwrap());
        assert_eq!(
            Regex::parse(r"\*\ ").unwrap(),
            Regex::Concat(vec![lit('*'), lit(' ')])
        );
        assert_eq!(Regex::parse("ε|a").unwrap().to_string(), "ε|a");
    }

    #[test]
    fn test_canonical_text() {
        for (input, canonical) in [
            ("a ( b | c ) *", "a(b|c)*"),
            ("((a))", "a"),
            ("(ab)*", "(ab)*"),
            ("(a|b)(c|d)", "(a|b)(c|d)"),
            (r"\(x\)", r"\(x\)"),
            ("(a*)*", "(a*)*"),
        ] {
            let regex = Regex::parse(input).unwrap();
            assert_eq!(regex.to_string(), canonical);
            assert_eq!(Regex::parse(canonical).unwrap(), regex);
        }
    }

    #[test]
    fn test_errors() {
        let err = invalid("");
        assert_eq!(err.kind, RegexErrorKind::EmptyExpression);

        let err = invalid("a|");
        assert_eq!((err.kind, err.position), (RegexErrorKind::EmptyAlternative, 2));

        let err = invalid("()");
        assert_eq!((err.kind, err.position), (RegexErrorKind::EmptyAlternative, 1));

        let err = invalid("a(b");
        assert_eq!((err.kind, err.position), (RegexErrorKind::MissingCloseParen, 1));
        assert_eq!(err.fragment, "(b");

        let err = invalid("ab)");
        assert_eq!((err.kind, err.position), (RegexErrorKind::UnmatchedCloseParen, 2));

        let err = invalid("*a");
        assert_eq!((err.kind, err.position), (RegexErrorKind::NothingToRepeat, 0));

        let err = invalid("a|+");
        assert_eq!(err.kind, RegexErrorKind::NothingToRepeat);

        let err = invalid("ab\\");
        assert_eq!((err.kind, err.position), (RegexErrorKind::DanglingEscape, 2));

        let err = invalid("a[bc]");
        assert_eq!((err.kind, err.position), (RegexErrorKind::UnsupportedOperator, 1));
        assert_eq!(err.fragment, "[bc]");
    }

    #[test]
    fn test_reference_matcher() {
        let regex = Regex::parse("a(b|c)*").unwrap();
        assert!(regex.matches("a"));
        assert!(regex.matches("abcb"));
        assert!(!regex.matches(""));
        assert!(!regex.matches("ba"));

        let regex = Regex::parse("(a|ε)b+c?").unwrap();
        assert!(regex.matches("b"));
        assert!(regex.matches("abbc"));
        assert!(!regex.matches("ac"));

        let regex = Regex::parse("(a*)*").unwrap();
        assert!(regex.matches(""));
        assert!(regex.matches("aaa"));
    }

    #[test]
    fn test_alphabet() {
        let regex = Regex::parse("a(b|c)*ε").unwrap();
        assert_eq!(
            regex.get_alphabet().into_iter().collect::<Vec<_>>(),
            vec!["a", "b", "c"]
        );
    }
}
