//! Parser for the BNF-like grammar notation:
//!
//! ```text
//! S -> a S b | ε        # one rule per line
//!    | c                # continuation of the previous rule
//! A -> a A; A -> b      # `;` separates rules on one line
//! ```

use std::{collections::BTreeSet, fmt};

use eyre::{Report, Result};
use serde::Serialize;
use tracing::debug;

use crate::{
    cfg::{Grammar, Production, Symbol},
    config::ParseOptions,
    grammar::{GrammarWarning, check_correctness},
};

const ARROWS: [&str; 3] = ["->", "→", "::="];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedGrammarError {
    EmptyInput,
    MissingArrow { line: usize, text: String },
    EmptyLeftHandSide { line: usize },
    NoNonTerminalOnLeft { line: usize, lhs: String },
    EpsilonOnLeft { line: usize },
    MissingRightHandSide { line: usize },
    EmptyAlternative { line: usize },
    EpsilonNotAlone { line: usize, alternative: String },
    InconsistentEpsilon { line: usize, found: String, expected: String },
    UnterminatedToken { line: usize, token: String },
    EmptyToken { line: usize, token: String },
    DanglingContinuation { line: usize },
    UndeclaredSymbol { line: usize, symbol: String },
    UnknownStart { start: String },
}

impl MalformedGrammarError {
    /// 1-based line of the offending text, when there is one.
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::EmptyInput | Self::UnknownStart { .. } => None,
            Self::MissingArrow { line, .. }
            | Self::EmptyLeftHandSide { line }
            | Self::NoNonTerminalOnLeft { line, .. }
            | Self::EpsilonOnLeft { line }
            | Self::MissingRightHandSide { line }
            | Self::EmptyAlternative { line }
            | Self::EpsilonNotAlone { line, .. }
            | Self::InconsistentEpsilon { line, .. }
            | Self::UnterminatedToken { line, .. }
            | Self::EmptyToken { line, .. }
            | Self::DanglingContinuation { line }
            | Self::UndeclaredSymbol { line, .. } => Some(*line),
        }
    }
}

impl fmt::Display for MalformedGrammarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyInput => write!(f, "Error: the grammar text contains no rules"),
            Self::MissingArrow { line, text } => write!(
                f,
                "Error on line {line}: no production arrow (->, →, ::=) found in {text:?}"
            ),
            Self::EmptyLeftHandSide { line } => {
                write!(f, "Error on line {line}: the left-hand side is empty")
            }
            Self::NoNonTerminalOnLeft { line, lhs } => write!(
                f,
                "Error on line {line}: the left-hand side {lhs:?} has no non-terminal"
            ),
            Self::EpsilonOnLeft { line } => write!(
                f,
                "Error on line {line}: epsilon cannot appear on a left-hand side"
            ),
            Self::MissingRightHandSide { line } => {
                write!(f, "Error on line {line}: the right-hand side is missing")
            }
            Self::EmptyAlternative { line } => write!(
                f,
                "Error on line {line}: empty alternative, write the epsilon token for the empty string"
            ),
            Self::EpsilonNotAlone { line, alternative } => write!(
                f,
                "Error on line {line}: epsilon must stand alone, found {alternative:?}"
            ),
            Self::InconsistentEpsilon {
                line,
                found,
                expected,
            } => write!(
                f,
                "Error on line {line}: inconsistent epsilon token {found:?}, the grammar already uses {expected:?}"
            ),
            Self::UnterminatedToken { line, token } => {
                write!(f, "Error on line {line}: unterminated token {token:?}")
            }
            Self::EmptyToken { line, token } => {
                write!(f, "Error on line {line}: empty symbol {token:?}")
            }
            Self::DanglingContinuation { line } => write!(
                f,
                "Error on line {line}: continuation line without a preceding rule"
            ),
            Self::UndeclaredSymbol { line, symbol } => write!(
                f,
                "Error on line {line}: non-terminal {symbol:?} is used but never defined"
            ),
            Self::UnknownStart { start } => write!(
                f,
                "Error: start symbol {start:?} is not the left-hand side of any rule"
            ),
        }
    }
}

impl std::error::Error for MalformedGrammarError {}

/// A parsed grammar together with the non-fatal findings about it.
#[derive(Debug, Clone, Serialize)]
pub struct ParsedGrammar {
    pub grammar: Grammar,
    pub warnings: Vec<GrammarWarning>,
}

enum Token {
    Symbol(Symbol),
    Epsilon(String),
}

struct Alternative {
    line: usize,
    symbols: Vec<Symbol>,
}

struct Rule {
    line: usize,
    lhs: Vec<Symbol>,
    alternatives: Vec<Alternative>,
}

struct Lexer<'a> {
    chars: Vec<char>,
    line: usize,
    options: &'a ParseOptions,
}

impl<'a> Lexer<'a> {
    fn new(text: &str, line: usize, options: &'a ParseOptions) -> Self {
        Lexer {
            chars: text.chars().collect(),
            line,
            options,
        }
    }

    fn matches_at(&self, idx: usize, token: &str) -> bool {
        let mut pos = idx;
        for expected in token.chars() {
            if self.chars.get(pos) != Some(&expected) {
                return false;
            }
            pos += 1;
        }
        !token.is_empty()
    }

    fn tokenize(&self) -> Result<Vec<Token>, MalformedGrammarError> {
        let mut tokens = Vec::new();
        let mut idx = 0;

        while idx < self.chars.len() {
            let c = self.chars[idx];

            if c.is_whitespace() {
                idx += 1;
                continue;
            }

            if let Some(epsilon) = self
                .options
                .epsilon_tokens
                .iter()
                .find(|token| self.matches_at(idx, token))
            {
                tokens.push(Token::Epsilon(epsilon.clone()));
                idx += epsilon.chars().count();
                continue;
            }

            let token = match c {
                '<' => {
                    let close = (idx + 1..self.chars.len()).find(|&pos| self.chars[pos] == '>');
                    let Some(close) = close else {
                        return Err(MalformedGrammarError::UnterminatedToken {
                            line: self.line,
                            token: self.chars[idx..].iter().collect(),
                        });
                    };
                    let name: String = self.chars[idx + 1..close].iter().collect();
                    let name = name.trim().to_string();
                    if name.is_empty() {
                        return Err(MalformedGrammarError::EmptyToken {
                            line: self.line,
                            token: "<>".to_string(),
                        });
                    }
                    idx = close + 1;
                    Symbol::NonTerminal(name)
                }
                '"' => {
                    let mut text = String::new();
                    let mut pos = idx + 1;
                    let mut closed = false;
                    while pos < self.chars.len() {
                        match self.chars[pos] {
                            '\\' if pos + 1 < self.chars.len() => {
                                text.push(self.chars[pos + 1]);
                                pos += 2;
                            }
                            '"' => {
                                closed = true;
                                break;
                            }
                            other => {
                                text.push(other);
                                pos += 1;
                            }
                        }
                    }
                    if !closed {
                        return Err(MalformedGrammarError::UnterminatedToken {
                            line: self.line,
                            token: self.chars[idx..].iter().collect(),
                        });
                    }
                    if text.is_empty() {
                        return Err(MalformedGrammarError::EmptyToken {
                            line: self.line,
                            token: "\"\"".to_string(),
                        });
                    }
                    idx = pos + 1;
                    Symbol::Terminal(text)
                }
                c if c.is_ascii_uppercase() => {
                    let mut name = c.to_string();
                    idx += 1;
                    while idx < self.chars.len()
                        && (self.chars[idx].is_ascii_digit() || self.chars[idx] == '\'')
                    {
                        name.push(self.chars[idx]);
                        idx += 1;
                    }
                    Symbol::NonTerminal(name)
                }
                other => {
                    idx += 1;
                    Symbol::Terminal(other.to_string())
                }
            };
            tokens.push(Token::Symbol(token));
        }

        Ok(tokens)
    }
}

// Split on `separator`, ignoring separators inside quoted terminals and <names>
fn split_top_level(text: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_quote = false;
    let mut in_angle = false;
    let mut escaped = false;

    for (pos, c) in text.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quote => escaped = true,
            '"' if !in_angle => in_quote = !in_quote,
            '<' if !in_quote => in_angle = true,
            '>' if in_angle => in_angle = false,
            c if c == separator && !in_quote && !in_angle => {
                parts.push(&text[start..pos]);
                start = pos + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);

    parts
}

// Byte offset and length of the first production arrow outside quotes
fn find_arrow(text: &str) -> Option<(usize, usize)> {
    let mut in_quote = false;
    let mut in_angle = false;
    let mut escaped = false;

    for (pos, c) in text.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quote => escaped = true,
            '"' if !in_angle => in_quote = !in_quote,
            '<' if !in_quote => in_angle = true,
            '>' if in_angle => in_angle = false,
            _ if !in_quote && !in_angle => {
                if let Some(arrow) = ARROWS.iter().find(|arrow| text[pos..].starts_with(**arrow)) {
                    return Some((pos, arrow.len()));
                }
            }
            _ => {}
        }
    }

    None
}

struct RuleParser<'a> {
    options: &'a ParseOptions,
    epsilon_spelling: Option<String>,
    rules: Vec<Rule>,
}

impl<'a> RuleParser<'a> {
    fn parse_alternative(
        &mut self,
        text: &str,
        line: usize,
    ) -> Result<Alternative, MalformedGrammarError> {
        if text.trim().is_empty() {
            return Err(MalformedGrammarError::EmptyAlternative { line });
        }

        let tokens = Lexer::new(text, line, self.options).tokenize()?;
        let mut symbols = Vec::new();
        let mut epsilon = None;

        for token in &tokens {
            match token {
                Token::Symbol(symbol) => symbols.push(symbol.clone()),
                Token::Epsilon(spelling) => epsilon = Some(spelling.clone()),
            }
        }

        if let Some(spelling) = epsilon {
            if tokens.len() > 1 {
                return Err(MalformedGrammarError::EpsilonNotAlone {
                    line,
                    alternative: text.trim().to_string(),
                });
            }
            match &self.epsilon_spelling {
                Some(expected) if *expected != spelling => {
                    return Err(MalformedGrammarError::InconsistentEpsilon {
                        line,
                        found: spelling,
                        expected: expected.clone(),
                    });
                }
                Some(_) => {}
                None => self.epsilon_spelling = Some(spelling),
            }
        }

        Ok(Alternative { line, symbols })
    }

    fn parse_alternatives(
        &mut self,
        text: &str,
        line: usize,
    ) -> Result<Vec<Alternative>, MalformedGrammarError> {
        split_top_level(text, '|')
            .into_iter()
            .map(|alternative| self.parse_alternative(alternative, line))
            .collect()
    }

    fn parse_rule(&mut self, text: &str, line: usize) -> Result<(), MalformedGrammarError> {
        let Some((arrow, arrow_len)) = find_arrow(text) else {
            return Err(MalformedGrammarError::MissingArrow {
                line,
                text: text.to_string(),
            });
        };

        let lhs_text = text[..arrow].trim();
        let rhs_text = text[arrow + arrow_len..].trim();

        if lhs_text.is_empty() {
            return Err(MalformedGrammarError::EmptyLeftHandSide { line });
        }

        let mut lhs = Vec::new();
        for token in Lexer::new(lhs_text, line, self.options).tokenize()? {
            match token {
                Token::Symbol(symbol) => lhs.push(symbol),
                Token::Epsilon(_) => return Err(MalformedGrammarError::EpsilonOnLeft { line }),
            }
        }

        if !lhs.iter().any(Symbol::is_non_terminal) {
            return Err(MalformedGrammarError::NoNonTerminalOnLeft {
                line,
                lhs: lhs_text.to_string(),
            });
        }

        if rhs_text.is_empty() {
            return Err(MalformedGrammarError::MissingRightHandSide { line });
        }

        let alternatives = self.parse_alternatives(rhs_text, line)?;
        self.rules.push(Rule {
            line,
            lhs,
            alternatives,
        });

        Ok(())
    }

    fn parse_line(&mut self, text: &str, line: usize) -> Result<(), MalformedGrammarError> {
        if let Some(continuation) = text.strip_prefix('|') {
            let alternatives = self.parse_alternatives(continuation, line)?;
            let Some(rule) = self.rules.last_mut() else {
                return Err(MalformedGrammarError::DanglingContinuation { line });
            };
            rule.alternatives.extend(alternatives);
            return Ok(());
        }

        for segment in split_top_level(text, ';') {
            if segment.trim().is_empty() {
                continue;
            }
            self.parse_rule(segment.trim(), line)?;
        }

        Ok(())
    }
}

fn check_declared(rules: &[Rule]) -> Result<BTreeSet<&str>, MalformedGrammarError> {
    let defined: BTreeSet<&str> = rules
        .iter()
        .flat_map(|rule| rule.lhs.iter())
        .filter(|symbol| symbol.is_non_terminal())
        .map(Symbol::get_name)
        .collect();

    for rule in rules {
        for alternative in &rule.alternatives {
            for symbol in &alternative.symbols {
                if let Symbol::NonTerminal(name) = symbol {
                    if !defined.contains(name.as_str()) {
                        return Err(MalformedGrammarError::UndeclaredSymbol {
                            line: alternative.line,
                            symbol: name.clone(),
                        });
                    }
                }
            }
        }
    }

    Ok(defined)
}

fn parse_rules(text: &str, options: &ParseOptions) -> Result<Grammar> {
    let mut parser = RuleParser {
        options,
        epsilon_spelling: None,
        rules: Vec::new(),
    };

    for (idx, raw_line) in text.lines().enumerate() {
        let content = raw_line.trim();
        if content.is_empty() || content.starts_with('#') {
            continue;
        }
        parser.parse_line(content, idx + 1).map_err(Report::new)?;
    }

    let rules = parser.rules;
    let Some(first) = rules.first() else {
        return Err(Report::new(MalformedGrammarError::EmptyInput));
    };

    let defined = check_declared(&rules).map_err(Report::new)?;

    let start = match &options.start {
        Some(start) if defined.contains(start.as_str()) => start.clone(),
        Some(start) => {
            return Err(Report::new(MalformedGrammarError::UnknownStart {
                start: start.clone(),
            }));
        }
        None => first
            .lhs
            .iter()
            .find(|symbol| symbol.is_non_terminal())
            .map(|symbol| symbol.get_name().to_string())
            .unwrap_or_default(),
    };

    debug!(rules = rules.len(), first_line = first.line, %start, "parsed grammar rules");

    let productions = rules
        .into_iter()
        .flat_map(|rule| {
            let lhs = rule.lhs;
            rule.alternatives
                .into_iter()
                .map(move |alternative| Production::new(lhs.clone(), alternative.symbols))
        })
        .collect();

    Ok(Grammar::new(start, productions)?)
}

/// Parses grammar text with explicit options, returning the well-formedness
/// warnings alongside the grammar.
pub fn parse_grammar_with(text: &str, options: &ParseOptions) -> Result<ParsedGrammar> {
    let grammar = parse_rules(text, options)?;
    let warnings = check_correctness(&grammar)?;

    Ok(ParsedGrammar { grammar, warnings })
}

pub fn parse_grammar(text: &str) -> Result<Grammar> {
    let parsed = parse_grammar_with(text, &ParseOptions::default())?;
    Ok(parsed.grammar)
}
