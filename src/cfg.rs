use std::{
    collections::{BTreeSet, HashSet},
    fmt,
};

use serde::Serialize;

use crate::grammar::{GrammarError, check_structure};

pub const EPSILON: &str = "ε";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Symbol {
    Terminal(String),
    NonTerminal(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Production {
    lhs: Vec<Symbol>,
    rhs: Vec<Symbol>,
}

/// A canonical grammar: deduplicated productions, a start non-terminal and the
/// symbol sets derived from the productions. Immutable once built.
#[derive(Debug, Clone, Serialize)]
pub struct Grammar {
    start: String,
    productions: Vec<Production>,
    terminals: BTreeSet<String>,
    non_terminals: BTreeSet<String>,
}

impl Symbol {
    pub fn terminal(text: impl Into<String>) -> Self {
        Symbol::Terminal(text.into())
    }

    pub fn non_terminal(name: impl Into<String>) -> Self {
        Symbol::NonTerminal(name.into())
    }

    pub fn get_name(&self) -> &str {
        match self {
            Symbol::Terminal(text) | Symbol::NonTerminal(text) => text,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Symbol::Terminal(_))
    }

    pub fn is_non_terminal(&self) -> bool {
        matches!(self, Symbol::NonTerminal(_))
    }
}

// A non-terminal prints bare when the lexer would read it back as one token
fn is_plain_non_terminal(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_uppercase() => {
            chars.all(|c| c.is_ascii_digit() || c == '\'')
        }
        _ => false,
    }
}

// A terminal prints bare when it is a single character with no meaning to the lexer
fn is_plain_terminal(text: &str) -> bool {
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => {
            !c.is_ascii_uppercase()
                && !c.is_whitespace()
                && !matches!(c, '|' | '<' | '>' | '"' | ';' | '#' | '\\' | '→' | 'ε' | 'λ')
        }
        _ => false,
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::NonTerminal(name) if is_plain_non_terminal(name) => write!(f, "{name}"),
            Symbol::NonTerminal(name) => write!(f, "<{name}>"),
            Symbol::Terminal(text) if is_plain_terminal(text) => write!(f, "{text}"),
            Symbol::Terminal(text) => {
                let escaped = text.replace('\\', "\\\\").replace('"', "\\\"");
                write!(f, "\"{escaped}\"")
            }
        }
    }
}

fn write_sequence(f: &mut fmt::Formatter<'_>, symbols: &[Symbol]) -> fmt::Result {
    if symbols.is_empty() {
        return write!(f, "{EPSILON}");
    }
    for (idx, symbol) in symbols.iter().enumerate() {
        if idx > 0 {
            write!(f, " ")?;
        }
        write!(f, "{symbol}")?;
    }
    Ok(())
}

impl Production {
    pub fn new(lhs: Vec<Symbol>, rhs: Vec<Symbol>) -> Self {
        Production { lhs, rhs }
    }

    pub fn get_lhs(&self) -> &[Symbol] {
        &self.lhs
    }

    pub fn get_rhs(&self) -> &[Symbol] {
        &self.rhs
    }

    pub fn is_epsilon(&self) -> bool {
        self.rhs.is_empty()
    }

    /// Name of the left-hand side when it is exactly one non-terminal.
    pub fn single_lhs(&self) -> Option<&str> {
        match &self.lhs[..] {
            [Symbol::NonTerminal(name)] => Some(name),
            _ => None,
        }
    }

    pub fn get_non_terminal_set(&self) -> HashSet<&str> {
        self.lhs
            .iter()
            .chain(self.rhs.iter())
            .filter(|symbol| symbol.is_non_terminal())
            .map(Symbol::get_name)
            .collect()
    }
}

impl fmt::Display for Production {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_sequence(f, &self.lhs)?;
        write!(f, " -> ")?;
        write_sequence(f, &self.rhs)
    }
}

impl Grammar {
    /// Builds a grammar, dropping duplicate productions and checking that the
    /// start symbol is defined and every used non-terminal has a production.
    pub fn new(start: impl Into<String>, productions: Vec<Production>) -> Result<Self, GrammarError> {
        let mut seen = HashSet::new();
        let productions: Vec<Production> = productions
            .into_iter()
            .filter(|production| seen.insert(production.clone()))
            .collect();

        let mut terminals = BTreeSet::new();
        let mut non_terminals = BTreeSet::new();
        for production in &productions {
            for symbol in production.lhs.iter().chain(production.rhs.iter()) {
                match symbol {
                    Symbol::Terminal(text) => terminals.insert(text.clone()),
                    Symbol::NonTerminal(name) => non_terminals.insert(name.clone()),
                };
            }
        }

        let grammar = Grammar {
            start: start.into(),
            productions,
            terminals,
            non_terminals,
        };
        check_structure(&grammar)?;
        Ok(grammar)
    }

    pub fn get_start(&self) -> &str {
        &self.start
    }

    pub fn get_start_symbol(&self) -> Symbol {
        Symbol::NonTerminal(self.start.clone())
    }

    pub fn get_productions(&self) -> &[Production] {
        &self.productions
    }

    pub fn get_terminals(&self) -> &BTreeSet<String> {
        &self.terminals
    }

    pub fn get_non_terminals(&self) -> &BTreeSet<String> {
        &self.non_terminals
    }

    /// Productions whose left-hand side is exactly the given non-terminal.
    pub fn productions_for<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Production> {
        self.productions
            .iter()
            .filter(move |production| production.single_lhs() == Some(name))
    }

    pub fn is_context_free(&self) -> bool {
        self.productions
            .iter()
            .all(|production| production.single_lhs().is_some())
    }

    // Left-hand sides in first-seen order, the start symbol's first
    fn left_hand_sides(&self) -> Vec<&[Symbol]> {
        let mut sides: Vec<&[Symbol]> = Vec::new();
        if let Some(first) = self.productions_for(&self.start).next() {
            sides.push(&first.lhs);
        }
        for production in &self.productions {
            if !sides.contains(&&production.lhs[..]) {
                sides.push(&production.lhs);
            }
        }
        sides
    }
}

impl PartialEq for Grammar {
    fn eq(&self, other: &Self) -> bool {
        let ours: HashSet<&Production> = self.productions.iter().collect();
        let theirs: HashSet<&Production> = other.productions.iter().collect();
        self.start == other.start && ours == theirs
    }
}

impl Eq for Grammar {}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, lhs) in self.left_hand_sides().into_iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write_sequence(f, lhs)?;
            write!(f, " ->")?;
            let alternatives = self.productions.iter().filter(|p| p.lhs[..] == lhs[..]);
            for (alt, production) in alternatives.enumerate() {
                if alt > 0 {
                    write!(f, " |")?;
                }
                write!(f, " ")?;
                write_sequence(f, &production.rhs)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod cfg_test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn t(text: &str) -> Symbol {
        Symbol::terminal(text)
    }

    fn n(name: &str) -> Symbol {
        Symbol::non_terminal(name)
    }

    #[test]
    fn test_duplicates_are_dropped() {
        let grammar = Grammar::new(
            "S",
            vec![
                Production::new(vec![n("S")], vec![t("a"), n("S")]),
                Production::new(vec![n("S")], vec![t("b")]),
                Production::new(vec![n("S")], vec![t("a"), n("S")]),
            ],
        )
        .unwrap();

        assert_eq!(grammar.get_productions().len(), 2);
        assert_eq!(
            grammar.get_terminals().iter().cloned().collect::<Vec<_>>(),
            vec!["a".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn test_render_groups_alternatives_start_first() {
        let grammar = Grammar::new(
            "S",
            vec![
                Production::new(vec![n("A")], vec![t("a")]),
                Production::new(vec![n("S")], vec![t("a"), n("A")]),
                Production::new(vec![n("S")], vec![]),
            ],
        )
        .unwrap();

        assert_eq!(grammar.to_string(), "S -> a A | ε\nA -> a");
    }

    #[test]
    fn test_render_quotes_ambiguous_symbols() {
        let production = Production::new(
            vec![n("state_1")],
            vec![t("X"), t("id"), t("|"), n("Q0")],
        );
        assert_eq!(production.to_string(), "<state_1> -> \"X\" \"id\" \"|\" Q0");
    }

    #[test]
    fn test_equality_ignores_production_order() {
        let first = Grammar::new(
            "S",
            vec![
                Production::new(vec![n("S")], vec![t("a")]),
                Production::new(vec![n("S")], vec![t("b")]),
            ],
        )
        .unwrap();
        let second = Grammar::new(
            "S",
            vec![
                Production::new(vec![n("S")], vec![t("b")]),
                Production::new(vec![n("S")], vec![t("a")]),
            ],
        )
        .unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_undefined_start_is_rejected() {
        let result = Grammar::new("T", vec![Production::new(vec![n("S")], vec![t("a")])]);
        assert!(matches!(result, Err(GrammarError::InvalidGoalError(_))));
    }
}
