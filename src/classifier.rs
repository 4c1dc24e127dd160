use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::{
    cfg::{Grammar, Production, Symbol},
    config::ClassifierMode,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ChomskyType {
    Unrestricted = 0,
    ContextSensitive = 1,
    ContextFree = 2,
    Regular = 3,
}

impl ChomskyType {
    pub fn level(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            ChomskyType::Unrestricted => "unrestricted",
            ChomskyType::ContextSensitive => "context-sensitive",
            ChomskyType::ContextFree => "context-free",
            ChomskyType::Regular => "regular",
        }
    }

    /// The next more restrictive type, if any.
    pub fn stronger(self) -> Option<ChomskyType> {
        match self {
            ChomskyType::Unrestricted => Some(ChomskyType::ContextSensitive),
            ChomskyType::ContextSensitive => Some(ChomskyType::ContextFree),
            ChomskyType::ContextFree => Some(ChomskyType::Regular),
            ChomskyType::Regular => None,
        }
    }
}

impl TryFrom<u8> for ChomskyType {
    type Error = String;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        match level {
            0 => Ok(ChomskyType::Unrestricted),
            1 => Ok(ChomskyType::ContextSensitive),
            2 => Ok(ChomskyType::ContextFree),
            3 => Ok(ChomskyType::Regular),
            other => Err(format!("there is no Chomsky type {other}, expected 0 to 3")),
        }
    }
}

impl fmt::Display for ChomskyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type {} ({})", self.level(), self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Linearity {
    Right,
    Left,
}

/// The rule a single production was judged against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Rule {
    Epsilon,
    SingleTerminal,
    RightLinear,
    LeftLinear,
    NotLinear,
    MixedLinearity,
    SingleNonTerminalLeft,
    LeftNotSingleNonTerminal,
    NonContracting,
    StartEpsilon,
    EliminableEpsilon,
    Contracting,
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Rule::Epsilon => "empty body (A -> ε)",
            Rule::SingleTerminal => "right-linear base case, single terminal (A -> a)",
            Rule::RightLinear => "right-linear (A -> aB)",
            Rule::LeftLinear => "left-linear (A -> Ba)",
            Rule::NotLinear => "body is not ε, a, aB or Ba",
            Rule::MixedLinearity => "mixes left-linear and right-linear productions",
            Rule::SingleNonTerminalLeft => "single non-terminal on the left (A -> β)",
            Rule::LeftNotSingleNonTerminal => "left-hand side is not a single non-terminal",
            Rule::NonContracting => "non-contracting (|α| <= |β|)",
            Rule::StartEpsilon => "start symbol may derive ε (S -> ε, S on no right-hand side)",
            Rule::EliminableEpsilon => {
                "ε-production in a context-free grammar, removable by ε-elimination"
            }
            Rule::Contracting => "contracting (|α| > |β|)",
        };
        write!(f, "{text}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleEvaluation {
    pub production: Production,
    pub rule: Rule,
    pub passed: bool,
    pub detail: Option<String>,
}

/// Outcome of checking one level of the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeCheck {
    pub level: ChomskyType,
    pub satisfied: bool,
    pub evaluations: Vec<RuleEvaluation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassificationResult {
    pub chomsky_type: ChomskyType,
    pub checks: Vec<TypeCheck>,
    /// Productions that kept the grammar out of the next stronger type.
    pub boundary: Vec<Production>,
    pub linearity: Option<Linearity>,
}

impl ClassificationResult {
    pub fn check(&self, level: ChomskyType) -> Option<&TypeCheck> {
        self.checks.iter().find(|check| check.level == level)
    }

    /// The evaluation trace as readable lines, strongest type first.
    pub fn justification(&self) -> Vec<String> {
        let mut lines = Vec::new();

        for check in &self.checks {
            if check.level == ChomskyType::Unrestricted {
                lines.push(format!(
                    "{}: no stronger type holds, every grammar is unrestricted",
                    check.level
                ));
                continue;
            }
            lines.push(format!("Checking {}", check.level));
            for evaluation in &check.evaluations {
                let mark = if evaluation.passed { "pass" } else { "fail" };
                let mut line = format!("  [{mark}] {}: {}", evaluation.production, evaluation.rule);
                if let Some(detail) = &evaluation.detail {
                    line.push_str(&format!(" ({detail})"));
                }
                lines.push(line);
            }
            let verdict = if check.satisfied { "holds" } else { "does not hold" };
            lines.push(format!("  {} {verdict}", check.level));
        }

        match self.linearity {
            Some(Linearity::Right) => lines.push("The grammar is right-linear".to_string()),
            Some(Linearity::Left) => lines.push("The grammar is left-linear".to_string()),
            None => {}
        }
        lines.push(format!("Result: {}", self.chomsky_type));

        lines
    }
}

pub struct Classifier<'a> {
    grammar: &'a Grammar,
    mode: ClassifierMode,
}

impl<'a> Classifier<'a> {
    pub fn new(grammar: &'a Grammar) -> Self {
        Classifier {
            grammar,
            mode: ClassifierMode::default(),
        }
    }

    pub fn with_mode(grammar: &'a Grammar, mode: ClassifierMode) -> Self {
        Classifier { grammar, mode }
    }

    fn record(
        &self,
        evaluations: &mut Vec<RuleEvaluation>,
        production: &Production,
        rule: Rule,
        passed: bool,
        detail: Option<String>,
    ) {
        if passed && self.mode == ClassifierMode::Brief {
            return;
        }
        evaluations.push(RuleEvaluation {
            production: production.clone(),
            rule,
            passed,
            detail,
        });
    }

    // Type 3: A -> ε | a | aB or A -> ε | a | Ba, one direction for the whole grammar
    fn check_regular(&self) -> (TypeCheck, Option<Linearity>) {
        let mut evaluations = Vec::new();
        let mut satisfied = true;
        let mut direction: Option<(Linearity, &Production)> = None;

        for production in self.grammar.get_productions() {
            if production.single_lhs().is_none() {
                satisfied = false;
                self.record(
                    &mut evaluations,
                    production,
                    Rule::LeftNotSingleNonTerminal,
                    false,
                    None,
                );
                continue;
            }

            let (rule, linearity) = match production.get_rhs() {
                [] => (Rule::Epsilon, None),
                [Symbol::Terminal(_)] => (Rule::SingleTerminal, None),
                [Symbol::Terminal(_), Symbol::NonTerminal(_)] => {
                    (Rule::RightLinear, Some(Linearity::Right))
                }
                [Symbol::NonTerminal(_), Symbol::Terminal(_)] => {
                    (Rule::LeftLinear, Some(Linearity::Left))
                }
                _ => (Rule::NotLinear, None),
            };

            if rule == Rule::NotLinear {
                satisfied = false;
                let non_terminals = production
                    .get_rhs()
                    .iter()
                    .filter(|symbol| symbol.is_non_terminal())
                    .count();
                let detail = match non_terminals {
                    0 => "more than one terminal".to_string(),
                    1 => "the non-terminal is not at a single-terminal edge".to_string(),
                    n => format!("{n} non-terminals in the body"),
                };
                self.record(&mut evaluations, production, rule, false, Some(detail));
                continue;
            }

            match (linearity, direction) {
                (Some(current), Some((established, first))) if current != established => {
                    satisfied = false;
                    self.record(
                        &mut evaluations,
                        production,
                        Rule::MixedLinearity,
                        false,
                        Some(format!("conflicts with {first}")),
                    );
                }
                (Some(current), None) => {
                    direction = Some((current, production));
                    self.record(&mut evaluations, production, rule, true, None);
                }
                _ => self.record(&mut evaluations, production, rule, true, None),
            }
        }

        let linearity = if satisfied {
            direction.map(|(linearity, _)| linearity)
        } else {
            None
        };

        (
            TypeCheck {
                level: ChomskyType::Regular,
                satisfied,
                evaluations,
            },
            linearity,
        )
    }

    // Type 2: a single non-terminal on every left-hand side
    fn check_context_free(&self) -> TypeCheck {
        let mut evaluations = Vec::new();
        let mut satisfied = true;

        for production in self.grammar.get_productions() {
            if production.single_lhs().is_some() {
                self.record(
                    &mut evaluations,
                    production,
                    Rule::SingleNonTerminalLeft,
                    true,
                    None,
                );
            } else {
                satisfied = false;
                self.record(
                    &mut evaluations,
                    production,
                    Rule::LeftNotSingleNonTerminal,
                    false,
                    Some(format!("{} symbols on the left", production.get_lhs().len())),
                );
            }
        }

        TypeCheck {
            level: ChomskyType::ContextFree,
            satisfied,
            evaluations,
        }
    }

    // Type 1: |lhs| <= |rhs|, except S -> ε when S never appears on a right-hand side.
    // A context-free grammar keeps its ε-productions: removing them yields an
    // equivalent grammar that meets the Type 1 condition.
    fn check_context_sensitive(&self) -> TypeCheck {
        let mut evaluations = Vec::new();
        let mut satisfied = true;

        let context_free = self
            .grammar
            .get_productions()
            .iter()
            .all(|production| production.single_lhs().is_some());

        let start = self.grammar.get_start_symbol();
        let start_on_rhs = self
            .grammar
            .get_productions()
            .iter()
            .any(|production| production.get_rhs().contains(&start));

        for production in self.grammar.get_productions() {
            let lhs_len = production.get_lhs().len();
            let rhs_len = production.get_rhs().len();

            if production.is_epsilon() && context_free {
                let rule = if production.get_lhs() == [start.clone()] && !start_on_rhs {
                    Rule::StartEpsilon
                } else {
                    Rule::EliminableEpsilon
                };
                self.record(&mut evaluations, production, rule, true, None);
            } else if production.is_epsilon() && production.get_lhs() == [start.clone()] {
                if start_on_rhs {
                    satisfied = false;
                    self.record(
                        &mut evaluations,
                        production,
                        Rule::Contracting,
                        false,
                        Some("the start symbol appears on a right-hand side".to_string()),
                    );
                } else {
                    self.record(&mut evaluations, production, Rule::StartEpsilon, true, None);
                }
            } else if rhs_len >= lhs_len {
                self.record(&mut evaluations, production, Rule::NonContracting, true, None);
            } else {
                satisfied = false;
                self.record(
                    &mut evaluations,
                    production,
                    Rule::Contracting,
                    false,
                    Some(format!("|α| = {lhs_len} > |β| = {rhs_len}")),
                );
            }
        }

        TypeCheck {
            level: ChomskyType::ContextSensitive,
            satisfied,
            evaluations,
        }
    }

    /// Whether the grammar meets the structural condition of `level` on its own.
    pub fn satisfies(&self, level: ChomskyType) -> bool {
        match level {
            ChomskyType::Regular => self.check_regular().0.satisfied,
            ChomskyType::ContextFree => self.check_context_free().satisfied,
            ChomskyType::ContextSensitive => self.check_context_sensitive().satisfied,
            ChomskyType::Unrestricted => true,
        }
    }

    /// Tries Type 3, 2, 1 in that order and stops at the first that holds.
    pub fn classify(&self) -> ClassificationResult {
        let mut checks = Vec::new();

        let (regular, linearity) = self.check_regular();
        let regular_holds = regular.satisfied;
        checks.push(regular);

        let chomsky_type = if regular_holds {
            ChomskyType::Regular
        } else {
            let context_free = self.check_context_free();
            let context_free_holds = context_free.satisfied;
            checks.push(context_free);

            if context_free_holds {
                ChomskyType::ContextFree
            } else {
                let context_sensitive = self.check_context_sensitive();
                let context_sensitive_holds = context_sensitive.satisfied;
                checks.push(context_sensitive);

                if context_sensitive_holds {
                    ChomskyType::ContextSensitive
                } else {
                    checks.push(TypeCheck {
                        level: ChomskyType::Unrestricted,
                        satisfied: true,
                        evaluations: Vec::new(),
                    });
                    ChomskyType::Unrestricted
                }
            }
        };

        let boundary = chomsky_type
            .stronger()
            .and_then(|stronger| checks.iter().find(|check| check.level == stronger))
            .map(|check| {
                check
                    .evaluations
                    .iter()
                    .filter(|evaluation| !evaluation.passed)
                    .map(|evaluation| evaluation.production.clone())
                    .collect()
            })
            .unwrap_or_default();

        debug!(%chomsky_type, productions = self.grammar.get_productions().len(), "classified grammar");

        ClassificationResult {
            chomsky_type,
            checks,
            boundary,
            linearity,
        }
    }
}

pub fn classify_grammar(grammar: &Grammar) -> ClassificationResult {
    Classifier::new(grammar).classify()
}

#[cfg(test)]
mod classifier_test {
    use super::*;
    use crate::bnf::parse_grammar;
    use pretty_assertions::assert_eq;

    fn classify(text: &str) -> ClassificationResult {
        classify_grammar(&parse_grammar(text).unwrap())
    }

    #[test]
    fn test_right_linear_grammar_is_regular() {
        let result = classify("S -> aS | b");

        assert_eq!(result.chomsky_type, ChomskyType::Regular);
        assert_eq!(result.linearity, Some(Linearity::Right));
        assert!(result.boundary.is_empty());

        let rules: Vec<(String, Rule)> = result.checks[0]
            .evaluations
            .iter()
            .map(|evaluation| (evaluation.production.to_string(), evaluation.rule))
            .collect();
        assert_eq!(
            rules,
            vec![
                ("S -> a S".to_string(), Rule::RightLinear),
                ("S -> b".to_string(), Rule::SingleTerminal),
            ]
        );
        assert!(
            result
                .justification()
                .iter()
                .any(|line| line.contains("S -> a S: right-linear"))
        );
        assert!(
            result
                .justification()
                .iter()
                .any(|line| line.contains("S -> b: right-linear base case"))
        );
    }

    #[test]
    fn test_left_linear_grammar_is_regular() {
        let result = classify("S -> S a | A b\nA -> a | ε");
        assert_eq!(result.chomsky_type, ChomskyType::Regular);
        assert_eq!(result.linearity, Some(Linearity::Left));
    }

    #[test]
    fn test_flanked_non_terminal_is_context_free() {
        let result = classify("S -> aSb | ab");

        assert_eq!(result.chomsky_type, ChomskyType::ContextFree);
        assert_eq!(
            result
                .boundary
                .iter()
                .map(|production| production.to_string())
                .collect::<Vec<_>>(),
            vec!["S -> a S b", "S -> a b"]
        );
        assert_eq!(result.checks.len(), 2);
    }

    #[test]
    fn test_mixed_linearity_downgrades_to_context_free() {
        let result = classify("S -> a A | B b\nA -> a\nB -> b");

        assert_eq!(result.chomsky_type, ChomskyType::ContextFree);
        assert_eq!(result.linearity, None);
        assert_eq!(
            result
                .boundary
                .iter()
                .map(|production| production.to_string())
                .collect::<Vec<_>>(),
            vec!["S -> B b"]
        );
        let regular = result.check(ChomskyType::Regular).unwrap();
        assert!(
            regular
                .evaluations
                .iter()
                .any(|evaluation| evaluation.rule == Rule::MixedLinearity)
        );
    }

    #[test]
    fn test_swap_rule_is_context_sensitive() {
        let result = classify("AB -> BA");
        assert_eq!(result.chomsky_type, ChomskyType::ContextSensitive);
    }

    #[test]
    fn test_contracting_rule_is_unrestricted() {
        let result = classify("S -> A B\nA B -> a\nA -> a\nB -> b");

        assert_eq!(result.chomsky_type, ChomskyType::Unrestricted);
        assert_eq!(
            result
                .boundary
                .iter()
                .map(|production| production.to_string())
                .collect::<Vec<_>>(),
            vec!["A B -> a"]
        );
    }

    #[test]
    fn test_start_epsilon_exception() {
        let allowed = classify("S -> A B | ε\nA B -> a b");
        assert_eq!(allowed.chomsky_type, ChomskyType::ContextSensitive);

        let recursive = classify("S -> A B | ε\nA B -> a S");
        assert_eq!(recursive.chomsky_type, ChomskyType::Unrestricted);
    }

    #[test]
    fn test_regular_grammar_with_epsilon_is_context_sensitive() {
        let grammar = parse_grammar("S -> aS | ε").unwrap();
        let classifier = Classifier::new(&grammar);

        assert_eq!(classifier.classify().chomsky_type, ChomskyType::Regular);
        assert!(classifier.satisfies(ChomskyType::ContextFree));
        assert!(classifier.satisfies(ChomskyType::ContextSensitive));

        let nested = parse_grammar("S -> aA\nA -> bA | ε").unwrap();
        let check = Classifier::new(&nested).check_context_sensitive();
        assert!(check.satisfied);
        assert!(
            check
                .evaluations
                .iter()
                .any(|evaluation| evaluation.rule == Rule::EliminableEpsilon)
        );
    }

    #[test]
    fn test_epsilon_outside_context_free_grammar_is_contracting() {
        let result = classify("S -> A B\nA B -> B A\nA -> a | ε\nB -> b");

        assert_eq!(result.chomsky_type, ChomskyType::Unrestricted);
        assert_eq!(
            result
                .boundary
                .iter()
                .map(|production| production.to_string())
                .collect::<Vec<_>>(),
            vec!["A -> ε"]
        );
    }

    #[test]
    fn test_classic_anbncn_grammar() {
        let result = classify(
            "S -> aSBC | aBC\nCB -> BC\naB -> ab\nbB -> bb\nbC -> bc\ncC -> cc",
        );
        assert_eq!(result.chomsky_type, ChomskyType::ContextSensitive);
    }

    #[test]
    fn test_unit_production_is_not_regular() {
        let result = classify("S -> A\nA -> a");
        assert_eq!(result.chomsky_type, ChomskyType::ContextFree);
    }

    #[test]
    fn test_brief_mode_keeps_only_failures() {
        let grammar = parse_grammar("S -> aSb | ab | c").unwrap();
        let result = Classifier::with_mode(&grammar, ClassifierMode::Brief).classify();

        let regular = result.check(ChomskyType::Regular).unwrap();
        assert!(regular.evaluations.iter().all(|evaluation| !evaluation.passed));
        assert_eq!(regular.evaluations.len(), 2);
    }
}

#[cfg(test)]
mod classifier_property_test {
    use super::*;
    use proptest::prelude::*;

    fn arb_symbol() -> impl Strategy<Value = Symbol> {
        prop_oneof![
            prop::sample::select(vec!["a", "b"]).prop_map(Symbol::terminal),
            prop::sample::select(vec!["S", "A"]).prop_map(Symbol::non_terminal),
        ]
    }

    fn arb_general_production() -> impl Strategy<Value = Production> {
        (
            prop::collection::vec(arb_symbol(), 1..3),
            prop::collection::vec(arb_symbol(), 0..4),
        )
            .prop_map(|(mut lhs, rhs)| {
                if !lhs.iter().any(Symbol::is_non_terminal) {
                    lhs[0] = Symbol::non_terminal("A");
                }
                Production::new(lhs, rhs)
            })
    }

    // Single non-terminal on the left, often linear, sometimes ε
    fn arb_context_free_production() -> impl Strategy<Value = Production> {
        (
            prop::sample::select(vec!["S", "A"]),
            prop_oneof![
                Just(Vec::new()),
                arb_symbol().prop_map(|symbol| vec![symbol]),
                (arb_symbol(), arb_symbol()).prop_map(|(first, second)| vec![first, second]),
            ],
        )
            .prop_map(|(lhs, rhs)| Production::new(vec![Symbol::non_terminal(lhs)], rhs))
    }

    fn arb_production() -> impl Strategy<Value = Production> {
        prop_oneof![
            1 => arb_general_production(),
            3 => arb_context_free_production(),
        ]
    }

    fn arb_grammar() -> impl Strategy<Value = Grammar> {
        prop::collection::vec(arb_production(), 0..6).prop_map(|mut productions| {
            productions.push(Production::new(
                vec![Symbol::non_terminal("S")],
                vec![Symbol::terminal("a")],
            ));
            productions.push(Production::new(
                vec![Symbol::non_terminal("A")],
                vec![Symbol::terminal("b")],
            ));
            Grammar::new("S", productions).unwrap()
        })
    }

    proptest! {
        #[test]
        fn reported_type_is_the_strongest_that_holds(grammar in arb_grammar()) {
            let classifier = Classifier::new(&grammar);
            let result = classifier.classify();

            prop_assert!(classifier.satisfies(result.chomsky_type));
            let mut stronger = result.chomsky_type.stronger();
            while let Some(level) = stronger {
                prop_assert!(!classifier.satisfies(level));
                stronger = level.stronger();
            }
            if classifier.satisfies(ChomskyType::Regular) {
                prop_assert!(classifier.satisfies(ChomskyType::ContextFree));
            }
            if classifier.satisfies(ChomskyType::ContextFree) {
                prop_assert!(classifier.satisfies(ChomskyType::ContextSensitive));
            }
        }
    }
}
