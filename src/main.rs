use std::{
    io::{self, Read},
    path::{Path, PathBuf},
};

use chomsky::{
    ChomskyType, ClassifierMode, ConversionOptions, Difficulty, Limits, ParseOptions,
    analyze_automaton_with, classifier::Classifier, compare_automata_with, compare_grammars_with,
    convert_regex_to_grammar_with, generate_example, parse_automaton, parse_grammar,
    parse_grammar_with, simulate_with,
};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chomsky", version)]
#[command(about = "Classify grammars and automata in the Chomsky hierarchy, convert and compare them")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Step budget for PDA and TM simulation
    #[arg(long, global = true)]
    max_steps: Option<usize>,

    /// Derivation depth used by the comparator
    #[arg(long, global = true)]
    max_depth: Option<usize>,

    /// Longest string the comparator generates
    #[arg(long, global = true)]
    max_length: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a grammar (reads stdin if no file is given)
    Classify {
        file: Option<PathBuf>,

        /// Start symbol, defaults to the left-hand side of the first rule
        #[arg(long)]
        start: Option<String>,

        /// Only list the failing rule checks
        #[arg(long)]
        brief: bool,
    },

    /// Analyze an automaton description
    Analyze { file: Option<PathBuf> },

    /// Run an automaton on one or more inputs
    Simulate {
        file: PathBuf,

        /// Input strings, use "" for the empty string
        #[arg(required = true)]
        inputs: Vec<String>,
    },

    /// Convert a regular expression to a regular grammar
    Convert {
        regex: String,

        /// Add a dead state so every DFA move is defined
        #[arg(long)]
        complete: bool,

        /// Keep the subset-construction DFA as is
        #[arg(long)]
        no_minimize: bool,
    },

    /// Compare the strings two grammars generate
    Compare { first: PathBuf, second: PathBuf },

    /// Compare two automaton descriptions
    CompareAutomata { first: PathBuf, second: PathBuf },

    /// Print a built-in example grammar
    Example {
        /// Chomsky type, 0 to 3
        #[arg(value_parser = parse_chomsky_type)]
        chomsky_type: ChomskyType,

        #[arg(default_value = "simple")]
        difficulty: Difficulty,
    },
}

fn parse_chomsky_type(text: &str) -> Result<ChomskyType, String> {
    let level: u8 = text
        .trim()
        .parse()
        .map_err(|_| format!("'{text}' is not a Chomsky type, expected 0 to 3"))?;
    ChomskyType::try_from(level)
}

fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read {}", path.display())),
        None => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .wrap_err("Failed to read standard input")?;
            Ok(text)
        }
    }
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Serialize)]
struct SimulationReport {
    input: String,
    verdict: chomsky::Verdict,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let defaults = Limits::default();
    let limits = Limits {
        max_steps: cli.max_steps.unwrap_or(defaults.max_steps),
        max_derivation_depth: cli.max_depth.unwrap_or(defaults.max_derivation_depth),
        max_string_length: cli.max_length.unwrap_or(defaults.max_string_length),
        ..defaults
    };

    match cli.command {
        Commands::Classify { file, start, brief } => {
            let text = read_input(file.as_deref())?;
            let options = ParseOptions {
                start,
                ..ParseOptions::default()
            };
            let parsed = parse_grammar_with(&text, &options)?;
            let mode = if brief {
                ClassifierMode::Brief
            } else {
                ClassifierMode::Explain
            };
            let result = Classifier::with_mode(&parsed.grammar, mode).classify();

            if cli.json {
                print_json(&serde_json::json!({
                    "grammar": parsed.grammar.to_string(),
                    "warnings": parsed.warnings,
                    "classification": result,
                }))?;
            } else {
                println!("{}\n", parsed.grammar);
                for warning in &parsed.warnings {
                    println!("warning: {warning}");
                }
                for line in result.justification() {
                    println!("{line}");
                }
                if !result.boundary.is_empty() {
                    println!("Productions ruling out the next stronger type:");
                    for production in &result.boundary {
                        println!("  {production}");
                    }
                }
            }
        }

        Commands::Analyze { file } => {
            let text = read_input(file.as_deref())?;
            let automaton = parse_automaton(&text)?;
            let analysis = analyze_automaton_with(&automaton, limits);

            if cli.json {
                print_json(&analysis)?;
            } else {
                println!("{automaton}\n");
                println!("{analysis}");
            }
        }

        Commands::Simulate { file, inputs } => {
            let text = read_input(Some(file.as_path()))?;
            let automaton = parse_automaton(&text)?;

            let mut reports = Vec::new();
            for input in inputs {
                let verdict = simulate_with(&automaton, &input, limits)?;
                reports.push(SimulationReport { input, verdict });
            }

            if cli.json {
                print_json(&reports)?;
            } else {
                for report in &reports {
                    let shown = if report.input.is_empty() { "ε" } else { &report.input };
                    println!("{shown}: {}", report.verdict);
                }
            }
        }

        Commands::Convert {
            regex,
            complete,
            no_minimize,
        } => {
            let options = ConversionOptions {
                complete_dfa: complete,
                skip_minimization: no_minimize,
            };
            let trace = convert_regex_to_grammar_with(&regex, limits, options)?;

            if cli.json {
                print_json(&trace)?;
            } else {
                for stage in &trace.stages {
                    println!("== {} ==", stage.kind);
                    println!("{}", stage.explanation);
                    println!("{}\n", stage.rendered);
                }
            }
        }

        Commands::Compare { first, second } => {
            let first = parse_grammar(&read_input(Some(first.as_path()))?)?;
            let second = parse_grammar(&read_input(Some(second.as_path()))?)?;
            let result =
                compare_grammars_with(&first, &second, limits.max_derivation_depth, limits)?;

            if cli.json {
                print_json(&result)?;
            } else {
                println!("{result}");
            }
        }

        Commands::CompareAutomata { first, second } => {
            let first = parse_automaton(&read_input(Some(first.as_path()))?)?;
            let second = parse_automaton(&read_input(Some(second.as_path()))?)?;
            let result = compare_automata_with(&first, &second, limits)?;

            if cli.json {
                print_json(&result)?;
            } else {
                println!("{result}");
            }
        }

        Commands::Example {
            chomsky_type,
            difficulty,
        } => {
            let grammar = generate_example(chomsky_type, difficulty)?;
            info!(%chomsky_type, %difficulty, "example grammar");

            if cli.json {
                print_json(&grammar)?;
            } else {
                println!("{grammar}");
            }
        }
    }

    Ok(())
}
