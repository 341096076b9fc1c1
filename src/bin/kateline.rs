//! Command-line interface for kateline
//! Tokenizes a file line by line with a Kate grammar and prints what every line produced.
//! Meant for debugging grammars and the engine, not for rendering.
//!
//! Usage:
//!   kateline `<grammar>` `<input>` [--format text|json|yaml] [--config `<file>`] [--no-validate]
//!   kateline `<grammar>` --dump-grammar
//!
//! `<grammar>` is either a path to a definition file or a key looked up in the configured
//! registry search paths. Set `RUST_LOG=kateline=trace` to follow individual rule matches.
//! `KATELINE_<SECTION>__<KEY>` variables override the configuration file, and flags override both.

use clap::{Arg, ArgAction, ArgMatches, Command};
use kateline::config::{KatelineConfig, Loader, OutputFormat};
use kateline::syntax::{
    load_grammar_file, ContextStack, FormatSpan, Grammar, SegmentSummary, SyntaxRegistry,
};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// What one input line produced, in the shape written by the json and yaml formats
#[derive(Debug, Serialize)]
struct LineReport {
    line: usize,
    stack: Vec<String>,
    segments: Vec<SegmentSummary>,
    spans: Vec<FormatSpan>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let matches = Command::new("kateline")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Tokenize text line by line with a Kate syntax definition")
        .arg_required_else_help(true)
        .arg(
            Arg::new("grammar")
                .help("Grammar file, or a grammar key resolved through the registry search paths")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("input")
                .help("File to tokenize")
                .required_unless_present("dump-grammar")
                .index(2),
        )
        .arg(
            Arg::new("format")
                .long("format")
                .short('f')
                .help("Output format: text, json or yaml (default from configuration)"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .help("Configuration file layered over the built-in defaults"),
        )
        .arg(
            Arg::new("no-validate")
                .long("no-validate")
                .help("Skip static checks of context references and #pop depths")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("dump-grammar")
                .long("dump-grammar")
                .help("Print the loaded grammar definition and exit")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let config = load_config(&matches);
    let grammar_arg = matches
        .get_one::<String>("grammar")
        .expect("grammar is a required argument");
    let grammar = load_grammar(grammar_arg, &config);

    if matches.get_flag("dump-grammar") {
        print!("{}", grammar);
        return;
    }

    let input = matches
        .get_one::<String>("input")
        .expect("input is required unless dumping the grammar");
    handle_tokenize_command(&grammar, input, config.output.format);
}

fn load_config(matches: &ArgMatches) -> KatelineConfig {
    let mut loader = Loader::new();
    if let Some(path) = matches.get_one::<String>("config") {
        loader = loader.with_file(path);
    }
    loader = loader.with_environment();
    if let Some(format) = matches.get_one::<String>("format") {
        if OutputFormat::from_name(format).is_none() {
            eprintln!("Unknown format '{}'", format);
            eprintln!("Available formats: {}", OutputFormat::NAMES.join(", "));
            std::process::exit(1);
        }
        loader = apply_override(loader, "output.format", format.as_str());
    }
    if matches.get_flag("no-validate") {
        loader = apply_override(loader, "loading.validate", false);
    }
    loader.build().unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    })
}

fn apply_override<V: Into<config::ValueKind>>(loader: Loader, key: &str, value: V) -> Loader {
    loader.set_override(key, value).unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    })
}

/// Files are loaded directly; anything else goes through the registry
fn load_grammar(grammar: &str, config: &KatelineConfig) -> Arc<Grammar> {
    let result = if Path::new(grammar).is_file() {
        load_grammar_file(grammar, &config.loading.load_options()).map(Arc::new)
    } else {
        SyntaxRegistry::from_config(config).load(grammar)
    };
    result.unwrap_or_else(|e| {
        eprintln!("Failed to load grammar '{}': {}", grammar, e);
        std::process::exit(1);
    })
}

fn handle_tokenize_command(grammar: &Grammar, input: &str, format: OutputFormat) {
    let text = std::fs::read_to_string(input).unwrap_or_else(|e| {
        eprintln!("Failed to read {}: {}", input, e);
        std::process::exit(1);
    });
    debug!(grammar = grammar.name(), input, "tokenizing");

    let mut stack: Option<ContextStack> = None;
    let mut reports = Vec::new();
    let mut rendered = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let result = grammar.parse_line(stack.as_ref(), line).unwrap_or_else(|e| {
            eprintln!("Line {}: {}", index + 1, e);
            std::process::exit(1);
        });
        match format {
            OutputFormat::Text => {
                rendered.push(format!("{}: {}\n{}", index + 1, line, result.render(grammar)))
            }
            OutputFormat::Json | OutputFormat::Yaml => reports.push(LineReport {
                line: index + 1,
                stack: result.stack_names(grammar),
                segments: result.describe(grammar),
                spans: result.spans(grammar),
            }),
        }
        stack = Some(result.stack);
    }

    let formatted = match format {
        OutputFormat::Text => rendered.join("\n\n"),
        OutputFormat::Json => serde_json::to_string_pretty(&reports).unwrap_or_else(|e| {
            eprintln!("Error formatting output: {}", e);
            std::process::exit(1);
        }),
        OutputFormat::Yaml => serde_yaml::to_string(&reports).unwrap_or_else(|e| {
            eprintln!("Error formatting output: {}", e);
            std::process::exit(1);
        }),
    };
    println!("{}", formatted);
}
