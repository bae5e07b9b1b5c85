//! Minimal CLI: validate | generate | tests | compat
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use indexmap::IndexMap;
use serde_json::Value;

use crate::outcome::Outcome;
use crate::parse::{parse_schema, ParsedSchema};
use crate::pattern::NegativeConfig;
use crate::resolver::Resolver;
use crate::row::Row;

// ---------------------------------- types ---------------------------------- //

/// match, generate, and compatibility-check JSON values against schemas
#[derive(Parser, Debug)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// validate JSON value files against a schema
    Validate(ValidateArgs),
    /// generate values satisfying a schema
    Generate(GenerateArgs),
    /// render positive and negative test values for a schema
    Tests(TestsArgs),
    /// check that a new schema still accepts everything an old one did
    Compat(CompatArgs),
}

#[derive(Args, Debug, Clone)]
struct SchemaSettings {
    /// schema file (JSON)
    #[arg(long, short)]
    schema: PathBuf,

    /// example dictionary: a JSON object mapping pattern tokens to values
    #[arg(long)]
    dictionary: Option<PathBuf>,

    /// fail instead of fabricating values the dictionary does not cover
    #[arg(long, requires = "dictionary")]
    strict_dictionary: bool,

    /// seed for deterministic generation
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

#[derive(Args, Debug)]
struct ValidateArgs {
    #[command(flatten)]
    schema_settings: SchemaSettings,

    /// one or more value files; literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    #[command(flatten)]
    schema_settings: SchemaSettings,

    /// how many values to generate
    #[arg(long, short, default_value_t = 1)]
    count: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum VariantKind {
    Positive,
    Negative,
    All,
}

#[derive(Args, Debug)]
struct TestsArgs {
    #[command(flatten)]
    schema_settings: SchemaSettings,

    /// which variant families to render
    #[arg(long, value_enum, default_value_t = VariantKind::All)]
    kind: VariantKind,

    /// cap per variant family
    #[arg(long, default_value_t = 20)]
    max: usize,

    /// skip cross-type mutations among the negatives
    #[arg(long)]
    no_type_negatives: bool,
}

#[derive(Args, Debug)]
struct CompatArgs {
    /// previously published schema
    #[arg(long)]
    old: PathBuf,

    /// candidate schema
    #[arg(long)]
    new: PathBuf,
}

// ------------------------------ implementation ----------------------------- //

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    /// Runs the selected subcommand; `Ok(false)` means the check itself found
    /// problems (mismatches, incompatibility) as opposed to an operational
    /// error.
    pub fn run(&self) -> anyhow::Result<bool> {
        match &self.cmd {
            Command::Validate(args) => run_validate(args),
            Command::Generate(args) => run_generate(args),
            Command::Tests(args) => run_tests(args),
            Command::Compat(args) => run_compat(args),
        }
    }
}

impl SchemaSettings {
    fn load(&self) -> anyhow::Result<(ParsedSchema, Resolver)> {
        let parsed = load_schema(&self.schema)?;
        let mut resolver = parsed.resolver().with_seed(self.seed);
        if let Some(path) = &self.dictionary {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("cannot read dictionary {}", path.display()))?;
            let entries: IndexMap<String, Value> = serde_json::from_str(&text)
                .with_context(|| format!("dictionary {} is not a JSON object", path.display()))?;
            resolver = resolver
                .with_dictionary(entries)
                .with_strict_dictionary(self.strict_dictionary);
        }
        Ok((parsed, resolver))
    }
}

fn load_schema(path: &Path) -> anyhow::Result<ParsedSchema> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read schema {}", path.display()))?;
    parse_schema(&text).with_context(|| format!("cannot parse schema {}", path.display()))
}

fn run_validate(args: &ValidateArgs) -> anyhow::Result<bool> {
    let (parsed, resolver) = args.schema_settings.load()?;
    let paths = resolve_file_path_patterns(&args.input)?;
    let mut all_ok = true;
    for path in paths {
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        let value: Value = serde_json::from_str(&text)
            .with_context(|| format!("{} is not valid JSON", path.display()))?;
        let result = parsed.root.matches(&value, &resolver);
        if result.is_success() {
            println!("{}: OK", path.display());
        } else {
            all_ok = false;
            println!("{}: FAILED", path.display());
            for line in result.report().lines() {
                println!("  {line}");
            }
        }
    }
    Ok(all_ok)
}

fn run_generate(args: &GenerateArgs) -> anyhow::Result<bool> {
    let (parsed, resolver) = args.schema_settings.load()?;
    for i in 0..args.count {
        let seeded = resolver.clone().with_seed(args.schema_settings.seed.wrapping_add(i));
        match parsed.root.generate(&seeded) {
            Outcome::Value(v) => println!("{}", serde_json::to_string_pretty(&v)?),
            Outcome::Failure(f) => anyhow::bail!("generation failed:\n{}", f.report()),
            Outcome::Exception(e) => return Err(e.into()),
        }
    }
    Ok(true)
}

fn run_tests(args: &TestsArgs) -> anyhow::Result<bool> {
    let (parsed, resolver) = args.schema_settings.load()?;
    let row = Row::new();
    let mut all_ok = true;
    if args.kind != VariantKind::Negative {
        for variant in parsed.root.new_based_on(&row, &resolver).take(args.max) {
            match variant.and_then(|p| p.generate(&resolver)) {
                Outcome::Value(v) => println!("+ {}", serde_json::to_string(&v)?),
                Outcome::Failure(f) => {
                    all_ok = false;
                    println!("+ SKIPPED: {}", f.report());
                }
                Outcome::Exception(e) => return Err(e.into()),
            }
        }
    }
    if args.kind != VariantKind::Positive {
        let config = NegativeConfig {
            with_data_type_negatives: !args.no_type_negatives,
        };
        let resolver = resolver.with_negative(true);
        let negatives = parsed.root.negative_based_on(&row, &resolver, &config);
        for variant in negatives.take(args.max) {
            match variant.and_then(|p| p.generate(&resolver)) {
                Outcome::Value(v) => println!("- {}", serde_json::to_string(&v)?),
                Outcome::Failure(f) => {
                    all_ok = false;
                    println!("- SKIPPED: {}", f.report());
                }
                Outcome::Exception(e) => return Err(e.into()),
            }
        }
    }
    Ok(all_ok)
}

fn run_compat(args: &CompatArgs) -> anyhow::Result<bool> {
    let old = load_schema(&args.old)?;
    let new = load_schema(&args.new)?;
    let old_resolver = old.resolver();
    let new_resolver = new.resolver();
    let result = new
        .root
        .encompasses(&old.root, &new_resolver, &old_resolver);
    if result.is_success() {
        println!("compatible: every value the old schema accepts is still accepted");
        Ok(true)
    } else {
        println!("INCOMPATIBLE");
        for line in result.report().lines() {
            println!("  {line}");
        }
        Ok(false)
    }
}

// ------------------------------ internal helpers --------------------------- //

fn resolve_file_path_patterns<I>(patterns: I) -> anyhow::Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();
    for raw in patterns {
        let pattern = raw.as_ref();
        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                anyhow::bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }
    Ok(out)
}
