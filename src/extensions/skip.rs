//! Job name patterns of `skip` and `jobs` instructions.
//!
//! Each argument is a regular expression searched anywhere in the job name.
//! A leading `-` marks an excluding pattern, and a bare `*` stands for
//! "any job". Patterns that fail to compile are reported and ignored.

use regex::Regex;

/// Which jobs the builder must skip.
#[derive(Debug, Clone, Default)]
pub enum SkipRule {
    /// Nothing is skipped.
    #[default]
    None,
    /// Every job is skipped (`skip` without arguments).
    All,
    /// Jobs matching any pattern are skipped (`skip <patterns...>`).
    List(Vec<Regex>),
    /// Jobs not matching an including pattern, or matching an excluding one,
    /// are skipped (`jobs <patterns...>`).
    Filter { include: Vec<Regex>, exclude: Vec<Regex> },
}

/// A pattern that failed to compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidPattern {
    pub pattern: String,
    pub reason: String,
}

impl SkipRule {
    /// Builds the rule of a `skip` instruction.
    pub fn skip(args: &[String]) -> (SkipRule, Vec<InvalidPattern>) {
        if args.is_empty() {
            return (SkipRule::All, Vec::new());
        }
        let (patterns, invalid) = compile_all(args.iter().map(String::as_str));
        (SkipRule::List(patterns), invalid)
    }

    /// Builds the rule of a `jobs` instruction.
    pub fn jobs(args: &[String]) -> (SkipRule, Vec<InvalidPattern>) {
        let (excluding, including): (Vec<&String>, Vec<&String>) =
            args.iter().partition(|arg| arg.starts_with('-'));

        let (include, mut invalid) = compile_all(including.into_iter().map(String::as_str));
        let (exclude, invalid_exclude) =
            compile_all(excluding.into_iter().map(|arg| &arg[1..]));
        invalid.extend(invalid_exclude);

        (SkipRule::Filter { include, exclude }, invalid)
    }

    /// Returns true if the builder must not trigger `job`.
    pub fn is_skipped(&self, job: &str) -> bool {
        match self {
            SkipRule::None => false,
            SkipRule::All => true,
            SkipRule::List(patterns) => patterns.iter().any(|p| p.is_match(job)),
            SkipRule::Filter { include, exclude } => {
                let not_included = !include.is_empty() && !include.iter().any(|p| p.is_match(job));
                not_included || exclude.iter().any(|p| p.is_match(job))
            }
        }
    }
}

fn compile_all<'a>(patterns: impl Iterator<Item = &'a str>) -> (Vec<Regex>, Vec<InvalidPattern>) {
    let mut compiled = Vec::new();
    let mut invalid = Vec::new();
    for pattern in patterns {
        let source = if pattern == "*" { ".*" } else { pattern };
        match Regex::new(source) {
            Ok(regex) => compiled.push(regex),
            Err(e) => invalid.push(InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            }),
        }
    }
    (compiled, invalid)
}
