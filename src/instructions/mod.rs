//! Instruction parsing for operator comments.
//!
//! Reviewers steer the reconciler by writing `jenkins:` documents in
//! comments. This module extracts them as [`Instruction`]s and classifies
//! their names into the closed set of [`InstructionKind`]s the extensions
//! understand.
//!
//! # Example
//!
//! ```
//! use chrono::Utc;
//! use ci_reconciler::instructions::{InstructionKind, parse_instructions};
//!
//! let comment = "Looks good, but docs are broken.\n\n```\njenkins:\n  skip: [doc]\n```";
//! let instructions = parse_instructions(comment, "reviewer", Utc::now());
//! assert_eq!(instructions[0].kind(), InstructionKind::Skip);
//! assert_eq!(instructions[0].args, vec!["doc".to_string()]);
//! ```

mod parser;
mod types;

pub use parser::{MARKER, parse_instructions};
pub use types::{Instruction, InstructionKind};
