//! Behaviour programs
//!
//! A [`Program`] is the ordered list of statements the runner executes. It is
//! produced outside the runner, either exported from the block editor as JSON
//! or written as a line-oriented text script (see [`script`]).

pub mod script;
pub mod statement;

pub use script::{parse_script, ParseError};
pub use statement::{MoveDirection, Statement, StatementId, StatementKind, TurnDirection};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

/// Program result
pub type ProgramResult<T> = Result<T, ProgramError>;

/// Reasons a program is refused before execution.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProgramError {
    #[error("program has no statements")]
    Empty,

    #[error("statement {id}: `{field}` is not a finite number")]
    NonFinite { id: StatementId, field: &'static str },

    #[error("statement {id}: `{field}` must not be negative")]
    Negative { id: StatementId, field: &'static str },

    #[error("statement {id}: `{field}` must not be empty")]
    EmptyIdentifier { id: StatementId, field: &'static str },

    #[error("statement id {0} is used more than once")]
    DuplicateId(StatementId),
}

/// Errors while loading a program from disk or JSON.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid program JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Script(#[from] ParseError),
}

/// An ordered sequence of statements.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Program {
    statements: Vec<Statement>,
}

#[derive(Deserialize)]
struct RawProgram {
    statements: Vec<RawStatement>,
}

#[derive(Deserialize)]
struct RawStatement {
    #[serde(default)]
    id: Option<StatementId>,
    #[serde(flatten)]
    kind: StatementKind,
}

impl Program {
    /// Create a program from statements.
    pub fn new(statements: Vec<Statement>) -> Self {
        Self { statements }
    }

    /// Create a program from bare kinds, numbering ids `s0`, `s1`, ...
    pub fn from_kinds<I>(kinds: I) -> Self
    where
        I: IntoIterator<Item = StatementKind>,
    {
        let statements = kinds
            .into_iter()
            .enumerate()
            .map(|(i, kind)| Statement::new(format!("s{}", i), kind))
            .collect();
        Self { statements }
    }

    /// Parse the JSON export of the block editor.
    ///
    /// Statements without an `id` get `s<index>`.
    pub fn from_json(source: &str) -> Result<Self, LoadError> {
        let raw: RawProgram = serde_json::from_str(source)?;
        let statements = raw
            .statements
            .into_iter()
            .enumerate()
            .map(|(i, s)| Statement {
                id: s.id.unwrap_or_else(|| StatementId::new(format!("s{}", i))),
                kind: s.kind,
            })
            .collect();
        Ok(Self { statements })
    }

    /// Serialize to the JSON export format.
    pub fn to_json(&self) -> Result<String, LoadError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a program file. `.json` files are read as editor exports,
    /// everything else as a text script.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let source = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if is_json {
            Self::from_json(&source)
        } else {
            Ok(parse_script(&source)?)
        }
    }

    /// Statements in execution order.
    #[inline]
    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    /// Statement at `index`.
    #[inline]
    pub fn get(
        &self,
        index: usize,
    ) -> Option<&Statement> {
        self.statements.get(index)
    }

    /// Number of statements.
    #[inline]
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    /// Whether the program has no statements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Check that the program can be executed.
    pub fn validate(&self) -> ProgramResult<()> {
        if self.statements.is_empty() {
            return Err(ProgramError::Empty);
        }

        let mut seen = HashSet::with_capacity(self.statements.len());
        for stmt in &self.statements {
            if !seen.insert(&stmt.id) {
                return Err(ProgramError::DuplicateId(stmt.id.clone()));
            }
            validate_statement(stmt)?;
        }
        Ok(())
    }
}

fn validate_statement(stmt: &Statement) -> ProgramResult<()> {
    let id = &stmt.id;
    match &stmt.kind {
        StatementKind::Move { distance, .. } => non_negative(id, "distance", *distance),
        StatementKind::Turn { degrees, .. } => non_negative(id, "degrees", *degrees),
        // A negative wait is allowed and behaves like zero.
        StatementKind::Wait { seconds } => finite(id, "seconds", *seconds),
        StatementKind::Speak { .. } => Ok(()),
        StatementKind::Servo { servo, value } => {
            not_empty(id, "servo", servo)?;
            finite(id, "value", *value)
        }
        StatementKind::Audio { clip } => not_empty(id, "clip", clip),
        StatementKind::Stop => Ok(()),
    }
}

fn finite(
    id: &StatementId,
    field: &'static str,
    value: f64,
) -> ProgramResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ProgramError::NonFinite {
            id: id.clone(),
            field,
        })
    }
}

fn non_negative(
    id: &StatementId,
    field: &'static str,
    value: f64,
) -> ProgramResult<()> {
    finite(id, field, value)?;
    if value < 0.0 {
        return Err(ProgramError::Negative {
            id: id.clone(),
            field,
        });
    }
    Ok(())
}

fn not_empty(
    id: &StatementId,
    field: &'static str,
    value: &str,
) -> ProgramResult<()> {
    if value.trim().is_empty() {
        return Err(ProgramError::EmptyIdentifier {
            id: id.clone(),
            field,
        });
    }
    Ok(())
}
