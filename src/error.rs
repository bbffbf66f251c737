//! Error types and reporting
//!
//! This module defines the errors the resolver can produce and renders them
//! as user-facing reports through the Ariadne library.

use ariadne::{Label, Report, ReportKind};
use thiserror::Error;

use crate::ast::ast::{Ident, QualIdent};
use crate::ast::{Loc, resolved};

/// A resolution error with the source position it applies to.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}")]
pub struct ResolveError {
    pub kind: ResolveErrorKind,
    pub loc: Loc,
    pub suggestions: Vec<ErrorSuggestion>,
}

impl ResolveError {
    pub fn new(kind: ResolveErrorKind, loc: Loc) -> Self {
        Self {
            kind,
            loc,
            suggestions: Vec::new(),
        }
    }

    pub fn with_suggestion(mut self, suggestion: ErrorSuggestion) -> Self {
        self.suggestions.push(suggestion);
        self
    }

    /// Generate an Ariadne error report.
    pub fn report(&self) -> Report<'_, Loc> {
        let mut report =
            Report::build(ReportKind::Error, self.loc.clone()).with_message(self.kind.to_string());

        report = report.with_label(Label::new(self.loc.clone()));

        for suggestion in &self.suggestions {
            report = report.with_note(suggestion.format());
        }

        match &self.kind {
            ResolveErrorKind::UnknownLocal(_) if self.suggestions.is_empty() => {
                report = report
                    .with_help("Names must be declared in an enclosing scope before use.");
            }
            ResolveErrorKind::NotAValue(_) => {
                report = report.with_help(
                    "Only the builtin procedures accept a type name where a value is expected.",
                );
            }
            _ => {}
        }

        report.finish()
    }
}

/// Collection of resolution errors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolveErrors(pub Vec<ResolveError>);

impl ResolveErrors {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, error: ResolveError) {
        self.0.push(error);
    }

    pub fn extend(&mut self, mut errors: ResolveErrors) {
        self.0.append(&mut errors.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn into_result<T>(self, ok: T) -> Result<T, Self> {
        if self.is_empty() { Ok(ok) } else { Err(self) }
    }

    pub fn reports(&self) -> Vec<Report<'_, Loc>> {
        self.0.iter().map(|e| e.report()).collect()
    }
}

impl From<ResolveError> for ResolveErrors {
    fn from(error: ResolveError) -> Self {
        Self(vec![error])
    }
}

impl IntoIterator for ResolveErrors {
    type Item = ResolveError;
    type IntoIter = std::vec::IntoIter<ResolveError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Suggestion attached to an error report.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorSuggestion {
    DidYouMean {
        wrong: String,
        suggestion: String,
        confidence: f32,
    },
    Help(String),
}

impl ErrorSuggestion {
    pub fn format(&self) -> String {
        match self {
            Self::DidYouMean {
                wrong,
                suggestion,
                confidence,
            } => {
                if *confidence > 0.8 {
                    format!("Did you mean '{}'?", suggestion)
                } else {
                    format!("Did you mean '{}' (similar to '{}')?", suggestion, wrong)
                }
            }
            Self::Help(msg) => msg.clone(),
        }
    }
}

/// The specific kind of resolution error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveErrorKind {
    #[error("'{0}' refers to a module that is not imported")]
    UnknownModule(QualIdent),
    #[error("undefined name '{0}'")]
    UnknownLocal(Ident),
    #[error("the imported module has no export named '{0}'")]
    UnknownImport(QualIdent),
    #[error("the site still admits more than one parse")]
    AmbiguousParses,
    #[error("{} declaration interpretations remain valid", .0.len())]
    AmbiguousDeclaration(Vec<resolved::Declaration>),
    #[error("{} designator interpretations remain valid", .0.len())]
    AmbiguousDesignator(Vec<resolved::Designator>),
    #[error("{} expression interpretations remain valid", .0.len())]
    AmbiguousExpression(Vec<resolved::Expression>),
    #[error("{} record interpretations remain valid", .0.len())]
    AmbiguousRecord(Vec<resolved::Designator>),
    #[error("{} statement interpretations remain valid", .0.len())]
    AmbiguousStatement(Vec<resolved::Statement>),
    #[error("no interpretation of the expression resolves")]
    InvalidExpression(ResolveErrors),
    #[error("the call's arguments do not resolve")]
    InvalidFunctionParameters(ResolveErrors),
    #[error("no interpretation of the record resolves")]
    InvalidRecord(ResolveErrors),
    #[error("no interpretation of the statement resolves")]
    InvalidStatement(ResolveErrors),
    #[error("'{0}' does not name a record")]
    NotARecord(QualIdent),
    #[error("'{0}' does not name a type")]
    NotAType(QualIdent),
    #[error("'{0}' names a type where a value is required")]
    NotAValue(QualIdent),
    #[error("two imports collide under the local name '{0}'")]
    ClashingImports(Ident),
    #[error("'{0}' is declared more than once in this scope")]
    DuplicateBinding(Ident),
    #[error("the value of constant '{0}' depends on itself")]
    CircularConstant(Ident),
    #[error("import cycle through module '{0}'")]
    CircularImport(Ident),
    #[error("the module could not be parsed: {0}")]
    UnparseableModule(String),
}
