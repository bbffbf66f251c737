//! Scopes and the bindings they hold
//!
//! A scope maps each locally declared name to a binding cell. Scopes chain:
//! lookup walks from the innermost scope outwards and the first hit wins.
//! Scopes never change shape after construction; what a cell *resolves to*
//! is filled in exactly once, on first use, which is how declarations within
//! one scope may refer to each other in any order.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::ast::{self, Ident};
use crate::ast::{Loc, Node, Placed, resolved};
use crate::error::ResolveErrors;

/// What a declared name denotes once its right-hand side has been resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum DeclarationRhs {
    /// `CONST name = value`.
    Constant(Rc<Placed<resolved::Expression>>),
    /// `TYPE name = T`.
    Type(Rc<Placed<resolved::Type>>),
    /// `VAR name: T`, a formal parameter, or a receiver.
    Variable(Rc<Placed<resolved::Type>>),
    /// A declared or predefined procedure.
    Procedure {
        /// Builtins accept type names as value arguments.
        builtin: bool,
        params: Option<Rc<Placed<resolved::FormalParameters>>>,
    },
}

impl DeclarationRhs {
    pub fn is_type(&self) -> bool {
        matches!(self, DeclarationRhs::Type(_))
    }

    pub fn is_procedure(&self) -> bool {
        matches!(self, DeclarationRhs::Procedure { .. })
    }

    pub fn is_builtin_procedure(&self) -> bool {
        matches!(self, DeclarationRhs::Procedure { builtin: true, .. })
    }
}

/// Syntactic classification of a binding. Known from the declaration form
/// alone, before the right-hand side has been looked at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Constant,
    Type,
    Variable,
    Procedure { builtin: bool },
}

/// A right-hand side that has not been resolved yet, as registered during
/// scope construction.
#[derive(Debug, Clone)]
pub(crate) enum PendingRhs {
    Constant(Node<ast::Expression>),
    Type(Node<ast::Type>),
    Variable(Node<ast::Type>),
    Procedure(Option<Node<ast::FormalParameters>>),
}

#[derive(Debug)]
enum CellState {
    Pending(PendingRhs),
    InProgress,
    Done(DeclarationRhs),
    Failed(ResolveErrors),
}

/// One name's slot in a scope.
///
/// The classification is fixed at registration; the resolved right-hand side
/// goes through `Pending -> InProgress -> Done | Failed` on first use. A
/// lookup that lands on `InProgress` has followed a declaration back into
/// itself — legal for types and procedures, an error for constant values.
#[derive(Debug)]
pub struct BindingCell {
    kind: DeclKind,
    loc: Loc,
    state: RefCell<CellState>,
}

impl BindingCell {
    pub(crate) fn pending(kind: DeclKind, loc: Loc, rhs: PendingRhs) -> Self {
        Self {
            kind,
            loc,
            state: RefCell::new(CellState::Pending(rhs)),
        }
    }

    pub(crate) fn done(kind: DeclKind, loc: Loc, rhs: DeclarationRhs) -> Self {
        Self {
            kind,
            loc,
            state: RefCell::new(CellState::Done(rhs)),
        }
    }

    pub(crate) fn failed(kind: DeclKind, loc: Loc, errors: ResolveErrors) -> Self {
        Self {
            kind,
            loc,
            state: RefCell::new(CellState::Failed(errors)),
        }
    }

    pub fn kind(&self) -> DeclKind {
        self.kind
    }

    pub fn loc(&self) -> &Loc {
        &self.loc
    }

    /// The resolved right-hand side, if resolution has already finished.
    pub fn resolved(&self) -> Option<Result<DeclarationRhs, ResolveErrors>> {
        match &*self.state.borrow() {
            CellState::Done(rhs) => Some(Ok(rhs.clone())),
            CellState::Failed(errors) => Some(Err(errors.clone())),
            CellState::Pending(_) | CellState::InProgress => None,
        }
    }

    /// Take the unresolved right-hand side out, marking the cell in
    /// progress. Returns `None` when the cell is already in progress — the
    /// caller has followed a declaration cycle.
    pub(crate) fn begin(&self) -> Option<PendingRhs> {
        let mut state = self.state.borrow_mut();
        match std::mem::replace(&mut *state, CellState::InProgress) {
            CellState::Pending(rhs) => Some(rhs),
            other => {
                *state = other;
                None
            }
        }
    }

    pub(crate) fn finish(&self, result: Result<DeclarationRhs, ResolveErrors>) {
        let mut state = self.state.borrow_mut();
        *state = match result {
            Ok(rhs) => CellState::Done(rhs),
            Err(errors) => CellState::Failed(errors),
        };
    }
}

/// A lexical scope: local bindings over an optional enclosing scope.
#[derive(Debug)]
pub struct Scope {
    parent: Option<Rc<Scope>>,
    bindings: HashMap<Ident, BindingCell>,
}

impl Scope {
    /// A scope with no enclosing scope.
    pub fn root(bindings: HashMap<Ident, BindingCell>) -> Rc<Self> {
        Rc::new(Self {
            parent: None,
            bindings,
        })
    }

    /// A scope nested inside `parent`; local bindings shadow outer ones.
    pub fn nested(parent: Rc<Scope>, bindings: HashMap<Ident, BindingCell>) -> Rc<Self> {
        Rc::new(Self {
            parent: Some(parent),
            bindings,
        })
    }

    /// The cell bound at this level, ignoring enclosing scopes.
    pub fn local(&self, name: &str) -> Option<&BindingCell> {
        self.bindings.get(name)
    }

    /// The innermost scope level binding `name`, together with its cell.
    pub fn find<'a>(scope: &'a Rc<Scope>, name: &str) -> Option<(Rc<Scope>, &'a BindingCell)> {
        let mut scope = scope;
        loop {
            if let Some(cell) = scope.bindings.get(name) {
                return Some((Rc::clone(scope), cell));
            }
            scope = scope.parent.as_ref()?;
        }
    }

    /// The bindings declared at this level.
    pub fn local_entries(&self) -> impl Iterator<Item = (&Ident, &BindingCell)> {
        self.bindings.iter()
    }

    /// Every name visible from this scope, innermost first. Shadowed names
    /// appear once per level; callers that need a set should dedup.
    pub fn visible_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        let mut scope = Some(self);
        while let Some(s) = scope {
            names.extend(s.bindings.keys().map(|n| n.as_str().to_string()));
            scope = s.parent.as_deref();
        }
        names
    }
}
