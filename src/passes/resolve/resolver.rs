//! The resolver proper
//!
//! Resolution happens per module. Scope construction registers every
//! declared name first, so declarations within one scope may refer to each
//! other in any order; each binding's right-hand side is then settled
//! against the completed scope. With scopes in hand, the traversal walks
//! declarations and statements, trying every reading of each ambiguous site
//! and keeping the unique one that resolves.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use tracing::{debug, trace};

use crate::ast::ast::{self, AccessMode, Ident, QualIdent};
use crate::ast::{Loc, Node, Placed, resolved};
use crate::error::{ErrorSuggestion, ResolveError, ResolveErrorKind, ResolveErrors};
use crate::suggestions;

use super::scope::{BindingCell, DeclKind, DeclarationRhs, PendingRhs, Scope};

/// The module whose procedures are builtin and accept type names as value
/// arguments.
const SYSTEM_MODULE: &str = "SYSTEM";

/// Where in the tree resolution currently is. Only `ExpressionOrType`
/// changes behaviour: it makes a type name acceptable where a value is
/// otherwise required, which arises for the arguments of builtin calls such
/// as `SIZE(INTEGER)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionState {
    Module,
    Declaration,
    Statement,
    Expression,
    ExpressionOrType,
}

/// A module the resolver has fully disambiguated, together with the scopes
/// built on the way. `globals` answers what any identifier in the module
/// denotes; `exports` is the subset visible to importers.
#[derive(Debug)]
pub struct ResolvedModule {
    pub module: resolved::Module,
    pub globals: Rc<Scope>,
    pub exports: Rc<Scope>,
}

/// Modules visible during resolution, keyed by their own names. A module
/// that failed to resolve keeps its errors here; importers see it as
/// exporting nothing.
pub type ModuleTable = HashMap<Ident, Result<Rc<ResolvedModule>, ResolveErrors>>;

/// Resolves names against a set of visible module exports and the scope
/// chain in force at each point of the traversal.
pub struct Resolver {
    /// Export scopes keyed by local (possibly aliased) import name.
    modules: HashMap<Ident, Rc<Scope>>,
}

impl Resolver {
    pub fn new(modules: HashMap<Ident, Rc<Scope>>) -> Self {
        Self { modules }
    }

    // ------------------------------------------------------------------
    // Name resolution
    // ------------------------------------------------------------------

    /// What `q` denotes in `scope`: the resolved right-hand side of its
    /// declaration, or why that name is unusable.
    pub fn resolve_name(
        &self,
        scope: &Rc<Scope>,
        q: &QualIdent,
        loc: &Loc,
    ) -> Result<DeclarationRhs, ResolveErrors> {
        match q {
            QualIdent::Qualified(module, name) => {
                let Some(exports) = self.modules.get(module) else {
                    return Err(ResolveError::new(
                        ResolveErrorKind::UnknownModule(q.clone()),
                        loc.clone(),
                    )
                    .into());
                };
                match exports.local(name.as_str()) {
                    // export scopes hold settled cells only
                    Some(cell) => cell.resolved().unwrap_or_else(|| {
                        Err(ResolveError::new(
                            ResolveErrorKind::UnknownImport(q.clone()),
                            loc.clone(),
                        )
                        .into())
                    }),
                    None => {
                        let mut error = ResolveError::new(
                            ResolveErrorKind::UnknownImport(q.clone()),
                            loc.clone(),
                        );
                        let candidates = exports.visible_names();
                        if let Some((suggestion, confidence)) =
                            suggestions::find_similar(name.as_str(), &candidates)
                        {
                            error = error.with_suggestion(ErrorSuggestion::DidYouMean {
                                wrong: name.as_str().to_string(),
                                suggestion,
                                confidence,
                            });
                        }
                        Err(error.into())
                    }
                }
            }
            QualIdent::Bare(name) => match Scope::find(scope, name.as_str()) {
                Some((owner, cell)) => self.force(&owner, name, cell),
                None => {
                    let mut error = ResolveError::new(
                        ResolveErrorKind::UnknownLocal(name.clone()),
                        loc.clone(),
                    );
                    let candidates = scope.visible_names();
                    if let Some((suggestion, confidence)) =
                        suggestions::find_similar(name.as_str(), &candidates)
                    {
                        error = error.with_suggestion(ErrorSuggestion::DidYouMean {
                            wrong: name.as_str().to_string(),
                            suggestion,
                            confidence,
                        });
                    }
                    Err(error.into())
                }
            },
        }
    }

    /// Like [`Resolver::resolve_name`], but the name must denote a type.
    pub fn resolve_type_name(
        &self,
        scope: &Rc<Scope>,
        q: &QualIdent,
        loc: &Loc,
    ) -> Result<DeclarationRhs, ResolveErrors> {
        let rhs = self.resolve_name(scope, q, loc)?;
        if rhs.is_type() {
            Ok(rhs)
        } else {
            Err(ResolveError::new(ResolveErrorKind::NotAType(q.clone()), loc.clone()).into())
        }
    }

    /// Settle a binding cell: resolve its right-hand side against the scope
    /// that owns it, remembering the outcome. A cell reached while its own
    /// right-hand side is being resolved answers with its reference form —
    /// types and procedures recurse legally; a constant's value may not
    /// require itself.
    fn force(
        &self,
        owner: &Rc<Scope>,
        name: &Ident,
        cell: &BindingCell,
    ) -> Result<DeclarationRhs, ResolveErrors> {
        if let Some(settled) = cell.resolved() {
            return settled;
        }
        match cell.begin() {
            Some(pending) => {
                let result = self.resolve_pending(owner, cell.kind(), pending);
                cell.finish(result.clone());
                result
            }
            None => match cell.kind() {
                DeclKind::Constant => Err(ResolveError::new(
                    ResolveErrorKind::CircularConstant(name.clone()),
                    cell.loc().clone(),
                )
                .into()),
                DeclKind::Type => Ok(DeclarationRhs::Type(self_reference(name, cell.loc()))),
                DeclKind::Variable => {
                    Ok(DeclarationRhs::Variable(self_reference(name, cell.loc())))
                }
                DeclKind::Procedure { builtin } => Ok(DeclarationRhs::Procedure {
                    builtin,
                    params: None,
                }),
            },
        }
    }

    fn resolve_pending(
        &self,
        owner: &Rc<Scope>,
        kind: DeclKind,
        pending: PendingRhs,
    ) -> Result<DeclarationRhs, ResolveErrors> {
        match pending {
            PendingRhs::Constant(value) => self
                .resolve_expression(owner, ResolutionState::Declaration, &value)
                .map(|(value, _)| DeclarationRhs::Constant(Rc::new(value))),
            PendingRhs::Type(ty) => self
                .resolve_type(owner, &ty)
                .map(|ty| DeclarationRhs::Type(Rc::new(ty))),
            PendingRhs::Variable(ty) => self
                .resolve_type(owner, &ty)
                .map(|ty| DeclarationRhs::Variable(Rc::new(ty))),
            PendingRhs::Procedure(params) => {
                let builtin = matches!(kind, DeclKind::Procedure { builtin: true });
                let params = match params {
                    Some(params) => Some(Rc::new(self.resolve_formal_parameters(owner, &params)?)),
                    None => None,
                };
                Ok(DeclarationRhs::Procedure { builtin, params })
            }
        }
    }

    // ------------------------------------------------------------------
    // Scope construction
    // ------------------------------------------------------------------

    /// Build the scope a declaration list introduces over `outer`, and
    /// settle every binding in it. The returned errors are the registration
    /// failures (duplicate names); failures inside right-hand sides stay in
    /// their cells and are reported where the declarations are traversed.
    pub fn local_scope(
        &self,
        module_name: &str,
        declarations: &[Node<ast::Declaration>],
        outer: Rc<Scope>,
    ) -> (Rc<Scope>, ResolveErrors) {
        let builtin = module_name == SYSTEM_MODULE;
        let mut bindings: HashMap<Ident, BindingCell> = HashMap::new();
        let mut errors = ResolveErrors::new();

        for node in declarations {
            for (name, cell) in declaration_bindings(node.alternatives.first(), builtin, &node.loc)
            {
                match bindings.entry(name) {
                    Entry::Occupied(mut slot) => {
                        let error = ResolveError::new(
                            ResolveErrorKind::DuplicateBinding(slot.key().clone()),
                            node.loc.clone(),
                        );
                        errors.push(error.clone());
                        let kind = slot.get().kind();
                        slot.insert(BindingCell::failed(kind, node.loc.clone(), error.into()));
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(cell);
                    }
                }
            }
        }

        trace!(bindings = bindings.len(), "constructed scope");
        let scope = Scope::nested(outer, bindings);
        for (name, cell) in scope.local_entries() {
            let _ = self.force(&scope, name, cell);
        }
        (scope, errors)
    }

    // ------------------------------------------------------------------
    // Designators
    // ------------------------------------------------------------------

    fn resolve_designator(
        &self,
        scope: &Rc<Scope>,
        state: ResolutionState,
        node: &Node<ast::Designator>,
    ) -> Result<Placed<resolved::Designator>, ResolveErrors> {
        if let Some(alt) = node.alternatives.only() {
            return self
                .designator_alternative(scope, state, alt, &node.loc)
                .map(|d| Placed::new(node.loc.clone(), d));
        }
        let mut oks = Vec::new();
        let mut errors = ResolveErrors::new();
        for alt in node.alternatives.iter() {
            match self.designator_alternative(scope, state, alt, &node.loc) {
                Ok(d) => oks.push(d),
                Err(e) => errors.extend(e),
            }
        }
        choose(
            &node.loc,
            oks,
            errors,
            None,
            ResolveErrorKind::AmbiguousDesignator,
        )
        .map(|d| Placed::new(node.loc.clone(), d))
    }

    fn designator_alternative(
        &self,
        scope: &Rc<Scope>,
        state: ResolutionState,
        alt: &ast::Designator,
        loc: &Loc,
    ) -> Result<resolved::Designator, ResolveErrors> {
        match alt {
            ast::Designator::Variable(q) => {
                let rhs = self.resolve_name(scope, q, loc)?;
                if rhs.is_type() && state != ResolutionState::ExpressionOrType {
                    return Err(ResolveError::new(
                        ResolveErrorKind::NotAValue(q.clone()),
                        loc.clone(),
                    )
                    .into());
                }
                Ok(resolved::Designator::Variable(q.clone()))
            }
            ast::Designator::Field { record, field } => {
                let record = self.resolve_designator(scope, state, record)?;
                Ok(resolved::Designator::Field {
                    record: Box::new(record),
                    field: field.clone(),
                })
            }
            ast::Designator::Index { array, indexes } => {
                let array = self.resolve_designator(scope, state, array)?;
                let mut out = Vec::new();
                for index in indexes {
                    let (index, _) =
                        self.resolve_expression(scope, ResolutionState::Expression, index)?;
                    out.push(index);
                }
                Ok(resolved::Designator::Index {
                    array: Box::new(array),
                    indexes: out,
                })
            }
            ast::Designator::TypeGuard { scrutinee, ty } => {
                let scrutinee = self.resolve_record(scope, state, scrutinee)?;
                self.resolve_type_name(scope, ty, loc)?;
                Ok(resolved::Designator::TypeGuard {
                    scrutinee: Box::new(scrutinee),
                    ty: ty.clone(),
                })
            }
            ast::Designator::Dereference(pointer) => {
                let pointer = self.resolve_designator(scope, state, pointer)?;
                Ok(resolved::Designator::Dereference(Box::new(pointer)))
            }
        }
    }

    /// Resolve a designator that must denote a record-valued location, the
    /// scrutinee of a type guard. Type names are value errors here even
    /// under `ExpressionOrType`, and procedures are no records at all.
    fn resolve_record(
        &self,
        scope: &Rc<Scope>,
        state: ResolutionState,
        node: &Node<ast::Designator>,
    ) -> Result<Placed<resolved::Designator>, ResolveErrors> {
        if let Some(alt) = node.alternatives.only() {
            return self
                .record_alternative(scope, state, alt, &node.loc)
                .map(|d| Placed::new(node.loc.clone(), d));
        }
        let mut oks = Vec::new();
        let mut errors = ResolveErrors::new();
        for alt in node.alternatives.iter() {
            match self.record_alternative(scope, state, alt, &node.loc) {
                Ok(d) => oks.push(d),
                Err(e) => errors.extend(e),
            }
        }
        choose(
            &node.loc,
            oks,
            errors,
            Some(ResolveErrorKind::InvalidRecord),
            ResolveErrorKind::AmbiguousRecord,
        )
        .map(|d| Placed::new(node.loc.clone(), d))
    }

    fn record_alternative(
        &self,
        scope: &Rc<Scope>,
        state: ResolutionState,
        alt: &ast::Designator,
        loc: &Loc,
    ) -> Result<resolved::Designator, ResolveErrors> {
        match alt {
            ast::Designator::Variable(q) => {
                let rhs = self.resolve_name(scope, q, loc)?;
                if rhs.is_type() {
                    Err(
                        ResolveError::new(ResolveErrorKind::NotAValue(q.clone()), loc.clone())
                            .into(),
                    )
                } else if rhs.is_procedure() {
                    Err(
                        ResolveError::new(ResolveErrorKind::NotARecord(q.clone()), loc.clone())
                            .into(),
                    )
                } else {
                    Ok(resolved::Designator::Variable(q.clone()))
                }
            }
            other => self.designator_alternative(scope, state, other, loc),
        }
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn resolve_expression(
        &self,
        scope: &Rc<Scope>,
        state: ResolutionState,
        node: &Node<ast::Expression>,
    ) -> Result<(Placed<resolved::Expression>, ResolutionState), ResolveErrors> {
        if let Some(alt) = node.alternatives.only() {
            let (expr, state) = self.expression_alternative(scope, state, alt, &node.loc)?;
            return Ok((Placed::new(node.loc.clone(), expr), state));
        }
        let mut oks = Vec::new();
        let mut errors = ResolveErrors::new();
        for alt in node.alternatives.iter() {
            match self.expression_alternative(scope, state, alt, &node.loc) {
                Ok(x) => oks.push(x),
                Err(e) => errors.extend(e),
            }
        }
        let mut iter = oks.into_iter();
        match (iter.next(), iter.next()) {
            (Some((expr, state)), None) => Ok((Placed::new(node.loc.clone(), expr), state)),
            (None, _) => Err(ResolveError::new(
                ResolveErrorKind::InvalidExpression(errors),
                node.loc.clone(),
            )
            .into()),
            (Some(first), Some(second)) => {
                let mut survivors = vec![first.0, second.0];
                survivors.extend(iter.map(|(expr, _)| expr));
                Err(ResolveError::new(
                    ResolveErrorKind::AmbiguousExpression(survivors),
                    node.loc.clone(),
                )
                .into())
            }
        }
    }

    fn expression_alternative(
        &self,
        scope: &Rc<Scope>,
        state: ResolutionState,
        alt: &ast::Expression,
        loc: &Loc,
    ) -> Result<(resolved::Expression, ResolutionState), ResolveErrors> {
        match alt {
            ast::Expression::Read(designator) => {
                let designator = self.resolve_designator(scope, state, designator)?;
                Ok((resolved::Expression::Read(Box::new(designator)), state))
            }
            ast::Expression::FunctionCall { function, args } => {
                let function = self.resolve_designator(scope, state, function)?;
                // SIZE(INTEGER) and friends: a bare callee naming a builtin
                // procedure admits type arguments
                let arg_state = match &function.node {
                    resolved::Designator::Variable(q) => {
                        match self.resolve_name(scope, q, &function.loc) {
                            Ok(rhs) if rhs.is_builtin_procedure() => {
                                ResolutionState::ExpressionOrType
                            }
                            _ => ResolutionState::Expression,
                        }
                    }
                    _ => ResolutionState::Expression,
                };
                let mut out = Vec::new();
                let mut errors = ResolveErrors::new();
                for arg in args {
                    match self.resolve_expression(scope, arg_state, arg) {
                        Ok((arg, _)) => out.push(arg),
                        Err(e) => errors.extend(e),
                    }
                }
                if !errors.is_empty() {
                    return Err(ResolveError::new(
                        ResolveErrorKind::InvalidFunctionParameters(errors),
                        loc.clone(),
                    )
                    .into());
                }
                Ok((
                    resolved::Expression::FunctionCall {
                        function: Box::new(function),
                        args: out,
                    },
                    arg_state,
                ))
            }
            ast::Expression::Is { scrutinee, ty } => {
                let (scrutinee, _) = self.resolve_expression(scope, state, scrutinee)?;
                self.resolve_type_name(scope, ty, loc)?;
                Ok((
                    resolved::Expression::Is {
                        scrutinee: Box::new(scrutinee),
                        ty: ty.clone(),
                    },
                    state,
                ))
            }
            ast::Expression::Binary { op, lhs, rhs } => {
                let (lhs, _) = self.resolve_expression(scope, state, lhs)?;
                let (rhs, _) = self.resolve_expression(scope, state, rhs)?;
                Ok((
                    resolved::Expression::Binary {
                        op: *op,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    },
                    state,
                ))
            }
            ast::Expression::Unary { op, operand } => {
                let (operand, _) = self.resolve_expression(scope, state, operand)?;
                Ok((
                    resolved::Expression::Unary {
                        op: *op,
                        operand: Box::new(operand),
                    },
                    state,
                ))
            }
            ast::Expression::Set(elements) => {
                let mut out = Vec::new();
                for element in elements {
                    out.push(match element {
                        ast::SetElement::Single(e) => {
                            let (e, _) = self.resolve_expression(scope, state, e)?;
                            resolved::SetElement::Single(e)
                        }
                        ast::SetElement::Range(lo, hi) => {
                            let (lo, _) = self.resolve_expression(scope, state, lo)?;
                            let (hi, _) = self.resolve_expression(scope, state, hi)?;
                            resolved::SetElement::Range(lo, hi)
                        }
                    });
                }
                Ok((resolved::Expression::Set(out), state))
            }
            ast::Expression::Literal(literal) => {
                Ok((resolved::Expression::Literal(literal.clone()), state))
            }
        }
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn resolve_statements(
        &self,
        scope: &Rc<Scope>,
        statements: &[Node<ast::Statement>],
    ) -> Result<Vec<Placed<resolved::Statement>>, ResolveErrors> {
        let mut out = Vec::new();
        let mut errors = ResolveErrors::new();
        for statement in statements {
            match self.resolve_statement(scope, statement) {
                Ok(s) => out.push(s),
                Err(e) => errors.extend(e),
            }
        }
        errors.into_result(out)
    }

    fn resolve_statement(
        &self,
        scope: &Rc<Scope>,
        node: &Node<ast::Statement>,
    ) -> Result<Placed<resolved::Statement>, ResolveErrors> {
        if let Some(alt) = node.alternatives.only() {
            return self
                .statement_alternative(scope, alt, &node.loc)
                .map(|s| Placed::new(node.loc.clone(), s));
        }
        let mut oks = Vec::new();
        let mut errors = ResolveErrors::new();
        for alt in node.alternatives.iter() {
            match self.statement_alternative(scope, alt, &node.loc) {
                Ok(s) => oks.push(s),
                Err(e) => errors.extend(e),
            }
        }
        choose(
            &node.loc,
            oks,
            errors,
            Some(ResolveErrorKind::InvalidStatement),
            ResolveErrorKind::AmbiguousStatement,
        )
        .map(|s| Placed::new(node.loc.clone(), s))
    }

    fn statement_alternative(
        &self,
        scope: &Rc<Scope>,
        alt: &ast::Statement,
        loc: &Loc,
    ) -> Result<resolved::Statement, ResolveErrors> {
        match alt {
            ast::Statement::Assignment { target, value } => {
                let target = self.resolve_designator(scope, ResolutionState::Expression, target)?;
                let (value, _) =
                    self.resolve_expression(scope, ResolutionState::Expression, value)?;
                Ok(resolved::Statement::Assignment { target, value })
            }
            ast::Statement::ProcedureCall { procedure, args } => {
                let procedure =
                    self.resolve_designator(scope, ResolutionState::Statement, procedure)?;
                let args = match args {
                    Some(args) => {
                        let mut out = Vec::new();
                        for arg in args {
                            let (arg, _) =
                                self.resolve_expression(scope, ResolutionState::Expression, arg)?;
                            out.push(arg);
                        }
                        Some(out)
                    }
                    None => None,
                };
                Ok(resolved::Statement::ProcedureCall { procedure, args })
            }
            ast::Statement::If {
                branches,
                else_branch,
            } => {
                let mut out = Vec::new();
                for (condition, body) in branches {
                    let (condition, _) =
                        self.resolve_expression(scope, ResolutionState::Expression, condition)?;
                    let body = self.resolve_statements(scope, body)?;
                    out.push((condition, body));
                }
                let else_branch = match else_branch {
                    Some(body) => Some(self.resolve_statements(scope, body)?),
                    None => None,
                };
                Ok(resolved::Statement::If {
                    branches: out,
                    else_branch,
                })
            }
            ast::Statement::Case {
                scrutinee,
                arms,
                else_branch,
            } => {
                let (scrutinee, _) =
                    self.resolve_expression(scope, ResolutionState::Expression, scrutinee)?;
                let mut out = Vec::new();
                for arm in arms {
                    let mut labels = Vec::new();
                    for label in &arm.labels {
                        labels.push(match label {
                            ast::CaseLabel::Single(e) => {
                                let (e, _) = self.resolve_expression(
                                    scope,
                                    ResolutionState::Expression,
                                    e,
                                )?;
                                resolved::CaseLabel::Single(e)
                            }
                            ast::CaseLabel::Range(lo, hi) => {
                                let (lo, _) = self.resolve_expression(
                                    scope,
                                    ResolutionState::Expression,
                                    lo,
                                )?;
                                let (hi, _) = self.resolve_expression(
                                    scope,
                                    ResolutionState::Expression,
                                    hi,
                                )?;
                                resolved::CaseLabel::Range(lo, hi)
                            }
                        });
                    }
                    let body = self.resolve_statements(scope, &arm.body)?;
                    out.push(resolved::CaseArm {
                        loc: arm.loc.clone(),
                        labels,
                        body,
                    });
                }
                let else_branch = match else_branch {
                    Some(body) => Some(self.resolve_statements(scope, body)?),
                    None => None,
                };
                Ok(resolved::Statement::Case {
                    scrutinee,
                    arms: out,
                    else_branch,
                })
            }
            ast::Statement::While { condition, body } => {
                let (condition, _) =
                    self.resolve_expression(scope, ResolutionState::Expression, condition)?;
                let body = self.resolve_statements(scope, body)?;
                Ok(resolved::Statement::While { condition, body })
            }
            ast::Statement::Repeat { body, condition } => {
                let body = self.resolve_statements(scope, body)?;
                let (condition, _) =
                    self.resolve_expression(scope, ResolutionState::Expression, condition)?;
                Ok(resolved::Statement::Repeat { body, condition })
            }
            ast::Statement::For {
                control,
                from,
                to,
                by,
                body,
            } => {
                let rhs = self.resolve_name(scope, &QualIdent::Bare(control.clone()), loc)?;
                if rhs.is_type() {
                    return Err(ResolveError::new(
                        ResolveErrorKind::NotAValue(QualIdent::Bare(control.clone())),
                        loc.clone(),
                    )
                    .into());
                }
                let (from, _) = self.resolve_expression(scope, ResolutionState::Expression, from)?;
                let (to, _) = self.resolve_expression(scope, ResolutionState::Expression, to)?;
                let by = match by {
                    Some(by) => {
                        Some(self.resolve_expression(scope, ResolutionState::Expression, by)?.0)
                    }
                    None => None,
                };
                let body = self.resolve_statements(scope, body)?;
                Ok(resolved::Statement::For {
                    control: control.clone(),
                    from,
                    to,
                    by,
                    body,
                })
            }
            ast::Statement::Loop { body } => {
                let body = self.resolve_statements(scope, body)?;
                Ok(resolved::Statement::Loop { body })
            }
            ast::Statement::With {
                alternatives,
                else_branch,
            } => {
                let mut out = Vec::new();
                for alternative in alternatives {
                    let rhs = self.resolve_name(scope, &alternative.scrutinee, &alternative.loc)?;
                    if rhs.is_type() {
                        return Err(ResolveError::new(
                            ResolveErrorKind::NotAValue(alternative.scrutinee.clone()),
                            alternative.loc.clone(),
                        )
                        .into());
                    }
                    if rhs.is_procedure() {
                        return Err(ResolveError::new(
                            ResolveErrorKind::NotARecord(alternative.scrutinee.clone()),
                            alternative.loc.clone(),
                        )
                        .into());
                    }
                    self.resolve_type_name(scope, &alternative.ty, &alternative.loc)?;
                    let body = self.resolve_statements(scope, &alternative.body)?;
                    out.push(resolved::WithAlternative {
                        loc: alternative.loc.clone(),
                        scrutinee: alternative.scrutinee.clone(),
                        ty: alternative.ty.clone(),
                        body,
                    });
                }
                let else_branch = match else_branch {
                    Some(body) => Some(self.resolve_statements(scope, body)?),
                    None => None,
                };
                Ok(resolved::Statement::With {
                    alternatives: out,
                    else_branch,
                })
            }
            ast::Statement::Exit => Ok(resolved::Statement::Exit),
            ast::Statement::Return(value) => {
                let value = match value {
                    Some(value) => Some(
                        self.resolve_expression(scope, ResolutionState::Expression, value)?
                            .0,
                    ),
                    None => None,
                };
                Ok(resolved::Statement::Return(value))
            }
        }
    }

    // ------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------

    fn resolve_declaration(
        &self,
        scope: &Rc<Scope>,
        state: ResolutionState,
        node: &Node<ast::Declaration>,
    ) -> Result<Placed<resolved::Declaration>, ResolveErrors> {
        if let Some(alt) = node.alternatives.only() {
            return self
                .declaration_alternative(scope, state, alt, &node.loc)
                .map(|d| Placed::new(node.loc.clone(), d));
        }
        let mut oks = Vec::new();
        let mut errors = ResolveErrors::new();
        for alt in node.alternatives.iter() {
            match self.declaration_alternative(scope, state, alt, &node.loc) {
                Ok(d) => oks.push(d),
                Err(e) => errors.extend(e),
            }
        }
        choose(
            &node.loc,
            oks,
            errors,
            None,
            ResolveErrorKind::AmbiguousDeclaration,
        )
        .map(|d| Placed::new(node.loc.clone(), d))
    }

    fn declaration_alternative(
        &self,
        scope: &Rc<Scope>,
        state: ResolutionState,
        alt: &ast::Declaration,
        _loc: &Loc,
    ) -> Result<resolved::Declaration, ResolveErrors> {
        match alt {
            ast::Declaration::Constant { name, value } => {
                let (value, _) = self.resolve_expression(scope, state, value)?;
                Ok(resolved::Declaration::Constant {
                    name: name.clone(),
                    value,
                })
            }
            ast::Declaration::TypeDef { name, ty } => {
                let ty = self.resolve_type(scope, ty)?;
                Ok(resolved::Declaration::TypeDef {
                    name: name.clone(),
                    ty,
                })
            }
            ast::Declaration::Variables { names, ty } => {
                let ty = self.resolve_type(scope, ty)?;
                Ok(resolved::Declaration::Variables {
                    names: names.clone(),
                    ty,
                })
            }
            ast::Declaration::Procedure { heading, body } => {
                let (heading, bindings) = self.resolve_heading(scope, heading)?;
                let heading_scope = Scope::nested(Rc::clone(scope), bindings);
                let body = self.resolve_procedure_body(&heading_scope, body)?;
                Ok(resolved::Declaration::Procedure { heading, body })
            }
            ast::Declaration::Forward { name, params } => {
                let params = match params {
                    Some(params) => Some(self.resolve_formal_parameters(scope, params)?),
                    None => None,
                };
                Ok(resolved::Declaration::Forward {
                    name: name.clone(),
                    params,
                })
            }
        }
    }

    /// Resolve a procedure heading and produce the bindings it contributes
    /// to the procedure's scope: one variable per formal parameter, plus the
    /// receiver for a type-bound procedure.
    fn resolve_heading(
        &self,
        scope: &Rc<Scope>,
        node: &Node<ast::ProcedureHeading>,
    ) -> Result<(Placed<resolved::ProcedureHeading>, HashMap<Ident, BindingCell>), ResolveErrors>
    {
        if let Some(alt) = node.alternatives.only() {
            return self
                .heading_alternative(scope, alt, &node.loc)
                .map(|(h, b)| (Placed::new(node.loc.clone(), h), b));
        }
        let mut oks = Vec::new();
        let mut errors = ResolveErrors::new();
        for alt in node.alternatives.iter() {
            match self.heading_alternative(scope, alt, &node.loc) {
                Ok(x) => oks.push(x),
                Err(e) => errors.extend(e),
            }
        }
        let mut iter = oks.into_iter();
        match (iter.next(), iter.next()) {
            (Some((heading, bindings)), None) => {
                Ok((Placed::new(node.loc.clone(), heading), bindings))
            }
            (None, _) => Err(errors),
            (Some(_), Some(_)) => Err(ResolveError::new(
                ResolveErrorKind::AmbiguousParses,
                node.loc.clone(),
            )
            .into()),
        }
    }

    fn heading_alternative(
        &self,
        scope: &Rc<Scope>,
        alt: &ast::ProcedureHeading,
        loc: &Loc,
    ) -> Result<(resolved::ProcedureHeading, HashMap<Ident, BindingCell>), ResolveErrors> {
        let mut errors = ResolveErrors::new();
        let mut bindings = HashMap::new();

        if let Some(receiver) = &alt.receiver {
            let ty = QualIdent::Bare(receiver.ty.clone());
            match self.resolve_type_name(scope, &ty, loc) {
                Ok(_) => {
                    bindings.insert(
                        receiver.name.clone(),
                        BindingCell::done(
                            DeclKind::Variable,
                            loc.clone(),
                            DeclarationRhs::Variable(Rc::new(Placed::new(
                                loc.clone(),
                                resolved::Type::Reference(ty),
                            ))),
                        ),
                    );
                }
                Err(e) => errors.extend(e),
            }
        }

        let params = match &alt.params {
            Some(params) => match self.resolve_formal_parameters(scope, params) {
                Ok(params) => Some(params),
                Err(e) => {
                    errors.extend(e);
                    None
                }
            },
            None => None,
        };

        if let Some(params) = &params {
            for section in &params.node.sections {
                let ty = Rc::new(section.ty.clone());
                for name in &section.names {
                    let cell = BindingCell::done(
                        DeclKind::Variable,
                        params.loc.clone(),
                        DeclarationRhs::Variable(Rc::clone(&ty)),
                    );
                    if bindings.insert(name.clone(), cell).is_some() {
                        errors.push(ResolveError::new(
                            ResolveErrorKind::DuplicateBinding(name.clone()),
                            params.loc.clone(),
                        ));
                    }
                }
            }
        }

        errors.into_result((
            resolved::ProcedureHeading {
                receiver: alt.receiver.clone(),
                name: alt.name.clone(),
                params,
            },
            bindings,
        ))
    }

    fn resolve_procedure_body(
        &self,
        outer: &Rc<Scope>,
        node: &Node<ast::ProcedureBody>,
    ) -> Result<Placed<resolved::ProcedureBody>, ResolveErrors> {
        let Some(alt) = node.alternatives.only() else {
            return Err(
                ResolveError::new(ResolveErrorKind::AmbiguousParses, node.loc.clone()).into(),
            );
        };
        let mut errors = ResolveErrors::new();
        let (inner, registration_errors) =
            self.local_scope("", &alt.declarations, Rc::clone(outer));
        errors.extend(registration_errors);

        let mut declarations = Vec::new();
        for declaration in &alt.declarations {
            match self.resolve_declaration(&inner, ResolutionState::Declaration, declaration) {
                Ok(d) => declarations.push(d),
                Err(e) => errors.extend(e),
            }
        }
        let statements = match &alt.statements {
            Some(statements) => match self.resolve_statements(&inner, statements) {
                Ok(s) => Some(s),
                Err(e) => {
                    errors.extend(e);
                    None
                }
            },
            None => None,
        };
        errors.into_result(Placed::new(
            node.loc.clone(),
            resolved::ProcedureBody {
                declarations,
                statements,
            },
        ))
    }

    // ------------------------------------------------------------------
    // Types and formal parameters
    // ------------------------------------------------------------------

    fn resolve_type(
        &self,
        scope: &Rc<Scope>,
        node: &Node<ast::Type>,
    ) -> Result<Placed<resolved::Type>, ResolveErrors> {
        let Some(alt) = node.alternatives.only() else {
            return Err(
                ResolveError::new(ResolveErrorKind::AmbiguousParses, node.loc.clone()).into(),
            );
        };
        let ty = self.type_alternative(scope, alt, &node.loc)?;
        Ok(Placed::new(node.loc.clone(), ty))
    }

    fn type_alternative(
        &self,
        scope: &Rc<Scope>,
        alt: &ast::Type,
        loc: &Loc,
    ) -> Result<resolved::Type, ResolveErrors> {
        match alt {
            ast::Type::Reference(q) => {
                self.resolve_type_name(scope, q, loc)?;
                Ok(resolved::Type::Reference(q.clone()))
            }
            ast::Type::Array {
                dimensions,
                element,
            } => {
                let mut out = Vec::new();
                for dimension in dimensions {
                    let (dimension, _) =
                        self.resolve_expression(scope, ResolutionState::Declaration, dimension)?;
                    out.push(dimension);
                }
                let element = self.resolve_type(scope, element)?;
                Ok(resolved::Type::Array {
                    dimensions: out,
                    element: Box::new(element),
                })
            }
            ast::Type::Record { base, fields } => {
                if let Some(base) = base {
                    self.resolve_type_name(scope, base, loc)?;
                }
                let mut out = Vec::new();
                for field in fields {
                    let ty = self.resolve_type(scope, &field.ty)?;
                    out.push(resolved::FieldList {
                        names: field.names.clone(),
                        ty,
                    });
                }
                Ok(resolved::Type::Record {
                    base: base.clone(),
                    fields: out,
                })
            }
            ast::Type::Pointer(target) => {
                let target = self.resolve_type(scope, target)?;
                Ok(resolved::Type::Pointer(Box::new(target)))
            }
            ast::Type::Procedure(params) => {
                let params = match params {
                    Some(params) => Some(self.resolve_formal_parameters(scope, params)?),
                    None => None,
                };
                Ok(resolved::Type::Procedure(params))
            }
        }
    }

    fn resolve_formal_parameters(
        &self,
        scope: &Rc<Scope>,
        node: &Node<ast::FormalParameters>,
    ) -> Result<Placed<resolved::FormalParameters>, ResolveErrors> {
        let Some(alt) = node.alternatives.only() else {
            return Err(
                ResolveError::new(ResolveErrorKind::AmbiguousParses, node.loc.clone()).into(),
            );
        };
        let mut sections = Vec::new();
        for section in &alt.sections {
            let ty = self.resolve_type(scope, &section.ty)?;
            sections.push(resolved::FpSection {
                var: section.var,
                names: section.names.clone(),
                ty,
            });
        }
        if let Some(return_type) = &alt.return_type {
            self.resolve_type_name(scope, return_type, &node.loc)?;
        }
        Ok(Placed::new(
            node.loc.clone(),
            resolved::FormalParameters {
                sections,
                return_type: alt.return_type.clone(),
            },
        ))
    }
}

/// Pick the unique surviving interpretation of a site, or turn the outcome
/// into the site's failure: the aggregated errors when nothing survived
/// (wrapped when the production has a wrapper kind), the list of survivors
/// when more than one did.
fn choose<T>(
    loc: &Loc,
    oks: Vec<T>,
    errors: ResolveErrors,
    invalid: Option<fn(ResolveErrors) -> ResolveErrorKind>,
    ambiguous: fn(Vec<T>) -> ResolveErrorKind,
) -> Result<T, ResolveErrors> {
    let mut iter = oks.into_iter();
    match (iter.next(), iter.next()) {
        (Some(only), None) => Ok(only),
        (None, _) => match invalid {
            Some(wrap) => Err(ResolveError::new(wrap(errors), loc.clone()).into()),
            None => Err(errors),
        },
        (Some(first), Some(second)) => {
            let mut survivors = vec![first, second];
            survivors.extend(iter);
            Err(ResolveError::new(ambiguous(survivors), loc.clone()).into())
        }
    }
}

fn self_reference(name: &Ident, loc: &Loc) -> Rc<Placed<resolved::Type>> {
    Rc::new(Placed::new(
        loc.clone(),
        resolved::Type::Reference(QualIdent::Bare(name.clone())),
    ))
}

/// The bindings one declaration contributes to its scope. For an ambiguous
/// declaration site the names come from the first reading; the readings the
/// upstream grammar produces never disagree on them.
fn declaration_bindings(
    decl: &ast::Declaration,
    builtin: bool,
    loc: &Loc,
) -> Vec<(Ident, BindingCell)> {
    match decl {
        ast::Declaration::Constant { name, value } => vec![(
            name.ident.clone(),
            BindingCell::pending(
                DeclKind::Constant,
                loc.clone(),
                PendingRhs::Constant(value.clone()),
            ),
        )],
        ast::Declaration::TypeDef { name, ty } => vec![(
            name.ident.clone(),
            BindingCell::pending(DeclKind::Type, loc.clone(), PendingRhs::Type(ty.clone())),
        )],
        ast::Declaration::Variables { names, ty } => names
            .iter()
            .map(|name| {
                (
                    name.ident.clone(),
                    BindingCell::pending(
                        DeclKind::Variable,
                        loc.clone(),
                        PendingRhs::Variable(ty.clone()),
                    ),
                )
            })
            .collect(),
        ast::Declaration::Procedure { heading, .. } => {
            let heading = heading.alternatives.first();
            vec![(
                heading.name.ident.clone(),
                BindingCell::pending(
                    DeclKind::Procedure { builtin },
                    loc.clone(),
                    PendingRhs::Procedure(heading.params.clone()),
                ),
            )]
        }
        ast::Declaration::Forward { name, params } => vec![(
            name.ident.clone(),
            BindingCell::pending(
                DeclKind::Procedure { builtin: false },
                loc.clone(),
                PendingRhs::Procedure(params.clone()),
            ),
        )],
    }
}

/// Resolve one module against the modules it may import.
///
/// Builds the import map (aliases win over module names, the empty alias
/// binds nothing, collisions are errors), stacks the module's global scope
/// on `predefined`, and traverses declarations and body. On success the
/// result carries the disambiguated tree plus the global and export scopes.
pub fn resolve_module(
    predefined: &Rc<Scope>,
    table: &ModuleTable,
    module: &ast::Module,
) -> Result<ResolvedModule, ResolveErrors> {
    debug!(module = %module.name, "resolving module");
    let mut errors = ResolveErrors::new();

    let mut visible: HashMap<Ident, Rc<Scope>> = HashMap::new();
    for import in &module.imports {
        let key = import
            .alias
            .clone()
            .unwrap_or_else(|| import.module.clone());
        // an import whose alias is the empty name binds nothing
        if key.is_empty() {
            continue;
        }
        if visible.contains_key(&key) {
            errors.push(ResolveError::new(
                ResolveErrorKind::ClashingImports(key.clone()),
                import.loc.clone(),
            ));
            continue;
        }
        let exports = match table.get(&import.module) {
            Some(Ok(resolved)) => Rc::clone(&resolved.exports),
            // a module that failed to resolve exports nothing; its own
            // errors stay keyed under that module
            Some(Err(_)) => Scope::root(HashMap::new()),
            None => {
                errors.push(ResolveError::new(
                    ResolveErrorKind::UnknownModule(QualIdent::Bare(import.module.clone())),
                    import.loc.clone(),
                ));
                continue;
            }
        };
        visible.insert(key, exports);
    }

    let resolver = Resolver::new(visible);
    let (globals, registration_errors) = resolver.local_scope(
        module.name.as_str(),
        &module.declarations,
        Rc::clone(predefined),
    );
    errors.extend(registration_errors);

    let mut declarations = Vec::new();
    for node in &module.declarations {
        match resolver.resolve_declaration(&globals, ResolutionState::Module, node) {
            Ok(declaration) => declarations.push(declaration),
            Err(e) => errors.extend(e),
        }
    }

    let body = match &module.body {
        Some(statements) => match resolver.resolve_statements(&globals, statements) {
            Ok(body) => Some(body),
            Err(e) => {
                errors.extend(e);
                None
            }
        },
        None => None,
    };

    if !errors.is_empty() {
        return Err(errors);
    }

    let exports = exports_of(&globals, &declarations);
    Ok(ResolvedModule {
        module: resolved::Module {
            loc: module.loc.clone(),
            name: module.name.clone(),
            imports: module.imports.clone(),
            declarations,
            body,
        },
        globals,
        exports,
    })
}

/// The subset of a module's global bindings its importers see: everything
/// not marked private.
fn exports_of(
    globals: &Rc<Scope>,
    declarations: &[Placed<resolved::Declaration>],
) -> Rc<Scope> {
    let mut bindings = HashMap::new();
    for declaration in declarations {
        for def in declaration.node.declared_names() {
            if def.access == AccessMode::PrivateOnly {
                continue;
            }
            if let Some(cell) = globals.local(def.ident.as_str())
                && let Some(settled) = cell.resolved()
            {
                let exported = match settled {
                    Ok(rhs) => BindingCell::done(cell.kind(), cell.loc().clone(), rhs),
                    Err(e) => BindingCell::failed(cell.kind(), cell.loc().clone(), e),
                };
                bindings.insert(def.ident.clone(), exported);
            }
        }
    }
    Scope::root(bindings)
}

/// Resolve a whole set of modules, dependencies first.
///
/// Each module sees the already-resolved results of the modules it imports.
/// An import cycle is reported on the module whose import closes it; Oberon
/// itself rules cyclic imports out.
pub fn resolve_modules(
    predefined: &Rc<Scope>,
    modules: &HashMap<Ident, ast::Module>,
) -> Result<HashMap<Ident, Rc<ResolvedModule>>, HashMap<Ident, ResolveErrors>> {
    let mut table = ModuleTable::new();
    let mut names: Vec<&Ident> = modules.keys().collect();
    names.sort();
    for name in names {
        let mut visiting = HashSet::new();
        visit(predefined, modules, name, &mut table, &mut visiting);
    }

    let mut succeeded = HashMap::new();
    let mut failed = HashMap::new();
    for (name, result) in table {
        match result {
            Ok(module) => {
                succeeded.insert(name, module);
            }
            Err(errors) => {
                failed.insert(name, errors);
            }
        }
    }
    if failed.is_empty() {
        Ok(succeeded)
    } else {
        Err(failed)
    }
}

fn visit(
    predefined: &Rc<Scope>,
    modules: &HashMap<Ident, ast::Module>,
    name: &Ident,
    table: &mut ModuleTable,
    visiting: &mut HashSet<Ident>,
) {
    if table.contains_key(name) {
        return;
    }
    // imports of modules outside the set are reported at the import site
    let Some(module) = modules.get(name) else {
        return;
    };
    visiting.insert(name.clone());
    for import in &module.imports {
        if table.contains_key(&import.module) || !modules.contains_key(&import.module) {
            continue;
        }
        if visiting.contains(&import.module) {
            let error = ResolveError::new(
                ResolveErrorKind::CircularImport(import.module.clone()),
                import.loc.clone(),
            );
            table.insert(name.clone(), Err(error.into()));
            visiting.remove(name);
            return;
        }
        visit(predefined, modules, &import.module, table, visiting);
    }
    let result = resolve_module(predefined, table, module).map(Rc::new);
    table.insert(name.clone(), result);
    visiting.remove(name);
}
