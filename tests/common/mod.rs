//! Builders shared by the integration tests.
//!
//! The resolver consumes trees the parser would normally produce; these
//! helpers spell such trees out by hand, one `Node` per site.

#![allow(dead_code)]

use oberon_resolve::ast::ast::*;
use oberon_resolve::ast::{Ambiguous, Loc, Node, Placed, resolved};
use oberon_resolve::error::{ResolveError, ResolveErrorKind, ResolveErrors};

pub fn l() -> Loc {
    Loc::generated()
}

pub fn at(offset: usize) -> Loc {
    Loc::new(0, offset..offset + 1)
}

pub fn ident(name: &str) -> Ident {
    Ident::new(name)
}

pub fn bare(name: &str) -> QualIdent {
    QualIdent::bare(name)
}

pub fn qual(module: &str, name: &str) -> QualIdent {
    QualIdent::qualified(module, name)
}

pub fn exported(name: &str) -> IdentDef {
    IdentDef::new(name, AccessMode::Exported)
}

pub fn readonly(name: &str) -> IdentDef {
    IdentDef::new(name, AccessMode::ExportedReadOnly)
}

pub fn private(name: &str) -> IdentDef {
    IdentDef::new(name, AccessMode::PrivateOnly)
}

/// A site with two readings.
pub fn ambig<T>(first: T, second: T) -> Node<T> {
    Node::new(l(), Ambiguous::new(first).or(second))
}

// ---------------------------------------------------------------------
// Expressions and designators
// ---------------------------------------------------------------------

pub fn int(value: i64) -> Node<Expression> {
    Node::single(l(), Expression::Literal(Literal::Integer(value)))
}

pub fn var(name: &str) -> Node<Designator> {
    Node::single(l(), Designator::Variable(bare(name)))
}

pub fn var_q(q: QualIdent) -> Node<Designator> {
    Node::single(l(), Designator::Variable(q))
}

pub fn read(designator: Node<Designator>) -> Node<Expression> {
    Node::single(l(), Expression::Read(Box::new(designator)))
}

pub fn call_expr(function: Node<Designator>, args: Vec<Node<Expression>>) -> Node<Expression> {
    Node::single(
        l(),
        Expression::FunctionCall {
            function: Box::new(function),
            args,
        },
    )
}

pub fn binary(op: BinaryOp, lhs: Node<Expression>, rhs: Node<Expression>) -> Node<Expression> {
    Node::single(
        l(),
        Expression::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
    )
}

// ---------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------

pub fn type_ref(name: &str) -> Node<Type> {
    Node::single(l(), Type::Reference(bare(name)))
}

pub fn type_ref_q(q: QualIdent) -> Node<Type> {
    Node::single(l(), Type::Reference(q))
}

pub fn pointer_to(target: Node<Type>) -> Node<Type> {
    Node::single(l(), Type::Pointer(Box::new(target)))
}

pub fn record(fields: Vec<(Vec<IdentDef>, Node<Type>)>) -> Node<Type> {
    Node::single(
        l(),
        Type::Record {
            base: None,
            fields: fields
                .into_iter()
                .map(|(names, ty)| FieldList { names, ty })
                .collect(),
        },
    )
}

// ---------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------

pub fn assign(target: Node<Designator>, value: Node<Expression>) -> Node<Statement> {
    Node::single(l(), Statement::Assignment { target, value })
}

pub fn call_stmt(procedure: Node<Designator>, args: Option<Vec<Node<Expression>>>) -> Node<Statement> {
    Node::single(l(), Statement::ProcedureCall { procedure, args })
}

pub fn if_stmt(condition: Node<Expression>, body: Vec<Node<Statement>>) -> Node<Statement> {
    Node::single(
        l(),
        Statement::If {
            branches: vec![(condition, body)],
            else_branch: None,
        },
    )
}

// ---------------------------------------------------------------------
// Declarations and modules
// ---------------------------------------------------------------------

pub fn const_decl(name: IdentDef, value: Node<Expression>) -> Node<Declaration> {
    Node::single(l(), Declaration::Constant { name, value })
}

pub fn type_decl(name: IdentDef, ty: Node<Type>) -> Node<Declaration> {
    Node::single(l(), Declaration::TypeDef { name, ty })
}

pub fn var_decl(names: Vec<IdentDef>, ty: Node<Type>) -> Node<Declaration> {
    Node::single(l(), Declaration::Variables { names, ty })
}

pub fn fp_section(names: Vec<&str>, ty: Node<Type>) -> FpSection {
    FpSection {
        var: false,
        names: names.into_iter().map(Ident::new).collect(),
        ty,
    }
}

pub fn formal_params(
    sections: Vec<FpSection>,
    return_type: Option<QualIdent>,
) -> Node<FormalParameters> {
    Node::single(
        l(),
        FormalParameters {
            sections,
            return_type,
        },
    )
}

pub fn proc_decl(
    name: IdentDef,
    params: Option<Node<FormalParameters>>,
    declarations: Vec<Node<Declaration>>,
    statements: Option<Vec<Node<Statement>>>,
) -> Node<Declaration> {
    Node::single(
        l(),
        Declaration::Procedure {
            heading: Node::single(
                l(),
                ProcedureHeading {
                    receiver: None,
                    name,
                    params,
                },
            ),
            body: Node::single(
                l(),
                ProcedureBody {
                    declarations,
                    statements,
                },
            ),
        },
    )
}

pub fn import(module: &str) -> Import {
    Import {
        loc: l(),
        alias: None,
        module: Ident::new(module),
    }
}

pub fn import_as(alias: &str, module: &str) -> Import {
    Import {
        loc: l(),
        alias: Some(Ident::new(alias)),
        module: Ident::new(module),
    }
}

pub fn module(
    name: &str,
    imports: Vec<Import>,
    declarations: Vec<Node<Declaration>>,
    body: Option<Vec<Node<Statement>>>,
) -> Module {
    Module {
        loc: l(),
        name: Ident::new(name),
        imports,
        declarations,
        body,
    }
}

// ---------------------------------------------------------------------
// Error inspection
// ---------------------------------------------------------------------

/// Every error kind in the collection, including those nested inside the
/// aggregating kinds.
pub fn kinds(errors: &ResolveErrors) -> Vec<&ResolveErrorKind> {
    fn walk<'a>(error: &'a ResolveError, out: &mut Vec<&'a ResolveErrorKind>) {
        out.push(&error.kind);
        match &error.kind {
            ResolveErrorKind::InvalidExpression(inner)
            | ResolveErrorKind::InvalidFunctionParameters(inner)
            | ResolveErrorKind::InvalidRecord(inner)
            | ResolveErrorKind::InvalidStatement(inner) => {
                for error in &inner.0 {
                    walk(error, out);
                }
            }
            _ => {}
        }
    }
    let mut out = Vec::new();
    for error in &errors.0 {
        walk(error, &mut out);
    }
    out
}

pub fn has_kind(errors: &ResolveErrors, pred: fn(&ResolveErrorKind) -> bool) -> bool {
    kinds(errors).into_iter().any(pred)
}

// ---------------------------------------------------------------------
// Requoting: wrap a resolved tree back into single-reading nodes
// ---------------------------------------------------------------------

pub fn requote(module: &resolved::Module) -> Module {
    Module {
        loc: module.loc.clone(),
        name: module.name.clone(),
        imports: module.imports.clone(),
        declarations: module.declarations.iter().map(requote_declaration).collect(),
        body: module
            .body
            .as_ref()
            .map(|body| body.iter().map(requote_statement).collect()),
    }
}

fn requote_declaration(decl: &Placed<resolved::Declaration>) -> Node<Declaration> {
    let node = match &decl.node {
        resolved::Declaration::Constant { name, value } => Declaration::Constant {
            name: name.clone(),
            value: requote_expression(value),
        },
        resolved::Declaration::TypeDef { name, ty } => Declaration::TypeDef {
            name: name.clone(),
            ty: requote_type(ty),
        },
        resolved::Declaration::Variables { names, ty } => Declaration::Variables {
            names: names.clone(),
            ty: requote_type(ty),
        },
        resolved::Declaration::Procedure { heading, body } => Declaration::Procedure {
            heading: Node::single(
                heading.loc.clone(),
                ProcedureHeading {
                    receiver: heading.node.receiver.clone(),
                    name: heading.node.name.clone(),
                    params: heading.node.params.as_ref().map(requote_params),
                },
            ),
            body: Node::single(
                body.loc.clone(),
                ProcedureBody {
                    declarations: body.node.declarations.iter().map(requote_declaration).collect(),
                    statements: body
                        .node
                        .statements
                        .as_ref()
                        .map(|s| s.iter().map(requote_statement).collect()),
                },
            ),
        },
        resolved::Declaration::Forward { name, params } => Declaration::Forward {
            name: name.clone(),
            params: params.as_ref().map(requote_params),
        },
    };
    Node::single(decl.loc.clone(), node)
}

fn requote_params(params: &Placed<resolved::FormalParameters>) -> Node<FormalParameters> {
    Node::single(
        params.loc.clone(),
        FormalParameters {
            sections: params
                .node
                .sections
                .iter()
                .map(|s| FpSection {
                    var: s.var,
                    names: s.names.clone(),
                    ty: requote_type(&s.ty),
                })
                .collect(),
            return_type: params.node.return_type.clone(),
        },
    )
}

fn requote_type(ty: &Placed<resolved::Type>) -> Node<Type> {
    let node = match &ty.node {
        resolved::Type::Reference(q) => Type::Reference(q.clone()),
        resolved::Type::Array {
            dimensions,
            element,
        } => Type::Array {
            dimensions: dimensions.iter().map(requote_expression).collect(),
            element: Box::new(requote_type(element)),
        },
        resolved::Type::Record { base, fields } => Type::Record {
            base: base.clone(),
            fields: fields
                .iter()
                .map(|f| FieldList {
                    names: f.names.clone(),
                    ty: requote_type(&f.ty),
                })
                .collect(),
        },
        resolved::Type::Pointer(target) => Type::Pointer(Box::new(requote_type(target))),
        resolved::Type::Procedure(params) => {
            Type::Procedure(params.as_ref().map(requote_params))
        }
    };
    Node::single(ty.loc.clone(), node)
}

fn requote_statements(statements: &[Placed<resolved::Statement>]) -> Vec<Node<Statement>> {
    statements.iter().map(requote_statement).collect()
}

fn requote_statement(statement: &Placed<resolved::Statement>) -> Node<Statement> {
    let node = match &statement.node {
        resolved::Statement::Assignment { target, value } => Statement::Assignment {
            target: requote_designator(target),
            value: requote_expression(value),
        },
        resolved::Statement::ProcedureCall { procedure, args } => Statement::ProcedureCall {
            procedure: requote_designator(procedure),
            args: args
                .as_ref()
                .map(|args| args.iter().map(requote_expression).collect()),
        },
        resolved::Statement::If {
            branches,
            else_branch,
        } => Statement::If {
            branches: branches
                .iter()
                .map(|(c, body)| (requote_expression(c), requote_statements(body)))
                .collect(),
            else_branch: else_branch.as_ref().map(|b| requote_statements(b)),
        },
        resolved::Statement::Case {
            scrutinee,
            arms,
            else_branch,
        } => Statement::Case {
            scrutinee: requote_expression(scrutinee),
            arms: arms
                .iter()
                .map(|arm| CaseArm {
                    loc: arm.loc.clone(),
                    labels: arm
                        .labels
                        .iter()
                        .map(|label| match label {
                            resolved::CaseLabel::Single(e) => {
                                CaseLabel::Single(requote_expression(e))
                            }
                            resolved::CaseLabel::Range(lo, hi) => CaseLabel::Range(
                                requote_expression(lo),
                                requote_expression(hi),
                            ),
                        })
                        .collect(),
                    body: requote_statements(&arm.body),
                })
                .collect(),
            else_branch: else_branch.as_ref().map(|b| requote_statements(b)),
        },
        resolved::Statement::While { condition, body } => Statement::While {
            condition: requote_expression(condition),
            body: requote_statements(body),
        },
        resolved::Statement::Repeat { body, condition } => Statement::Repeat {
            body: requote_statements(body),
            condition: requote_expression(condition),
        },
        resolved::Statement::For {
            control,
            from,
            to,
            by,
            body,
        } => Statement::For {
            control: control.clone(),
            from: requote_expression(from),
            to: requote_expression(to),
            by: by.as_ref().map(requote_expression),
            body: requote_statements(body),
        },
        resolved::Statement::Loop { body } => Statement::Loop {
            body: requote_statements(body),
        },
        resolved::Statement::With {
            alternatives,
            else_branch,
        } => Statement::With {
            alternatives: alternatives
                .iter()
                .map(|alt| WithAlternative {
                    loc: alt.loc.clone(),
                    scrutinee: alt.scrutinee.clone(),
                    ty: alt.ty.clone(),
                    body: requote_statements(&alt.body),
                })
                .collect(),
            else_branch: else_branch.as_ref().map(|b| requote_statements(b)),
        },
        resolved::Statement::Exit => Statement::Exit,
        resolved::Statement::Return(value) => {
            Statement::Return(value.as_ref().map(requote_expression))
        }
    };
    Node::single(statement.loc.clone(), node)
}

fn requote_expression(expression: &Placed<resolved::Expression>) -> Node<Expression> {
    let node = match &expression.node {
        resolved::Expression::Read(designator) => {
            Expression::Read(Box::new(requote_designator(designator)))
        }
        resolved::Expression::FunctionCall { function, args } => Expression::FunctionCall {
            function: Box::new(requote_designator(function)),
            args: args.iter().map(requote_expression).collect(),
        },
        resolved::Expression::Is { scrutinee, ty } => Expression::Is {
            scrutinee: Box::new(requote_expression(scrutinee)),
            ty: ty.clone(),
        },
        resolved::Expression::Binary { op, lhs, rhs } => Expression::Binary {
            op: *op,
            lhs: Box::new(requote_expression(lhs)),
            rhs: Box::new(requote_expression(rhs)),
        },
        resolved::Expression::Unary { op, operand } => Expression::Unary {
            op: *op,
            operand: Box::new(requote_expression(operand)),
        },
        resolved::Expression::Set(elements) => Expression::Set(
            elements
                .iter()
                .map(|element| match element {
                    resolved::SetElement::Single(e) => SetElement::Single(requote_expression(e)),
                    resolved::SetElement::Range(lo, hi) => {
                        SetElement::Range(requote_expression(lo), requote_expression(hi))
                    }
                })
                .collect(),
        ),
        resolved::Expression::Literal(literal) => Expression::Literal(literal.clone()),
    };
    Node::single(expression.loc.clone(), node)
}

fn requote_designator(designator: &Placed<resolved::Designator>) -> Node<Designator> {
    let node = match &designator.node {
        resolved::Designator::Variable(q) => Designator::Variable(q.clone()),
        resolved::Designator::Field { record, field } => Designator::Field {
            record: Box::new(requote_designator(record)),
            field: field.clone(),
        },
        resolved::Designator::Index { array, indexes } => Designator::Index {
            array: Box::new(requote_designator(array)),
            indexes: indexes.iter().map(requote_expression).collect(),
        },
        resolved::Designator::TypeGuard { scrutinee, ty } => Designator::TypeGuard {
            scrutinee: Box::new(requote_designator(scrutinee)),
            ty: ty.clone(),
        },
        resolved::Designator::Dereference(pointer) => {
            Designator::Dereference(Box::new(requote_designator(pointer)))
        }
    };
    Node::single(designator.loc.clone(), node)
}
