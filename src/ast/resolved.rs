//! The fully disambiguated syntax tree produced by the resolver.
//!
//! Shapes mirror [`crate::ast::ast`], but every position holds a [`Placed`]
//! node: exactly one interpretation, with its source location.

use crate::ast::{Loc, Placed};

pub use crate::ast::ast::{
    AccessMode, BinaryOp, Ident, IdentDef, Import, Literal, QualIdent, Receiver, UnaryOp,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub loc: Loc,
    pub name: Ident,
    pub imports: Vec<Import>,
    pub declarations: Vec<Placed<Declaration>>,
    pub body: Option<Vec<Placed<Statement>>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    Constant {
        name: IdentDef,
        value: Placed<Expression>,
    },
    TypeDef {
        name: IdentDef,
        ty: Placed<Type>,
    },
    Variables {
        names: Vec<IdentDef>,
        ty: Placed<Type>,
    },
    Procedure {
        heading: Placed<ProcedureHeading>,
        body: Placed<ProcedureBody>,
    },
    Forward {
        name: IdentDef,
        params: Option<Placed<FormalParameters>>,
    },
}

impl Declaration {
    /// The defining occurrences this declaration introduces.
    pub fn declared_names(&self) -> Vec<&IdentDef> {
        match self {
            Declaration::Constant { name, .. }
            | Declaration::TypeDef { name, .. }
            | Declaration::Forward { name, .. } => vec![name],
            Declaration::Variables { names, .. } => names.iter().collect(),
            Declaration::Procedure { heading, .. } => vec![&heading.node.name],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcedureHeading {
    pub receiver: Option<Receiver>,
    pub name: IdentDef,
    pub params: Option<Placed<FormalParameters>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcedureBody {
    pub declarations: Vec<Placed<Declaration>>,
    pub statements: Option<Vec<Placed<Statement>>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormalParameters {
    pub sections: Vec<FpSection>,
    pub return_type: Option<QualIdent>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FpSection {
    pub var: bool,
    pub names: Vec<Ident>,
    pub ty: Placed<Type>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Reference(QualIdent),
    Array {
        dimensions: Vec<Placed<Expression>>,
        element: Box<Placed<Type>>,
    },
    Record {
        base: Option<QualIdent>,
        fields: Vec<FieldList>,
    },
    Pointer(Box<Placed<Type>>),
    Procedure(Option<Placed<FormalParameters>>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldList {
    pub names: Vec<IdentDef>,
    pub ty: Placed<Type>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Assignment {
        target: Placed<Designator>,
        value: Placed<Expression>,
    },
    ProcedureCall {
        procedure: Placed<Designator>,
        args: Option<Vec<Placed<Expression>>>,
    },
    If {
        branches: Vec<(Placed<Expression>, Vec<Placed<Statement>>)>,
        else_branch: Option<Vec<Placed<Statement>>>,
    },
    Case {
        scrutinee: Placed<Expression>,
        arms: Vec<CaseArm>,
        else_branch: Option<Vec<Placed<Statement>>>,
    },
    While {
        condition: Placed<Expression>,
        body: Vec<Placed<Statement>>,
    },
    Repeat {
        body: Vec<Placed<Statement>>,
        condition: Placed<Expression>,
    },
    For {
        control: Ident,
        from: Placed<Expression>,
        to: Placed<Expression>,
        by: Option<Placed<Expression>>,
        body: Vec<Placed<Statement>>,
    },
    Loop {
        body: Vec<Placed<Statement>>,
    },
    With {
        alternatives: Vec<WithAlternative>,
        else_branch: Option<Vec<Placed<Statement>>>,
    },
    Exit,
    Return(Option<Placed<Expression>>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct WithAlternative {
    pub loc: Loc,
    pub scrutinee: QualIdent,
    pub ty: QualIdent,
    pub body: Vec<Placed<Statement>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseArm {
    pub loc: Loc,
    pub labels: Vec<CaseLabel>,
    pub body: Vec<Placed<Statement>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CaseLabel {
    Single(Placed<Expression>),
    Range(Placed<Expression>, Placed<Expression>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Read(Box<Placed<Designator>>),
    FunctionCall {
        function: Box<Placed<Designator>>,
        args: Vec<Placed<Expression>>,
    },
    Is {
        scrutinee: Box<Placed<Expression>>,
        ty: QualIdent,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Placed<Expression>>,
        rhs: Box<Placed<Expression>>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Placed<Expression>>,
    },
    Set(Vec<SetElement>),
    Literal(Literal),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SetElement {
    Single(Placed<Expression>),
    Range(Placed<Expression>, Placed<Expression>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Designator {
    Variable(QualIdent),
    Field {
        record: Box<Placed<Designator>>,
        field: Ident,
    },
    Index {
        array: Box<Placed<Designator>>,
        indexes: Vec<Placed<Expression>>,
    },
    TypeGuard {
        scrutinee: Box<Placed<Designator>>,
        ty: QualIdent,
    },
    Dereference(Box<Placed<Designator>>),
}
