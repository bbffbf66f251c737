//! The standard environments
//!
//! Every module is resolved against a scope of names that need no import:
//! the basic types, `TRUE` and `FALSE`, and the standard procedures. Oberon
//! and Oberon-2 differ only in the procedure list (`ASSERT`), which is the
//! language seam the [`Language`] trait exposes.
//!
//! The parameter and result types below are placeholders (`ARRAY`,
//! `POINTER`, …) kept as opaque type references; they take part in name
//! resolution only and are never type-checked, so they are deliberately not
//! added to the type scope themselves.

use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::ast::{Ident, QualIdent};
use crate::ast::{Loc, Placed, resolved};

use super::scope::{BindingCell, DeclKind, DeclarationRhs, Scope};

/// Which language variant a front-end resolves for.
pub trait Language {
    /// The scope of names available without any import.
    fn predefined() -> Rc<Scope>;
}

/// The Oberon language as in the 1990 report.
pub struct Oberon;

impl Language for Oberon {
    fn predefined() -> Rc<Scope> {
        predefined()
    }
}

/// The Oberon-2 language.
pub struct Oberon2;

impl Language for Oberon2 {
    fn predefined() -> Rc<Scope> {
        predefined2()
    }
}

fn type_ref(name: &str) -> Rc<Placed<resolved::Type>> {
    Rc::new(Placed::new(
        Loc::generated(),
        resolved::Type::Reference(QualIdent::bare(name)),
    ))
}

fn basic_type(bindings: &mut HashMap<Ident, BindingCell>, name: &str) {
    bindings.insert(
        Ident::new(name),
        BindingCell::done(
            DeclKind::Type,
            Loc::generated(),
            DeclarationRhs::Type(type_ref(name)),
        ),
    );
}

fn constant(bindings: &mut HashMap<Ident, BindingCell>, name: &str) {
    // predefined constants denote themselves
    let value = resolved::Expression::Read(Box::new(Placed::new(
        Loc::generated(),
        resolved::Designator::Variable(QualIdent::bare(name)),
    )));
    bindings.insert(
        Ident::new(name),
        BindingCell::done(
            DeclKind::Constant,
            Loc::generated(),
            DeclarationRhs::Constant(Rc::new(Placed::new(Loc::generated(), value))),
        ),
    );
}

fn procedure(
    bindings: &mut HashMap<Ident, BindingCell>,
    name: &str,
    builtin: bool,
    params: &[(&str, &str)],
    return_type: Option<&str>,
) {
    let sections = params
        .iter()
        .map(|(param, ty)| resolved::FpSection {
            var: false,
            names: vec![Ident::new(*param)],
            ty: Placed::new(
                Loc::generated(),
                resolved::Type::Reference(QualIdent::bare(*ty)),
            ),
        })
        .collect();
    let params = resolved::FormalParameters {
        sections,
        return_type: return_type.map(QualIdent::bare),
    };
    bindings.insert(
        Ident::new(name),
        BindingCell::done(
            DeclKind::Procedure { builtin },
            Loc::generated(),
            DeclarationRhs::Procedure {
                builtin,
                params: Some(Rc::new(Placed::new(Loc::generated(), params))),
            },
        ),
    );
}

fn standard_bindings() -> HashMap<Ident, BindingCell> {
    let mut bindings = HashMap::new();

    for name in [
        "BOOLEAN", "CHAR", "SHORTINT", "INTEGER", "LONGINT", "REAL", "LONGREAL", "SET",
    ] {
        basic_type(&mut bindings, name);
    }

    constant(&mut bindings, "TRUE");
    constant(&mut bindings, "FALSE");

    procedure(&mut bindings, "ABS", false, &[("n", "INTEGER")], Some("INTEGER"));
    procedure(
        &mut bindings,
        "ASH",
        false,
        &[("n", "INTEGER"), ("s", "INTEGER")],
        Some("INTEGER"),
    );
    procedure(&mut bindings, "CAP", false, &[("c", "CHAR")], Some("CHAR"));
    procedure(&mut bindings, "LEN", false, &[("a", "ARRAY")], Some("LONGINT"));
    procedure(&mut bindings, "MAX", true, &[("t", "INTEGER")], Some("INTEGER"));
    procedure(&mut bindings, "MIN", true, &[("t", "INTEGER")], Some("INTEGER"));
    procedure(&mut bindings, "ODD", false, &[("n", "INTEGER")], Some("BOOLEAN"));
    procedure(&mut bindings, "SIZE", true, &[("t", "INTEGER")], Some("INTEGER"));
    procedure(&mut bindings, "ORD", false, &[("c", "CHAR")], Some("INTEGER"));
    procedure(&mut bindings, "CHR", false, &[("n", "INTEGER")], Some("CHAR"));
    procedure(&mut bindings, "SHORT", false, &[("n", "LONGINT")], Some("INTEGER"));
    procedure(&mut bindings, "LONG", false, &[("n", "INTEGER")], Some("LONGINT"));
    procedure(&mut bindings, "ENTIER", false, &[("r", "REAL")], Some("LONGINT"));
    procedure(&mut bindings, "INC", false, &[("v", "INTEGER")], None);
    procedure(&mut bindings, "DEC", false, &[("v", "INTEGER")], None);
    procedure(
        &mut bindings,
        "INCL",
        false,
        &[("s", "SET"), ("n", "INTEGER")],
        None,
    );
    procedure(
        &mut bindings,
        "EXCL",
        false,
        &[("s", "SET"), ("n", "INTEGER")],
        None,
    );
    procedure(
        &mut bindings,
        "COPY",
        false,
        &[("src", "ARRAY"), ("dst", "ARRAY")],
        None,
    );
    procedure(&mut bindings, "NEW", false, &[("p", "POINTER")], None);
    procedure(&mut bindings, "HALT", false, &[("n", "INTEGER")], None);

    bindings
}

/// The names every Oberon module sees without importing anything.
pub fn predefined() -> Rc<Scope> {
    Scope::root(standard_bindings())
}

/// The Oberon-2 environment: Oberon's plus `ASSERT`.
pub fn predefined2() -> Rc<Scope> {
    let mut bindings = standard_bindings();
    procedure(&mut bindings, "ASSERT", false, &[("b", "BOOLEAN")], None);
    Scope::root(bindings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_marked() {
        let scope = predefined();
        for name in ["MAX", "MIN", "SIZE"] {
            let cell = scope.local(name).unwrap();
            assert_eq!(cell.kind(), DeclKind::Procedure { builtin: true });
        }
        let abs = scope.local("ABS").unwrap();
        assert_eq!(abs.kind(), DeclKind::Procedure { builtin: false });
    }

    #[test]
    fn assert_is_oberon2_only() {
        assert!(predefined().local("ASSERT").is_none());
        assert!(predefined2().local("ASSERT").is_some());
        assert!(Oberon2::predefined().local("ASSERT").is_some());
        assert!(Oberon::predefined().local("ASSERT").is_none());
    }

    #[test]
    fn basic_types_resolve_to_themselves() {
        let scope = predefined();
        let cell = scope.local("INTEGER").unwrap();
        match cell.resolved().unwrap().unwrap() {
            DeclarationRhs::Type(ty) => {
                assert_eq!(
                    ty.node,
                    resolved::Type::Reference(QualIdent::bare("INTEGER"))
                );
            }
            other => panic!("expected a type binding, got {other:?}"),
        }
    }
}
