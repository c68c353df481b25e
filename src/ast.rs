// stmt   ::= expr (';' expr)*          -- ';' nests to the right
// expr   ::= assign
// assign ::= app (':=' app)?
// app    ::= atom atom*                -- application associates left
// atom   ::= ID | 'true' | 'false' | '0' | 'unit'
//          | 'l' ID ':' type '.' stmt
//          | '(' stmt ')' | '{' record '}' | atom '.' ID
//          | 'if' stmt 'then' stmt 'else' stmt
//          | 'let' ID '=' stmt 'in' stmt
//          | 'succ' atom | 'pred' atom | 'iszero' atom
//          | 'ref' atom | '!' atom | 'fix' atom
// record ::= ID '=' stmt (',' ID '=' stmt)*
// type   ::= tatom ('->' tatom)*       -- '->' associates right
// tatom  ::= 'Bool' | 'Nat' | 'Unit' | '(' type ')'
//          | 'Ref' tatom | '{' ID ':' type (',' ID ':' type)* '}'

use crate::types::Type;
use std::fmt;

/// A term of the language, in de Bruijn form.
///
/// Bound variables carry both their source name (for printing and for the
/// name check in the variable typing rule) and their de Bruijn index; index
/// 0 refers to the innermost enclosing binder. [`Term::Location`] never
/// comes out of the parser — it only arises during evaluation.
#[derive(Clone, Debug)]
pub enum Term {
    Variable {
        name: String,
        index: usize,
    },
    Abstraction {
        param: String,
        param_ty: Type,
        body: Box<Term>,
    },
    Application {
        lhs: Box<Term>,
        rhs: Box<Term>,
    },
    True,
    False,
    Zero,
    Unit,
    If {
        condition: Box<Term>,
        then_branch: Box<Term>,
        else_branch: Box<Term>,
    },
    Succ(Box<Term>),
    Pred(Box<Term>),
    IsZero(Box<Term>),
    /// Non-empty, labels distinct, in source order.
    Record {
        fields: Vec<(String, Term)>,
    },
    Projection {
        record: Box<Term>,
        label: String,
    },
    Let {
        binding: String,
        bound: Box<Term>,
        body: Box<Term>,
    },
    Ref(Box<Term>),
    Deref(Box<Term>),
    Assign {
        lhs: Box<Term>,
        rhs: Box<Term>,
    },
    Sequence {
        lhs: Box<Term>,
        rhs: Box<Term>,
    },
    Fix(Box<Term>),
    /// A store cell handle; a value form.
    Location(usize),
}

/// Term equality is α-equivalence: binder and variable names are ignored,
/// indices and record/projection labels are not. Two programs differing
/// only in bound names compare equal.
impl PartialEq for Term {
    fn eq(&self, other: &Self) -> bool {
        use Term::*;
        match (self, other) {
            (Variable { index: a, .. }, Variable { index: b, .. }) => a == b,
            (
                Abstraction { param_ty: t1, body: b1, .. },
                Abstraction { param_ty: t2, body: b2, .. },
            ) => t1 == t2 && b1 == b2,
            (
                Application { lhs: l1, rhs: r1 },
                Application { lhs: l2, rhs: r2 },
            ) => l1 == l2 && r1 == r2,
            (True, True) | (False, False) | (Zero, Zero) | (Unit, Unit) => {
                true
            }
            (
                If { condition: c1, then_branch: t1, else_branch: e1 },
                If { condition: c2, then_branch: t2, else_branch: e2 },
            ) => c1 == c2 && t1 == t2 && e1 == e2,
            (Succ(a), Succ(b))
            | (Pred(a), Pred(b))
            | (IsZero(a), IsZero(b))
            | (Ref(a), Ref(b))
            | (Deref(a), Deref(b))
            | (Fix(a), Fix(b)) => a == b,
            (Record { fields: f1 }, Record { fields: f2 }) => f1 == f2,
            (
                Projection { record: r1, label: l1 },
                Projection { record: r2, label: l2 },
            ) => l1 == l2 && r1 == r2,
            (
                Let { bound: b1, body: d1, .. },
                Let { bound: b2, body: d2, .. },
            ) => b1 == b2 && d1 == d2,
            (Assign { lhs: l1, rhs: r1 }, Assign { lhs: l2, rhs: r2 })
            | (Sequence { lhs: l1, rhs: r1 }, Sequence { lhs: l2, rhs: r2 }) => {
                l1 == l2 && r1 == r2
            }
            (Location(a), Location(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Term {}

impl Term {
    /// A numeric value: `0` or `succ` of a numeric value.
    pub fn is_numeric_value(&self) -> bool {
        match self {
            Term::Zero => true,
            Term::Succ(inner) => inner.is_numeric_value(),
            _ => false,
        }
    }

    /// A value form: abstractions, the constants, numeric values, records
    /// of values, and locations.
    pub fn is_value(&self) -> bool {
        match self {
            Term::Abstraction { .. }
            | Term::True
            | Term::False
            | Term::Unit
            | Term::Location(_) => true,
            Term::Record { fields } => {
                fields.iter().all(|(_, value)| value.is_value())
            }
            _ => self.is_numeric_value(),
        }
    }

    /// Adds `distance` to every variable with index ≥ `cutoff`, bumping the
    /// cutoff under each binder.
    pub fn shift(&mut self, distance: isize) {
        self.shift_from(0, distance);
    }

    fn shift_from(&mut self, cutoff: usize, distance: isize) {
        match self {
            Term::Variable { index, .. } => {
                if *index >= cutoff {
                    *index = index
                        .checked_add_signed(distance)
                        .expect("de Bruijn index underflow");
                }
            }
            Term::Abstraction { body, .. } => {
                body.shift_from(cutoff + 1, distance);
            }
            Term::Let { bound, body, .. } => {
                bound.shift_from(cutoff, distance);
                body.shift_from(cutoff + 1, distance);
            }
            Term::Application { lhs, rhs }
            | Term::Assign { lhs, rhs }
            | Term::Sequence { lhs, rhs } => {
                lhs.shift_from(cutoff, distance);
                rhs.shift_from(cutoff, distance);
            }
            Term::If { condition, then_branch, else_branch } => {
                condition.shift_from(cutoff, distance);
                then_branch.shift_from(cutoff, distance);
                else_branch.shift_from(cutoff, distance);
            }
            Term::Succ(inner)
            | Term::Pred(inner)
            | Term::IsZero(inner)
            | Term::Ref(inner)
            | Term::Deref(inner)
            | Term::Fix(inner) => inner.shift_from(cutoff, distance),
            Term::Record { fields } => {
                for (_, value) in fields {
                    value.shift_from(cutoff, distance);
                }
            }
            Term::Projection { record, .. } => {
                record.shift_from(cutoff, distance);
            }
            Term::True
            | Term::False
            | Term::Zero
            | Term::Unit
            | Term::Location(_) => {}
        }
    }

    /// Replaces every variable with index `target + depth` (where `depth`
    /// counts the binders crossed) by `replacement` shifted up by `depth`.
    pub fn substitute(&mut self, target: usize, replacement: &Term) {
        self.substitute_at(0, target, replacement);
    }

    fn substitute_at(&mut self, depth: usize, target: usize, replacement: &Term) {
        match self {
            Term::Variable { index, .. } => {
                if *index == target + depth {
                    let mut sub = replacement.clone();
                    sub.shift(depth as isize);
                    *self = sub;
                }
            }
            Term::Abstraction { body, .. } => {
                body.substitute_at(depth + 1, target, replacement);
            }
            Term::Let { bound, body, .. } => {
                bound.substitute_at(depth, target, replacement);
                body.substitute_at(depth + 1, target, replacement);
            }
            Term::Application { lhs, rhs }
            | Term::Assign { lhs, rhs }
            | Term::Sequence { lhs, rhs } => {
                lhs.substitute_at(depth, target, replacement);
                rhs.substitute_at(depth, target, replacement);
            }
            Term::If { condition, then_branch, else_branch } => {
                condition.substitute_at(depth, target, replacement);
                then_branch.substitute_at(depth, target, replacement);
                else_branch.substitute_at(depth, target, replacement);
            }
            Term::Succ(inner)
            | Term::Pred(inner)
            | Term::IsZero(inner)
            | Term::Ref(inner)
            | Term::Deref(inner)
            | Term::Fix(inner) => {
                inner.substitute_at(depth, target, replacement);
            }
            Term::Record { fields } => {
                for (_, value) in fields {
                    value.substitute_at(depth, target, replacement);
                }
            }
            Term::Projection { record, .. } => {
                record.substitute_at(depth, target, replacement);
            }
            Term::True
            | Term::False
            | Term::Zero
            | Term::Unit
            | Term::Location(_) => {}
        }
    }
}

// Printing. The goal is a string in the surface syntax that parses back to
// the same AST (locations excepted — they have no source form). Positions
// that the parser treats as "extending to the right" print their operand
// bare; positions that would be re-associated get parentheses.
impl Term {
    fn is_atom(&self) -> bool {
        matches!(
            self,
            Term::Variable { .. }
                | Term::True
                | Term::False
                | Term::Zero
                | Term::Unit
                | Term::Record { .. }
                | Term::Projection { .. }
                | Term::Location(_)
        )
    }

    fn fmt_atom(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_atom() {
            write!(f, "{self}")
        } else {
            write!(f, "({self})")
        }
    }

    fn fmt_app_lhs(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if matches!(self, Term::Application { .. }) || self.is_atom() {
            write!(f, "{self}")
        } else {
            write!(f, "({self})")
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Variable { name, .. } => f.write_str(name),
            // Written `l` in the input, printed `λ` (which the lexer also
            // accepts, keeping printed terms re-parseable).
            Term::Abstraction { param, param_ty, body } => {
                write!(f, "λ {param}:{param_ty}. {body}")
            }
            Term::Application { lhs, rhs } => {
                lhs.fmt_app_lhs(f)?;
                f.write_str(" ")?;
                rhs.fmt_atom(f)
            }
            Term::True => f.write_str("true"),
            Term::False => f.write_str("false"),
            Term::Zero => f.write_str("0"),
            Term::Unit => f.write_str("unit"),
            Term::If { condition, then_branch, else_branch } => {
                // All three positions hold full statements; the else
                // branch extends maximally, so none needs grouping here.
                write!(
                    f,
                    "if {condition} then {then_branch} else {else_branch}"
                )
            }
            Term::Succ(inner) => {
                f.write_str("succ ")?;
                inner.fmt_atom(f)
            }
            Term::Pred(inner) => {
                f.write_str("pred ")?;
                inner.fmt_atom(f)
            }
            Term::IsZero(inner) => {
                f.write_str("iszero ")?;
                inner.fmt_atom(f)
            }
            Term::Record { fields } => {
                f.write_str("{")?;
                for (i, (label, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{label}={value}")?;
                }
                f.write_str("}")
            }
            Term::Projection { record, label } => {
                record.fmt_atom(f)?;
                write!(f, ".{label}")
            }
            Term::Let { binding, bound, body } => {
                write!(f, "let {binding} = {bound} in {body}")
            }
            Term::Ref(inner) => {
                f.write_str("ref ")?;
                inner.fmt_atom(f)
            }
            Term::Deref(inner) => {
                f.write_str("!")?;
                inner.fmt_atom(f)
            }
            Term::Assign { lhs, rhs } => {
                if matches!(**lhs, Term::Application { .. }) || lhs.is_atom() {
                    write!(f, "{lhs}")?;
                } else {
                    write!(f, "({lhs})")?;
                }
                f.write_str(" := ")?;
                // An open-ended right-hand side (a body or else branch
                // that keeps extending) would swallow a following `;`.
                if matches!(
                    **rhs,
                    Term::Abstraction { .. }
                        | Term::If { .. }
                        | Term::Let { .. }
                        | Term::Assign { .. }
                        | Term::Sequence { .. }
                ) {
                    write!(f, "({rhs})")
                } else {
                    write!(f, "{rhs}")
                }
            }
            Term::Sequence { lhs, rhs } => {
                // A left operand with an open body or else branch would
                // swallow the `;`.
                if matches!(
                    **lhs,
                    Term::Abstraction { .. }
                        | Term::If { .. }
                        | Term::Let { .. }
                        | Term::Sequence { .. }
                ) {
                    write!(f, "({lhs})")?;
                } else {
                    write!(f, "{lhs}")?;
                }
                write!(f, "; {rhs}")
            }
            Term::Fix(inner) => {
                f.write_str("fix ")?;
                inner.fmt_atom(f)
            }
            Term::Location(cell) => write!(f, "l[{cell}]"),
        }
    }
}
