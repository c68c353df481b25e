use crate::{
    ast::Term,
    types::{Type, TypeKind, TypeStore},
};

/// The type checker.
///
/// `type_of` is total: instead of failing it produces the absorbing `Ⱦ`
/// type, which the typing rules propagate. Callers observe ill-typedness
/// as a value, never as an error.
pub struct Checker<'t> {
    types: &'t mut TypeStore,
    /// The typing context; the innermost binding is last.
    context: Vec<(String, Type)>,
}

impl<'t> Checker<'t> {
    pub fn new(types: &'t mut TypeStore) -> Checker<'t> {
        Checker { types, context: Vec::with_capacity(16) }
    }

    pub fn type_of(&mut self, term: &Term) -> Type {
        match term {
            Term::True | Term::False => self.types.bool_ty(),
            Term::Zero => self.types.nat_ty(),
            Term::Unit => self.types.unit_ty(),
            Term::Variable { name, index } => {
                // A variable types only when its index is in range *and*
                // the binding there carries the same name; free variables
                // (whose indices point past the context) have no type.
                match self.context.len().checked_sub(index + 1) {
                    Some(slot) if self.context[slot].0 == *name => {
                        self.context[slot].1.clone()
                    }
                    _ => self.types.ill_ty(),
                }
            }
            Term::Abstraction { param, param_ty, body } => {
                let body_ty = self.scoped(param.clone(), param_ty.clone(), |c| {
                    c.type_of(body)
                });
                self.types.fun(param_ty.clone(), body_ty)
            }
            Term::Application { lhs, rhs } => {
                let fun_ty = self.type_of(lhs);
                let arg_ty = self.type_of(rhs);
                match fun_ty.kind() {
                    TypeKind::Fun(domain, codomain)
                        if arg_ty.is_subtype_of(domain) =>
                    {
                        codomain.clone()
                    }
                    _ => self.types.ill_ty(),
                }
            }
            Term::If { condition, then_branch, else_branch } => {
                let cond_ty = self.type_of(condition);
                if !cond_ty.is_subtype_of(&self.types.bool_ty()) {
                    return self.types.ill_ty();
                }
                let then_ty = self.type_of(then_branch);
                let else_ty = self.type_of(else_branch);
                self.types.join(&then_ty, &else_ty)
            }
            Term::Succ(inner) | Term::Pred(inner) => {
                let ty = self.type_of(inner);
                if ty.is_subtype_of(&self.types.nat_ty()) {
                    self.types.nat_ty()
                } else {
                    self.types.ill_ty()
                }
            }
            Term::IsZero(inner) => {
                let ty = self.type_of(inner);
                if ty.is_subtype_of(&self.types.nat_ty()) {
                    self.types.bool_ty()
                } else {
                    self.types.ill_ty()
                }
            }
            Term::Record { fields } => {
                let mut field_tys = Vec::with_capacity(fields.len());
                for (label, value) in fields {
                    let ty = self.type_of(value);
                    if ty.is_ill() {
                        return self.types.ill_ty();
                    }
                    field_tys.push((label.clone(), ty));
                }
                self.types.record(field_tys)
            }
            Term::Projection { record, label } => {
                let record_ty = self.type_of(record);
                match record_ty.kind() {
                    TypeKind::Record(fields) => fields
                        .iter()
                        .find(|(l, _)| l == label)
                        .map(|(_, ty)| ty.clone())
                        .unwrap_or_else(|| self.types.ill_ty()),
                    _ => self.types.ill_ty(),
                }
            }
            Term::Let { binding, bound, body } => {
                let bound_ty = self.type_of(bound);
                if bound_ty.is_ill() {
                    return self.types.ill_ty();
                }
                self.scoped(binding.clone(), bound_ty, |c| c.type_of(body))
            }
            Term::Ref(inner) => {
                let ty = self.type_of(inner);
                self.types.reference(ty)
            }
            Term::Deref(inner) => {
                let ty = self.type_of(inner);
                match ty.kind() {
                    TypeKind::Ref(cell) => cell.clone(),
                    _ => self.types.ill_ty(),
                }
            }
            Term::Assign { lhs, rhs } => {
                let lhs_ty = self.type_of(lhs);
                let rhs_ty = self.type_of(rhs);
                match lhs_ty.kind() {
                    TypeKind::Ref(cell) if rhs_ty.is_subtype_of(cell) => {
                        self.types.unit_ty()
                    }
                    _ => self.types.ill_ty(),
                }
            }
            Term::Sequence { lhs, rhs } => {
                let lhs_ty = self.type_of(lhs);
                if lhs_ty.is_subtype_of(&self.types.unit_ty()) {
                    self.type_of(rhs)
                } else {
                    self.types.ill_ty()
                }
            }
            Term::Fix(inner) => {
                let ty = self.type_of(inner);
                match ty.kind() {
                    TypeKind::Fun(domain, codomain) if domain == codomain => {
                        domain.clone()
                    }
                    _ => self.types.ill_ty(),
                }
            }
            // Locations have no source syntax, so the static checker never
            // derives a type for them.
            Term::Location(_) => self.types.ill_ty(),
        }
    }

    fn scoped<T>(
        &mut self,
        name: String,
        ty: Type,
        f: impl FnOnce(&mut Self) -> T,
    ) -> T {
        self.context.push((name, ty));
        let res = f(self);
        self.context.pop();
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;
    use pretty_assertions::assert_eq;

    #[track_caller]
    fn check(src: &str, expected: impl Fn(&mut TypeStore) -> Type) {
        let mut types = TypeStore::new();
        let term = parser::parse(src, &mut types)
            .unwrap_or_else(|e| panic!("parse failed for {src:?}: {e}"));
        let actual = Checker::new(&mut types).type_of(&term);
        let expected = expected(&mut types);
        assert_eq!(actual, expected, "program: {src}");
    }

    #[test]
    fn free_variables_have_no_type() {
        check("x", |s| s.ill_ty());
        check("x y", |s| s.ill_ty());
        check("(l x:Bool. x) x", |s| s.ill_ty());
    }

    #[test]
    fn constants() {
        check("true", |s| s.bool_ty());
        check("false", |s| s.bool_ty());
        check("0", |s| s.nat_ty());
        check("unit", |s| s.unit_ty());
    }

    #[test]
    fn abstractions_and_application() {
        check("(l x:Bool. x)", |s| {
            let b = s.bool_ty();
            s.fun(b.clone(), b)
        });
        check("(l x:Bool. x) true", |s| s.bool_ty());
        check("(l x:Bool->Bool. x) (l y:Bool. y)", |s| {
            let b = s.bool_ty();
            s.fun(b.clone(), b)
        });
        check("l x:Bool->Bool. l y:Bool. x y", |s| {
            let b = s.bool_ty();
            let b2b = s.fun(b.clone(), b.clone());
            s.fun(b2b.clone(), b2b)
        });
        // An argument that is not a subtype of the domain.
        check("(l x:Bool. x) (l y:Bool. y)", |s| s.ill_ty());
        check("(l z:Bool. l x:Bool. x) (l y:Bool. y)", |s| s.ill_ty());
    }

    #[test]
    fn ill_typed_bodies_embed_in_function_types() {
        check("(l x:Bool. x x)", |s| {
            let b = s.bool_ty();
            let ill = s.ill_ty();
            s.fun(b, ill)
        });
        check("(l x:Bool. x a)", |s| {
            let b = s.bool_ty();
            let ill = s.ill_ty();
            s.fun(b, ill)
        });
        check("l x:Bool. (l y:Bool. (x y) x)", |s| {
            let b = s.bool_ty();
            let ill = s.ill_ty();
            let inner = s.fun(b.clone(), ill);
            s.fun(b, inner)
        });
    }

    #[test]
    fn arithmetic() {
        check("succ 0", |s| s.nat_ty());
        check("pred 0", |s| s.nat_ty());
        check("iszero 0", |s| s.bool_ty());
        check("iszero pred 0", |s| s.bool_ty());
        check("pred iszero 0", |s| s.ill_ty());
        check("succ true", |s| s.ill_ty());
        check("l x:Nat. pred pred x", |s| {
            let n = s.nat_ty();
            s.fun(n.clone(), n)
        });
        check("(l x:Nat. pred pred x) succ succ succ 0", |s| s.nat_ty());
    }

    #[test]
    fn conditionals_join_their_arms() {
        check("if true then true else false", |s| s.bool_ty());
        check("l x:Bool. if true then true else false", |s| {
            let b = s.bool_ty();
            s.fun(b.clone(), b)
        });
        check("if true then (l x:Bool. x) true else false", |s| s.bool_ty());
        // Nat and Bool arms join at Top.
        check("if false then true else 0", |s| s.top_ty());
        check("if false then true else succ succ 0", |s| s.top_ty());
        // Arms whose function types cannot join (no domain meet).
        check(
            "if (if true then true else false) then (l y:Bool->Bool. y) \
             else (l x:Bool. false)",
            |s| s.ill_ty(),
        );
        check(
            "if (if true then true else false) then (l y:Bool. y) \
             else (l x:Bool. false)",
            |s| {
                let b = s.bool_ty();
                s.fun(b.clone(), b)
            },
        );
        // A non-boolean condition.
        check("if (l x:Bool. x) then true else false", |s| s.ill_ty());
        check("if succ 0 then succ 0 else true", |s| s.ill_ty());
    }

    #[test]
    fn records() {
        check("{x=0}", |s| {
            let n = s.nat_ty();
            s.record(vec![("x".into(), n)])
        });
        check("{x=0, y=true}", |s| {
            let (n, b) = (s.nat_ty(), s.bool_ty());
            s.record(vec![("x".into(), n), ("y".into(), b)])
        });
        check("{x=0, y=true, z=l x:Bool. x}", |s| {
            let (n, b) = (s.nat_ty(), s.bool_ty());
            let b2b = s.fun(b.clone(), b.clone());
            s.record(vec![
                ("x".into(), n),
                ("y".into(), b),
                ("z".into(), b2b),
            ])
        });
        check("{x=if true then 0 else pred (succ succ 0)}", |s| {
            let n = s.nat_ty();
            s.record(vec![("x".into(), n)])
        });
        // A joined field type lands in the record.
        check("{x=if true then 0 else iszero 0}", |s| {
            let top = s.top_ty();
            s.record(vec![("x".into(), top)])
        });
        // Any ill-typed field poisons the whole record.
        check("{x=succ true}", |s| s.ill_ty());
    }

    #[test]
    fn projections() {
        check("{x=0}.x", |s| s.nat_ty());
        check("{x=0}.y", |s| s.ill_ty());
        check("{x=0, y=true}.y", |s| s.bool_ty());
        check("(l r:{x:Nat}. r.x) {x=succ 0}", |s| s.nat_ty());
        // Width subtyping admits a wider record argument.
        check("(l r:{x:Nat}. succ r.x) {x=succ 0, y=true}", |s| s.nat_ty());
        check("0 .x", |s| s.ill_ty());
    }

    #[test]
    fn let_bindings() {
        check("let x = true in l y:Nat. x", |s| {
            let (n, b) = (s.nat_ty(), s.bool_ty());
            s.fun(n, b)
        });
        check("let x = l x:Bool. x in l y:Nat. x", |s| {
            let (n, b) = (s.nat_ty(), s.bool_ty());
            let b2b = s.fun(b.clone(), b);
            s.fun(n, b2b)
        });
        // The inner binder shadows the let.
        check("let x = true in l x:Nat. x", |s| {
            let n = s.nat_ty();
            s.fun(n.clone(), n)
        });
        check("(l y:Nat. (let x = succ y in succ x)) 0", |s| s.nat_ty());
        // An ill-typed bound term poisons the let.
        check("(l y:Nat. (let x = succ false in succ x)) 0", |s| s.ill_ty());
    }

    #[test]
    fn references() {
        check("ref 0", |s| {
            let n = s.nat_ty();
            s.reference(n)
        });
        check("l x:Ref Bool. x", |s| {
            let b = s.bool_ty();
            let rb = s.reference(b);
            s.fun(rb.clone(), rb)
        });
        check("l x:Ref Bool. !x", |s| {
            let b = s.bool_ty();
            let rb = s.reference(b.clone());
            s.fun(rb, b)
        });
        check("l x:Bool. ref x", |s| {
            let b = s.bool_ty();
            let rb = s.reference(b.clone());
            s.fun(b, rb)
        });
        check("(l x:Nat. ref x) 0", |s| {
            let n = s.nat_ty();
            s.reference(n)
        });
        check("!ref l x:Nat. x", |s| {
            let n = s.nat_ty();
            s.fun(n.clone(), n)
        });
        check("!ref l x:Nat. !ref l y:Bool. y", |s| {
            let (n, b) = (s.nat_ty(), s.bool_ty());
            let b2b = s.fun(b.clone(), b);
            s.fun(n, b2b)
        });
        check("!0", |s| s.ill_ty());
    }

    #[test]
    fn assignment_and_sequencing() {
        check("let x = ref 0 in x := succ 0", |s| s.unit_ty());
        check("let x = ref 0 in x := true", |s| s.ill_ty());
        check("let x = ref 0 in !x", |s| s.nat_ty());
        check("(x := succ (!x)); !x", |s| s.ill_ty());
        check("let x = ref 0 in (x := succ (!x)); !x", |s| s.nat_ty());
        check(
            "let x = ref 0 in (x := succ (!x)); (x := succ (!x)); !x",
            |s| s.nat_ty(),
        );
        // The left of `;` must be Unit.
        check("0; true", |s| s.ill_ty());
        check("unit; true", |s| s.bool_ty());
    }

    #[test]
    fn ref_cells_are_invariant() {
        // Storing a wider record is fine (it is a subtype of the cell
        // type); reading back yields the cell type.
        check(
            "let x = ref {a=0, b=false} in \
             ((l y:Unit. ((!x).a)) (x := {a=succ 0, b=false}))",
            |s| s.nat_ty(),
        );
        // Field order in the stored record is irrelevant.
        check(
            "let x = ref {a=0, b=false} in \
             ((l y:Unit. ((!x).a)) (x := {b=false, a=succ 0}))",
            |s| s.nat_ty(),
        );
        // A record missing a field of the cell type is not assignable.
        check(
            "let x = ref {a=0, b=false} in \
             ((l y:Unit. ((!x).a)) (x := {a=succ 0, c=false}))",
            |s| s.ill_ty(),
        );
    }

    #[test]
    fn fixpoints() {
        check(
            "fix l ie: Nat -> Bool. l x:Nat. if iszero x then true else \
             if iszero (pred x) then false else ie (pred (pred x))",
            |s| {
                let (n, b) = (s.nat_ty(), s.bool_ty());
                s.fun(n, b)
            },
        );
        // `fix` needs a T -> T argument.
        check("fix l x:Nat. iszero x", |s| s.ill_ty());
        check("fix 0", |s| s.ill_ty());
    }

    #[test]
    fn subject_reduction_spot_checks() {
        use crate::interpreter::Interpreter;

        let programs = [
            "(l x:Nat. succ x) succ 0",
            "if false then true else succ succ 0",
            "(l r:{x:Nat}. r.x) {x=succ 0}",
            "let x = true in x",
            "(l x:Bool. if x then true else false) false",
        ];
        for src in programs {
            let mut types = TypeStore::new();
            let term = parser::parse(src, &mut types).unwrap();
            let before = Checker::new(&mut types).type_of(&term);

            let mut interp = Interpreter::new(&mut types, None);
            let value = interp.eval(term).unwrap();
            let after = Checker::new(&mut types).type_of(&value);

            assert!(
                after.is_subtype_of(&before),
                "{src}: evaluation moved the type from {before} to {after}"
            );
        }
    }
}
