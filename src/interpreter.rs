use std::fmt;

use crate::{
    ast::Term,
    type_checker::Checker,
    types::{Type, TypeStore},
};

/// The evaluator-owned heap backing `ref`, `!` and `:=`.
///
/// Allocation order assigns location ids; cells are never deallocated. A
/// store lives for exactly one top-level interpretation. Reading a location
/// that was never allocated is unreachable from well-typed source and from
/// the allocation discipline, so it asserts.
pub struct Store {
    cells: Vec<Term>,
}

impl Store {
    pub fn new() -> Store {
        Store { cells: Vec::new() }
    }

    pub fn alloc(&mut self, value: Term) -> usize {
        self.cells.push(value);
        self.cells.len() - 1
    }

    pub fn read(&self, location: usize) -> &Term {
        assert!(location < self.cells.len(), "read of unallocated location");
        &self.cells[location]
    }

    pub fn write(&mut self, location: usize, value: Term) {
        assert!(location < self.cells.len(), "write to unallocated location");
        self.cells[location] = value;
    }
}

impl Default for Store {
    fn default() -> Self {
        Store::new()
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    /// No evaluation rule applies and the term is not a value.
    Stuck(Term),
    /// The advisory step budget ran out.
    StepLimitExceeded(usize),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Stuck(residual) => write!(f, "stuck term: {residual}"),
            Error::StepLimitExceeded(budget) => {
                write!(f, "step limit of {budget} exceeded")
            }
        }
    }
}

impl std::error::Error for Error {}

/// Small-step, call-by-value evaluator.
///
/// [`Interpreter::step`] applies the first matching reduction rule and
/// returns the stepped term, or gives the term back unchanged when no rule
/// applies; the driver loops on that explicit signal. Each interpreter owns
/// its store, so separate runs never share cells.
pub struct Interpreter<'t> {
    types: &'t mut TypeStore,
    store: Store,
    max_steps: Option<usize>,
}

impl<'t> Interpreter<'t> {
    pub fn new(types: &'t mut TypeStore, max_steps: Option<usize>) -> Interpreter<'t> {
        Interpreter { types, store: Store::new(), max_steps }
    }

    /// Runs a parsed program: types it, evaluates it, and renders the
    /// result.
    ///
    /// The type is computed on the term *before* evaluation, so ill-typed
    /// programs receive `Ⱦ`; those are rendered unevaluated (running them
    /// could only get stuck or lie about the static semantics). Numeric
    /// results render in decimal, everything else in surface syntax.
    pub fn interpret(&mut self, term: &Term) -> Result<(String, Type), Error> {
        let ty = Checker::new(self.types).type_of(term);
        if ty.is_ill() {
            return Ok((term.to_string(), ty));
        }
        let value = self.eval(term.clone())?;
        Ok((render(&value), ty))
    }

    /// Reduces until no rule applies. Returns the value, an error carrying
    /// the stuck residual, or a budget overrun.
    pub fn eval(&mut self, term: Term) -> Result<Term, Error> {
        let mut term = term;
        let mut steps: usize = 0;
        loop {
            match self.step(term) {
                Ok(next) => {
                    term = next;
                    steps += 1;
                    if let Some(budget) = self.max_steps {
                        if steps > budget {
                            return Err(Error::StepLimitExceeded(budget));
                        }
                    }
                }
                Err(residual) => {
                    return if residual.is_value() {
                        Ok(residual)
                    } else {
                        Err(Error::Stuck(residual))
                    };
                }
            }
        }
    }

    /// A single reduction step: `Ok` is the stepped term, `Err` hands the
    /// term back untouched because no rule applies.
    fn step(&mut self, term: Term) -> Result<Term, Term> {
        match term {
            Term::Application { lhs, rhs } => {
                if matches!(*lhs, Term::Abstraction { .. }) && rhs.is_value() {
                    let Term::Abstraction { body, .. } = *lhs else {
                        unreachable!()
                    };
                    return Ok(substitute_top(*rhs, *body));
                }
                if lhs.is_value() {
                    map_both(self.step(*rhs), |rhs| Term::Application {
                        lhs,
                        rhs: Box::new(rhs),
                    })
                } else {
                    map_both(self.step(*lhs), |lhs| Term::Application {
                        lhs: Box::new(lhs),
                        rhs,
                    })
                }
            }
            Term::If { condition, then_branch, else_branch } => {
                match *condition {
                    Term::True => Ok(*then_branch),
                    Term::False => Ok(*else_branch),
                    condition => {
                        map_both(self.step(condition), |condition| Term::If {
                            condition: Box::new(condition),
                            then_branch,
                            else_branch,
                        })
                    }
                }
            }
            Term::Succ(inner) => {
                map_both(self.step(*inner), |t| Term::Succ(Box::new(t)))
            }
            Term::Pred(inner) => match *inner {
                Term::Zero => Ok(Term::Zero),
                Term::Succ(nv) if nv.is_numeric_value() => Ok(*nv),
                inner => {
                    map_both(self.step(inner), |t| Term::Pred(Box::new(t)))
                }
            },
            Term::IsZero(inner) => match *inner {
                Term::Zero => Ok(Term::True),
                Term::Succ(nv) if nv.is_numeric_value() => Ok(Term::False),
                inner => {
                    map_both(self.step(inner), |t| Term::IsZero(Box::new(t)))
                }
            },
            Term::Record { fields } => {
                // Step the leftmost field that is not yet a value.
                let mut fields = fields;
                let redex = fields.iter().position(|(_, v)| !v.is_value());
                match redex {
                    Some(i) => {
                        let (label, value) = fields.remove(i);
                        match self.step(value) {
                            Ok(value) => {
                                fields.insert(i, (label, value));
                                Ok(Term::Record { fields })
                            }
                            Err(value) => {
                                fields.insert(i, (label, value));
                                Err(Term::Record { fields })
                            }
                        }
                    }
                    None => Err(Term::Record { fields }),
                }
            }
            Term::Projection { record, label } => {
                if record.is_value() {
                    if let Term::Record { fields } = *record {
                        let found =
                            fields.iter().position(|(l, _)| *l == label);
                        match found {
                            Some(i) => {
                                let mut fields = fields;
                                Ok(fields.swap_remove(i).1)
                            }
                            None => Err(Term::Projection {
                                record: Box::new(Term::Record { fields }),
                                label,
                            }),
                        }
                    } else {
                        Err(Term::Projection { record, label })
                    }
                } else {
                    map_both(self.step(*record), |record| Term::Projection {
                        record: Box::new(record),
                        label,
                    })
                }
            }
            Term::Let { binding, bound, body } => {
                if bound.is_value() {
                    Ok(substitute_top(*bound, *body))
                } else {
                    map_both(self.step(*bound), |bound| Term::Let {
                        binding,
                        bound: Box::new(bound),
                        body,
                    })
                }
            }
            Term::Ref(inner) => {
                if inner.is_value() {
                    let location = self.store.alloc(*inner);
                    Ok(Term::Location(location))
                } else {
                    map_both(self.step(*inner), |t| Term::Ref(Box::new(t)))
                }
            }
            Term::Deref(inner) => match *inner {
                Term::Location(location) => {
                    Ok(self.store.read(location).clone())
                }
                inner => {
                    map_both(self.step(inner), |t| Term::Deref(Box::new(t)))
                }
            },
            Term::Assign { lhs, rhs } => {
                if matches!(*lhs, Term::Location(_)) && rhs.is_value() {
                    let Term::Location(location) = *lhs else {
                        unreachable!()
                    };
                    self.store.write(location, *rhs);
                    Ok(Term::Unit)
                } else if !rhs.is_value() {
                    map_both(self.step(*rhs), |rhs| Term::Assign {
                        lhs,
                        rhs: Box::new(rhs),
                    })
                } else {
                    map_both(self.step(*lhs), |lhs| Term::Assign {
                        lhs: Box::new(lhs),
                        rhs,
                    })
                }
            }
            Term::Sequence { lhs, rhs } => match *lhs {
                Term::Unit => Ok(*rhs),
                lhs => map_both(self.step(lhs), |lhs| Term::Sequence {
                    lhs: Box::new(lhs),
                    rhs,
                }),
            },
            Term::Fix(inner) => {
                if let Term::Abstraction { .. } = *inner {
                    let unrolled = Term::Fix(inner.clone());
                    let Term::Abstraction { body, .. } = *inner else {
                        unreachable!()
                    };
                    Ok(substitute_top(unrolled, *body))
                } else {
                    map_both(self.step(*inner), |t| Term::Fix(Box::new(t)))
                }
            }
            // Values, variables and locations: no rule applies.
            term => Err(term),
        }
    }
}

fn map_both(
    stepped: Result<Term, Term>,
    rebuild: impl FnOnce(Term) -> Term,
) -> Result<Term, Term> {
    match stepped {
        Ok(term) => Ok(rebuild(term)),
        Err(term) => Err(rebuild(term)),
    }
}

/// The β-reduction substitution: `arg` enters `body` in place of index 0.
/// The argument is shifted up before substituting (it is about to sit one
/// binder deeper) and the result shifted down to account for the consumed
/// binder.
fn substitute_top(mut arg: Term, mut body: Term) -> Term {
    arg.shift(1);
    body.substitute(0, &arg);
    body.shift(-1);
    body
}

/// Renders an evaluation result: numeric values in decimal, anything else
/// in surface syntax.
fn render(term: &Term) -> String {
    if term.is_numeric_value() {
        let mut n: u64 = 0;
        let mut cursor = term;
        while let Term::Succ(inner) = cursor {
            n += 1;
            cursor = &**inner;
        }
        n.to_string()
    } else {
        term.to_string()
    }
}
