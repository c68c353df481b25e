use std::{
    collections::HashMap,
    fmt,
    hash::{Hash, Hasher},
    rc::Rc,
};

/// A canonical (hash-consed) type.
///
/// Every type is interned in a [`TypeStore`]: structurally equal types share
/// a single allocation, so within a store equality coincides with pointer
/// identity and comparing two types usually stops at the first pointer
/// check. (The structural fallback only does work for types from different
/// stores, which arises in tests.)
#[derive(Clone)]
pub struct Type(Rc<TypeKind>);

/// The structure of a type. Children are always canonical [`Type`] handles
/// from the same store.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Bool,
    Nat,
    Unit,
    /// The maximal type: every well-formed type is a subtype of `Top`.
    Top,
    /// The absorbing "no type" sentinel. Never a subtype or supertype of
    /// anything but itself, and never equal to a well-formed type.
    Ill,
    /// `T1 -> T2`
    Fun(Type, Type),
    /// `{l1:T1, …, ln:Tn}`, labels distinct, source order preserved.
    Record(Vec<(String, Type)>),
    /// `Ref T`
    Ref(Type),
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl Eq for Type {}

impl Hash for Type {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type({self})")
    }
}

impl Type {
    pub fn kind(&self) -> &TypeKind {
        &self.0
    }

    pub fn is_ill(&self) -> bool {
        matches!(*self.0, TypeKind::Ill)
    }

    pub fn is_top(&self) -> bool {
        matches!(*self.0, TypeKind::Top)
    }

    /// The subtyping relation `self <: other`.
    ///
    /// Reflexive (identity, thanks to interning) and transitive, with:
    /// every well-formed type a subtype of `Top`; functions contravariant
    /// in the domain and covariant in the codomain; records subtyped by
    /// width (extra fields allowed on the subtype), depth (componentwise)
    /// and permutation (field order irrelevant); `Ref` invariant.
    pub fn is_subtype_of(&self, other: &Type) -> bool {
        if self == other {
            return true;
        }
        if self.is_ill() || other.is_ill() {
            return false;
        }
        if other.is_top() {
            return true;
        }
        match (self.kind(), other.kind()) {
            (TypeKind::Fun(s1, s2), TypeKind::Fun(t1, t2)) => {
                t1.is_subtype_of(s1) && s2.is_subtype_of(t2)
            }
            (TypeKind::Record(sub), TypeKind::Record(sup)) => {
                sup.iter().all(|(label, want)| {
                    sub.iter()
                        .any(|(l, have)| l == label && have.is_subtype_of(want))
                })
            }
            // `Ref T <: Ref T` was already handled by the identity check;
            // references are otherwise unrelated (invariance).
            _ => false,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            TypeKind::Bool => f.write_str("Bool"),
            TypeKind::Nat => f.write_str("Nat"),
            TypeKind::Unit => f.write_str("Unit"),
            TypeKind::Top => f.write_str("Top"),
            TypeKind::Ill => f.write_str("Ⱦ"),
            TypeKind::Fun(lhs, rhs) => write!(f, "({lhs} -> {rhs})"),
            TypeKind::Record(fields) => {
                f.write_str("{")?;
                for (i, (label, ty)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{label}:{ty}")?;
                }
                f.write_str("}")
            }
            TypeKind::Ref(inner) => write!(f, "Ref {inner}"),
        }
    }
}

/// The owning catalog of canonical types.
///
/// The store grows monotonically; interned types are never revised. It is a
/// plain owned value — the harness owns one per run and tests reset simply
/// by constructing a fresh store. Factories assume their arguments are
/// already canonical (they come from the same store) and preserve that
/// invariant for the types they build.
pub struct TypeStore {
    pool: HashMap<TypeKind, Type>,
    bool_: Type,
    nat: Type,
    unit: Type,
    top: Type,
    ill: Type,
}

impl Default for TypeStore {
    fn default() -> Self {
        TypeStore::new()
    }
}

impl TypeStore {
    pub fn new() -> TypeStore {
        let mut pool = HashMap::with_capacity(64);
        let mut base = |kind: TypeKind| {
            let ty = Type(Rc::new(kind.clone()));
            pool.insert(kind, ty.clone());
            ty
        };
        let bool_ = base(TypeKind::Bool);
        let nat = base(TypeKind::Nat);
        let unit = base(TypeKind::Unit);
        let top = base(TypeKind::Top);
        let ill = base(TypeKind::Ill);
        TypeStore {
            pool,
            bool_,
            nat,
            unit,
            top,
            ill,
        }
    }

    pub fn bool_ty(&self) -> Type {
        self.bool_.clone()
    }

    pub fn nat_ty(&self) -> Type {
        self.nat.clone()
    }

    pub fn unit_ty(&self) -> Type {
        self.unit.clone()
    }

    pub fn top_ty(&self) -> Type {
        self.top.clone()
    }

    pub fn ill_ty(&self) -> Type {
        self.ill.clone()
    }

    pub fn fun(&mut self, domain: Type, codomain: Type) -> Type {
        self.intern(TypeKind::Fun(domain, codomain))
    }

    pub fn record(&mut self, fields: Vec<(String, Type)>) -> Type {
        debug_assert!(
            fields
                .iter()
                .enumerate()
                .all(|(i, (l, _))| fields[..i].iter().all(|(p, _)| p != l)),
            "record labels must be distinct"
        );
        self.intern(TypeKind::Record(fields))
    }

    pub fn reference(&mut self, inner: Type) -> Type {
        self.intern(TypeKind::Ref(inner))
    }

    fn intern(&mut self, kind: TypeKind) -> Type {
        if let Some(ty) = self.pool.get(&kind) {
            return ty.clone();
        }
        let ty = Type(Rc::new(kind.clone()));
        self.pool.insert(kind, ty.clone());
        ty
    }

    /// The least upper bound of `s` and `t` under subtyping.
    ///
    /// Incompatible well-formed types join at `Top`; a function join whose
    /// domain meet does not exist is `Ⱦ`; anything involving `Ⱦ` is `Ⱦ`.
    pub fn join(&mut self, s: &Type, t: &Type) -> Type {
        if s == t {
            return s.clone();
        }
        if s.is_ill() || t.is_ill() {
            return self.ill_ty();
        }
        match (s.kind().clone(), t.kind().clone()) {
            (TypeKind::Fun(s1, s2), TypeKind::Fun(t1, t2)) => {
                match self.meet(&s1, &t1) {
                    Some(domain) => {
                        let codomain = self.join(&s2, &t2);
                        self.fun(domain, codomain)
                    }
                    None => self.ill_ty(),
                }
            }
            (TypeKind::Record(sf), TypeKind::Record(tf)) => {
                // Exactly the labels present in both, each at the join of
                // the two field types.
                let mut fields = Vec::new();
                for (label, sty) in &sf {
                    if let Some((_, tty)) = tf.iter().find(|(l, _)| l == label)
                    {
                        let joined = self.join(sty, tty);
                        fields.push((label.clone(), joined));
                    }
                }
                self.record(fields)
            }
            _ => self.top_ty(),
        }
    }

    /// The greatest lower bound of `s` and `t`, or `None` when the two
    /// types have no common subtype. Used for the domain component of
    /// function joins.
    pub fn meet(&mut self, s: &Type, t: &Type) -> Option<Type> {
        if s == t {
            return Some(s.clone());
        }
        if s.is_ill() || t.is_ill() {
            return None;
        }
        if s.is_top() {
            return Some(t.clone());
        }
        if t.is_top() {
            return Some(s.clone());
        }
        match (s.kind().clone(), t.kind().clone()) {
            (TypeKind::Fun(s1, s2), TypeKind::Fun(t1, t2)) => {
                let codomain = self.meet(&s2, &t2)?;
                let domain = self.join(&s1, &t1);
                Some(self.fun(domain, codomain))
            }
            (TypeKind::Record(sf), TypeKind::Record(tf)) => {
                // The union of the labels; shared labels must meet.
                let mut fields = Vec::new();
                for (label, sty) in &sf {
                    match tf.iter().find(|(l, _)| l == label) {
                        Some((_, tty)) => {
                            let met = self.meet(sty, tty)?;
                            fields.push((label.clone(), met));
                        }
                        None => fields.push((label.clone(), sty.clone())),
                    }
                }
                for (label, tty) in &tf {
                    if !sf.iter().any(|(l, _)| l == label) {
                        fields.push((label.clone(), tty.clone()));
                    }
                }
                Some(self.record(fields))
            }
            _ => None,
        }
    }
}
