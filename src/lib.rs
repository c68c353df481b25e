//! An interpreter for a small, explicitly-typed lambda calculus with
//! booleans, naturals, records, let, mutable references, sequencing, unit
//! and an explicit fixed-point operator, under a structural subtyping
//! discipline with a top type.
//!
//! The pipeline is `lexer` → `parser` → `type_checker` → `interpreter`;
//! `types` provides the hash-consed catalog shared by the last three
//! stages.

/// The lexer takes the source input, mapping it into a sequence of tokens.
pub mod lexer;

/// The parser takes the token sequence, mapping it into a de Bruijn AST.
pub mod parser;

/// The type checker computes the type of a term; ill-typed programs get
/// the absorbing `Ⱦ` type rather than an error.
pub mod type_checker;

/// The evaluator performs small-step, call-by-value reduction against a
/// store of reference cells.
pub mod interpreter;

pub mod ast;
pub mod token;
pub mod types;

pub use ast::Term;
pub use interpreter::Interpreter;
pub use type_checker::Checker;
pub use types::{Type, TypeStore};
