//! Builtin constants and functions, and turning an [`Expression`] into a
//! number.

use crate::algebra::Expression;
use once_cell::sync::Lazy;
use smol_str::SmolStr;
use std::{
    collections::HashMap,
    error::Error,
    f64::consts,
    fmt::{self, Display, Formatter},
};

/// Contextual information used when evaluating an [`Expression`].
pub trait Context {
    /// Look up a named constant (e.g. `pi`).
    fn constant(&self, name: &str) -> Option<f64>;

    fn evaluate_function(
        &self,
        name: &str,
        argument: f64,
    ) -> Result<f64, EvaluationError>;

    /// Is `name` a constant or function this context knows about?
    fn is_builtin(&self, name: &str) -> bool;
}

impl<'a, C: Context + ?Sized> Context for &'a C {
    fn constant(&self, name: &str) -> Option<f64> { (**self).constant(name) }

    fn evaluate_function(
        &self,
        name: &str,
        argument: f64,
    ) -> Result<f64, EvaluationError> {
        (**self).evaluate_function(name, argument)
    }

    fn is_builtin(&self, name: &str) -> bool { (**self).is_builtin(name) }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EvaluationError {
    UnknownFunction { name: SmolStr },
    /// The function was called with an argument outside its domain.
    Domain { function: SmolStr, argument: f64 },
}

impl Display for EvaluationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            EvaluationError::UnknownFunction { name } => {
                write!(f, "Unknown function \"{}\"", name)
            },
            EvaluationError::Domain { function, argument } => write!(
                f,
                "{} is outside the domain of \"{}\"",
                argument, function
            ),
        }
    }
}

impl Error for EvaluationError {}

/// An entry in the builtin table.
#[derive(Debug, Copy, Clone)]
pub enum Builtin {
    Constant(f64),
    Function(fn(f64) -> f64),
}

static BUILTINS: Lazy<HashMap<&'static str, Builtin>> = Lazy::new(|| {
    let mut table = HashMap::new();

    table.insert("pi", Builtin::Constant(consts::PI));
    table.insert("e", Builtin::Constant(consts::E));

    let functions: [(&'static str, fn(f64) -> f64); 12] = [
        ("sin", f64::sin),
        ("cos", f64::cos),
        ("tan", f64::tan),
        ("arcsin", f64::asin),
        ("arccos", f64::acos),
        ("arctan", f64::atan),
        ("sec", |x| 1.0 / x.cos()),
        ("cosec", |x| 1.0 / x.sin()),
        ("cot", |x| 1.0 / x.tan()),
        ("log", f64::log10),
        ("ln", f64::ln),
        ("sqrt", f64::sqrt),
    ];

    for (name, function) in functions.iter().copied() {
        table.insert(name, Builtin::Function(function));
    }

    table
});

/// The set of builtin constants and functions. Angles are in radians.
#[derive(Debug, Default, Copy, Clone)]
pub struct Builtins;

impl Builtins {
    pub fn lookup(name: &str) -> Option<Builtin> {
        BUILTINS.get(name).copied()
    }
}

impl Context for Builtins {
    fn constant(&self, name: &str) -> Option<f64> {
        match Builtins::lookup(name) {
            Some(Builtin::Constant(value)) => Some(value),
            _ => None,
        }
    }

    fn evaluate_function(
        &self,
        name: &str,
        argument: f64,
    ) -> Result<f64, EvaluationError> {
        match Builtins::lookup(name) {
            Some(Builtin::Function(function)) => Ok(function(argument)),
            _ => Err(EvaluationError::UnknownFunction { name: name.into() }),
        }
    }

    fn is_builtin(&self, name: &str) -> bool { BUILTINS.contains_key(name) }
}

/// A [`Context`] which turns a `NaN` coming out of a function into an
/// [`EvaluationError::Domain`] instead of letting it propagate.
#[derive(Debug, Default, Copy, Clone)]
pub struct Strict<C>(pub C);

impl<C: Context> Context for Strict<C> {
    fn constant(&self, name: &str) -> Option<f64> { self.0.constant(name) }

    fn evaluate_function(
        &self,
        name: &str,
        argument: f64,
    ) -> Result<f64, EvaluationError> {
        let value = self.0.evaluate_function(name, argument)?;

        if value.is_nan() && !argument.is_nan() {
            Err(EvaluationError::Domain {
                function: name.into(),
                argument,
            })
        } else {
            Ok(value)
        }
    }

    fn is_builtin(&self, name: &str) -> bool { self.0.is_builtin(name) }
}

/// Evaluate an [`Expression`] tree.
///
/// Builtin constants are looked up in the [`Context`], and every other
/// reference is handed to `resolve`.
pub fn evaluate<C, F, E>(
    expr: &Expression,
    ctx: &C,
    resolve: &mut F,
) -> Result<f64, E>
where
    C: Context + ?Sized,
    F: FnMut(&str) -> Result<f64, E>,
    E: From<EvaluationError>,
{
    match expr {
        Expression::Literal(value) => Ok(*value),
        Expression::Reference(name) => match ctx.constant(name) {
            Some(value) => Ok(value),
            None => resolve(name.as_str()),
        },
        Expression::FunctionCall { function, argument } => {
            let argument = evaluate(argument, ctx, resolve)?;
            ctx.evaluate_function(function, argument).map_err(E::from)
        },
        Expression::Binary { left, right, op } => {
            let left = evaluate(left, ctx, resolve)?;
            let right = evaluate(right, ctx, resolve)?;
            Ok(op.apply(left, right))
        },
    }
}
