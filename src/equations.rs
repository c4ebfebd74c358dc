use crate::algebra::{Expression, ParseError};
use once_cell::sync::Lazy;
use regex::Regex;
use smol_str::SmolStr;
use std::{
    collections::{hash_map, HashMap},
    error::Error,
    fmt::{self, Display, Formatter},
    iter::{Extend, FromIterator},
    str::FromStr,
};

static LITERAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?([0-9]+\.?[0-9]*|\.[0-9]+)$").unwrap()
});

/// What a name is bound to.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    FixedValue(f64),
    /// An expression which is evaluated on demand.
    Formula(Expression),
}

impl Binding {
    /// Interpret the right hand side of an assignment, treating a bare
    /// (optionally signed) number as a [`Binding::FixedValue`] and anything
    /// else as a [`Binding::Formula`].
    pub fn from_rhs(rhs: &str) -> Result<Binding, ParseError> {
        let rhs = rhs.trim();

        if LITERAL.is_match(rhs) {
            if let Ok(value) = rhs.parse() {
                return Ok(Binding::FixedValue(value));
            }
        }

        Ok(Binding::Formula(rhs.parse()?))
    }
}

/// A single `name = rhs` assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct Equation {
    pub name: SmolStr,
    pub binding: Binding,
}

impl FromStr for Equation {
    type Err = EquationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.find('=') {
            Some(index) => {
                let (left, right) = s.split_at(index);
                let right = &right[1..];

                Ok(Equation {
                    name: left.trim().into(),
                    binding: Binding::from_rhs(right)?,
                })
            },
            None => Err(EquationError::MissingEquals),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EquationError {
    MissingEquals,
    Parse(ParseError),
}

impl From<ParseError> for EquationError {
    fn from(e: ParseError) -> Self { EquationError::Parse(e) }
}

impl Display for EquationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            EquationError::MissingEquals => {
                write!(f, "Equations are written as \"name = expression\"")
            },
            EquationError::Parse(_) => write!(f, "Unable to parse the equation"),
        }
    }
}

impl Error for EquationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            EquationError::Parse(inner) => Some(inner),
            _ => None,
        }
    }
}

/// Every name that has been bound, and what it is bound to.
///
/// Each name has exactly one [`Binding`], and inserting a name again replaces
/// it.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Equations {
    bindings: HashMap<SmolStr, Binding>,
}

impl Equations {
    pub fn new() -> Self { Equations::default() }

    pub fn push(&mut self, equation: Equation) {
        self.insert(equation.name, equation.binding);
    }

    /// Bind a name, returning whatever it was previously bound to.
    pub fn insert(&mut self, name: SmolStr, binding: Binding) -> Option<Binding> {
        self.bindings.insert(name, binding)
    }

    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.bindings.keys().map(SmolStr::as_str)
    }

    pub fn len(&self) -> usize { self.bindings.len() }

    pub fn is_empty(&self) -> bool { self.bindings.is_empty() }
}

impl Extend<Equation> for Equations {
    fn extend<T: IntoIterator<Item = Equation>>(&mut self, iter: T) {
        for equation in iter {
            self.push(equation);
        }
    }
}

impl FromIterator<Equation> for Equations {
    fn from_iter<T: IntoIterator<Item = Equation>>(iter: T) -> Self {
        let mut equations = Equations::new();
        equations.extend(iter);
        equations
    }
}

impl<'a> IntoIterator for &'a Equations {
    type IntoIter = hash_map::Iter<'a, SmolStr, Binding>;
    type Item = (&'a SmolStr, &'a Binding);

    fn into_iter(self) -> Self::IntoIter { self.bindings.iter() }
}
