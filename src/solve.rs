use crate::{
    algebra::{self, Expression, NormalizationError, ParseError},
    config::{CachePolicy, Config, DomainPolicy},
    equations::{Binding, Equation, Equations},
    ops::{self, Builtins, Context, EvaluationError, Strict},
};
use log::debug;
use smol_str::SmolStr;
use std::{
    cell::RefCell,
    collections::{BTreeMap, HashMap},
    error::Error,
    fmt::{self, Display, Formatter},
};

/// Stores named equations and evaluates them on demand.
///
/// A name is bound to either a fixed value or a formula. Evaluating a formula
/// recursively evaluates every name it refers to, so equations may be defined
/// in any order as long as they don't (transitively) refer to themselves.
///
/// ```rust
/// use eqsolve::Solver;
///
/// let mut solver = Solver::new();
/// solver.define("y", "x^2 + 2x")?;
/// solver.set_value("x", 3.0)?;
///
/// assert_eq!(solver.evaluate("y")?, 15.0);
/// # Ok::<(), eqsolve::SolveError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Solver<C = Builtins> {
    equations: Equations,
    cache: RefCell<HashMap<SmolStr, f64>>,
    /// The names currently being evaluated, outermost first.
    in_flight: RefCell<Vec<SmolStr>>,
    ctx: C,
    config: Config,
}

impl Solver<Builtins> {
    pub fn new() -> Self { Solver::with_config(Config::default()) }

    pub fn with_config(config: Config) -> Self {
        Solver::with_context(Builtins::default(), config)
    }
}

impl Default for Solver<Builtins> {
    fn default() -> Self { Solver::new() }
}

impl<C: Context> Solver<C> {
    /// Create a [`Solver`] which uses a custom set of builtins.
    pub fn with_context(ctx: C, config: Config) -> Self {
        Solver {
            equations: Equations::new(),
            cache: RefCell::new(HashMap::new()),
            in_flight: RefCell::new(Vec::new()),
            ctx,
            config,
        }
    }

    pub fn config(&self) -> &Config { &self.config }

    pub fn equations(&self) -> &Equations { &self.equations }

    pub fn binding(&self, name: &str) -> Option<&Binding> {
        self.equations.get(name)
    }

    /// Every bound name, sorted alphabetically.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.equations.names().collect();
        names.sort();
        names
    }

    /// Parse `expression_text` and bind it to `name`, replacing whatever was
    /// there before.
    pub fn define(
        &mut self,
        name: &str,
        expression_text: &str,
    ) -> Result<(), SolveError> {
        let name = self.check_name(name)?;
        let formula = algebra::parse(expression_text)?;

        self.bind(name, Binding::Formula(formula));
        Ok(())
    }

    /// Bind `name` to a fixed value, replacing whatever was there before.
    pub fn set_value(
        &mut self,
        name: &str,
        value: f64,
    ) -> Result<(), SolveError> {
        let name = self.check_name(name)?;

        self.bind(name, Binding::FixedValue(value));
        Ok(())
    }

    /// Bind `name` to `rhs`, using [`Solver::set_value()`] when `rhs` is a
    /// plain number and [`Solver::define()`] otherwise.
    pub fn define_or_set(
        &mut self,
        name: &str,
        rhs: &str,
    ) -> Result<(), SolveError> {
        let name = self.check_name(name)?;
        let binding = Binding::from_rhs(rhs)?;

        self.bind(name, binding);
        Ok(())
    }

    /// Add a parsed `name = rhs` [`Equation`].
    pub fn push(&mut self, equation: Equation) -> Result<(), SolveError> {
        let name = self.check_name(&equation.name)?;

        self.bind(name, equation.binding);
        Ok(())
    }

    fn bind(&mut self, name: SmolStr, binding: Binding) {
        match &binding {
            Binding::FixedValue(value) => debug!("Set {} = {}", name, value),
            Binding::Formula(formula) => {
                debug!("Defined {} = {}", name, formula)
            },
        }

        self.equations.insert(name, binding);
        self.invalidate();
    }

    /// Forget every cached value.
    ///
    /// Any binding may feed into any other, so a change to one name can't
    /// invalidate less than the whole cache.
    fn invalidate(&mut self) {
        let cache = self.cache.get_mut();

        if !cache.is_empty() {
            debug!("Clearing {} cached values", cache.len());
            cache.clear();
        }
    }

    pub(crate) fn check_name(
        &self,
        name: &str,
    ) -> Result<SmolStr, SolveError> {
        let name = name.trim();

        if !algebra::is_identifier(name) {
            Err(SolveError::InvalidName { name: name.into() })
        } else if self.ctx.is_builtin(name) {
            Err(SolveError::ReservedName { name: name.into() })
        } else {
            Ok(name.into())
        }
    }

    /// Get the numeric value of a name.
    pub fn evaluate(&mut self, name: &str) -> Result<f64, SolveError> {
        let got = self.evaluate_name(name);

        debug_assert!(
            self.in_flight.get_mut().is_empty(),
            "Names were left in flight: {:?}",
            self.in_flight
        );

        got
    }

    fn evaluate_name(&self, name: &str) -> Result<f64, SolveError> {
        self.check_for_cycle(name)?;

        if let Some(value) = self.cache.borrow().get(name) {
            return Ok(*value);
        }

        let value = match self.equations.get(name) {
            Some(Binding::FixedValue(value)) => *value,
            Some(Binding::Formula(formula)) => {
                self.check_depth(name)?;
                let _guard = InFlight::enter(&self.in_flight, name);
                self.evaluate_formula(formula)?
            },
            None => {
                return self.ctx.constant(name).ok_or_else(|| {
                    SolveError::UnknownName { name: name.into() }
                })
            },
        };

        if self.config.cache == CachePolicy::Memoize {
            self.cache.borrow_mut().insert(name.into(), value);
        }

        Ok(value)
    }

    fn check_for_cycle(&self, name: &str) -> Result<(), SolveError> {
        let in_flight = self.in_flight.borrow();
        let position = in_flight.iter().position(|n| n.as_str() == name);

        match position {
            Some(start) => {
                let mut chain = in_flight[start..].to_vec();
                chain.push(name.into());
                debug!("Found a circular dependency on \"{}\"", name);

                Err(SolveError::CircularDependency {
                    name: name.into(),
                    chain,
                })
            },
            None => Ok(()),
        }
    }

    fn check_depth(&self, name: &str) -> Result<(), SolveError> {
        let limit = self.config.max_depth;

        if self.in_flight.borrow().len() >= limit {
            Err(SolveError::TooDeep {
                name: name.into(),
                limit,
            })
        } else {
            Ok(())
        }
    }

    fn evaluate_formula(
        &self,
        formula: &Expression,
    ) -> Result<f64, SolveError> {
        let mut resolve = |name: &str| self.evaluate_name(name);

        match self.config.domain {
            DomainPolicy::Propagate => {
                ops::evaluate(formula, &self.ctx, &mut resolve)
            },
            DomainPolicy::Reject => {
                ops::evaluate(formula, &Strict(&self.ctx), &mut resolve)
            },
        }
    }

    /// The names a formula refers to, excluding builtin constants.
    ///
    /// Returns `None` when `name` isn't bound.
    pub fn dependencies(&self, name: &str) -> Option<Vec<&str>> {
        match self.equations.get(name)? {
            Binding::FixedValue(_) => Some(Vec::new()),
            Binding::Formula(formula) => Some(
                formula
                    .references()
                    .filter(|r| self.ctx.constant(r).is_none())
                    .collect(),
            ),
        }
    }

    /// Every value known without doing any more evaluation, i.e. the fixed
    /// values and whatever has been cached.
    pub fn snapshot_values(&self) -> BTreeMap<SmolStr, f64> {
        let mut values: BTreeMap<SmolStr, f64> = self
            .cache
            .borrow()
            .iter()
            .map(|(name, value)| (name.clone(), *value))
            .collect();

        for (name, binding) in &self.equations {
            if let Binding::FixedValue(value) = binding {
                values.insert(name.clone(), *value);
            }
        }

        values
    }
}

/// Marks a name as being evaluated until the guard is dropped.
struct InFlight<'a> {
    stack: &'a RefCell<Vec<SmolStr>>,
}

impl<'a> InFlight<'a> {
    fn enter(stack: &'a RefCell<Vec<SmolStr>>, name: &str) -> Self {
        stack.borrow_mut().push(name.into());
        InFlight { stack }
    }
}

impl<'a> Drop for InFlight<'a> {
    fn drop(&mut self) { self.stack.borrow_mut().pop(); }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SolveError {
    Normalization(NormalizationError),
    Parse(ParseError),
    UnknownName {
        name: SmolStr,
    },
    UnknownFunction {
        name: SmolStr,
    },
    CircularDependency {
        name: SmolStr,
        /// The evaluation stack, starting and ending with `name`.
        chain: Vec<SmolStr>,
    },
    Domain {
        function: SmolStr,
        argument: f64,
    },
    InvalidName {
        name: SmolStr,
    },
    /// The name belongs to a builtin constant or function.
    ReservedName {
        name: SmolStr,
    },
    InvalidStep {
        step: f64,
    },
    TooManySamples {
        limit: usize,
    },
    /// Evaluating `name` needed a chain of more than `limit` formulas.
    TooDeep {
        name: SmolStr,
        limit: usize,
    },
}

impl From<ParseError> for SolveError {
    fn from(e: ParseError) -> Self {
        match e {
            ParseError::Normalization(inner) => {
                SolveError::Normalization(inner)
            },
            other => SolveError::Parse(other),
        }
    }
}

impl From<NormalizationError> for SolveError {
    fn from(e: NormalizationError) -> Self { SolveError::Normalization(e) }
}

impl From<EvaluationError> for SolveError {
    fn from(e: EvaluationError) -> Self {
        match e {
            EvaluationError::UnknownFunction { name } => {
                SolveError::UnknownFunction { name }
            },
            EvaluationError::Domain { function, argument } => {
                SolveError::Domain { function, argument }
            },
        }
    }
}

impl Display for SolveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SolveError::Normalization(_) | SolveError::Parse(_) => {
                write!(f, "Unable to parse the expression")
            },
            SolveError::UnknownName { name } => {
                write!(f, "\"{}\" is not defined", name)
            },
            SolveError::UnknownFunction { name } => {
                write!(f, "Unknown function \"{}\"", name)
            },
            SolveError::CircularDependency { name, chain } => {
                let chain: Vec<_> = chain.iter().map(SmolStr::as_str).collect();
                write!(
                    f,
                    "\"{}\" depends on itself ({})",
                    name,
                    chain.join(" -> ")
                )
            },
            SolveError::Domain { function, argument } => write!(
                f,
                "{} is outside the domain of \"{}\"",
                argument, function
            ),
            SolveError::InvalidName { name } => {
                write!(f, "\"{}\" is not a valid name", name)
            },
            SolveError::ReservedName { name } => {
                write!(f, "\"{}\" is a builtin and can't be redefined", name)
            },
            SolveError::InvalidStep { step } => {
                write!(f, "The step must be positive, not {}", step)
            },
            SolveError::TooManySamples { limit } => {
                write!(f, "Sampling would produce more than {} points", limit)
            },
            SolveError::TooDeep { name, limit } => write!(
                f,
                "Evaluating \"{}\" goes more than {} formulas deep",
                name, limit
            ),
        }
    }
}

impl Error for SolveError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SolveError::Normalization(inner) => Some(inner),
            SolveError::Parse(inner) => Some(inner),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn solver_with(equations: &[(&str, &str)]) -> Solver {
        let mut solver = Solver::new();

        for (name, rhs) in equations {
            solver.define_or_set(name, rhs).unwrap();
        }

        solver
    }

    #[test]
    fn implicit_multiplication() {
        let mut solver = solver_with(&[("x", "3"), ("y", "8x")]);

        assert_eq!(solver.evaluate("y").unwrap(), 24.0);
    }

    #[test]
    fn nested_function_calls() {
        let mut solver = solver_with(&[("y", "cos(sin(0))")]);

        assert_eq!(solver.evaluate("y").unwrap(), 1.0);
    }

    #[test]
    fn names_can_be_defined_in_any_order() {
        let mut solver =
            solver_with(&[("z", "y + 1"), ("y", "x^2"), ("x", "-4")]);

        assert_eq!(solver.evaluate("z").unwrap(), 17.0);
        assert_eq!(solver.evaluate("y").unwrap(), 16.0);
    }

    #[test]
    fn builtin_constants() {
        let mut solver =
            solver_with(&[("circumference", "2pi*r"), ("r", "1")]);

        approx::assert_relative_eq!(
            solver.evaluate("circumference").unwrap(),
            2.0 * PI
        );
    }

    #[test]
    fn circular_dependency() {
        let mut solver = solver_with(&[
            ("a", "b + 1"),
            ("b", "a + 1"),
            ("c", "2*d"),
            ("d", "4"),
        ]);

        let got = solver.evaluate("a").unwrap_err();

        assert_eq!(
            got,
            SolveError::CircularDependency {
                name: "a".into(),
                chain: vec!["a".into(), "b".into(), "a".into()],
            }
        );
        assert!(solver.in_flight.borrow().is_empty());
        // an unrelated name still evaluates
        assert_eq!(solver.evaluate("c").unwrap(), 8.0);
    }

    #[test]
    fn self_reference() {
        let mut solver = solver_with(&[("a", "a + 1")]);

        let got = solver.evaluate("a").unwrap_err();

        assert_eq!(got.to_string(), "\"a\" depends on itself (a -> a)");
    }

    #[test]
    fn builtin_constants_can_be_evaluated_directly() {
        let mut solver = Solver::new();

        approx::assert_relative_eq!(solver.evaluate("pi").unwrap(), PI);
        approx::assert_relative_eq!(
            solver.evaluate("e").unwrap(),
            std::f64::consts::E
        );
        assert!(solver.snapshot_values().is_empty());
    }

    #[test]
    fn long_chains_of_formulas_are_cut_off() {
        let config = Config::default().with_max_depth(10);
        let mut solver = Solver::with_config(config);
        for i in 0..20 {
            let rhs = format!("a{} + 1", i + 1);
            solver.define(&format!("a{}", i), &rhs).unwrap();
        }
        solver.set_value("a20", 0.0).unwrap();

        let got = solver.evaluate("a0").unwrap_err();

        assert_eq!(
            got,
            SolveError::TooDeep {
                name: "a10".into(),
                limit: 10
            }
        );
        assert!(solver.in_flight.borrow().is_empty());
        assert_eq!(solver.evaluate("a15").unwrap(), 5.0);
    }

    #[test]
    fn chains_within_the_limit_are_evaluated() {
        let mut solver = Solver::new();
        for i in 0..100 {
            let rhs = format!("a{} + 1", i + 1);
            solver.define(&format!("a{}", i), &rhs).unwrap();
        }
        solver.set_value("a100", 0.0).unwrap();

        assert_eq!(solver.evaluate("a0").unwrap(), 100.0);
    }

    #[test]
    fn identifiers_containing_reserved_words_can_be_referenced() {
        let mut solver = solver_with(&[
            ("a_sin", "3"),
            ("var5e", "3"),
            ("z", "a_sin(2)"),
            ("w", "var5e + 1"),
        ]);

        assert_eq!(solver.evaluate("z").unwrap(), 6.0);
        assert_eq!(solver.evaluate("w").unwrap(), 4.0);
    }

    #[test]
    fn unknown_name() {
        let mut solver = Solver::new();

        let got = solver.evaluate("nope").unwrap_err();

        assert_eq!(got, SolveError::UnknownName { name: "nope".into() });
    }

    #[test]
    fn failures_deep_in_the_tree_leave_nothing_in_flight() {
        let mut solver = solver_with(&[("a", "b"), ("b", "c*q")]);

        let got = solver.evaluate("a").unwrap_err();

        assert_eq!(got, SolveError::UnknownName { name: "c".into() });
        assert!(solver.in_flight.borrow().is_empty());

        solver.set_value("c", 2.0).unwrap();
        solver.set_value("q", 5.0).unwrap();
        assert_eq!(solver.evaluate("a").unwrap(), 10.0);
    }

    #[test]
    fn unknown_words_before_brackets_are_multiplied() {
        let mut solver = solver_with(&[("y", "asin(1)")]);

        let got = solver.evaluate("y").unwrap_err();

        assert_eq!(got, SolveError::UnknownName { name: "asin".into() });
    }

    #[test]
    fn redefining_a_dependency_invalidates_dependents() {
        let mut solver =
            solver_with(&[("x", "1"), ("y", "x + 1"), ("z", "y*2")]);
        assert_eq!(solver.evaluate("z").unwrap(), 4.0);

        solver.set_value("x", 5.0).unwrap();
        assert_eq!(solver.evaluate("z").unwrap(), 12.0);

        solver.define("y", "x - 1").unwrap();
        assert_eq!(solver.evaluate("z").unwrap(), 8.0);
    }

    #[test]
    fn set_value_replaces_a_formula() {
        let mut solver = solver_with(&[("x", "2"), ("y", "x^2")]);
        assert_eq!(solver.evaluate("y").unwrap(), 4.0);

        solver.set_value("y", 7.0).unwrap();

        assert_eq!(solver.binding("y"), Some(&Binding::FixedValue(7.0)));
        assert_eq!(solver.evaluate("y").unwrap(), 7.0);
    }

    #[test]
    fn evaluated_values_are_cached() {
        let mut solver = solver_with(&[("x", "2"), ("y", "x^2"), ("z", "1")]);

        solver.evaluate("y").unwrap();
        let got = solver.snapshot_values();

        let should_be: BTreeMap<SmolStr, f64> =
            vec![("x".into(), 2.0), ("y".into(), 4.0), ("z".into(), 1.0)]
                .into_iter()
                .collect();
        assert_eq!(got, should_be);
    }

    #[test]
    fn disabled_cache_only_snapshots_fixed_values() {
        let config = Config::default().with_cache(CachePolicy::Disabled);
        let mut solver = Solver::with_config(config);
        solver.set_value("x", 2.0).unwrap();
        solver.define("y", "x^2").unwrap();

        assert_eq!(solver.evaluate("y").unwrap(), 4.0);

        assert!(solver.cache.borrow().is_empty());
        assert_eq!(solver.snapshot_values().len(), 1);
    }

    #[test]
    fn domain_errors_propagate_as_nan_by_default() {
        let mut solver = solver_with(&[("x", "-1"), ("y", "sqrt(x)")]);

        assert!(solver.evaluate("y").unwrap().is_nan());
    }

    #[test]
    fn domain_errors_can_be_rejected() {
        let config = Config::default().with_domain(DomainPolicy::Reject);
        let mut solver = Solver::with_config(config);
        solver.set_value("x", -1.0).unwrap();
        solver.define("y", "ln(x)").unwrap();

        let got = solver.evaluate("y").unwrap_err();

        assert_eq!(
            got,
            SolveError::Domain {
                function: "ln".into(),
                argument: -1.0
            }
        );
        assert!(solver.in_flight.borrow().is_empty());
    }

    #[test]
    fn builtins_cant_be_redefined() {
        let mut solver = Solver::new();

        for name in &["pi", "e", "sin", "sqrt"] {
            let got = solver.set_value(name, 3.0).unwrap_err();

            assert_eq!(
                got,
                SolveError::ReservedName {
                    name: (*name).into()
                }
            );
        }
    }

    #[test]
    fn names_must_be_identifiers() {
        let mut solver = Solver::new();

        for name in &["", "2a", "a b", "x+1"] {
            let got = solver.define(name, "1").unwrap_err();

            assert_eq!(
                got,
                SolveError::InvalidName {
                    name: name.trim().into()
                }
            );
        }

        solver.define(" theta ", "pi/4").unwrap();
        assert!(solver.binding("theta").is_some());
    }

    #[test]
    fn bad_expressions_are_reported_when_defined() {
        let mut solver = Solver::new();

        let got = solver.define("y", "cos(sin(y)").unwrap_err();
        assert_eq!(
            got,
            SolveError::Normalization(NormalizationError::UnbalancedBrackets {
                opening: 2,
                closing: 1
            })
        );

        let got = solver.define("y", "1 + * 2").unwrap_err();
        match got {
            SolveError::Parse(ParseError::UnexpectedToken { .. }) => {},
            other => panic!("Unexpected error: {:?}", other),
        }

        assert!(solver.binding("y").is_none());
    }

    #[test]
    fn define_or_set_tells_numbers_from_formulas() {
        let solver = solver_with(&[("x", " -2.5 "), ("y", "x + 1")]);

        assert_eq!(solver.binding("x"), Some(&Binding::FixedValue(-2.5)));
        match solver.binding("y") {
            Some(Binding::Formula(_)) => {},
            other => panic!("Expected a formula, found {:?}", other),
        }
    }

    #[test]
    fn push_parsed_equations() {
        let mut solver = Solver::new();

        for src in &["y = 2x + 1", "x = 4"] {
            solver.push(src.parse().unwrap()).unwrap();
        }

        assert_eq!(solver.evaluate("y").unwrap(), 9.0);
        assert_eq!(
            solver.push("pi = 3".parse().unwrap()).unwrap_err(),
            SolveError::ReservedName { name: "pi".into() }
        );
    }

    #[test]
    fn list_dependencies() {
        let solver = solver_with(&[(
            "y",
            "x^2 + y^2 - log(x) - cos[sin(y)] + 8x + 6pi",
        )]);

        assert_eq!(solver.dependencies("y"), Some(vec!["x", "y"]));
        assert_eq!(solver.dependencies("x"), None);
        assert_eq!(solver.names(), vec!["y"]);
    }
}
