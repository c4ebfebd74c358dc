use smol_str::SmolStr;
use std::{
    fmt::{self, Display, Formatter},
    ops::{Add, Div, Mul, Neg, Sub},
};

/// An expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// A fixed number.
    Literal(f64),
    /// A bare identifier, resolved later against the builtin constants or the
    /// other equations.
    Reference(SmolStr),
    /// Invoke a named function with a single argument.
    FunctionCall {
        function: SmolStr,
        argument: Box<Expression>,
    },
    /// An expression involving two operands.
    Binary {
        left: Box<Expression>,
        right: Box<Expression>,
        op: BinaryOperation,
    },
}

impl Expression {
    pub fn reference<S: Into<SmolStr>>(name: S) -> Self {
        Expression::Reference(name.into())
    }

    pub fn call<S: Into<SmolStr>>(function: S, argument: Expression) -> Self {
        Expression::FunctionCall {
            function: function.into(),
            argument: Box::new(argument),
        }
    }

    /// Raise this expression to some power.
    pub fn pow(self, exponent: Expression) -> Self {
        Expression::binary(self, BinaryOperation::Power, exponent)
    }

    pub(crate) fn binary(
        left: Expression,
        op: BinaryOperation,
        right: Expression,
    ) -> Self {
        Expression::Binary {
            left: Box::new(left),
            right: Box::new(right),
            op,
        }
    }

    /// Every name this expression refers to, in the order they first appear.
    ///
    /// Function names are not included, only bare references.
    pub fn references(&self) -> impl Iterator<Item = &str> + '_ {
        let mut names = Vec::new();
        self.collect_references(&mut names);
        names.into_iter()
    }

    fn collect_references<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            Expression::Literal(_) => {},
            Expression::Reference(name) => {
                if !names.contains(&name.as_str()) {
                    names.push(name.as_str());
                }
            },
            Expression::FunctionCall { argument, .. } => {
                argument.collect_references(names)
            },
            Expression::Binary { left, right, .. } => {
                left.collect_references(names);
                right.collect_references(names);
            },
        }
    }

    /// How tightly this expression binds when printed as an operand.
    fn precedence(&self) -> u8 {
        match self {
            Expression::Binary { op, .. } => op.precedence(),
            // negative literals always get wrapped
            Expression::Literal(value) if *value < 0.0 => 0,
            _ => u8::MAX,
        }
    }
}

/// An operation that can be applied to two arguments.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum BinaryOperation {
    Plus,
    Minus,
    Times,
    Divide,
    Power,
}

impl BinaryOperation {
    /// Apply the operation using plain IEEE-754 semantics (division by zero
    /// gives an infinity or NaN).
    pub fn apply(self, left: f64, right: f64) -> f64 {
        match self {
            BinaryOperation::Plus => left + right,
            BinaryOperation::Minus => left - right,
            BinaryOperation::Times => left * right,
            BinaryOperation::Divide => left / right,
            BinaryOperation::Power => left.powf(right),
        }
    }

    fn precedence(self) -> u8 {
        match self {
            BinaryOperation::Plus | BinaryOperation::Minus => 1,
            BinaryOperation::Times | BinaryOperation::Divide => 2,
            BinaryOperation::Power => 3,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperation::Plus => "+",
            BinaryOperation::Minus => "-",
            BinaryOperation::Times => "*",
            BinaryOperation::Divide => "/",
            BinaryOperation::Power => "^",
        }
    }
}

// define some operator overloads to make constructing an expression easier.

impl Add for Expression {
    type Output = Expression;

    fn add(self, rhs: Expression) -> Expression {
        Expression::binary(self, BinaryOperation::Plus, rhs)
    }
}

impl Sub for Expression {
    type Output = Expression;

    fn sub(self, rhs: Expression) -> Expression {
        Expression::binary(self, BinaryOperation::Minus, rhs)
    }
}

impl Mul for Expression {
    type Output = Expression;

    fn mul(self, rhs: Expression) -> Expression {
        Expression::binary(self, BinaryOperation::Times, rhs)
    }
}

impl Div for Expression {
    type Output = Expression;

    fn div(self, rhs: Expression) -> Expression {
        Expression::binary(self, BinaryOperation::Divide, rhs)
    }
}

/// Negation is expressed as multiplication by `-1` so evaluation never needs
/// a separate unary case.
impl Neg for Expression {
    type Output = Expression;

    fn neg(self) -> Self::Output { Expression::Literal(-1.0) * self }
}

impl Display for Expression {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(value) => write!(f, "{}", value),
            Expression::Reference(name) => write!(f, "{}", name),
            Expression::Binary { left, right, op } => {
                let precedence = op.precedence();
                write_operand(left, left.precedence() < precedence, f)?;

                match op {
                    BinaryOperation::Plus | BinaryOperation::Minus => {
                        write!(f, " {} ", op.symbol())?
                    },
                    _ => write!(f, "{}", op.symbol())?,
                }

                // operators are left-associative
                write_operand(right, right.precedence() <= precedence, f)?;

                Ok(())
            },
            Expression::FunctionCall { function, argument } => {
                write!(f, "{}({})", function, argument)
            },
        }
    }
}

fn write_operand(
    expr: &Expression,
    parenthesize: bool,
    f: &mut Formatter<'_>,
) -> fmt::Result {
    if parenthesize {
        write!(f, "({})", expr)
    } else {
        write!(f, "{}", expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        let x = || Expression::reference("x");
        let inputs = vec![
            (Expression::Literal(3.0), "3"),
            (Expression::Literal(2.5), "2.5"),
            (x(), "x"),
            (Expression::call("sin", Expression::Literal(5.0)), "sin(5)"),
            (-x(), "(-1)*x"),
            (-Expression::call("sin", x()), "(-1)*sin(x)"),
            (Expression::Literal(1.0) + Expression::Literal(1.0), "1 + 1"),
            (Expression::Literal(1.0) - Expression::Literal(1.0), "1 - 1"),
            (Expression::Literal(1.0) * Expression::Literal(1.0), "1*1"),
            (Expression::Literal(1.0) / Expression::Literal(1.0), "1/1"),
            (x().pow(Expression::Literal(2.0)), "x^2"),
            (Expression::Literal(-4.0), "-4"),
            (
                Expression::Literal(1.0)
                    - (Expression::Literal(2.0) - Expression::Literal(3.0)),
                "1 - (2 - 3)",
            ),
            (
                Expression::Literal(1.0) - Expression::Literal(2.0)
                    + Expression::Literal(3.0),
                "1 - 2 + 3",
            ),
            (
                Expression::Literal(2.0) * x().pow(Expression::Literal(2.0)),
                "2*x^2",
            ),
            (
                (Expression::Literal(1.0) + Expression::Literal(2.0))
                    / Expression::Literal(3.0),
                "(1 + 2)/3",
            ),
        ];

        for (expr, should_be) in inputs {
            let got = expr.to_string();
            assert_eq!(got, should_be);
        }
    }

    #[test]
    fn references_are_deduplicated_and_ordered() {
        let expr = Expression::reference("y")
            + Expression::call("cos", Expression::reference("x"))
            + Expression::reference("y") * Expression::Literal(2.0);

        let got: Vec<_> = expr.references().collect();

        assert_eq!(got, vec!["y", "x"]);
    }

    #[test]
    fn function_names_are_not_references() {
        let expr = Expression::call("sqrt", Expression::Literal(4.0));

        assert_eq!(expr.references().count(), 0);
    }

    #[test]
    fn binary_operations_use_float_semantics() {
        assert_eq!(BinaryOperation::Power.apply(2.0, 10.0), 1024.0);
        assert_eq!(BinaryOperation::Divide.apply(1.0, 0.0), f64::INFINITY);
        assert!(BinaryOperation::Divide.apply(0.0, 0.0).is_nan());
        assert!(BinaryOperation::Power.apply(-8.0, 1.0 / 3.0).is_nan());
    }
}
