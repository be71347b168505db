//! Formula parsing and evaluation.
//!
//! Formulas are ordinary algebraic expressions over the point coordinates `x`
//! and `y`, numeric constants, and fit parameters written as `[k]`:
//!
//! ```text
//! [0] * x^[1] / (1 + [2] * exp(-y / [3]))
//! ```
//!
//! The grammar is parsed with `nom` into an [`Expression`] tree once, at
//! definition load time, and evaluated many times by the objective function.

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{alpha1, alphanumeric1, char, digit1, multispace0},
    combinator::recognize,
    multi::many0,
    number::complete::double,
    sequence::{delimited, pair},
    IResult, Parser,
};
use thiserror::Error;

/// Error that can occur during formula parsing or evaluation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("Failed to parse formula: {message}")]
    ParseError { message: String },

    #[error("Undefined variable: {name}")]
    UndefinedVariable { name: String },

    #[error("Parameter index [{index}] out of range ({count} parameters)")]
    ParameterOutOfRange { index: usize, count: usize },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Invalid operation: {message}")]
    InvalidOperation { message: String },

    #[error("Undefined function: {name}")]
    UndefinedFunction { name: String },
}

/// Result type for expression evaluation
type ExprResult<T> = Result<T, ExpressionError>;

/// Expression AST node
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Constant number
    Number(f64),

    /// Named variable (`x` or `y` in model formulas)
    Variable(String),

    /// Fit parameter `[k]`
    Parameter(usize),

    /// Unary operations
    Unary(UnaryOp, Box<Expression>),

    /// Binary operations
    Binary(BinaryOp, Box<Expression>, Box<Expression>),

    /// Function call
    Function(String, Vec<Expression>),
}

/// Unary operations
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOp {
    /// Negation (-)
    Neg,
}

/// Binary operations
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

/// Source of variable and parameter values during evaluation
pub trait EvaluationContext {
    /// Get the value of a named variable
    fn get_variable(&self, name: &str) -> ExprResult<f64>;

    /// Get the value of parameter `[index]`
    fn get_parameter(&self, index: usize) -> ExprResult<f64>;
}

impl Expression {
    /// Parse an expression from a string
    pub fn parse(input: &str) -> ExprResult<Self> {
        match expr_parser(input.trim()) {
            Ok((remainder, expr)) => {
                // Make sure the entire input was consumed
                if remainder.trim().is_empty() {
                    Ok(expr)
                } else {
                    Err(ExpressionError::ParseError {
                        message: format!("Unexpected trailing characters: '{}'", remainder),
                    })
                }
            }
            Err(e) => Err(ExpressionError::ParseError {
                message: format!("{:?}", e),
            }),
        }
    }

    /// Evaluate the expression with the given context
    pub fn evaluate<C: EvaluationContext>(&self, context: &C) -> ExprResult<f64> {
        match self {
            Self::Number(n) => Ok(*n),

            Self::Variable(name) => context.get_variable(name),

            Self::Parameter(index) => context.get_parameter(*index),

            Self::Unary(UnaryOp::Neg, expr) => Ok(-expr.evaluate(context)?),

            Self::Binary(op, left, right) => {
                let lhs = left.evaluate(context)?;
                let rhs = right.evaluate(context)?;

                match op {
                    BinaryOp::Add => Ok(lhs + rhs),
                    BinaryOp::Sub => Ok(lhs - rhs),
                    BinaryOp::Mul => Ok(lhs * rhs),
                    BinaryOp::Div => {
                        if rhs == 0.0 {
                            Err(ExpressionError::DivisionByZero)
                        } else {
                            Ok(lhs / rhs)
                        }
                    }
                    BinaryOp::Pow => Ok(lhs.powf(rhs)),
                }
            }

            Self::Function(name, args) => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(arg.evaluate(context)?);
                }
                call_function(name, &values)
            }
        }
    }

    /// Find all variable names used in the expression
    pub fn variables(&self) -> Vec<String> {
        let mut vars = Vec::new();
        self.walk(&mut |node| {
            if let Self::Variable(name) = node {
                vars.push(name.clone());
            }
        });
        vars.sort();
        vars.dedup();
        vars
    }

    /// Number of parameter slots the expression needs (highest `[k]` plus one)
    pub fn parameter_span(&self) -> usize {
        let mut span = 0;
        self.walk(&mut |node| {
            if let Self::Parameter(index) = node {
                span = span.max(index + 1);
            }
        });
        span
    }

    fn walk<F: FnMut(&Expression)>(&self, visit: &mut F) {
        visit(self);
        match self {
            Self::Number(_) | Self::Variable(_) | Self::Parameter(_) => {}
            Self::Unary(_, expr) => expr.walk(visit),
            Self::Binary(_, left, right) => {
                left.walk(visit);
                right.walk(visit);
            }
            Self::Function(_, args) => {
                for arg in args {
                    arg.walk(visit);
                }
            }
        }
    }
}

fn expect_args(name: &str, values: &[f64], count: usize) -> ExprResult<()> {
    if values.len() != count {
        return Err(ExpressionError::InvalidOperation {
            message: format!(
                "{}() requires {} argument(s), got {}",
                name,
                count,
                values.len()
            ),
        });
    }
    Ok(())
}

fn call_function(name: &str, values: &[f64]) -> ExprResult<f64> {
    let unary: Option<fn(f64) -> f64> = match name {
        "sin" => Some(f64::sin),
        "cos" => Some(f64::cos),
        "tan" => Some(f64::tan),
        "tanh" => Some(f64::tanh),
        "exp" => Some(f64::exp),
        "log" | "ln" => Some(f64::ln),
        "log10" => Some(f64::log10),
        "sqrt" => Some(f64::sqrt),
        "abs" => Some(f64::abs),
        _ => None,
    };
    if let Some(f) = unary {
        expect_args(name, values, 1)?;
        return Ok(f(values[0]));
    }

    match name {
        "pow" => {
            expect_args(name, values, 2)?;
            Ok(values[0].powf(values[1]))
        }
        "max" | "min" => {
            if values.len() < 2 {
                return Err(ExpressionError::InvalidOperation {
                    message: format!(
                        "{}() requires at least 2 arguments, got {}",
                        name,
                        values.len()
                    ),
                });
            }
            if name == "max" {
                Ok(values.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b)))
            } else {
                Ok(values.iter().fold(f64::INFINITY, |a, &b| a.min(b)))
            }
        }
        _ => Err(ExpressionError::UndefinedFunction {
            name: name.to_string(),
        }),
    }
}

// Parser functions using nom

/// Parse an identifier (variable or function name)
fn identifier(input: &str) -> IResult<&str, String> {
    let mut parser = recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ));

    let (input, matched) = parser.parse(input)?;
    Ok((input, matched.to_string()))
}

/// Parse a comma-separated list of expressions (for function arguments)
fn args_list(input: &str) -> IResult<&str, Vec<Expression>> {
    let (input, first) = expr_parser(input)?;
    let mut res = vec![first];

    let mut remainder = input;
    loop {
        let mut comma_parser = delimited(
            multispace0::<&str, nom::error::Error<&str>>,
            char::<&str, nom::error::Error<&str>>(','),
            multispace0::<&str, nom::error::Error<&str>>,
        );

        match comma_parser.parse(remainder) {
            Ok((after_comma, _)) => {
                let (after_expr, expr) = expr_parser(after_comma)?;
                res.push(expr);
                remainder = after_expr;
            }
            Err(_) => break,
        }
    }

    Ok((remainder, res))
}

/// Parse a function call
fn function_call(input: &str) -> IResult<&str, Expression> {
    let (input, name) = identifier(input)?;
    let (input, _) = multispace0.parse(input)?;
    let (input, _) = char::<_, nom::error::Error<_>>('(').parse(input)?;
    let (input, _) = multispace0.parse(input)?;

    // Handle empty arguments case
    if let Ok((input, _)) = char::<_, nom::error::Error<_>>(')').parse(input) {
        return Ok((input, Expression::Function(name, vec![])));
    }

    let (input, args) = args_list(input)?;
    let (input, _) = multispace0.parse(input)?;
    let (input, _) = char::<_, nom::error::Error<_>>(')').parse(input)?;

    Ok((input, Expression::Function(name, args)))
}

/// Parse a parameter reference `[k]`
fn parameter(input: &str) -> IResult<&str, Expression> {
    let mut parser = delimited(
        pair(char('['), multispace0),
        digit1,
        pair(multispace0, char(']')),
    );
    let (input, digits) = parser.parse(input)?;
    // digit1 guarantees the slice is numeric; only overflow can fail here
    let index = digits.parse::<usize>().map_err(|_| {
        nom::Err::Failure(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Digit,
        ))
    })?;
    Ok((input, Expression::Parameter(index)))
}

/// Parse a number
fn number(input: &str) -> IResult<&str, Expression> {
    // `double` also accepts "inf"/"nan" spellings, which would shadow identifiers
    if input.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Float,
        )));
    }
    let (input, num) = double(input)?;
    Ok((input, Expression::Number(num)))
}

/// Parse a variable reference
fn variable(input: &str) -> IResult<&str, Expression> {
    let (input, var_name) = identifier(input)?;
    Ok((input, Expression::Variable(var_name)))
}

/// Parse a parenthesized expression
fn parens(input: &str) -> IResult<&str, Expression> {
    let (input, _) = char('(').parse(input)?;
    let (input, _) = multispace0.parse(input)?;
    let (input, expr) = expr_parser(input)?;
    let (input, _) = multispace0.parse(input)?;
    let (input, _) = char::<_, nom::error::Error<_>>(')').parse(input)?;
    Ok((input, expr))
}

/// Parse a primary expression
fn primary(input: &str) -> IResult<&str, Expression> {
    if let Ok(result) = number(input) {
        return Ok(result);
    }
    if let Ok(result) = parameter(input) {
        return Ok(result);
    }
    if let Ok(result) = function_call(input) {
        return Ok(result);
    }
    if let Ok(result) = variable(input) {
        return Ok(result);
    }
    parens(input)
}

/// Parse a unary expression (-expr)
fn unary(input: &str) -> IResult<&str, Expression> {
    let (input, _) = multispace0.parse(input)?;

    match char::<_, nom::error::Error<_>>('-').parse(input) {
        Ok((after, _)) => {
            let (remaining, expr) = unary(after)?;
            Ok((remaining, Expression::Unary(UnaryOp::Neg, Box::new(expr))))
        }
        Err(_) => primary(input),
    }
}

/// Parse a power expression (right-associative: a^b^c = a^(b^c))
fn power(input: &str) -> IResult<&str, Expression> {
    let (input, left) = unary(input)?;
    let (input, _) = multispace0.parse(input)?;

    match char::<_, nom::error::Error<_>>('^').parse(input) {
        Ok((after_op, _)) => {
            let (after_op, _) = multispace0.parse(after_op)?;
            let (after_right, right) = power(after_op)?;
            Ok((
                after_right,
                Expression::Binary(BinaryOp::Pow, Box::new(left), Box::new(right)),
            ))
        }
        Err(_) => Ok((input, left)),
    }
}

/// Fold a left-associative chain of `operand (op operand)*`
fn left_chain<'a>(
    input: &'a str,
    operand: fn(&'a str) -> IResult<&'a str, Expression>,
    ops: &[(char, BinaryOp)],
) -> IResult<&'a str, Expression> {
    let (mut input, mut acc) = operand(input)?;
    loop {
        let (after_space, _) = multispace0.parse(input)?;
        let next = ops
            .iter()
            .find(|(symbol, _)| after_space.starts_with(*symbol));
        let Some(&(symbol, op)) = next else {
            return Ok((input, acc));
        };
        let after_op = &after_space[symbol.len_utf8()..];
        let (after_op, _) = multispace0.parse(after_op)?;
        let (rest, right) = operand(after_op)?;
        acc = Expression::Binary(op, Box::new(acc), Box::new(right));
        input = rest;
    }
}

/// Parse a multiplicative expression (expr * expr, expr / expr)
fn term(input: &str) -> IResult<&str, Expression> {
    left_chain(input, power, &[('*', BinaryOp::Mul), ('/', BinaryOp::Div)])
}

/// Parse an additive expression (expr + expr, expr - expr)
fn expr_parser(input: &str) -> IResult<&str, Expression> {
    let (input, _) = multispace0.parse(input)?;
    left_chain(input, term, &[('+', BinaryOp::Add), ('-', BinaryOp::Sub)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct TestContext {
        vars: HashMap<String, f64>,
        params: Vec<f64>,
    }

    impl TestContext {
        fn new(x: f64, y: f64, params: &[f64]) -> Self {
            let mut vars = HashMap::new();
            vars.insert("x".to_string(), x);
            vars.insert("y".to_string(), y);
            Self {
                vars,
                params: params.to_vec(),
            }
        }
    }

    impl EvaluationContext for TestContext {
        fn get_variable(&self, name: &str) -> ExprResult<f64> {
            self.vars
                .get(name)
                .copied()
                .ok_or_else(|| ExpressionError::UndefinedVariable {
                    name: name.to_string(),
                })
        }

        fn get_parameter(&self, index: usize) -> ExprResult<f64> {
            self.params
                .get(index)
                .copied()
                .ok_or(ExpressionError::ParameterOutOfRange {
                    index,
                    count: self.params.len(),
                })
        }
    }

    fn eval(formula: &str, ctx: &TestContext) -> f64 {
        Expression::parse(formula).unwrap().evaluate(ctx).unwrap()
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(Expression::parse("42").unwrap(), Expression::Number(42.0));
        assert_eq!(Expression::parse("1.5e3").unwrap(), Expression::Number(1500.0));
        assert_eq!(
            Expression::parse("-2.5").unwrap(),
            Expression::Unary(UnaryOp::Neg, Box::new(Expression::Number(2.5)))
        );
    }

    #[test]
    fn test_parse_parameter() {
        assert_eq!(Expression::parse("[0]").unwrap(), Expression::Parameter(0));
        assert_eq!(Expression::parse("[ 12 ]").unwrap(), Expression::Parameter(12));
        assert!(Expression::parse("[a]").is_err());
    }

    #[test]
    fn test_subtraction_is_left_associative() {
        let ctx = TestContext::new(0.0, 0.0, &[]);
        assert_eq!(eval("10 - 4 - 3", &ctx), 3.0);
        assert_eq!(eval("24 / 4 / 2", &ctx), 3.0);
        assert_eq!(eval("2 ^ 3 ^ 2", &ctx), 512.0);
    }

    #[test]
    fn test_model_formula() {
        let ctx = TestContext::new(2.0, 3.0, &[1.5, 2.0]);
        assert_eq!(eval("[0]*x^[1]", &ctx), 6.0);
        assert_eq!(eval("[0]*x + [1]*y", &ctx), 9.0);
        assert_eq!(eval("-x^2", &ctx), -4.0);
        assert!((eval("exp(-y/[1])", &ctx) - (-1.5f64).exp()).abs() < 1e-15);
        assert_eq!(eval("pow(x, 3)", &ctx), 8.0);
        assert_eq!(eval("max(x, y, 1)", &ctx), 3.0);
    }

    #[test]
    fn test_variables_and_span() {
        let expr = Expression::parse("[0] + [3]*x/(1 + [1]*y)").unwrap();
        assert_eq!(expr.variables(), vec!["x".to_string(), "y".to_string()]);
        assert_eq!(expr.parameter_span(), 4);

        let expr = Expression::parse("[0]*x").unwrap();
        assert_eq!(expr.variables(), vec!["x".to_string()]);
        assert_eq!(expr.parameter_span(), 1);
    }

    #[test]
    fn test_evaluation_errors() {
        let ctx = TestContext::new(1.0, 1.0, &[1.0]);

        match Expression::parse("z").unwrap().evaluate(&ctx) {
            Err(ExpressionError::UndefinedVariable { name }) => assert_eq!(name, "z"),
            other => panic!("Expected UndefinedVariable error, got {other:?}"),
        }

        assert_eq!(
            Expression::parse("1 / (x - 1)").unwrap().evaluate(&ctx),
            Err(ExpressionError::DivisionByZero)
        );

        assert_eq!(
            Expression::parse("[2]").unwrap().evaluate(&ctx),
            Err(ExpressionError::ParameterOutOfRange { index: 2, count: 1 })
        );

        assert!(matches!(
            Expression::parse("foo(1)").unwrap().evaluate(&ctx),
            Err(ExpressionError::UndefinedFunction { .. })
        ));

        assert!(matches!(
            Expression::parse("sin(1, 2)").unwrap().evaluate(&ctx),
            Err(ExpressionError::InvalidOperation { .. })
        ));
    }

    #[test]
    fn test_parse_errors() {
        assert!(Expression::parse("1 +").is_err());
        assert!(Expression::parse("(x").is_err());
        assert!(Expression::parse("x y").is_err());
    }
}
