//! Safe evaluation of user-typed formulas for the vector-field page.
//!
//! The original page ran user text through `eval` with a numpy namespace.
//! Here the text is parsed into an AST over a fixed grammar, checked
//! against an allow-list (sin, cos, tan, exp, sqrt plus the caller's
//! variables), and compiled to bytecode for a small stack VM. Anything
//! outside the allow-list is a compile error, never arbitrary evaluation.

use std::collections::HashMap;
use thiserror::Error;

/// Functions a formula may call. The original page exposed these under the
/// `np.` prefix as well, so `np.sin(X)` and `sin(X)` both resolve.
pub const ALLOWED_FUNCTIONS: &[&str] = &["sin", "cos", "tan", "exp", "sqrt"];

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExprError {
    #[error("empty expression")]
    Empty,
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),
    #[error("malformed number '{0}'")]
    MalformedNumber(String),
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("expected ')'")]
    MissingParen,
    #[error("unknown symbol '{0}'")]
    UnknownSymbol(String),
    #[error("unknown function '{0}' (allowed: sin, cos, tan, exp, sqrt)")]
    UnknownFunction(String),
    #[error("unexpected trailing input near '{0}'")]
    TrailingInput(String),
}

/// OpCodes for the stack VM.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OpCode {
    /// Pushes a constant onto the stack.
    Const(f64),
    /// Pushes the value of a variable (by index in the caller's list).
    Var(usize),
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Neg,
    Sin,
    Cos,
    Tan,
    Exp,
    Sqrt,
}

/// A compiled formula: bytecode plus the arity it was compiled against.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    ops: Vec<OpCode>,
    arity: usize,
}

impl Program {
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Runs the bytecode against one set of variable values. The stack
    /// buffer is caller-owned so grid sweeps do not reallocate per node.
    ///
    /// Domain errors (divide by zero, sqrt of a negative) follow IEEE-754
    /// and surface as inf/NaN; the caller decides what a non-finite
    /// result means.
    pub fn eval(&self, vars: &[f64], stack: &mut Vec<f64>) -> f64 {
        debug_assert_eq!(vars.len(), self.arity);
        stack.clear();

        for op in &self.ops {
            match op {
                OpCode::Const(v) => stack.push(*v),
                OpCode::Var(idx) => stack.push(vars[*idx]),
                OpCode::Add => {
                    let b = stack.pop().unwrap_or(0.0);
                    let a = stack.pop().unwrap_or(0.0);
                    stack.push(a + b);
                }
                OpCode::Sub => {
                    let b = stack.pop().unwrap_or(0.0);
                    let a = stack.pop().unwrap_or(0.0);
                    stack.push(a - b);
                }
                OpCode::Mul => {
                    let b = stack.pop().unwrap_or(0.0);
                    let a = stack.pop().unwrap_or(0.0);
                    stack.push(a * b);
                }
                OpCode::Div => {
                    let b = stack.pop().unwrap_or(0.0);
                    let a = stack.pop().unwrap_or(0.0);
                    stack.push(a / b);
                }
                OpCode::Pow => {
                    let b = stack.pop().unwrap_or(0.0);
                    let a = stack.pop().unwrap_or(0.0);
                    stack.push(a.powf(b));
                }
                OpCode::Neg => {
                    let a = stack.pop().unwrap_or(0.0);
                    stack.push(-a);
                }
                OpCode::Sin => {
                    let a = stack.pop().unwrap_or(0.0);
                    stack.push(a.sin());
                }
                OpCode::Cos => {
                    let a = stack.pop().unwrap_or(0.0);
                    stack.push(a.cos());
                }
                OpCode::Tan => {
                    let a = stack.pop().unwrap_or(0.0);
                    stack.push(a.tan());
                }
                OpCode::Exp => {
                    let a = stack.pop().unwrap_or(0.0);
                    stack.push(a.exp());
                }
                OpCode::Sqrt => {
                    let a = stack.pop().unwrap_or(0.0);
                    stack.push(a.sqrt());
                }
            }
        }

        stack.pop().unwrap_or(0.0)
    }
}

/// Parses and compiles `src` against the given variable names.
/// Variable matching is case-insensitive (the page documents `X`/`Y` but
/// users type `x`/`y` just as often).
pub fn compile(src: &str, var_names: &[&str]) -> Result<Program, ExprError> {
    let tokens = tokenize(src)?;
    if tokens.is_empty() {
        return Err(ExprError::Empty);
    }

    let mut parser = Parser { tokens, pos: 0 };
    let ast = parser.parse_expression()?;
    if let Some(token) = parser.peek() {
        return Err(ExprError::TrailingInput(token.describe()));
    }

    let vars: HashMap<String, usize> = var_names
        .iter()
        .enumerate()
        .map(|(i, name)| (name.to_ascii_lowercase(), i))
        .collect();

    let mut ops = Vec::new();
    compile_node(&ast, &vars, &mut ops)?;
    Ok(Program {
        ops,
        arity: var_names.len(),
    })
}

// --- AST ---

#[derive(Debug)]
enum Expr {
    Number(f64),
    Variable(String),
    Binary(Box<Expr>, char, Box<Expr>),
    Neg(Box<Expr>),
    Call(String, Box<Expr>),
}

fn compile_node(
    expr: &Expr,
    vars: &HashMap<String, usize>,
    ops: &mut Vec<OpCode>,
) -> Result<(), ExprError> {
    match expr {
        Expr::Number(n) => ops.push(OpCode::Const(*n)),
        Expr::Variable(name) => {
            let idx = vars
                .get(&name.to_ascii_lowercase())
                .ok_or_else(|| ExprError::UnknownSymbol(name.clone()))?;
            ops.push(OpCode::Var(*idx));
        }
        Expr::Binary(left, op, right) => {
            compile_node(left, vars, ops)?;
            compile_node(right, vars, ops)?;
            ops.push(match op {
                '+' => OpCode::Add,
                '-' => OpCode::Sub,
                '*' => OpCode::Mul,
                '/' => OpCode::Div,
                _ => OpCode::Pow,
            });
        }
        Expr::Neg(operand) => {
            compile_node(operand, vars, ops)?;
            ops.push(OpCode::Neg);
        }
        Expr::Call(func, arg) => {
            compile_node(arg, vars, ops)?;
            // The numpy-qualified spelling is still valid input.
            let bare = func.strip_prefix("np.").unwrap_or(func);
            ops.push(match bare {
                "sin" => OpCode::Sin,
                "cos" => OpCode::Cos,
                "tan" => OpCode::Tan,
                "exp" => OpCode::Exp,
                "sqrt" => OpCode::Sqrt,
                _ => return Err(ExprError::UnknownFunction(func.clone())),
            });
        }
    }
    Ok(())
}

// --- Tokenizer ---

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Identifier(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(n) => n.to_string(),
            Token::Identifier(s) => s.clone(),
            Token::Plus => "+".into(),
            Token::Minus => "-".into(),
            Token::Star => "*".into(),
            Token::Slash => "/".into(),
            Token::Caret => "^".into(),
            Token::LParen => "(".into(),
            Token::RParen => ")".into(),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, ExprError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c.is_ascii_digit() || c == '.' {
            let mut num_str = String::new();
            while let Some(&d) = chars.peek() {
                if d.is_ascii_digit() || d == '.' {
                    num_str.push(d);
                    chars.next();
                } else {
                    break;
                }
            }
            let value: f64 = num_str
                .parse()
                .map_err(|_| ExprError::MalformedNumber(num_str.clone()))?;
            tokens.push(Token::Number(value));
        } else if c.is_alphabetic() {
            let mut ident = String::new();
            while let Some(&d) = chars.peek() {
                // '.' admits the numpy-qualified spelling np.sin.
                if d.is_alphanumeric() || d == '_' || d == '.' {
                    ident.push(d);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(Token::Identifier(ident));
        } else {
            match c {
                '+' => tokens.push(Token::Plus),
                '-' => tokens.push(Token::Minus),
                '*' => tokens.push(Token::Star),
                '/' => tokens.push(Token::Slash),
                '^' => tokens.push(Token::Caret),
                '(' => tokens.push(Token::LParen),
                ')' => tokens.push(Token::RParen),
                other => return Err(ExprError::UnexpectedChar(other)),
            }
            chars.next();
        }
    }
    Ok(tokens)
}

// --- Parser ---

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn consume(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn parse_expression(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_term()?;

        while let Some(token) = self.peek() {
            let op = match token {
                Token::Plus => '+',
                Token::Minus => '-',
                _ => break,
            };
            self.consume();
            let right = self.parse_term()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_power()?;

        while let Some(token) = self.peek() {
            let op = match token {
                Token::Star => '*',
                Token::Slash => '/',
                _ => break,
            };
            self.consume();
            let right = self.parse_power()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_power(&mut self) -> Result<Expr, ExprError> {
        let left = self.parse_unary()?;

        // Right-associative: X^2^3 is X^(2^3).
        if let Some(Token::Caret) = self.peek() {
            self.consume();
            let right = self.parse_power()?;
            return Ok(Expr::Binary(Box::new(left), '^', Box::new(right)));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        if let Some(Token::Minus) = self.peek() {
            self.consume();
            let expr = self.parse_unary()?;
            return Ok(Expr::Neg(Box::new(expr)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ExprError> {
        match self.consume() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Identifier(name)) => {
                if let Some(Token::LParen) = self.peek() {
                    self.consume();
                    let arg = self.parse_expression()?;
                    match self.consume() {
                        Some(Token::RParen) => Ok(Expr::Call(name, Box::new(arg))),
                        _ => Err(ExprError::MissingParen),
                    }
                } else {
                    Ok(Expr::Variable(name))
                }
            }
            Some(Token::LParen) => {
                let expr = self.parse_expression()?;
                match self.consume() {
                    Some(Token::RParen) => Ok(expr),
                    _ => Err(ExprError::MissingParen),
                }
            }
            Some(token) => Err(ExprError::TrailingInput(token.describe())),
            None => Err(ExprError::UnexpectedEnd),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(src: &str, x: f64, y: f64) -> f64 {
        let program = compile(src, &["X", "Y"]).unwrap();
        let mut stack = Vec::new();
        program.eval(&[x, y], &mut stack)
    }

    #[test]
    fn arithmetic_and_precedence() {
        assert_eq!(eval("1 + 2 * 3", 0.0, 0.0), 7.0);
        assert_eq!(eval("(1 + 2) * 3", 0.0, 0.0), 9.0);
        assert_eq!(eval("2 ^ 3 ^ 2", 0.0, 0.0), 512.0);
        assert_eq!(eval("-X + Y", 3.0, 5.0), 2.0);
        assert_eq!(eval("X*Y - Y/2", 4.0, 2.0), 7.0);
    }

    #[test]
    fn variables_are_case_insensitive() {
        assert_eq!(eval("x + Y", 1.0, 2.0), 3.0);
        assert_eq!(eval("X + y", 1.0, 2.0), 3.0);
    }

    #[test]
    fn allowed_functions_evaluate() {
        assert!((eval("sin(X)", std::f64::consts::FRAC_PI_2, 0.0) - 1.0).abs() < 1e-12);
        assert!((eval("cos(X)", 0.0, 0.0) - 1.0).abs() < 1e-12);
        assert!((eval("tan(X)", 0.0, 0.0)).abs() < 1e-12);
        assert!((eval("exp(X)", 1.0, 0.0) - std::f64::consts::E).abs() < 1e-12);
        assert_eq!(eval("sqrt(X^2 + Y^2)", 3.0, 4.0), 5.0);
    }

    #[test]
    fn numpy_qualified_names_still_resolve() {
        assert!((eval("np.sin(X)", std::f64::consts::FRAC_PI_2, 0.0) - 1.0).abs() < 1e-12);
        assert!((eval("np.cos(X)", 0.0, 0.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn disallowed_symbols_are_rejected() {
        assert_eq!(
            compile("foo(X)", &["X", "Y"]).unwrap_err(),
            ExprError::UnknownFunction("foo".into())
        );
        assert_eq!(
            compile("Z + 1", &["X", "Y"]).unwrap_err(),
            ExprError::UnknownSymbol("Z".into())
        );
        assert_eq!(
            compile("X @ Y", &["X", "Y"]).unwrap_err(),
            ExprError::UnexpectedChar('@')
        );
        // eval-style escape hatches do not parse.
        assert!(compile("__import__('os')", &["X", "Y"]).is_err());
    }

    #[test]
    fn malformed_input_is_rejected() {
        assert_eq!(compile("", &["X"]).unwrap_err(), ExprError::Empty);
        assert_eq!(compile("   ", &["X"]).unwrap_err(), ExprError::Empty);
        assert_eq!(
            compile("sin(X", &["X"]).unwrap_err(),
            ExprError::MissingParen
        );
        assert_eq!(
            compile("1.2.3", &["X"]).unwrap_err(),
            ExprError::MalformedNumber("1.2.3".into())
        );
        assert_eq!(
            compile("X Y", &["X", "Y"]).unwrap_err(),
            ExprError::TrailingInput("Y".into())
        );
        assert_eq!(compile("X +", &["X"]).unwrap_err(), ExprError::UnexpectedEnd);
    }

    #[test]
    fn domain_errors_follow_ieee() {
        assert!(eval("1 / X", 0.0, 0.0).is_infinite());
        assert!(eval("sqrt(X)", -1.0, 0.0).is_nan());
    }
}
