//! Algebraic expression AST.
//!
//! Expressions appear inside `{...}` braces on device lines and in `.param`
//! statements. The IR stores them verbatim; nothing here evaluates. Device
//! parameter values reuse the same type, so a plain number and a full
//! expression are indistinguishable at the type level.

use std::fmt;

use num_complex::Complex64;

use crate::units::Value;

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
}

/// Binary operators, arithmetic through boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    And,
    Or,
    Xor,
    Lt,
    Le,
    Eq,
    Ne,
    Ge,
    Gt,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "**",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Xor => "^^",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Ge => ">=",
            BinaryOp::Gt => ">",
        }
    }
}

/// The fixed catalogue of built-in functions.
///
/// Lookup is case-insensitive and folds the aliases the SPICE dialect
/// accepts: `log` is `ln`, `pwr` is `pow`, `arctan` is `atan`, `r` is `re`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    Abs,
    Acos,
    Acosh,
    Agauss,
    Asin,
    Asinh,
    Atan,
    Atan2,
    Atanh,
    Aunif,
    Ceil,
    Cos,
    Cosh,
    Db,
    Ddt,
    Ddx,
    Exp,
    Floor,
    Gauss,
    I,
    If,
    Img,
    Int,
    Limit,
    Ln,
    Log10,
    Magnitude,
    Max,
    Min,
    Nint,
    Ph,
    Pow,
    Pwrs,
    Rand,
    Re,
    Sdt,
    Sgn,
    Sign,
    Sin,
    Sinh,
    Sqrt,
    Stp,
    Tan,
    Tanh,
    Unif,
    Uramp,
    V,
}

impl Function {
    pub fn from_name(name: &str) -> Option<Function> {
        let lower = name.to_ascii_lowercase();
        Some(match lower.as_str() {
            "abs" => Function::Abs,
            "acos" => Function::Acos,
            "acosh" => Function::Acosh,
            "agauss" => Function::Agauss,
            "asin" => Function::Asin,
            "asinh" => Function::Asinh,
            "atan" | "arctan" => Function::Atan,
            "atan2" => Function::Atan2,
            "atanh" => Function::Atanh,
            "aunif" => Function::Aunif,
            "ceil" => Function::Ceil,
            "cos" => Function::Cos,
            "cosh" => Function::Cosh,
            "db" => Function::Db,
            "ddt" => Function::Ddt,
            "ddx" => Function::Ddx,
            "exp" => Function::Exp,
            "floor" => Function::Floor,
            "gauss" => Function::Gauss,
            "i" => Function::I,
            "if" => Function::If,
            "img" => Function::Img,
            "int" => Function::Int,
            "limit" => Function::Limit,
            "ln" | "log" => Function::Ln,
            "log10" => Function::Log10,
            "m" => Function::Magnitude,
            "max" => Function::Max,
            "min" => Function::Min,
            "nint" => Function::Nint,
            "ph" => Function::Ph,
            "pow" | "pwr" => Function::Pow,
            "pwrs" => Function::Pwrs,
            "rand" => Function::Rand,
            "re" | "r" => Function::Re,
            "sdt" => Function::Sdt,
            "sgn" => Function::Sgn,
            "sign" => Function::Sign,
            "sin" => Function::Sin,
            "sinh" => Function::Sinh,
            "sqrt" => Function::Sqrt,
            "stp" => Function::Stp,
            "tan" => Function::Tan,
            "tanh" => Function::Tanh,
            "unif" => Function::Unif,
            "uramp" => Function::Uramp,
            "v" => Function::V,
            _ => return None,
        })
    }

    /// Canonical lowercase name for emission.
    pub fn name(self) -> &'static str {
        match self {
            Function::Abs => "abs",
            Function::Acos => "acos",
            Function::Acosh => "acosh",
            Function::Agauss => "agauss",
            Function::Asin => "asin",
            Function::Asinh => "asinh",
            Function::Atan => "atan",
            Function::Atan2 => "atan2",
            Function::Atanh => "atanh",
            Function::Aunif => "aunif",
            Function::Ceil => "ceil",
            Function::Cos => "cos",
            Function::Cosh => "cosh",
            Function::Db => "db",
            Function::Ddt => "ddt",
            Function::Ddx => "ddx",
            Function::Exp => "exp",
            Function::Floor => "floor",
            Function::Gauss => "gauss",
            Function::I => "i",
            Function::If => "if",
            Function::Img => "img",
            Function::Int => "int",
            Function::Limit => "limit",
            Function::Ln => "ln",
            Function::Log10 => "log10",
            Function::Magnitude => "m",
            Function::Max => "max",
            Function::Min => "min",
            Function::Nint => "nint",
            Function::Ph => "ph",
            Function::Pow => "pow",
            Function::Pwrs => "pwrs",
            Function::Rand => "rand",
            Function::Re => "re",
            Function::Sdt => "sdt",
            Function::Sgn => "sgn",
            Function::Sign => "sign",
            Function::Sin => "sin",
            Function::Sinh => "sinh",
            Function::Sqrt => "sqrt",
            Function::Stp => "stp",
            Function::Tan => "tan",
            Function::Tanh => "tanh",
            Function::Unif => "unif",
            Function::Uramp => "uramp",
            Function::V => "v",
        }
    }

    /// Number of arguments the function takes. `v` accepts one node or a
    /// node pair, so its maximum is two.
    pub fn arity(self) -> (usize, usize) {
        match self {
            Function::Rand => (0, 0),
            Function::V => (1, 2),
            Function::Abs
            | Function::Acos
            | Function::Acosh
            | Function::Asin
            | Function::Asinh
            | Function::Atan
            | Function::Atanh
            | Function::Ceil
            | Function::Cos
            | Function::Cosh
            | Function::Db
            | Function::Ddt
            | Function::Exp
            | Function::Floor
            | Function::I
            | Function::Img
            | Function::Int
            | Function::Ln
            | Function::Log10
            | Function::Magnitude
            | Function::Nint
            | Function::Ph
            | Function::Re
            | Function::Sdt
            | Function::Sgn
            | Function::Sin
            | Function::Sinh
            | Function::Sqrt
            | Function::Stp
            | Function::Tan
            | Function::Tanh
            | Function::Uramp => (1, 1),
            Function::Atan2
            | Function::Aunif
            | Function::Ddx
            | Function::Max
            | Function::Min
            | Function::Pow
            | Function::Pwrs
            | Function::Sign
            | Function::Unif => (2, 2),
            Function::Agauss | Function::Gauss | Function::If | Function::Limit => (3, 3),
        }
    }
}

/// An expression tree node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A numeric literal.
    Number(Value),
    /// A complex literal.
    Complex(Complex64),
    /// A bare string argument, e.g. a model name in a parameter position.
    Str(String),
    /// A variable reference.
    Symbol(String),
    /// Verbatim source text carried through unparsed (POLY forms).
    Raw(String),
    /// A parenthesized value list, e.g. a MOSFET `key=(a b c)` parameter.
    List(Vec<Expr>),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        function: Function,
        args: Vec<Expr>,
    },
    /// A `TABLE {expr} = (in,out)...` piecewise lookup.
    Table {
        expr: Box<Expr>,
        points: Vec<(Expr, Expr)>,
    },
}

impl Expr {
    pub fn number(value: impl Into<Value>) -> Expr {
        Expr::Number(value.into())
    }

    pub fn symbol(name: impl Into<String>) -> Expr {
        Expr::Symbol(name.into())
    }

    pub fn unary(op: UnaryOp, expr: Expr) -> Expr {
        Expr::Unary {
            op,
            expr: Box::new(expr),
        }
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn call(function: Function, args: Vec<Expr>) -> Expr {
        Expr::Call { function, args }
    }

    /// The literal value if this node is a plain number.
    pub fn as_value(&self) -> Option<Value> {
        match self {
            Expr::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// The string payload if this node is a bare string argument.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Expr::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(v) => write!(f, "{v}"),
            Expr::Complex(c) => {
                if c.im < 0.0 {
                    write!(f, "{}-{}j", c.re, -c.im)
                } else {
                    write!(f, "{}+{}j", c.re, c.im)
                }
            }
            Expr::Str(s) | Expr::Symbol(s) => write!(f, "{s}"),
            Expr::Raw(s) => write!(f, "{s}"),
            Expr::List(items) => {
                write!(f, "(")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
            Expr::Unary { op, expr } => {
                let symbol = match op {
                    UnaryOp::Neg => "-",
                    UnaryOp::Pos => "+",
                    UnaryOp::Not => "!",
                };
                if expr.is_atomic() {
                    write!(f, "{symbol}{expr}")
                } else {
                    write!(f, "{symbol}({expr})")
                }
            }
            Expr::Binary { op, lhs, rhs } => {
                write_operand(f, lhs)?;
                write!(f, " {} ", op.symbol())?;
                write_operand(f, rhs)
            }
            Expr::Call { function, args } => {
                write!(f, "{}(", function.name())?;
                for (idx, arg) in args.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
            Expr::Table { expr, points } => {
                write!(f, "table({expr}")?;
                for (input, output) in points {
                    write!(f, ", ({input}, {output})")?;
                }
                write!(f, ")")
            }
        }
    }
}

fn write_operand(f: &mut fmt::Formatter<'_>, expr: &Expr) -> fmt::Result {
    if expr.is_atomic() {
        write!(f, "{expr}")
    } else {
        write!(f, "({expr})")
    }
}

impl Expr {
    fn is_atomic(&self) -> bool {
        !matches!(self, Expr::Binary { .. } | Expr::Unary { .. })
    }
}
