// Licensed under the Apache-2.0 license

//! Expression evaluation over symbolic hardware parameters.
//!
//! Register widths and array depths may be written in terms of the module's
//! parameters (`"DATA_W"`, `"$clog2(DEPTH)+1"`). Each [`ParamExpr`] keeps its
//! source text, which is emitted verbatim where the hardware must stay
//! parametric, and a parsed [`Expr`] that is evaluated against a
//! [`ParamEnv`] under a [`Valuation`] whenever a concrete number is needed.
//!
//! ```text
//! Parameter[] ──resolve (topological, per valuation)──► ParamEnv
//! "2*WIDTH+1" ──parse──► Expr ──eval(ParamEnv, Max)──► 31
//! ```

mod parse;

use std::collections::{HashMap, VecDeque};
use std::fmt;

use log::debug;

use crate::error::{CsrError, Result};
use crate::types::Parameter;

/// Which of a parameter's three numeric fields is substituted.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Valuation {
    /// The default value; used for reset values and documentation.
    Value,
    Min,
    /// The largest legal value; used to size hardware for every configuration.
    Max,
}

impl Valuation {
    pub const ALL: [Valuation; 3] = [Valuation::Value, Valuation::Min, Valuation::Max];
}

impl fmt::Display for Valuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Valuation::Value => write!(f, "value"),
            Valuation::Min => write!(f, "min"),
            Valuation::Max => write!(f, "max"),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UnaryOp {
    Neg,
    Not,
    BitNot,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BinaryOp {
    Pow,
    Mul,
    Div,
    Mod,
    Add,
    Sub,
    Shl,
    Shr,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    BitAnd,
    BitXor,
    BitOr,
    And,
    Or,
}

/// Parsed expression tree.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Num(i64),
    Ident(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
    /// Function call; the name keeps its `$`/backtick marker.
    Call(String, Vec<Expr>),
}

/// Outcome of looking a name up in a [`ParamEnv`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Lookup {
    Value(i64),
    /// The parameter exists but its field for this valuation is not available.
    Unavailable,
    Undefined,
}

impl Expr {
    /// Collects every identifier referenced by the expression.
    pub fn identifiers<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Num(_) => {}
            Expr::Ident(name) => out.push(name),
            Expr::Unary(_, e) => e.identifiers(out),
            Expr::Binary(_, a, b) => {
                a.identifiers(out);
                b.identifiers(out);
            }
            Expr::Ternary(c, a, b) => {
                c.identifiers(out);
                a.identifiers(out);
                b.identifiers(out);
            }
            Expr::Call(_, args) => args.iter().for_each(|a| a.identifiers(out)),
        }
    }

    fn eval(
        &self,
        lookup: &dyn Fn(&str) -> Lookup,
        mode: Valuation,
    ) -> std::result::Result<i64, String> {
        match self {
            Expr::Num(v) => Ok(*v),
            Expr::Ident(name) => match lookup(name) {
                Lookup::Value(v) => Ok(v),
                Lookup::Unavailable => Err(format!("parameter `{name}` has no {mode} value")),
                Lookup::Undefined => Err(format!("`{name}` is not a defined parameter")),
            },
            Expr::Unary(op, e) => {
                let v = e.eval(lookup, mode)?;
                Ok(match op {
                    UnaryOp::Neg => v.checked_neg().ok_or("arithmetic overflow")?,
                    UnaryOp::Not => (v == 0) as i64,
                    UnaryOp::BitNot => !v,
                })
            }
            Expr::Binary(op, a, b) => {
                let a = a.eval(lookup, mode)?;
                let b = b.eval(lookup, mode)?;
                binary(*op, a, b)
            }
            Expr::Ternary(c, a, b) => {
                if c.eval(lookup, mode)? != 0 {
                    a.eval(lookup, mode)
                } else {
                    b.eval(lookup, mode)
                }
            }
            Expr::Call(name, args) => {
                let args = args
                    .iter()
                    .map(|a| a.eval(lookup, mode))
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                call(name, &args)
            }
        }
    }
}

fn binary(op: BinaryOp, a: i64, b: i64) -> std::result::Result<i64, String> {
    let overflow = || "arithmetic overflow".to_string();
    Ok(match op {
        BinaryOp::Pow => {
            let exp = u32::try_from(b).map_err(|_| format!("invalid exponent {b}"))?;
            a.checked_pow(exp).ok_or_else(overflow)?
        }
        BinaryOp::Mul => a.checked_mul(b).ok_or_else(overflow)?,
        BinaryOp::Div => {
            if b == 0 {
                return Err("division by zero".into());
            }
            a.checked_div(b).ok_or_else(overflow)?
        }
        BinaryOp::Mod => {
            if b == 0 {
                return Err("modulus by zero".into());
            }
            a.checked_rem(b).ok_or_else(overflow)?
        }
        BinaryOp::Add => a.checked_add(b).ok_or_else(overflow)?,
        BinaryOp::Sub => a.checked_sub(b).ok_or_else(overflow)?,
        BinaryOp::Shl => {
            let s = u32::try_from(b).map_err(|_| format!("invalid shift amount {b}"))?;
            a.checked_shl(s).ok_or_else(overflow)?
        }
        BinaryOp::Shr => {
            let s = u32::try_from(b).map_err(|_| format!("invalid shift amount {b}"))?;
            a.checked_shr(s).ok_or_else(overflow)?
        }
        BinaryOp::Lt => (a < b) as i64,
        BinaryOp::Le => (a <= b) as i64,
        BinaryOp::Gt => (a > b) as i64,
        BinaryOp::Ge => (a >= b) as i64,
        BinaryOp::Eq => (a == b) as i64,
        BinaryOp::Ne => (a != b) as i64,
        BinaryOp::BitAnd => a & b,
        BinaryOp::BitXor => a ^ b,
        BinaryOp::BitOr => a | b,
        BinaryOp::And => (a != 0 && b != 0) as i64,
        BinaryOp::Or => (a != 0 || b != 0) as i64,
    })
}

fn call(name: &str, args: &[i64]) -> std::result::Result<i64, String> {
    let bare = name.trim_start_matches(['$', '`']).to_ascii_lowercase();
    match bare.as_str() {
        "clog2" => match args {
            [n] if *n < 0 => Err(format!("clog2 of negative value {n}")),
            [n] => Ok(crate::util::ceil_log2(*n as u64) as i64),
            _ => Err(format!("`{name}` takes one argument")),
        },
        "iob_max" | "max" if !args.is_empty() => Ok(args.iter().copied().fold(i64::MIN, i64::max)),
        "iob_min" | "min" if !args.is_empty() => Ok(args.iter().copied().fold(i64::MAX, i64::min)),
        "iob_max" | "max" | "iob_min" | "min" => Err(format!("`{name}` needs arguments")),
        _ => Err(format!("unknown function `{name}`")),
    }
}

/// An expression together with the text it was written as.
#[derive(Clone, Debug, PartialEq)]
pub struct ParamExpr {
    source: String,
    ast: Expr,
}

impl ParamExpr {
    /// Parses `source`, failing with [`CsrError::Expression`] on bad syntax.
    pub fn parse(source: &str) -> Result<Self> {
        let ast = parse::parse_expression(source)
            .map_err(|reason| CsrError::expression(source, source, reason))?;
        Ok(Self {
            source: source.trim().to_string(),
            ast,
        })
    }

    pub fn literal(value: i64) -> Self {
        Self {
            source: value.to_string(),
            ast: Expr::Num(value),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// The value when the expression is a plain integer.
    pub fn as_literal(&self) -> Option<i64> {
        match self.ast {
            Expr::Num(v) => Some(v),
            _ => None,
        }
    }

    /// Names of the identifiers this expression depends on.
    pub fn references(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.ast.identifiers(&mut out);
        out
    }

    /// Evaluates against `env`, substituting each parameter's `mode` field.
    pub fn eval(&self, env: &ParamEnv, mode: Valuation) -> Result<i64> {
        self.eval_with(&|name| env.lookup(name, mode), mode)
    }

    fn eval_with(&self, lookup: &dyn Fn(&str) -> Lookup, mode: Valuation) -> Result<i64> {
        self.ast.eval(lookup, mode).map_err(|reason| {
            CsrError::expression(&self.source, substitute(&self.source, lookup), reason)
        })
    }

    /// Evaluates and requires a non-negative result.
    pub fn eval_unsigned(&self, env: &ParamEnv, mode: Valuation) -> Result<u64> {
        let v = self.eval(env, mode)?;
        u64::try_from(v).map_err(|_| {
            CsrError::expression(
                &self.source,
                v.to_string(),
                "expected a non-negative value",
            )
        })
    }
}

impl fmt::Display for ParamExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

/// Replaces every known parameter name in `source` by its value.
///
/// Used for error messages, so that a failure shows how far substitution got.
fn substitute(source: &str, lookup: &dyn Fn(&str) -> Lookup) -> String {
    let chars: Vec<char> = source.chars().collect();
    let is_ident = |c: char| c.is_ascii_alphanumeric() || c == '_';
    let mut out = String::with_capacity(source.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let start = i;
        if c.is_ascii_digit() || c == '\'' || c == '$' {
            // Literals and system functions pass through untouched.
            i += 1;
            while i < chars.len() && (is_ident(chars[i]) || chars[i] == '\'') {
                i += 1;
            }
            out.extend(&chars[start..i]);
        } else if c == '`' || c.is_ascii_alphabetic() || c == '_' {
            i += 1;
            while i < chars.len() && is_ident(chars[i]) {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            let name = word.trim_start_matches('`');
            let is_call = chars[i..].iter().find(|c| !c.is_whitespace()) == Some(&'(');
            match lookup(name) {
                Lookup::Value(v) if !is_call => out.push_str(&v.to_string()),
                _ => out.push_str(&word),
            }
        } else {
            out.push(c);
            i += 1;
        }
    }
    out
}

#[derive(Clone, Copy, Debug, Default)]
struct Resolved {
    value: Option<i64>,
    min: Option<i64>,
    max: Option<i64>,
}

impl Resolved {
    fn get(&self, mode: Valuation) -> Option<i64> {
        match mode {
            Valuation::Value => self.value,
            Valuation::Min => self.min,
            Valuation::Max => self.max,
        }
    }

    fn set(&mut self, mode: Valuation, v: Option<i64>) {
        match mode {
            Valuation::Value => self.value = v,
            Valuation::Min => self.min = v,
            Valuation::Max => self.max = v,
        }
    }
}

/// Numeric parameter environment, resolved once per build.
///
/// Passed explicitly into every evaluation; nothing about the current module
/// is kept in shared state.
#[derive(Clone, Debug, Default)]
pub struct ParamEnv {
    params: HashMap<String, Resolved>,
}

impl ParamEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defines `name` with the same number for every valuation.
    pub fn with(mut self, name: &str, value: i64) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: i64) {
        self.params.insert(
            name.to_string(),
            Resolved {
                value: Some(value),
                min: Some(value),
                max: Some(value),
            },
        );
    }

    /// Overrides a single valuation of `name`.
    pub fn insert_mode(&mut self, name: &str, mode: Valuation, value: Option<i64>) {
        self.params
            .entry(name.to_string())
            .or_default()
            .set(mode, value);
    }

    pub fn lookup(&self, name: &str, mode: Valuation) -> Lookup {
        match self.params.get(name) {
            Some(r) => match r.get(mode) {
                Some(v) => Lookup::Value(v),
                None => Lookup::Unavailable,
            },
            None => Lookup::Undefined,
        }
    }

    /// Resolves parameter definitions that may reference each other.
    ///
    /// Each valuation is resolved independently: the referenced parameters
    /// form a dependency graph that is evaluated in topological order. A
    /// cycle is reported as an [`CsrError::Expression`]. A field that fails to
    /// evaluate stays unavailable and only errors where it is used.
    pub fn resolve(params: &[Parameter]) -> Result<Self> {
        let mut env = ParamEnv::new();
        for p in params {
            if env.params.insert(p.name.clone(), Resolved::default()).is_some() {
                return Err(CsrError::config(format!(
                    "parameter `{}` is declared more than once",
                    p.name
                )));
            }
        }
        let index: HashMap<&str, usize> = params
            .iter()
            .enumerate()
            .map(|(i, p)| (p.name.as_str(), i))
            .collect();

        for mode in Valuation::ALL {
            // Edges point from a parameter to the parameters that use it.
            let mut users: Vec<Vec<usize>> = vec![Vec::new(); params.len()];
            let mut pending = vec![0usize; params.len()];
            for (i, p) in params.iter().enumerate() {
                if let Some(expr) = p.field(mode) {
                    for name in expr.references() {
                        if let Some(&dep) = index.get(name) {
                            users[dep].push(i);
                            pending[i] += 1;
                        }
                    }
                }
            }

            let mut ready: VecDeque<usize> = (0..params.len()).filter(|&i| pending[i] == 0).collect();
            let mut done = 0;
            while let Some(i) = ready.pop_front() {
                done += 1;
                let p = &params[i];
                let value = match p.field(mode) {
                    Some(expr) => match expr.eval(&env, mode) {
                        Ok(v) => Some(v),
                        Err(e) => {
                            debug!("parameter {} has no {mode} value: {e}", p.name);
                            None
                        }
                    },
                    None => None,
                };
                env.insert_mode(&p.name, mode, value);
                for &user in &users[i] {
                    pending[user] -= 1;
                    if pending[user] == 0 {
                        ready.push_back(user);
                    }
                }
            }

            if done < params.len() {
                let cycle: Vec<&str> = params
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| pending[*i] > 0)
                    .map(|(_, p)| p.name.as_str())
                    .collect();
                let first = params
                    .iter()
                    .find(|p| p.name == cycle[0])
                    .and_then(|p| p.field(mode))
                    .map(|e| e.source().to_string())
                    .unwrap_or_default();
                return Err(CsrError::expression(
                    &first,
                    &first,
                    format!(
                        "parameter dependency cycle ({mode}) through {}",
                        cycle.join(", ")
                    ),
                ));
            }
        }
        Ok(env)
    }
}
