// Licensed under the Apache-2.0 license

//! Recursive-descent parser for parameter expressions.
//!
//! Precedence, lowest first: `?:`, `||`, `&&`, `|`, `^`, `&`, `== !=`,
//! `< <= > >=`, `<< >>`, `+ -`, `* / %`, `**`, unary `- ! ~`.

use winnow::ascii::{digit1, multispace0};
use winnow::combinator::{alt, cut_err, delimited, not, opt, preceded, separated, terminated};
use winnow::error::{ContextError, ErrMode};
use winnow::token::{one_of, take_while};
use winnow::{ModalResult, Parser};

use super::{BinaryOp, Expr, UnaryOp};

/// Parses a complete expression, rejecting trailing input.
pub(super) fn parse_expression(src: &str) -> Result<Expr, String> {
    delimited(multispace0, ternary, multispace0)
        .parse(src)
        .map_err(|e| format!("syntax error at offset {}", e.offset()))
}

fn ws<'i, O, P>(inner: P) -> impl Parser<&'i str, O, ErrMode<ContextError>>
where
    P: Parser<&'i str, O, ErrMode<ContextError>>,
{
    delimited(multispace0, inner, multispace0)
}

/// Left-associative chain of `operand (op operand)*`.
fn fold_binary<'i, Operand, Op>(
    i: &mut &'i str,
    mut operand: Operand,
    mut op: Op,
) -> ModalResult<Expr>
where
    Operand: Parser<&'i str, Expr, ErrMode<ContextError>>,
    Op: Parser<&'i str, BinaryOp, ErrMode<ContextError>>,
{
    let mut lhs = operand.parse_next(i)?;
    while let Some(found) = opt(ws(op.by_ref())).parse_next(i)? {
        let rhs = cut_err(operand.by_ref()).parse_next(i)?;
        lhs = Expr::Binary(found, Box::new(lhs), Box::new(rhs));
    }
    Ok(lhs)
}

fn ternary(i: &mut &str) -> ModalResult<Expr> {
    let cond = logical_or.parse_next(i)?;
    if opt(ws('?')).parse_next(i)?.is_none() {
        return Ok(cond);
    }
    let (then, _, otherwise) = cut_err((ternary, ws(':'), ternary)).parse_next(i)?;
    Ok(Expr::Ternary(
        Box::new(cond),
        Box::new(then),
        Box::new(otherwise),
    ))
}

fn logical_or(i: &mut &str) -> ModalResult<Expr> {
    fold_binary(i, logical_and, "||".value(BinaryOp::Or))
}

fn logical_and(i: &mut &str) -> ModalResult<Expr> {
    fold_binary(i, bit_or, "&&".value(BinaryOp::And))
}

fn bit_or(i: &mut &str) -> ModalResult<Expr> {
    fold_binary(i, bit_xor, terminated('|', not('|')).value(BinaryOp::BitOr))
}

fn bit_xor(i: &mut &str) -> ModalResult<Expr> {
    fold_binary(i, bit_and, '^'.value(BinaryOp::BitXor))
}

fn bit_and(i: &mut &str) -> ModalResult<Expr> {
    fold_binary(i, equality, terminated('&', not('&')).value(BinaryOp::BitAnd))
}

fn equality(i: &mut &str) -> ModalResult<Expr> {
    fold_binary(
        i,
        relational,
        alt(("==".value(BinaryOp::Eq), "!=".value(BinaryOp::Ne))),
    )
}

fn relational(i: &mut &str) -> ModalResult<Expr> {
    fold_binary(
        i,
        shift,
        alt((
            "<=".value(BinaryOp::Le),
            ">=".value(BinaryOp::Ge),
            terminated('<', not('<')).value(BinaryOp::Lt),
            terminated('>', not('>')).value(BinaryOp::Gt),
        )),
    )
}

fn shift(i: &mut &str) -> ModalResult<Expr> {
    fold_binary(
        i,
        additive,
        alt(("<<".value(BinaryOp::Shl), ">>".value(BinaryOp::Shr))),
    )
}

fn additive(i: &mut &str) -> ModalResult<Expr> {
    fold_binary(
        i,
        multiplicative,
        alt(('+'.value(BinaryOp::Add), '-'.value(BinaryOp::Sub))),
    )
}

fn multiplicative(i: &mut &str) -> ModalResult<Expr> {
    fold_binary(
        i,
        power,
        alt((
            terminated('*', not('*')).value(BinaryOp::Mul),
            '/'.value(BinaryOp::Div),
            '%'.value(BinaryOp::Mod),
        )),
    )
}

// `**` is right-associative.
fn power(i: &mut &str) -> ModalResult<Expr> {
    let base = unary.parse_next(i)?;
    if opt(ws("**")).parse_next(i)?.is_none() {
        return Ok(base);
    }
    let exponent = cut_err(power).parse_next(i)?;
    Ok(Expr::Binary(
        BinaryOp::Pow,
        Box::new(base),
        Box::new(exponent),
    ))
}

fn unary(i: &mut &str) -> ModalResult<Expr> {
    let op = opt(ws(alt((
        '-'.value(UnaryOp::Neg),
        terminated('!', not('=')).value(UnaryOp::Not),
        '~'.value(UnaryOp::BitNot),
    ))))
    .parse_next(i)?;
    match op {
        Some(op) => Ok(Expr::Unary(op, Box::new(cut_err(unary).parse_next(i)?))),
        None => primary.parse_next(i),
    }
}

fn primary(i: &mut &str) -> ModalResult<Expr> {
    ws(alt((
        number.map(Expr::Num),
        name_or_call,
        delimited('(', ternary, ws(')')),
    )))
    .parse_next(i)
}

fn name_or_call(i: &mut &str) -> ModalResult<Expr> {
    let name = identifier.parse_next(i)?;
    let args: Option<Vec<Expr>> = opt(preceded(
        multispace0,
        delimited('(', separated(0.., ternary, ws(',')), ws(')')),
    ))
    .parse_next(i)?;
    Ok(match args {
        Some(args) => Expr::Call(name.to_string(), args),
        None => Expr::Ident(name.trim_start_matches('`').to_string()),
    })
}

/// Identifier, optionally carrying a backtick macro or `$` system-function marker.
fn identifier<'i>(i: &mut &'i str) -> ModalResult<&'i str> {
    (
        opt(one_of(['`', '$'])),
        one_of(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(0.., |c: char| c.is_ascii_alphanumeric() || c == '_'),
    )
        .take()
        .parse_next(i)
}

fn number(i: &mut &str) -> ModalResult<i64> {
    alt((based_literal, hex_literal, digit1.try_map(str::parse::<i64>))).parse_next(i)
}

fn hex_literal(i: &mut &str) -> ModalResult<i64> {
    preceded(
        alt(("0x", "0X")),
        take_while(1.., |c: char| c.is_ascii_hexdigit() || c == '_'),
    )
    .try_map(|digits: &str| i64::from_str_radix(&digits.replace('_', ""), 16))
    .parse_next(i)
}

/// Verilog based literal such as `16'h0100`, `1'b0` or `'d12`.
fn based_literal(i: &mut &str) -> ModalResult<i64> {
    (
        opt(digit1),
        '\'',
        one_of(['h', 'H', 'd', 'D', 'b', 'B', 'o', 'O']),
        take_while(1.., |c: char| c.is_ascii_hexdigit() || c == '_'),
    )
        .try_map(|(_, _, base, digits)| {
            let radix = match base {
                'h' | 'H' => 16,
                'b' | 'B' => 2,
                'o' | 'O' => 8,
                _ => 10,
            };
            i64::from_str_radix(&str::replace(digits, '_', ""), radix)
        })
        .parse_next(i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(v: i64) -> Box<Expr> {
        Box::new(Expr::Num(v))
    }

    #[test]
    fn test_precedence() {
        assert_eq!(
            parse_expression("1 + 2 * 3").unwrap(),
            Expr::Binary(
                BinaryOp::Add,
                num(1),
                Box::new(Expr::Binary(BinaryOp::Mul, num(2), num(3)))
            )
        );
        assert_eq!(
            parse_expression("2 ** 3 ** 2").unwrap(),
            Expr::Binary(
                BinaryOp::Pow,
                num(2),
                Box::new(Expr::Binary(BinaryOp::Pow, num(3), num(2)))
            )
        );
    }

    #[test]
    fn test_literals() {
        assert_eq!(parse_expression("16'h0100").unwrap(), Expr::Num(0x100));
        assert_eq!(parse_expression("1'b0").unwrap(), Expr::Num(0));
        assert_eq!(parse_expression("0xFF_FF").unwrap(), Expr::Num(0xffff));
        assert_eq!(parse_expression(" 42 ").unwrap(), Expr::Num(42));
    }

    #[test]
    fn test_identifiers_and_calls() {
        assert_eq!(
            parse_expression("`DATA_W").unwrap(),
            Expr::Ident("DATA_W".into())
        );
        assert_eq!(
            parse_expression("$clog2(N)").unwrap(),
            Expr::Call("$clog2".into(), vec![Expr::Ident("N".into())])
        );
        assert_eq!(
            parse_expression("`IOB_MAX(A, 3)").unwrap(),
            Expr::Call(
                "`IOB_MAX".into(),
                vec![Expr::Ident("A".into()), Expr::Num(3)]
            )
        );
    }

    #[test]
    fn test_logical_vs_bitwise() {
        assert_eq!(
            parse_expression("A || B | C").unwrap(),
            Expr::Binary(
                BinaryOp::Or,
                Box::new(Expr::Ident("A".into())),
                Box::new(Expr::Binary(
                    BinaryOp::BitOr,
                    Box::new(Expr::Ident("B".into())),
                    Box::new(Expr::Ident("C".into()))
                ))
            )
        );
    }

    #[test]
    fn test_ternary() {
        let expr = parse_expression("((A > 1) ? A : 1)").unwrap();
        assert!(matches!(expr, Expr::Ternary(..)));
    }

    #[test]
    fn test_syntax_errors() {
        assert!(parse_expression("1 +").is_err());
        assert!(parse_expression("(1").is_err());
        assert!(parse_expression("A B").is_err());
        assert!(parse_expression("").is_err());
    }
}
