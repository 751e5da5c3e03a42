use serde_json::Value;
use winnow::combinator::{alt, cut_err, delimited, not, opt, preceded, repeat, separated, terminated};
use winnow::error::{ErrMode, ModalResult, StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::token::{any, one_of, take_while};

use super::ast::{CompareOp, Expr};

// -- Whitespace & words -----------------------------------------------------

fn ws(input: &mut &str) -> ModalResult<()> {
    take_while(0.., |c: char| c.is_ascii_whitespace())
        .void()
        .parse_next(input)
}

fn ident_char(input: &mut &str) -> ModalResult<char> {
    one_of(|c: char| c.is_ascii_alphanumeric() || c == '_').parse_next(input)
}

fn word<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    (
        take_while(1.., |c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(0.., |c: char| {
            c.is_ascii_alphanumeric() || c == '_' || c == '.'
        }),
    )
        .take()
        .parse_next(input)
}

// -- Literals ---------------------------------------------------------------

fn string_literal(input: &mut &str) -> ModalResult<String> {
    let quote = one_of(['\'', '"']).parse_next(input)?;
    let mut s = String::new();
    loop {
        let ch = cut_err(any).parse_next(input)?;
        match ch {
            c if c == quote => return Ok(s),
            '\\' => {
                let esc = cut_err(any).parse_next(input)?;
                match esc {
                    'n' => s.push('\n'),
                    't' => s.push('\t'),
                    other => s.push(other),
                }
            }
            c => s.push(c),
        }
    }
}

fn number(input: &mut &str) -> ModalResult<Expr> {
    let text = (
        opt('-'),
        take_while(1.., |c: char| c.is_ascii_digit()),
        opt(('.', take_while(1.., |c: char| c.is_ascii_digit()))),
    )
        .take()
        .parse_next(input)?;

    let value = if text.contains('.') {
        text.parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
    } else {
        text.parse::<i64>().ok().map(Value::from)
    };

    value
        .map(Expr::Literal)
        .ok_or_else(|| ErrMode::from_input(input).cut())
}

fn record_ref(input: &mut &str) -> ModalResult<Expr> {
    let path = delimited(
        ('[', ws, "data."),
        take_while(1.., |c: char| {
            c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')
        }),
        (ws, ']'),
    )
    .parse_next(input)?;
    Ok(Expr::Record(path.to_owned()))
}

fn list(input: &mut &str) -> ModalResult<Expr> {
    let items: Vec<Expr> =
        delimited('[', separated(0.., expr, (ws, ',')), (ws, cut_err(']'))).parse_next(input)?;
    Ok(Expr::List(items))
}

fn ident_or_call(input: &mut &str) -> ModalResult<Expr> {
    let name = word.parse_next(input)?;
    match name {
        "true" | "TRUE" => return Ok(Expr::Literal(Value::Bool(true))),
        "false" | "FALSE" => return Ok(Expr::Literal(Value::Bool(false))),
        "null" | "NULL" | "nil" => return Ok(Expr::Literal(Value::Null)),
        _ => {}
    }

    let checkpoint = input.checkpoint();
    ws.parse_next(input)?;
    if opt('(').parse_next(input)?.is_some() {
        let args: Vec<Expr> = separated(0.., expr, (ws, ',')).parse_next(input)?;
        (ws, cut_err(')')).parse_next(input)?;
        return Ok(Expr::Call {
            name: name.to_owned(),
            args,
        });
    }

    input.reset(&checkpoint);
    Ok(Expr::Field(name.to_owned()))
}

fn operand(input: &mut &str) -> ModalResult<Expr> {
    ws.parse_next(input)?;
    alt((
        delimited('(', expr, (ws, cut_err(')'))),
        record_ref,
        list,
        string_literal.map(|s| Expr::Literal(Value::String(s))),
        number,
        ident_or_call,
    ))
    .context(StrContext::Expected(StrContextValue::Description("operand")))
    .parse_next(input)
}

// -- Operators --------------------------------------------------------------

fn compare_op(input: &mut &str) -> ModalResult<CompareOp> {
    ws.parse_next(input)?;
    alt((
        ">=".value(CompareOp::Gte),
        ">".value(CompareOp::Gt),
        "<=".value(CompareOp::Lte),
        "<".value(CompareOp::Lt),
        "==".value(CompareOp::Eq),
        "!=".value(CompareOp::Neq),
        "=".value(CompareOp::Eq),
        terminated(alt(("in", "IN")), not(ident_char)).value(CompareOp::In),
        (alt(("not", "NOT")), ws, alt(("in", "IN")), not(ident_char)).value(CompareOp::NotIn),
    ))
    .parse_next(input)
}

fn and_op(input: &mut &str) -> ModalResult<()> {
    ws.parse_next(input)?;
    alt((
        "&&".void(),
        terminated(alt(("and", "AND")), not(ident_char)).void(),
    ))
    .parse_next(input)
}

fn or_op(input: &mut &str) -> ModalResult<()> {
    ws.parse_next(input)?;
    alt((
        "||".void(),
        terminated(alt(("or", "OR")), not(ident_char)).void(),
    ))
    .parse_next(input)
}

fn not_op(input: &mut &str) -> ModalResult<()> {
    ws.parse_next(input)?;
    alt((
        terminated('!', not('=')).void(),
        terminated(alt(("not", "NOT")), not(ident_char)).void(),
    ))
    .parse_next(input)
}

// -- Expressions (precedence: OR < AND < NOT < comparison < operand) --------

fn comparison(input: &mut &str) -> ModalResult<Expr> {
    let left = operand(input)?;
    match opt(compare_op).parse_next(input)? {
        Some(op) => {
            let right = cut_err(operand).parse_next(input)?;
            Ok(Expr::Compare {
                op,
                left: Box::new(left),
                right: Box::new(right),
            })
        }
        None => Ok(left),
    }
}

fn unary(input: &mut &str) -> ModalResult<Expr> {
    if opt(not_op).parse_next(input)?.is_some() {
        let inner = cut_err(unary).parse_next(input)?;
        Ok(Expr::Not(Box::new(inner)))
    } else {
        comparison(input)
    }
}

fn and_expr(input: &mut &str) -> ModalResult<Expr> {
    let first = unary(input)?;
    let rest: Vec<Expr> = repeat(0.., preceded(and_op, cut_err(unary))).parse_next(input)?;
    Ok(rest
        .into_iter()
        .fold(first, |acc, r| Expr::And(Box::new(acc), Box::new(r))))
}

fn or_expr(input: &mut &str) -> ModalResult<Expr> {
    let first = and_expr(input)?;
    let rest: Vec<Expr> = repeat(0.., preceded(or_op, cut_err(and_expr))).parse_next(input)?;
    Ok(rest
        .into_iter()
        .fold(first, |acc, r| Expr::Or(Box::new(acc), Box::new(r))))
}

fn expr(input: &mut &str) -> ModalResult<Expr> {
    ws.parse_next(input)?;
    or_expr(input)
}

pub fn parse_expression(input: &mut &str) -> ModalResult<Expr> {
    terminated(expr, ws).parse_next(input)
}
