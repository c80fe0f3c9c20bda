//! Value expression evaluation.
//!
//! Clause parameters and array indices are serialized value expressions:
//! literals (`5`, `-3L`, `2.5f`, `(byte) 1`, `'c'`, `true`, `null`),
//! positional string constants (`Object[42]`), widening/narrowing casts
//! (`WIDEN-J(...)`, `NARROW-I(...)`), fully parenthesized arithmetic
//! (`({x}.size)-(1)`), and origin expressions, which recurse into
//! [`CandidateBackbone::resolve_or_visit`].
//!
//! Arithmetic follows two's-complement integer semantics: `+`, `-`, `*`
//! wrap, division by zero is a hard error, shift amounts are masked by the
//! operand width, and `>>>` shifts in zero bits.

use crate::backbone::CandidateBackbone;
use crate::cache::OriginCache;
use crate::error::{OriginError, SimilarityError};
use crate::model::EvalCtx;
use crate::value::Value;

pub(crate) fn eval_value(
    text: &str,
    backbone: &mut CandidateBackbone,
    ctx: &EvalCtx<'_>,
    cache: &OriginCache,
) -> Result<Value, OriginError> {
    match text {
        "true" => return Ok(Value::Bool(true)),
        "false" => return Ok(Value::Bool(false)),
        "null" => return Ok(Value::Null),
        _ => {}
    }

    if let Ok(x) = text.parse::<i32>() {
        return Ok(Value::Int(x));
    }
    // Suffixed literals; on parse failure fall through, the text may be an
    // origin that happens to end in the suffix letter.
    if let Some(rest) = text.strip_suffix('L') {
        if let Ok(x) = rest.parse::<i64>() {
            return Ok(Value::Long(x));
        }
    }
    if let Some(rest) = text.strip_suffix('f') {
        if let Ok(x) = rest.parse::<f32>() {
            return Ok(Value::Float(x));
        }
    }
    if let Some(rest) = text.strip_suffix('d') {
        if let Ok(x) = rest.parse::<f64>() {
            return Ok(Value::Double(x));
        }
    }
    if let Some(rest) = text.strip_prefix("(byte) ") {
        let x = rest
            .parse::<i8>()
            .map_err(|_| SimilarityError::IllFormedValue(text.to_string()))?;
        return Ok(Value::Byte(x));
    }
    if let Some(rest) = text.strip_prefix("(short) ") {
        let x = rest
            .parse::<i16>()
            .map_err(|_| SimilarityError::IllFormedValue(text.to_string()))?;
        return Ok(Value::Short(x));
    }
    {
        let mut chars = text.chars();
        if let (Some('\''), Some(c), Some('\''), None) =
            (chars.next(), chars.next(), chars.next(), chars.next())
        {
            return Ok(Value::Char(c));
        }
    }

    if let Some(rest) = text.strip_prefix("WIDEN-") {
        return eval_conversion(rest, text, backbone, ctx, cache);
    }
    if let Some(rest) = text.strip_prefix("NARROW-") {
        return eval_conversion(rest, text, backbone, ctx, cache);
    }

    // Symbolic placeholders the engine cannot score against.
    if text == "*" || text == "<DEFAULT>" || text.starts_with("{R[") {
        return Err(SimilarityError::UnsupportedValue(text.to_string()).into());
    }

    if let Some(rest) = text.strip_prefix("Object[") {
        let position = rest
            .strip_suffix(']')
            .and_then(|p| p.parse::<i64>().ok())
            .ok_or_else(|| SimilarityError::IllFormedValue(text.to_string()))?;
        return match ctx.constants.get(&position) {
            Some(s) => Ok(Value::Str(s.clone())),
            None => Err(SimilarityError::MissingConstant(position).into()),
        };
    }

    if text.starts_with('(') {
        return eval_binary(text, backbone, ctx, cache);
    }
    if (text.starts_with('~') || text.starts_with('-')) && text[1..].starts_with('(') {
        return eval_unary(text, backbone, ctx, cache);
    }

    if text.starts_with('{') || text.starts_with('[') || text.starts_with('<') {
        return backbone.resolve_or_visit(text, ctx, cache);
    }

    Err(SimilarityError::IllFormedValue(text.to_string()).into())
}

/// `T(inner)` with `T` one of `D`, `F`, `I`, `J`; `expr` is the full text for
/// error reporting.
fn eval_conversion(
    rest: &str,
    expr: &str,
    backbone: &mut CandidateBackbone,
    ctx: &EvalCtx<'_>,
    cache: &OriginCache,
) -> Result<Value, OriginError> {
    let ill = || SimilarityError::IllFormedValue(expr.to_string());
    let mut chars = rest.chars();
    let target = chars.next().ok_or_else(ill)?;
    let inner = chars
        .as_str()
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(ill)?;
    let value = eval_value(inner, backbone, ctx, cache)?;
    convert(target, &value, expr).map_err(OriginError::from)
}

/// Numeric conversion with Java cast semantics: float-to-integer saturates
/// and maps NaN to 0, integer narrowing truncates to the low bits.
fn convert(target: char, value: &Value, expr: &str) -> Result<Value, SimilarityError> {
    use Value::*;
    let converted = match (target, value) {
        ('D', Byte(x)) => Double(*x as f64),
        ('D', Short(x)) => Double(*x as f64),
        ('D', Char(c)) => Double(*c as u32 as f64),
        ('D', Int(x)) => Double(*x as f64),
        ('D', Long(x)) => Double(*x as f64),
        ('D', Float(x)) => Double(*x as f64),
        ('D', Double(x)) => Double(*x),
        ('F', Byte(x)) => Float(*x as f32),
        ('F', Short(x)) => Float(*x as f32),
        ('F', Char(c)) => Float(*c as u32 as f32),
        ('F', Int(x)) => Float(*x as f32),
        ('F', Long(x)) => Float(*x as f32),
        ('F', Float(x)) => Float(*x),
        ('F', Double(x)) => Float(*x as f32),
        ('I', Byte(x)) => Int(*x as i32),
        ('I', Short(x)) => Int(*x as i32),
        ('I', Char(c)) => Int(*c as u32 as i32),
        ('I', Int(x)) => Int(*x),
        ('I', Long(x)) => Int(*x as i32),
        ('I', Float(x)) => Int(*x as i32),
        ('I', Double(x)) => Int(*x as i32),
        ('J', Byte(x)) => Long(*x as i64),
        ('J', Short(x)) => Long(*x as i64),
        ('J', Char(c)) => Long(*c as u32 as i64),
        ('J', Int(x)) => Long(*x as i64),
        ('J', Long(x)) => Long(*x),
        ('J', Float(x)) => Long(*x as i64),
        ('J', Double(x)) => Long(*x as i64),
        _ => return Err(SimilarityError::IllFormedValue(expr.to_string())),
    };
    Ok(converted)
}

/// `~(x)` or `-(x)`.
fn eval_unary(
    text: &str,
    backbone: &mut CandidateBackbone,
    ctx: &EvalCtx<'_>,
    cache: &OriginCache,
) -> Result<Value, OriginError> {
    let op = &text[..1];
    let inner = text[1..]
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| SimilarityError::IllFormedValue(text.to_string()))?;
    let value = eval_value(inner, backbone, ctx, cache)?;
    let result = match (op, &value) {
        ("~", Value::Int(x)) => Value::Int(!x),
        ("~", Value::Long(x)) => Value::Long(!x),
        ("-", Value::Int(x)) => Value::Int(x.wrapping_neg()),
        ("-", Value::Long(x)) => Value::Long(x.wrapping_neg()),
        ("-", Value::Float(x)) => Value::Float(-x),
        ("-", Value::Double(x)) => Value::Double(-x),
        _ => {
            return Err(SimilarityError::OperandTypes {
                op: op.to_string(),
                expr: text.to_string(),
            }
            .into())
        }
    };
    Ok(result)
}

/// `(lhs) op (rhs)`, both operands parenthesized, optional spaces around the
/// operator.
fn eval_binary(
    text: &str,
    backbone: &mut CandidateBackbone,
    ctx: &EvalCtx<'_>,
    cache: &OriginCache,
) -> Result<Value, OriginError> {
    let ill = || SimilarityError::IllFormedValue(text.to_string());

    let close = matching_paren(text).ok_or_else(ill)?;
    let lhs_text = &text[1..close];
    let rest = text[close + 1..].trim_start();
    if rest.is_empty() {
        // Plain parenthesized value.
        return eval_value(lhs_text, backbone, ctx, cache);
    }

    let op_len = rest
        .char_indices()
        .take_while(|(_, c)| "+-*/%<>|&^".contains(*c))
        .count();
    let op = &rest[..op_len];
    if !matches!(op, "+" | "-" | "*" | "/" | "%" | "<<" | ">>" | ">>>" | "|" | "&" | "^") {
        return Err(ill().into());
    }
    let rhs = rest[op_len..].trim_start();
    let rhs_close = matching_paren(rhs).ok_or_else(ill)?;
    if rhs_close != rhs.len() - 1 {
        return Err(ill().into());
    }
    let rhs_text = &rhs[1..rhs_close];

    let lhs = eval_value(lhs_text, backbone, ctx, cache)?;
    let rhs = eval_value(rhs_text, backbone, ctx, cache)?;
    apply_binary(op, &lhs, &rhs, text).map_err(OriginError::from)
}

/// Byte index of the `)` matching a leading `(`, or `None`.
fn matching_paren(text: &str) -> Option<usize> {
    if !text.starts_with('(') {
        return None;
    }
    let mut level = 0usize;
    for (i, c) in text.char_indices() {
        match c {
            '(' => level += 1,
            ')' => {
                level -= 1;
                if level == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn apply_binary(op: &str, lhs: &Value, rhs: &Value, expr: &str) -> Result<Value, SimilarityError> {
    use Value::*;

    macro_rules! arith {
        ($wrap:ident, $float_op:tt) => {
            match (lhs, rhs) {
                (Int(a), Int(b)) => return Ok(Int(a.$wrap(*b))),
                (Long(a), Long(b)) => return Ok(Long(a.$wrap(*b))),
                (Float(a), Float(b)) => return Ok(Float(a $float_op b)),
                (Double(a), Double(b)) => return Ok(Double(a $float_op b)),
                _ => {}
            }
        };
    }
    macro_rules! div_like {
        ($wrap:ident, $float_op:tt) => {
            match (lhs, rhs) {
                (Int(_), Int(0)) | (Long(_), Long(0)) => {
                    return Err(SimilarityError::DivisionByZero(expr.to_string()))
                }
                // wrapping: i32::MIN / -1 overflows back to i32::MIN
                (Int(a), Int(b)) => return Ok(Int(a.$wrap(*b))),
                (Long(a), Long(b)) => return Ok(Long(a.$wrap(*b))),
                (Float(a), Float(b)) => return Ok(Float(a $float_op b)),
                (Double(a), Double(b)) => return Ok(Double(a $float_op b)),
                _ => {}
            }
        };
    }
    macro_rules! bitwise {
        ($bit_op:tt) => {
            match (lhs, rhs) {
                (Int(a), Int(b)) => return Ok(Int(a $bit_op b)),
                (Long(a), Long(b)) => return Ok(Long(a $bit_op b)),
                (Bool(a), Bool(b)) => return Ok(Bool(a $bit_op b)),
                _ => {}
            }
        };
    }

    match op {
        "+" => arith!(wrapping_add, +),
        "-" => arith!(wrapping_sub, -),
        "*" => arith!(wrapping_mul, *),
        "/" => div_like!(wrapping_div, /),
        "%" => div_like!(wrapping_rem, %),
        // Shift amounts are masked by the width of the shifted operand.
        "<<" => match (lhs, rhs) {
            (Int(a), Int(b)) => return Ok(Int(a.wrapping_shl(*b as u32))),
            (Long(a), Int(b)) => return Ok(Long(a.wrapping_shl(*b as u32))),
            _ => {}
        },
        ">>" => match (lhs, rhs) {
            (Int(a), Int(b)) => return Ok(Int(a.wrapping_shr(*b as u32))),
            (Long(a), Int(b)) => return Ok(Long(a.wrapping_shr(*b as u32))),
            _ => {}
        },
        ">>>" => match (lhs, rhs) {
            (Int(a), Int(b)) => return Ok(Int((*a as u32).wrapping_shr(*b as u32) as i32)),
            (Long(a), Int(b)) => return Ok(Long((*a as u64).wrapping_shr(*b as u32) as i64)),
            _ => {}
        },
        "|" => bitwise!(|),
        "&" => bitwise!(&),
        "^" => bitwise!(^),
        _ => return Err(SimilarityError::IllFormedValue(expr.to_string())),
    }

    Err(SimilarityError::OperandTypes {
        op: op.to_string(),
        expr: expr.to_string(),
    })
}
