//! file: core/src/ir/value.rs
//! description: IR constants and the compile-time folding rules.
//!
//! Folding follows the language's numeric semantics: bitwise operators work
//! on the 32-bit integer conversion of their operands, shift counts are
//! masked to five bits and division never traps.
//!
use crate::ir::op::AluOp;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Const {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    /// An array hole. Distinct from `Undefined`.
    Missing,
}

impl Const {
    /// Equality used to share temps that hold the same literal. Unlike `===`
    /// it tells `+0` from `-0`, and `NaN` never matches.
    pub fn same_value(&self, other: &Const) -> bool {
        match (self, other) {
            (Const::Number(a), Const::Number(b)) => a == b && a.is_sign_negative() == b.is_sign_negative(),
            (a, b) => a == b,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Const::Undefined | Const::Null | Const::Missing => false,
            Const::Bool(b) => *b,
            Const::Number(v) => *v != 0.0 && !v.is_nan(),
        }
    }
}

impl std::fmt::Display for Const {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Const::Undefined => write!(f, "undefined"),
            Const::Null => write!(f, "null"),
            Const::Bool(b) => write!(f, "{}", b),
            Const::Missing => write!(f, "missing"),
            Const::Number(v) if *v == 0.0 && v.is_sign_negative() => write!(f, "-0"),
            Const::Number(v) => write!(f, "{}", number_to_string(*v)),
        }
    }
}

/// Formats a number the way the language's `ToString` does: integers
/// below 1e21 without a fraction, exponent notation outside 1e-7..1e21.
pub fn number_to_string(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }
    let scientific = format!("{:e}", value);
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((scientific.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    if (-7..21).contains(&exponent) {
        format!("{}", value)
    } else if exponent > 0 {
        format!("{}e+{}", mantissa, exponent)
    } else {
        format!("{}e{}", mantissa, exponent)
    }
}

pub fn to_uint32(value: f64) -> u32 {
    if !value.is_finite() {
        return 0;
    }
    value.trunc().rem_euclid(4_294_967_296.0) as u32
}

pub fn to_int32(value: f64) -> i32 {
    to_uint32(value) as i32
}

/// Folds a unary operator applied to a numeric constant.
pub fn fold_unop(op: AluOp, value: f64) -> Option<Const> {
    let folded = match op {
        AluOp::Not => Const::Bool(!Const::Number(value).is_truthy()),
        AluOp::UMinus => Const::Number(-value),
        AluOp::UPlus => Const::Number(value),
        AluOp::Compl => Const::Number(f64::from(!to_int32(value))),
        AluOp::Increment => Const::Number(value + 1.0),
        AluOp::Decrement => Const::Number(value - 1.0),
        _ => return None,
    };
    Some(folded)
}

/// Folds a binary operator over two numeric constants. `in` and
/// `instanceof` need an object on the right and are never folded.
pub fn fold_binop(op: AluOp, left: f64, right: f64) -> Option<Const> {
    let number = |v: f64| Some(Const::Number(v));
    let boolean = |b: bool| Some(Const::Bool(b));
    match op {
        AluOp::Add => number(left + right),
        AluOp::Sub => number(left - right),
        AluOp::Mul => number(left * right),
        AluOp::Div => number(left / right),
        AluOp::Mod => number(left % right),
        AluOp::BitAnd => number(f64::from(to_int32(left) & to_int32(right))),
        AluOp::BitOr => number(f64::from(to_int32(left) | to_int32(right))),
        AluOp::BitXor => number(f64::from(to_int32(left) ^ to_int32(right))),
        AluOp::LShift => number(f64::from(to_int32(left).wrapping_shl(to_uint32(right) & 0x1f))),
        AluOp::RShift => number(f64::from(to_int32(left) >> (to_uint32(right) & 0x1f))),
        AluOp::URShift => number(f64::from(to_uint32(left) >> (to_uint32(right) & 0x1f))),
        AluOp::Gt => boolean(left > right),
        AluOp::Lt => boolean(left < right),
        AluOp::Ge => boolean(left >= right),
        AluOp::Le => boolean(left <= right),
        AluOp::Eq | AluOp::StrictEq => boolean(left == right),
        AluOp::Ne | AluOp::StrictNe => boolean(left != right),
        AluOp::InstanceOf | AluOp::In => None,
        AluOp::Not | AluOp::UMinus | AluOp::UPlus | AluOp::Compl | AluOp::Increment | AluOp::Decrement => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_print_like_the_language() {
        assert_eq!(number_to_string(3.0), "3");
        assert_eq!(number_to_string(-0.0), "0");
        assert_eq!(number_to_string(0.5), "0.5");
        assert_eq!(number_to_string(1e21), "1e+21");
        assert_eq!(number_to_string(1e20), "100000000000000000000");
        assert_eq!(number_to_string(1.5e-7), "1.5e-7");
        assert_eq!(number_to_string(0.000001), "0.000001");
        assert_eq!(number_to_string(f64::NAN), "NaN");
        assert_eq!(number_to_string(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn int32_conversion_wraps() {
        assert_eq!(to_int32(4_294_967_296.0 + 5.0), 5);
        assert_eq!(to_int32(2_147_483_648.0), i32::MIN);
        assert_eq!(to_int32(-1.5), -1);
        assert_eq!(to_uint32(-1.0), u32::MAX);
        assert_eq!(to_int32(f64::NAN), 0);
    }

    #[test]
    fn same_value_separates_signed_zeros() {
        assert!(!Const::Number(0.0).same_value(&Const::Number(-0.0)));
        assert!(Const::Number(2.0).same_value(&Const::Number(2.0)));
        assert!(!Const::Number(f64::NAN).same_value(&Const::Number(f64::NAN)));
        assert!(Const::Null.same_value(&Const::Null));
        assert!(!Const::Null.same_value(&Const::Undefined));
    }

    #[test]
    fn shifts_mask_their_count() {
        assert_eq!(fold_binop(AluOp::LShift, 1.0, 33.0), Some(Const::Number(2.0)));
        assert_eq!(fold_binop(AluOp::URShift, -1.0, 0.0), Some(Const::Number(4_294_967_295.0)));
        assert_eq!(fold_binop(AluOp::RShift, -8.0, 1.0), Some(Const::Number(-4.0)));
    }

    #[test]
    fn unary_folding() {
        assert_eq!(fold_unop(AluOp::Not, 0.0), Some(Const::Bool(true)));
        assert_eq!(fold_unop(AluOp::Not, f64::NAN), Some(Const::Bool(true)));
        assert_eq!(fold_unop(AluOp::Compl, 5.0), Some(Const::Number(-6.0)));
        assert_eq!(fold_unop(AluOp::Add, 5.0), None);
    }

    #[test]
    fn display_keeps_negative_zero() {
        assert_eq!(Const::Number(-0.0).to_string(), "-0");
        assert_eq!(Const::Missing.to_string(), "missing");
    }
}
