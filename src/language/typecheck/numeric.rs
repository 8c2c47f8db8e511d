use super::{type_eq, TypeContext, TypeError, TypeErrorKind, TypeResult};
use crate::language::types::{CharWidth, TypeDescriptor, TypeKind};
use tracing::trace;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NumericKind {
    Signed(u32),
    Unsigned(u32),
    Float(u32),
}

impl NumericKind {
    pub fn of(ty: &TypeDescriptor, pointer_bits: u32) -> Option<Self> {
        match ty.kind {
            TypeKind::Int { width, signed: true } => {
                Some(NumericKind::Signed(width.bits(pointer_bits)))
            }
            TypeKind::Int { width, signed: false } => {
                Some(NumericKind::Unsigned(width.bits(pointer_bits)))
            }
            TypeKind::Char(CharWidth::W8) => Some(NumericKind::Unsigned(8)),
            TypeKind::Float(width) => Some(NumericKind::Float(width.bits())),
            _ => None,
        }
    }

    pub fn bits(self) -> u32 {
        match self {
            NumericKind::Signed(bits) | NumericKind::Unsigned(bits) | NumericKind::Float(bits) => {
                bits
            }
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, NumericKind::Float(_))
    }

    fn is_signed(self) -> bool {
        matches!(self, NumericKind::Signed(_))
    }
}

/// How a value is converted by an implicit widening.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Conversion {
    /// Sign-extends when `signed`, zero-extends otherwise.
    IntExtend { signed: bool },
    IntToFloat { signed: bool },
    FloatExtend,
}

/// Implicit conversion from `from` to `to`, if one exists. Never narrows and
/// never turns a float into an integer.
pub fn widening(from: NumericKind, to: NumericKind) -> Option<Conversion> {
    match (from, to) {
        (NumericKind::Float(from_bits), NumericKind::Float(to_bits)) => {
            (from_bits < to_bits).then_some(Conversion::FloatExtend)
        }
        (NumericKind::Float(_), _) => None,
        (int, NumericKind::Float(_)) => Some(Conversion::IntToFloat {
            signed: int.is_signed(),
        }),
        (int, target) => (int.bits() <= target.bits()).then_some(Conversion::IntExtend {
            signed: int.is_signed(),
        }),
    }
}

/// Backend capability used to emit numeric conversions.
pub trait ValueBuilder {
    type Value: Clone;

    /// Resizes an integer to `bits`; `signed` is the source signedness.
    fn int_cast(&mut self, value: Self::Value, bits: u32, signed: bool)
        -> TypeResult<Self::Value>;
    fn int_to_float(
        &mut self,
        value: Self::Value,
        bits: u32,
        signed: bool,
    ) -> TypeResult<Self::Value>;
    fn float_extend(&mut self, value: Self::Value, bits: u32) -> TypeResult<Self::Value>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct TypedValue<V> {
    pub value: V,
    pub ty: TypeDescriptor,
}

impl<V> TypedValue<V> {
    pub fn new(value: V, ty: TypeDescriptor) -> Self {
        Self { value, ty }
    }
}

fn no_conversion(from: &TypeDescriptor, to: &TypeDescriptor) -> TypeError {
    TypeError::new(TypeErrorKind::NoImplicitConversion {
        from: from.to_string(),
        to: to.to_string(),
    })
    .at(from.span)
    .with_help("use an explicit cast")
}

/// Implicitly widens `value` to `dest`.
pub fn widen<B: ValueBuilder>(
    builder: &mut B,
    value: TypedValue<B::Value>,
    dest: &TypeDescriptor,
    pointer_bits: u32,
) -> TypeResult<TypedValue<B::Value>> {
    if value.ty == *dest {
        return Ok(value);
    }
    let (Some(from), Some(to)) = (
        NumericKind::of(&value.ty, pointer_bits),
        NumericKind::of(dest, pointer_bits),
    ) else {
        return Err(no_conversion(&value.ty, dest));
    };
    let Some(conversion) = widening(from, to) else {
        return Err(no_conversion(&value.ty, dest));
    };
    trace!(from = %value.ty, to = %dest, ?conversion, "implicit widening");
    let converted = match conversion {
        Conversion::IntExtend { signed } => builder.int_cast(value.value, to.bits(), signed)?,
        Conversion::IntToFloat { signed } => {
            builder.int_to_float(value.value, to.bits(), signed)?
        }
        Conversion::FloatExtend => builder.float_extend(value.value, to.bits())?,
    };
    Ok(TypedValue::new(converted, dest.clone().with_span(value.ty.span)))
}

/// Brings two operands of a binary operation to a common numeric type.
/// Operands that are not both numeric are returned unchanged.
pub fn promote<B: ValueBuilder>(
    builder: &mut B,
    lhs: TypedValue<B::Value>,
    rhs: TypedValue<B::Value>,
    pointer_bits: u32,
) -> TypeResult<(TypedValue<B::Value>, TypedValue<B::Value>)> {
    let (Some(lk), Some(rk)) = (
        NumericKind::of(&lhs.ty, pointer_bits),
        NumericKind::of(&rhs.ty, pointer_bits),
    ) else {
        return Ok((lhs, rhs));
    };
    if lhs.ty == rhs.ty {
        return Ok((lhs, rhs));
    }
    match (lk.is_float(), rk.is_float()) {
        (false, true) => {
            let target = rhs.ty.clone();
            Ok((widen(builder, lhs, &target, pointer_bits)?, rhs))
        }
        (true, false) => {
            let target = lhs.ty.clone();
            Ok((lhs, widen(builder, rhs, &target, pointer_bits)?))
        }
        _ if lk.bits() < rk.bits() => {
            let target = rhs.ty.clone();
            Ok((widen(builder, lhs, &target, pointer_bits)?, rhs))
        }
        _ if rk.bits() < lk.bits() => {
            let target = lhs.ty.clone();
            Ok((lhs, widen(builder, rhs, &target, pointer_bits)?))
        }
        _ => Ok((lhs, rhs)),
    }
}

/// Accepts `arg` where `expected` is required, widening numbers when the
/// types differ.
pub fn coerce_argument<B: ValueBuilder>(
    ctx: &TypeContext<'_>,
    builder: &mut B,
    arg: TypedValue<B::Value>,
    expected: &TypeDescriptor,
) -> TypeResult<TypedValue<B::Value>> {
    if type_eq(ctx, expected, &arg.ty).succeeded() {
        return Ok(arg);
    }
    if arg.ty.is_numeric() && expected.is_numeric() {
        return widen(builder, arg, expected, ctx.pointer_bits());
    }
    Err(TypeError::new(TypeErrorKind::TypeMismatch {
        expected: expected.to_string(),
        found: arg.ty.to_string(),
    })
    .at(arg.ty.span))
}

/// Compile-time numeric value. Integers keep their raw bit pattern truncated
/// to `bits`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Constant {
    Int { bits: u32, raw: u128 },
    Float { bits: u32, value: f64 },
}

fn mask(bits: u32) -> u128 {
    if bits >= 128 {
        u128::MAX
    } else {
        (1u128 << bits) - 1
    }
}

impl Constant {
    pub fn int(bits: u32, value: i128) -> Self {
        Constant::Int {
            bits,
            raw: (value as u128) & mask(bits),
        }
    }

    pub fn float(bits: u32, value: f64) -> Self {
        Constant::Float { bits, value }
    }

    pub fn as_unsigned(&self) -> Option<u128> {
        match *self {
            Constant::Int { raw, .. } => Some(raw),
            Constant::Float { .. } => None,
        }
    }

    pub fn as_signed(&self) -> Option<i128> {
        match *self {
            Constant::Int { bits: 0, .. } => Some(0),
            Constant::Int { bits, raw } if bits < 128 => {
                let sign = 1u128 << (bits - 1);
                if raw & sign != 0 {
                    Some((raw | !mask(bits)) as i128)
                } else {
                    Some(raw as i128)
                }
            }
            Constant::Int { raw, .. } => Some(raw as i128),
            Constant::Float { .. } => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match *self {
            Constant::Float { value, .. } => Some(value),
            Constant::Int { .. } => None,
        }
    }
}

/// Folds conversions over `Constant` values without a backend.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConstFolder;

fn expected_int(found: &Constant) -> TypeError {
    TypeError::new(TypeErrorKind::Backend {
        message: format!("expected an integer constant, found {found:?}"),
    })
}

/// Nearest IEEE binary16 value, ties to even; out of range becomes infinity.
fn round_to_half(value: f64) -> f64 {
    const HALF_MAX: f64 = 65504.0;
    if !value.is_finite() || value == 0.0 {
        return value;
    }
    let exponent = ((value.to_bits() >> 52) & 0x7ff) as i32 - 1023;
    // Ten fraction bits; below 2^-14 the spacing stays fixed (subnormals).
    let quantum = 2f64.powi(exponent.max(-14) - 10);
    let rounded = (value / quantum).round_ties_even() * quantum;
    if rounded.abs() > HALF_MAX {
        f64::INFINITY.copysign(value)
    } else {
        rounded
    }
}

impl ValueBuilder for ConstFolder {
    type Value = Constant;

    fn int_cast(&mut self, value: Constant, bits: u32, signed: bool) -> TypeResult<Constant> {
        let wide = if signed {
            value.as_signed()
        } else {
            value.as_unsigned().map(|raw| raw as i128)
        };
        let wide = wide.ok_or_else(|| expected_int(&value))?;
        Ok(Constant::int(bits, wide))
    }

    fn int_to_float(&mut self, value: Constant, bits: u32, signed: bool) -> TypeResult<Constant> {
        let converted = if signed {
            value.as_signed().map(|v| v as f64)
        } else {
            value.as_unsigned().map(|v| v as f64)
        };
        let converted = converted.ok_or_else(|| expected_int(&value))?;
        let converted = match bits {
            16 => round_to_half(converted),
            32 => f64::from(converted as f32),
            _ => converted,
        };
        Ok(Constant::float(bits, converted))
    }

    fn float_extend(&mut self, value: Constant, bits: u32) -> TypeResult<Constant> {
        match value {
            Constant::Float { value, .. } => Ok(Constant::float(bits, value)),
            other => Err(TypeError::new(TypeErrorKind::Backend {
                message: format!("expected a float constant, found {other:?}"),
            })),
        }
    }
}
