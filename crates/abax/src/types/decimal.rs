//! Decimal type for arbitrary precision decimal arithmetic.
//!
//! The implementation uses a coefficient (BigInt) and an exponent (i32)
//! representation: value = coefficient * 10^exponent. Results are rounded
//! to a 28-significant-digit context with half-even rounding, matching
//! Python's default decimal context.
//!
//! Construction is exact on every path that matters for the evaluator:
//! from literal source text (so `0.1` is exactly one tenth) and from binary
//! floats (the full binary expansion, as `Decimal(float)` produces).
//! Special values (NaN, infinities) are not represented; operations that
//! would produce them fail instead, like the default context's traps.

use std::{cmp::Ordering, fmt, str::FromStr};

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{Signed, ToPrimitive, Zero};

/// Significant digits kept by arithmetic, as in Python's default context.
const CONTEXT_PRECISION: u64 = 28;

/// Largest digit count allowed to grow out of `**` before we refuse.
const MAX_POW_DIGITS: u64 = 250_000;

/// Errors from decimal arithmetic, mapped to runtime exceptions by the
/// numeric domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecimalError {
    DivisionByZero,
    /// Exponent or intermediate size grew beyond what we are willing to
    /// compute inside a chat command.
    TooLarge,
}

/// A decimal number with arbitrary precision.
///
/// Stored as coefficient * 10^exponent. Trailing zeros are preserved so
/// significance behaves like Python's `decimal.Decimal` (`1.0 + 2.0` keeps
/// one fractional digit).
#[derive(Debug, Clone)]
pub struct Decimal {
    coefficient: BigInt,
    exponent: i32,
}

/// Parse failure for [`Decimal::from_str`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDecimalError;

impl fmt::Display for ParseDecimalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid decimal literal")
    }
}

fn pow10(k: u64) -> BigInt {
    BigInt::from(10u32).pow(u32::try_from(k).unwrap_or(u32::MAX))
}

fn digit_count(n: &BigInt) -> u64 {
    if n.is_zero() {
        1
    } else {
        n.abs().to_string().len() as u64
    }
}

/// Rounds `coeff` (non-negative) down by `drop` digits with half-even
/// rounding. `sticky` marks extra discarded weight below the dropped
/// digits (e.g. a nonzero division remainder).
fn round_half_even(coeff: &BigInt, drop: u64, sticky: bool) -> BigInt {
    let scale = pow10(drop);
    let (quotient, remainder) = coeff.div_rem(&scale);
    let doubled = &remainder * 2i32;
    let round_up = match doubled.cmp(&scale) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => sticky || quotient.is_odd(),
    };
    if round_up { quotient + 1 } else { quotient }
}

impl Decimal {
    pub(crate) fn new(coefficient: BigInt, exponent: i32) -> Self {
        Self { coefficient, exponent }
    }

    pub(crate) fn zero() -> Self {
        Self::new(BigInt::zero(), 0)
    }

    pub(crate) fn one() -> Self {
        Self::new(BigInt::from(1), 0)
    }

    pub fn from_bigint(value: BigInt) -> Self {
        Self::new(value, 0)
    }

    pub fn from_i64(value: i64) -> Self {
        Self::from_bigint(BigInt::from(value))
    }

    /// Exact conversion from a binary float: the full binary expansion, as
    /// Python's `Decimal(float)` produces. Fails for NaN and infinities.
    pub fn try_from_f64(value: f64) -> Result<Self, DecimalError> {
        if !value.is_finite() {
            return Err(DecimalError::TooLarge);
        }
        if value == 0.0 {
            return Ok(Self::zero());
        }
        let bits = value.to_bits();
        let negative = bits >> 63 == 1;
        let exp_bits = ((bits >> 52) & 0x7ff) as i64;
        let fraction = bits & 0x000f_ffff_ffff_ffff;
        // Subnormals have an implicit leading 0, normals an implicit 1.
        let (mut mantissa, mut exp2) = if exp_bits == 0 {
            (fraction, -1074i64)
        } else {
            (fraction | (1 << 52), exp_bits - 1075)
        };
        // Reduce m / 2^k to lowest terms, as float.as_integer_ratio does, so
        // the resulting coefficient carries no trailing zeros.
        while mantissa & 1 == 0 && exp2 < 0 {
            mantissa >>= 1;
            exp2 += 1;
        }
        let mut coefficient = BigInt::from(mantissa);
        let exponent;
        if exp2 >= 0 {
            // m * 2^e is an integer
            coefficient <<= u64::try_from(exp2).expect("non-negative");
            exponent = 0;
        } else {
            // m / 2^k == m * 5^k / 10^k
            let k = u32::try_from(-exp2).expect("bounded by 1074");
            coefficient *= BigInt::from(5u8).pow(k);
            exponent = -i32::try_from(k).expect("bounded by 1074");
        }
        if negative {
            coefficient = -coefficient;
        }
        Ok(Self::new(coefficient, exponent))
    }

    pub fn is_zero(&self) -> bool {
        self.coefficient.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.coefficient.is_negative()
    }

    /// True when the value has no fractional part.
    pub fn is_integral(&self) -> bool {
        if self.exponent >= 0 || self.coefficient.is_zero() {
            return true;
        }
        let scale = pow10(u64::from(self.exponent.unsigned_abs()));
        self.coefficient.mod_floor(&scale).is_zero()
    }

    /// The integer value, when integral.
    pub fn to_bigint(&self) -> Option<BigInt> {
        if !self.is_integral() {
            return None;
        }
        if self.exponent >= 0 {
            Some(&self.coefficient * pow10(u64::from(self.exponent.unsigned_abs())))
        } else {
            let scale = pow10(u64::from(self.exponent.unsigned_abs()));
            Some(self.coefficient.div_floor(&scale))
        }
    }

    /// Nearest binary float. Goes through the decimal string so the result
    /// is correctly rounded by the float parser.
    pub fn to_f64(&self) -> f64 {
        self.to_string().parse().unwrap_or(f64::NAN)
    }

    /// The raw (coefficient, exponent) pair, trailing zeros preserved.
    pub(crate) fn to_parts(&self) -> (&BigInt, i32) {
        (&self.coefficient, self.exponent)
    }

    /// Canonical (coefficient, exponent) with trailing zeros stripped; used
    /// for hashing so numerically equal decimals hash alike.
    pub(crate) fn normalized(&self) -> (BigInt, i32) {
        if self.coefficient.is_zero() {
            return (BigInt::zero(), 0);
        }
        let mut coeff = self.coefficient.clone();
        let mut exp = self.exponent;
        let ten = BigInt::from(10u32);
        while (&coeff % &ten).is_zero() {
            coeff /= &ten;
            exp += 1;
        }
        (coeff, exp)
    }

    /// Rounds to the context precision (half-even) when the coefficient has
    /// grown past it.
    fn round_to_context(mut self) -> Self {
        let digits = digit_count(&self.coefficient);
        if digits <= CONTEXT_PRECISION {
            return self;
        }
        let drop = digits - CONTEXT_PRECISION;
        let negative = self.coefficient.is_negative();
        let mut coeff = round_half_even(&self.coefficient.abs(), drop, false);
        if negative {
            coeff = -coeff;
        }
        self.coefficient = coeff;
        self.exponent = self.exponent.saturating_add(i32::try_from(drop).unwrap_or(i32::MAX));
        self
    }

    /// Coefficient rescaled to a lower exponent (exact).
    fn coefficient_at(&self, exponent: i32) -> BigInt {
        debug_assert!(exponent <= self.exponent);
        &self.coefficient * pow10(u64::from(self.exponent.abs_diff(exponent)))
    }

    pub(crate) fn neg(&self) -> Self {
        Self::new(-self.coefficient.clone(), self.exponent)
    }

    pub(crate) fn abs(&self) -> Self {
        Self::new(self.coefficient.abs(), self.exponent)
    }

    pub(crate) fn add(&self, other: &Self) -> Self {
        let exponent = self.exponent.min(other.exponent);
        let sum = self.coefficient_at(exponent) + other.coefficient_at(exponent);
        Self::new(sum, exponent).round_to_context()
    }

    pub(crate) fn sub(&self, other: &Self) -> Self {
        self.add(&other.neg())
    }

    pub(crate) fn mul(&self, other: &Self) -> Self {
        let coefficient = &self.coefficient * &other.coefficient;
        let exponent = self.exponent.saturating_add(other.exponent);
        Self::new(coefficient, exponent).round_to_context()
    }

    /// Division rounded to context precision; exact results keep the fewest
    /// digits possible without raising the exponent past the ideal one.
    pub(crate) fn div(&self, other: &Self) -> Result<Self, DecimalError> {
        if other.is_zero() {
            return Err(DecimalError::DivisionByZero);
        }
        let ideal_exp = i64::from(self.exponent) - i64::from(other.exponent);
        if self.is_zero() {
            let exp = i32::try_from(ideal_exp).map_err(|_| DecimalError::TooLarge)?;
            return Ok(Self::new(BigInt::zero(), exp));
        }
        let negative = self.coefficient.is_negative() != other.coefficient.is_negative();
        let mut dividend = self.coefficient.abs();
        let divisor = other.coefficient.abs();
        let mut exp = ideal_exp;

        // Give the integer quotient at least precision + 1 digits.
        let shift = CONTEXT_PRECISION as i64 + 1 + digit_count(&divisor) as i64 - digit_count(&dividend) as i64;
        if shift > 0 {
            dividend *= pow10(shift as u64);
            exp -= shift;
        }
        let (mut quotient, remainder) = dividend.div_rem(&divisor);
        if remainder.is_zero() {
            // Exact: strip trailing zeros, but never past the ideal exponent.
            let ten = BigInt::from(10u32);
            while exp < ideal_exp && (&quotient % &ten).is_zero() {
                quotient /= &ten;
                exp += 1;
            }
        } else {
            let digits = digit_count(&quotient);
            if digits > CONTEXT_PRECISION {
                let drop = digits - CONTEXT_PRECISION;
                quotient = round_half_even(&quotient, drop, true);
                exp += drop as i64;
            }
        }
        if negative {
            quotient = -quotient;
        }
        let exp = i32::try_from(exp).map_err(|_| DecimalError::TooLarge)?;
        Ok(Self::new(quotient, exp))
    }

    /// Floored division: `floor(a / b)` as an exact integer-valued decimal.
    pub(crate) fn floordiv(&self, other: &Self) -> Result<Self, DecimalError> {
        if other.is_zero() {
            return Err(DecimalError::DivisionByZero);
        }
        let exponent = self.exponent.min(other.exponent);
        let a = self.coefficient_at(exponent);
        let b = other.coefficient_at(exponent);
        Ok(Self::new(a.div_floor(&b), 0))
    }

    /// Floored remainder, keeping the divisor's sign, so that
    /// `a == (a // b) * b + a % b`.
    pub(crate) fn rem(&self, other: &Self) -> Result<Self, DecimalError> {
        if other.is_zero() {
            return Err(DecimalError::DivisionByZero);
        }
        let exponent = self.exponent.min(other.exponent);
        let a = self.coefficient_at(exponent);
        let b = other.coefficient_at(exponent);
        Ok(Self::new(a.mod_floor(&b), exponent))
    }

    /// Integral power. Exact, then rounded to context precision.
    pub(crate) fn pow_integral(&self, n: &BigInt) -> Result<Self, DecimalError> {
        if n.is_zero() {
            return Ok(Self::one());
        }
        if n.is_negative() {
            if self.is_zero() {
                return Err(DecimalError::DivisionByZero);
            }
            let positive = self.pow_integral(&n.abs())?;
            return Self::one().div(&positive);
        }
        let n = n.to_u32().ok_or(DecimalError::TooLarge)?;
        if digit_count(&self.coefficient).saturating_mul(u64::from(n)) > MAX_POW_DIGITS {
            return Err(DecimalError::TooLarge);
        }
        let coefficient = self.coefficient.pow(n);
        let exponent = i64::from(self.exponent) * i64::from(n);
        let exponent = i32::try_from(exponent).map_err(|_| DecimalError::TooLarge)?;
        Ok(Self::new(coefficient, exponent).round_to_context())
    }

    /// Rescales to the given exponent with half-even rounding, like
    /// `Decimal.quantize(Decimal((0, (1,), exp)))`.
    pub(crate) fn quantize(&self, exponent: i32) -> Self {
        if self.exponent >= exponent {
            let coeff = self.coefficient_at(exponent);
            return Self::new(coeff, exponent);
        }
        let drop = u64::from(exponent.abs_diff(self.exponent));
        let negative = self.coefficient.is_negative();
        let mut coeff = round_half_even(&self.coefficient.abs(), drop, false);
        if negative {
            coeff = -coeff;
        }
        Self::new(coeff, exponent)
    }

    /// Largest integer `<= self`.
    pub(crate) fn floor(&self) -> BigInt {
        if self.exponent >= 0 {
            &self.coefficient * pow10(u64::from(self.exponent.unsigned_abs()))
        } else {
            let scale = pow10(u64::from(self.exponent.unsigned_abs()));
            self.coefficient.div_floor(&scale)
        }
    }

    /// Smallest integer `>= self`.
    pub(crate) fn ceil(&self) -> BigInt {
        if self.exponent >= 0 {
            &self.coefficient * pow10(u64::from(self.exponent.unsigned_abs()))
        } else {
            let scale = pow10(u64::from(self.exponent.unsigned_abs()));
            self.coefficient.div_ceil(&scale)
        }
    }

    /// Integer part, truncating toward zero (`int(Decimal)` semantics).
    pub(crate) fn trunc(&self) -> BigInt {
        if self.is_negative() { self.ceil() } else { self.floor() }
    }

    fn cmp_value(&self, other: &Self) -> Ordering {
        let exponent = self.exponent.min(other.exponent);
        self.coefficient_at(exponent).cmp(&other.coefficient_at(exponent))
    }
}

impl PartialEq for Decimal {
    fn eq(&self, other: &Self) -> bool {
        self.cmp_value(other) == Ordering::Equal
    }
}

impl Eq for Decimal {}

impl PartialOrd for Decimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Decimal {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_value(other)
    }
}

impl FromStr for Decimal {
    type Err = ParseDecimalError;

    /// Parses decimal literal text: optional sign, digits with an optional
    /// point, optional exponent, underscores allowed as in Python source.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cleaned: String = s.chars().filter(|c| *c != '_').collect();
        let mut rest = cleaned.trim();
        let mut negative = false;
        if let Some(stripped) = rest.strip_prefix('-') {
            negative = true;
            rest = stripped;
        } else if let Some(stripped) = rest.strip_prefix('+') {
            rest = stripped;
        }

        let (mantissa, exp_part) = match rest.find(['e', 'E']) {
            Some(pos) => {
                let exp: i32 = rest[pos + 1..].parse().map_err(|_| ParseDecimalError)?;
                (&rest[..pos], exp)
            }
            None => (rest, 0),
        };
        let (int_digits, frac_digits) = match mantissa.find('.') {
            Some(pos) => (&mantissa[..pos], &mantissa[pos + 1..]),
            None => (mantissa, ""),
        };
        if int_digits.is_empty() && frac_digits.is_empty() {
            return Err(ParseDecimalError);
        }
        if !int_digits.bytes().all(|b| b.is_ascii_digit()) || !frac_digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseDecimalError);
        }
        let digits = format!("{int_digits}{frac_digits}");
        let mut coefficient = BigInt::parse_bytes(digits.as_bytes(), 10).ok_or(ParseDecimalError)?;
        if negative {
            coefficient = -coefficient;
        }
        let exponent = exp_part
            .checked_sub(i32::try_from(frac_digits.len()).map_err(|_| ParseDecimalError)?)
            .ok_or(ParseDecimalError)?;
        Ok(Self::new(coefficient, exponent))
    }
}

impl fmt::Display for Decimal {
    /// CPython's `Decimal.__str__` algorithm: fixed-point when the exponent
    /// is non-positive and the adjusted exponent is at least -6, scientific
    /// notation otherwise.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.coefficient.is_negative() {
            f.write_str("-")?;
        }
        let digits = self.coefficient.abs().to_string();
        let leftdigits = i64::from(self.exponent) + digits.len() as i64;

        if self.exponent <= 0 && leftdigits > -6 {
            if self.exponent == 0 {
                f.write_str(&digits)
            } else if leftdigits > 0 {
                let split = usize::try_from(leftdigits).expect("positive");
                write!(f, "{}.{}", &digits[..split], &digits[split..])
            } else {
                let zeros = usize::try_from(-leftdigits).expect("non-negative");
                write!(f, "0.{}{}", "0".repeat(zeros), digits)
            }
        } else {
            let adjusted = leftdigits - 1;
            if digits.len() == 1 {
                write!(f, "{digits}E{adjusted:+}")
            } else {
                write!(f, "{}.{}E{adjusted:+}", &digits[..1], &digits[1..])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn parse_and_display_round_trip() {
        for s in ["0", "1", "-1", "0.5", "123.456", "0.001", "1E+3", "1.5E-7", "100"] {
            assert_eq!(dec(s).to_string(), s);
        }
        assert_eq!(dec("1e3").to_string(), "1E+3");
        assert_eq!(dec("0.100").to_string(), "0.100");
        assert_eq!(dec("+12_3.5").to_string(), "123.5");
    }

    #[test]
    fn tenth_sums_exactly() {
        let tenth = dec("0.1");
        let mut total = Decimal::zero();
        for _ in 0..10 {
            total = total.add(&tenth);
        }
        assert_eq!(total, Decimal::one());
        assert_eq!(total.to_string(), "1.0");
    }

    #[test]
    fn division_exact_and_rounded() {
        assert_eq!(dec("1").div(&dec("2")).unwrap().to_string(), "0.5");
        assert_eq!(dec("10").div(&dec("2")).unwrap().to_string(), "5");
        let third = dec("1").div(&dec("3")).unwrap();
        assert_eq!(third.to_string(), "0.3333333333333333333333333333");
        assert_eq!(dec("2").div(&dec("0")), Err(DecimalError::DivisionByZero));
    }

    #[test]
    fn floored_division_and_remainder() {
        assert_eq!(dec("10").floordiv(&dec("3")).unwrap(), dec("3"));
        assert_eq!(dec("10").rem(&dec("3")).unwrap(), dec("1"));
        assert_eq!(dec("-7").floordiv(&dec("2")).unwrap(), dec("-4"));
        assert_eq!(dec("-7").rem(&dec("2")).unwrap(), dec("1"));
        // a == (a // b) * b + a % b
        let (a, b) = (dec("-7.5"), dec("2"));
        let recombined = a.floordiv(&b).unwrap().mul(&b).add(&a.rem(&b).unwrap());
        assert_eq!(recombined, a);
    }

    #[test]
    fn integral_powers() {
        assert_eq!(dec("2").pow_integral(&BigInt::from(3)).unwrap(), dec("8"));
        assert_eq!(dec("3").pow_integral(&BigInt::from(0)).unwrap(), dec("1"));
        assert_eq!(dec("2").pow_integral(&BigInt::from(-2)).unwrap(), dec("0.25"));
        assert_eq!(dec("1.5").pow_integral(&BigInt::from(2)).unwrap(), dec("2.25"));
    }

    #[test]
    fn from_f64_is_exact_binary() {
        // 0.1 as a double is not one tenth; Decimal(float) keeps every digit.
        let d = Decimal::try_from_f64(0.1).unwrap();
        assert!(d > dec("0.1"));
        assert_eq!(
            d.to_string(),
            "0.1000000000000000055511151231257827021181583404541015625"
        );
        assert_eq!(Decimal::try_from_f64(2.5).unwrap(), dec("2.5"));
        assert_eq!(Decimal::try_from_f64(-3.0).unwrap(), dec("-3"));
        assert!(Decimal::try_from_f64(f64::INFINITY).is_err());
    }

    #[test]
    fn quantize_rounds_half_even() {
        assert_eq!(dec("2.675").quantize(-2).to_string(), "2.68");
        assert_eq!(dec("2.5").quantize(0).to_string(), "2");
        assert_eq!(dec("3.5").quantize(0).to_string(), "4");
        assert_eq!(dec("-2.5").quantize(0).to_string(), "-2");
        assert_eq!(dec("1").quantize(-2).to_string(), "1.00");
    }

    #[test]
    fn floor_ceil_trunc() {
        assert_eq!(dec("3.2").floor(), BigInt::from(3));
        assert_eq!(dec("3.2").ceil(), BigInt::from(4));
        assert_eq!(dec("-3.2").floor(), BigInt::from(-4));
        assert_eq!(dec("-3.2").ceil(), BigInt::from(-3));
        assert_eq!(dec("-3.7").trunc(), BigInt::from(-3));
        assert_eq!(dec("5").floor(), BigInt::from(5));
    }

    #[test]
    fn integral_checks() {
        assert!(dec("5").is_integral());
        assert!(dec("5.00").is_integral());
        assert!(!dec("5.5").is_integral());
        assert_eq!(dec("5.00").to_bigint(), Some(BigInt::from(5)));
        assert_eq!(dec("5.5").to_bigint(), None);
    }
}
