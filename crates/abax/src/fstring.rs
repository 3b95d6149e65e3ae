//! F-string parts and the format-spec mini-language.
//!
//! One engine serves f-string interpolations and `str.format`. Format
//! specs follow the host grammar
//! `[[fill]align][sign][#][0][width][,|_][.precision][type]` with the
//! numeric presentation types implemented over exact decimals, so `.2f`
//! rounding matches the host.

use num_bigint::BigInt;

use crate::{
    exception::{Exception, RunResult},
    expressions::Expr,
    types::Decimal,
    value::{Value, is_numeric, to_decimal_exact},
};

/// One segment of an f-string: literal text or an interpolation.
#[derive(Debug, Clone)]
pub(crate) enum FStringPart {
    Literal(Box<str>),
    Interpolation {
        expr: Box<Expr>,
        conversion: ConversionFlag,
        format_spec: Option<FormatSpec>,
        /// Text before the value for `=` debug specs (`f"{a=}"` -> `"a="`).
        debug_prefix: Option<Box<str>>,
    },
}

/// Conversion flag on an interpolation: `!s`, `!r`, `!a` or none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConversionFlag {
    None,
    Str,
    Repr,
    Ascii,
}

/// A format spec, either fixed text or with embedded interpolations that
/// are assembled at evaluation time.
#[derive(Debug, Clone)]
pub(crate) enum FormatSpec {
    Static(Box<str>),
    Dynamic(Vec<FStringPart>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Right,
    Center,
    /// `=`: padding goes between the sign and the digits.
    AfterSign,
}

/// A parsed format specification.
#[derive(Debug, Clone, Default)]
pub(crate) struct ParsedFormatSpec {
    fill: Option<char>,
    align: Option<Align>,
    sign: Option<char>,
    alternate: bool,
    width: Option<usize>,
    grouping: Option<char>,
    precision: Option<usize>,
    kind: Option<char>,
}

fn align_of(c: char) -> Align {
    match c {
        '<' => Align::Left,
        '>' => Align::Right,
        '^' => Align::Center,
        _ => Align::AfterSign,
    }
}

/// Parses format-spec text; `ValueError` on anything outside the grammar.
pub(crate) fn parse_format_spec(spec: &str) -> RunResult<ParsedFormatSpec> {
    let chars: Vec<char> = spec.chars().collect();
    let mut parsed = ParsedFormatSpec::default();
    let mut i = 0;

    if chars.len() >= 2 && matches!(chars[1], '<' | '>' | '^' | '=') {
        parsed.fill = Some(chars[0]);
        parsed.align = Some(align_of(chars[1]));
        i = 2;
    } else if !chars.is_empty() && matches!(chars[0], '<' | '>' | '^' | '=') {
        parsed.align = Some(align_of(chars[0]));
        i = 1;
    }
    if i < chars.len() && matches!(chars[i], '+' | '-' | ' ') {
        parsed.sign = Some(chars[i]);
        i += 1;
    }
    if i < chars.len() && chars[i] == '#' {
        parsed.alternate = true;
        i += 1;
    }
    if i < chars.len() && chars[i] == '0' {
        if parsed.fill.is_none() {
            parsed.fill = Some('0');
            parsed.align.get_or_insert(Align::AfterSign);
        }
        i += 1;
    }
    let width_start = i;
    while i < chars.len() && chars[i].is_ascii_digit() {
        i += 1;
    }
    if i > width_start {
        let width: String = chars[width_start..i].iter().collect();
        parsed.width = Some(width.parse().expect("digits"));
    }
    if i < chars.len() && matches!(chars[i], ',' | '_') {
        parsed.grouping = Some(chars[i]);
        i += 1;
    }
    if i < chars.len() && chars[i] == '.' {
        i += 1;
        let precision_start = i;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
        if i == precision_start {
            return Err(Exception::value_error("Format specifier missing precision"));
        }
        let precision: String = chars[precision_start..i].iter().collect();
        parsed.precision = Some(precision.parse().expect("digits"));
    }
    if i < chars.len() {
        if "bcdeEfFgGnosxX%".contains(chars[i]) && i == chars.len() - 1 {
            parsed.kind = Some(chars[i]);
        } else {
            return Err(Exception::value_error(format!("Invalid format specifier '{spec}'")));
        }
    }
    Ok(parsed)
}

/// Applies a conversion flag, yielding the string to be formatted in place
/// of the value (or `None` to format the value itself).
pub(crate) fn apply_conversion(value: &Value, flag: ConversionFlag) -> Option<String> {
    match flag {
        ConversionFlag::None => None,
        ConversionFlag::Str => Some(value.py_str()),
        ConversionFlag::Repr => Some(value.py_repr()),
        ConversionFlag::Ascii => Some(escape_non_ascii(&value.py_repr())),
    }
}

fn escape_non_ascii(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        let code = c as u32;
        if code < 128 {
            out.push(c);
        } else if code <= 0xff {
            out.push_str(&format!("\\x{code:02x}"));
        } else if code <= 0xffff {
            out.push_str(&format!("\\u{code:04x}"));
        } else {
            out.push_str(&format!("\\U{code:08x}"));
        }
    }
    out
}

/// Formats one value against a parsed spec.
pub(crate) fn format_value(value: &Value, spec: &ParsedFormatSpec) -> RunResult<String> {
    match spec.kind {
        None => {
            if is_numeric(value) {
                format_number(value, spec)
            } else {
                format_text(&value.py_str(), spec)
            }
        }
        Some('s') => {
            if is_numeric(value) {
                return Err(unknown_code('s', value));
            }
            format_text(&value.py_str(), spec)
        }
        Some(kind @ ('d' | 'n' | 'b' | 'o' | 'x' | 'X' | 'c')) => {
            let Some(n) = value.as_int() else {
                return Err(unknown_code(kind, value));
            };
            format_integer(&n, kind, spec)
        }
        Some(kind @ ('f' | 'F' | 'e' | 'E' | 'g' | 'G' | '%')) => {
            if !is_numeric(value) {
                return Err(unknown_code(kind, value));
            }
            format_number_kind(value, kind, spec)
        }
        Some(kind) => Err(unknown_code(kind, value)),
    }
}

fn unknown_code(kind: char, value: &Value) -> Exception {
    Exception::value_error(format!(
        "Unknown format code '{kind}' for object of type '{}'",
        value.type_().name()
    ))
}

/// Default presentation for a numeric value with no type code: the plain
/// `str()` form, plus grouping on the integer digits when requested.
fn format_number(value: &Value, spec: &ParsedFormatSpec) -> RunResult<String> {
    if spec.precision.is_some() {
        // A precision with no type code behaves like 'g'.
        return format_number_kind(value, 'g', spec);
    }
    let text = value.py_str();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest.to_string()),
        None => (false, text),
    };
    let body = if spec.grouping.is_some() && !digits.contains(['e', 'E', 'n', 'i']) {
        match digits.split_once('.') {
            Some((int_part, frac_part)) => {
                format!("{}.{frac_part}", group_digits(int_part, spec.grouping.expect("checked")))
            }
            None => group_digits(&digits, spec.grouping.expect("checked")),
        }
    } else {
        digits
    };
    Ok(pad_number(&body, "", negative, spec))
}

fn format_integer(n: &BigInt, kind: char, spec: &ParsedFormatSpec) -> RunResult<String> {
    use num_traits::{Signed, ToPrimitive};

    if kind == 'c' {
        let code = n
            .to_u32()
            .and_then(char::from_u32)
            .ok_or_else(|| Exception::overflow("%c arg not in range(0x110000)"))?;
        return format_text(&code.to_string(), spec);
    }
    let magnitude = n.abs();
    let (digits, prefix) = match kind {
        'b' => (magnitude.to_str_radix(2), "0b"),
        'o' => (magnitude.to_str_radix(8), "0o"),
        'x' => (magnitude.to_str_radix(16), "0x"),
        'X' => (magnitude.to_str_radix(16).to_uppercase(), "0X"),
        _ => (magnitude.to_str_radix(10), ""),
    };
    let digits = match spec.grouping {
        Some(sep) if kind == 'd' || kind == 'n' => group_digits(&digits, sep),
        Some('_') => group_digits_every(&digits, '_', 4),
        _ => digits,
    };
    let prefix = if spec.alternate && !prefix.is_empty() { prefix } else { "" };
    Ok(pad_number(&digits, prefix, n.is_negative(), spec))
}

fn format_number_kind(value: &Value, kind: char, spec: &ParsedFormatSpec) -> RunResult<String> {
    let decimal = to_decimal_exact(value).ok_or_else(|| {
        Exception::value_error(format!("cannot format '{}' value", value.type_().name()))
    })?;
    let negative = decimal.is_negative();
    let magnitude = decimal.abs();
    let body = match kind {
        'f' | 'F' => fixed_digits(&magnitude, spec.precision.unwrap_or(6)),
        '%' => {
            let scaled = magnitude.mul(&Decimal::from_i64(100));
            format!("{}%", fixed_digits(&scaled, spec.precision.unwrap_or(6)))
        }
        'e' | 'E' => scientific_digits(&magnitude, spec.precision.unwrap_or(6), kind == 'E'),
        _ => general_digits(&magnitude, spec.precision.unwrap_or(6).max(1), kind == 'G', spec.alternate),
    };
    let body = match (spec.grouping, body.split_once('.')) {
        (Some(sep), Some((int_part, frac_part))) if !int_part.contains(['e', 'E']) => {
            format!("{}.{frac_part}", group_digits(int_part, sep))
        }
        (Some(sep), None) if !body.contains(['e', 'E', '%']) => group_digits(&body, sep),
        _ => body,
    };
    Ok(pad_number(&body, "", negative, spec))
}

/// Fixed-point digits with exactly `precision` fractional places,
/// half-even rounded. Rendered from the quantized parts directly so tiny
/// magnitudes never collapse to scientific notation.
fn fixed_digits(magnitude: &Decimal, precision: usize) -> String {
    use num_traits::Signed;

    let exponent = -i32::try_from(precision).unwrap_or(i32::MAX);
    let quantized = magnitude.quantize(exponent);
    let (coefficient, _) = quantized.to_parts();
    let mut digits = coefficient.abs().to_string();
    if precision == 0 {
        return digits;
    }
    while digits.len() <= precision {
        digits.insert(0, '0');
    }
    let split = digits.len() - precision;
    format!("{}.{}", &digits[..split], &digits[split..])
}

/// Scientific notation with `precision` mantissa decimals.
fn scientific_digits(magnitude: &Decimal, precision: usize, upper: bool) -> String {
    let (digits, adjusted) = significant_digits(magnitude, precision + 1);
    let mantissa = if precision == 0 {
        digits[..1].to_string()
    } else {
        format!("{}.{}", &digits[..1], &digits[1..])
    };
    let marker = if upper { 'E' } else { 'e' };
    format!("{mantissa}{marker}{adjusted:+03}")
}

/// General format: fixed when the exponent is in range, scientific
/// otherwise, trailing zeros stripped.
fn general_digits(magnitude: &Decimal, precision: usize, upper: bool, keep_zeros: bool) -> String {
    let (_, adjusted) = significant_digits(magnitude, precision);
    if adjusted >= -4 && adjusted < i64::try_from(precision).unwrap_or(i64::MAX) {
        let decimals = usize::try_from(i64::try_from(precision).unwrap_or(0) - 1 - adjusted).unwrap_or(0);
        let fixed = fixed_digits(magnitude, decimals);
        if keep_zeros { fixed } else { strip_trailing_zeros(&fixed) }
    } else {
        let sci = scientific_digits(magnitude, precision - 1, upper);
        if keep_zeros {
            sci
        } else {
            match sci.split_once(if upper { 'E' } else { 'e' }) {
                Some((mantissa, exponent)) => format!(
                    "{}{}{exponent}",
                    strip_trailing_zeros(mantissa),
                    if upper { 'E' } else { 'e' }
                ),
                None => sci,
            }
        }
    }
}

fn strip_trailing_zeros(text: &str) -> String {
    if !text.contains('.') {
        return text.to_string();
    }
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Rounds to `count` significant digits; returns the digit string and the
/// adjusted (power-of-ten) exponent.
fn significant_digits(magnitude: &Decimal, count: usize) -> (String, i64) {
    if magnitude.is_zero() {
        return ("0".repeat(count.max(1)), 0);
    }
    let (coefficient, exponent) = magnitude.normalized();
    let digits = coefficient.to_string();
    let adjusted = i64::from(exponent) + digits.len() as i64 - 1;
    let target_exponent = adjusted - count as i64 + 1;
    let quantized = magnitude.quantize(i32::try_from(target_exponent).unwrap_or(i32::MAX));
    let (coefficient, exponent) = quantized.normalized();
    let mut digits = coefficient.to_string();
    let mut adjusted = i64::from(exponent) + digits.len() as i64 - 1;
    // rounding may have carried into one extra digit (9.99 -> 10.0)
    if digits.len() > count {
        digits.truncate(count);
        adjusted = adjusted.max(i64::from(exponent) + count as i64);
    }
    while digits.len() < count {
        digits.push('0');
    }
    (digits, adjusted)
}

fn group_digits(digits: &str, sep: char) -> String {
    group_digits_every(digits, sep, 3)
}

fn group_digits_every(digits: &str, sep: char, every: usize) -> String {
    let chars: Vec<char> = digits.chars().collect();
    let mut out = String::with_capacity(chars.len() + chars.len() / every);
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && (chars.len() - i) % every == 0 {
            out.push(sep);
        }
        out.push(*c);
    }
    out
}

fn sign_str(negative: bool, sign: Option<char>) -> &'static str {
    if negative {
        "-"
    } else {
        match sign {
            Some('+') => "+",
            Some(' ') => " ",
            _ => "",
        }
    }
}

fn pad_number(body: &str, prefix: &str, negative: bool, spec: &ParsedFormatSpec) -> String {
    let sign = sign_str(negative, spec.sign);
    pad(body, prefix, sign, spec, Align::Right)
}

fn format_text(text: &str, spec: &ParsedFormatSpec) -> RunResult<String> {
    let truncated: String = match spec.precision {
        Some(precision) => text.chars().take(precision).collect(),
        None => text.to_string(),
    };
    Ok(pad(&truncated, "", "", spec, Align::Left))
}

fn pad(body: &str, prefix: &str, sign: &str, spec: &ParsedFormatSpec, default_align: Align) -> String {
    let content_len = sign.chars().count() + prefix.chars().count() + body.chars().count();
    let width = spec.width.unwrap_or(0);
    if content_len >= width {
        return format!("{sign}{prefix}{body}");
    }
    let fill = spec.fill.unwrap_or(' ');
    let padding = width - content_len;
    let align = spec.align.unwrap_or(default_align);
    match align {
        Align::Left => format!("{sign}{prefix}{body}{}", fill.to_string().repeat(padding)),
        Align::Right => format!("{}{sign}{prefix}{body}", fill.to_string().repeat(padding)),
        Align::AfterSign => format!("{sign}{prefix}{}{body}", fill.to_string().repeat(padding)),
        Align::Center => {
            let left = padding / 2;
            let right = padding - left;
            format!(
                "{}{sign}{prefix}{body}{}",
                fill.to_string().repeat(left),
                fill.to_string().repeat(right)
            )
        }
    }
}

/// `str.format` with auto/manual numbering and named fields; nested
/// replacement fields inside specs are not supported.
pub(crate) fn str_format(template: &str, args: &[Value], kwargs: &[(String, Value)]) -> RunResult<String> {
    let mut out = String::new();
    let mut chars = template.chars().peekable();
    let mut auto_index = 0usize;
    let mut manual = false;

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '}' => {
                return Err(Exception::value_error("Single '}' encountered in format string"));
            }
            '{' => {
                let mut field = String::new();
                let mut closed = false;
                for inner in chars.by_ref() {
                    if inner == '{' {
                        return Err(Exception::value_error(
                            "nested replacement fields are not supported",
                        ));
                    }
                    if inner == '}' {
                        closed = true;
                        break;
                    }
                    field.push(inner);
                }
                if !closed {
                    return Err(Exception::value_error("Single '{' encountered in format string"));
                }
                let (name_and_conv, spec_text) = match field.split_once(':') {
                    Some((head, spec)) => (head, spec),
                    None => (field.as_str(), ""),
                };
                let (name, conversion) = match name_and_conv.split_once('!') {
                    Some((name, "s")) => (name, ConversionFlag::Str),
                    Some((name, "r")) => (name, ConversionFlag::Repr),
                    Some((name, "a")) => (name, ConversionFlag::Ascii),
                    Some((_, flag)) => {
                        return Err(Exception::value_error(format!(
                            "Unknown conversion specifier {flag}"
                        )));
                    }
                    None => (name_and_conv, ConversionFlag::None),
                };
                let value = if name.is_empty() {
                    if manual {
                        return Err(Exception::value_error(
                            "cannot switch from manual field specification to automatic field numbering",
                        ));
                    }
                    let value = args.get(auto_index).ok_or_else(|| {
                        Exception::index_error("Replacement index out of range for positional args tuple")
                    })?;
                    auto_index += 1;
                    value
                } else if name.bytes().all(|b| b.is_ascii_digit()) {
                    manual = true;
                    let index: usize = name.parse().expect("digits");
                    args.get(index).ok_or_else(|| {
                        Exception::index_error(format!(
                            "Replacement index {index} out of range for positional args tuple"
                        ))
                    })?
                } else {
                    kwargs
                        .iter()
                        .find(|(key, _)| key == name)
                        .map(|(_, value)| value)
                        .ok_or_else(|| Exception::key_error(format!("'{name}'")))?
                };
                let spec = parse_format_spec(spec_text)?;
                match apply_conversion(value, conversion) {
                    Some(text) => out.push_str(&format_value(&Value::from(text), &spec)?),
                    None => out.push_str(&format_value(value, &spec)?),
                }
            }
            c => out.push(c),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(value: &Value, spec: &str) -> String {
        format_value(value, &parse_format_spec(spec).unwrap()).unwrap()
    }

    #[test]
    fn thousands_grouping() {
        assert_eq!(fmt(&Value::int(123_456), ","), "123,456");
        assert_eq!(fmt(&Value::int(1234), "_"), "1_234");
        assert_eq!(fmt(&Value::int(123), ","), "123");
        assert_eq!(fmt(&Value::Decimal("1234567.25".parse().unwrap()), ","), "1,234,567.25");
    }

    #[test]
    fn fixed_point() {
        assert_eq!(fmt(&Value::Float(3.14159), ".2f"), "3.14");
        assert_eq!(fmt(&Value::Float(2.0), ".3f"), "2.000");
        assert_eq!(fmt(&Value::int(5), ".1f"), "5.0");
        assert_eq!(fmt(&Value::Float(-1.5), ".0f"), "-2");
        assert_eq!(fmt(&Value::Float(0.5), "%"), "50.000000%");
    }

    #[test]
    fn scientific() {
        assert_eq!(fmt(&Value::Float(1234.5), ".2e"), "1.23e+03");
        assert_eq!(fmt(&Value::Float(0.00123), ".1E"), "1.2E-03");
    }

    #[test]
    fn width_and_alignment() {
        assert_eq!(fmt(&Value::from("ab"), "5"), "ab   ");
        assert_eq!(fmt(&Value::from("ab"), ">5"), "   ab");
        assert_eq!(fmt(&Value::from("ab"), "^6"), "  ab  ");
        assert_eq!(fmt(&Value::from("ab"), "*^6"), "**ab**");
        assert_eq!(fmt(&Value::int(42), "5"), "   42");
        assert_eq!(fmt(&Value::int(-42), "05"), "-0042");
        assert_eq!(fmt(&Value::int(42), "+d"), "+42");
    }

    #[test]
    fn radix_codes() {
        assert_eq!(fmt(&Value::int(255), "x"), "ff");
        assert_eq!(fmt(&Value::int(255), "#X"), "0XFF");
        assert_eq!(fmt(&Value::int(5), "b"), "101");
        assert_eq!(fmt(&Value::int(8), "#o"), "0o10");
    }

    #[test]
    fn invalid_specs() {
        assert!(parse_format_spec("q").is_err());
        assert!(parse_format_spec(".f").is_err());
        assert!(parse_format_spec("<<<").is_err());
    }

    #[test]
    fn format_method_fields() {
        let args = [Value::from("item"), Value::int(3)];
        assert_eq!(str_format("{}4", &args, &[]).unwrap(), "item4");
        assert_eq!(str_format("{1}:{0}", &args, &[]).unwrap(), "3:item");
        assert_eq!(str_format("{{literal}}", &[], &[]).unwrap(), "{literal}");
        let kwargs = [("name".to_string(), Value::from("mira"))];
        assert_eq!(str_format("hi {name}!", &[], &kwargs).unwrap(), "hi mira!");
        assert!(str_format("{oops}", &[], &[]).is_err());
    }
}
