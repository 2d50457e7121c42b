//! Kubernetes resource quantity canonicalization
//!
//! metrics-server reports usage in whatever unit is convenient for it
//! (`123456789n`, `20480Ki`). Stored records use the canonical form the
//! Kubernetes tooling prints, so the same usage always renders the same way.

const DECIMAL_SUFFIXES: &[(i32, &str)] = &[
    (-9, "n"),
    (-6, "u"),
    (-3, "m"),
    (0, ""),
    (3, "k"),
    (6, "M"),
    (9, "G"),
    (12, "T"),
    (15, "P"),
    (18, "E"),
];

const BINARY_SUFFIXES: &[(u32, &str)] = &[
    (1, "Ki"),
    (2, "Mi"),
    (3, "Gi"),
    (4, "Ti"),
    (5, "Pi"),
    (6, "Ei"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    DecimalSi,
    BinarySi,
    DecimalExponent,
}

/// Exact value `mantissa * 10^exponent` plus the notation it was written in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Parsed {
    mantissa: i128,
    exponent: i32,
    format: Format,
}

/// Render a quantity in canonical form, passing unparseable input through
pub fn canonicalize(raw: &str) -> String {
    parse(raw.trim())
        .and_then(format)
        .unwrap_or_else(|| raw.to_string())
}

fn parse(s: &str) -> Option<Parsed> {
    let number_len = s
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || c == '.' || (i == 0 && (c == '+' || c == '-'))))
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    let (number, suffix) = s.split_at(number_len);

    let (negative, digits) = match number.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, number.strip_prefix('+').unwrap_or(number)),
    };
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if fraction.contains('.') {
        return None;
    }

    let mut mantissa: i128 = 0;
    for c in whole.chars().chain(fraction.chars()) {
        let digit = c.to_digit(10)? as i128;
        mantissa = mantissa.checked_mul(10)?.checked_add(digit)?;
    }
    if negative {
        mantissa = -mantissa;
    }
    let mut exponent = -(fraction.len() as i32);

    let format = if let Some((power, _)) = BINARY_SUFFIXES.iter().find(|(_, sfx)| *sfx == suffix) {
        mantissa = mantissa.checked_mul(1024i128.checked_pow(*power)?)?;
        Format::BinarySi
    } else if let Some((power, _)) = DECIMAL_SUFFIXES.iter().find(|(_, sfx)| *sfx == suffix) {
        exponent = exponent.checked_add(*power)?;
        Format::DecimalSi
    } else if let Some(exp) = suffix
        .strip_prefix('e')
        .or_else(|| suffix.strip_prefix('E'))
    {
        exponent = exponent.checked_add(exp.parse::<i32>().ok()?)?;
        Format::DecimalExponent
    } else {
        return None;
    };

    Some(Parsed {
        mantissa,
        exponent,
        format,
    })
}

fn format(q: Parsed) -> Option<String> {
    if q.mantissa == 0 {
        return Some("0".to_string());
    }

    if q.format == Format::BinarySi {
        if let Some(bytes) = whole_value(q.mantissa, q.exponent) {
            if bytes.abs() >= 1024 {
                return Some(format_binary(bytes));
            }
        }
    }

    let (mantissa, exponent) = normalize(q.mantissa, q.exponent)?;
    let mut group = exponent.div_euclid(3) * 3;
    if group > 18 {
        group = 18;
    }
    let mantissa = mantissa.checked_mul(10i128.checked_pow((exponent - group) as u32)?)?;

    let suffix = if q.format == Format::DecimalExponent {
        if group == 0 {
            String::new()
        } else {
            format!("e{}", group)
        }
    } else {
        DECIMAL_SUFFIXES
            .iter()
            .find(|(power, _)| *power == group)
            .map(|(_, sfx)| sfx.to_string())?
    };

    Some(format!("{}{}", mantissa, suffix))
}

/// The value as an integer when it has no fractional part
fn whole_value(mantissa: i128, exponent: i32) -> Option<i128> {
    if exponent >= 0 {
        mantissa.checked_mul(10i128.checked_pow(exponent as u32)?)
    } else {
        let divisor = 10i128.checked_pow(exponent.unsigned_abs())?;
        (mantissa % divisor == 0).then(|| mantissa / divisor)
    }
}

fn format_binary(bytes: i128) -> String {
    let mut value = bytes;
    let mut suffix = "";
    for (_, sfx) in BINARY_SUFFIXES {
        if value % 1024 != 0 {
            break;
        }
        value /= 1024;
        suffix = sfx;
    }
    format!("{}{}", value, suffix)
}

/// Strip trailing zeros and round anything finer than nano up to nano
fn normalize(mut mantissa: i128, mut exponent: i32) -> Option<(i128, i32)> {
    if exponent < -9 {
        let divisor = 10i128.checked_pow((-9 - exponent) as u32)?;
        let mut scaled = mantissa / divisor;
        if mantissa % divisor != 0 {
            scaled += mantissa.signum();
        }
        mantissa = scaled;
        exponent = -9;
    }
    while mantissa != 0 && mantissa % 10 == 0 {
        mantissa /= 10;
        exponent = exponent.checked_add(1)?;
    }
    Some((mantissa, exponent))
}
