//! Display formatting for screener cells. Unknown values render as `-`.

pub const MISSING: &str = "-";

const MARKET_CAP_UNITS: [&str; 5] = ["", "K", "M", "B", "T"];

/// `1234567.891` -> `"1,234,567"` style grouping of the integer part.
fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Fixed `decimals`, then trailing zeros beyond `min_decimals` trimmed, with
/// the integer part grouped.
fn grouped(value: f64, min_decimals: usize, max_decimals: usize) -> String {
    let fixed = format!("{:.*}", max_decimals, value.abs());
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i, f),
        None => (fixed.as_str(), ""),
    };

    let mut frac = frac_part.to_string();
    while frac.len() > min_decimals && frac.ends_with('0') {
        frac.pop();
    }

    let sign = if value < 0.0 && fixed.chars().any(|c| c.is_ascii_digit() && c != '0') {
        "-"
    } else {
        ""
    };
    if frac.is_empty() {
        format!("{}{}", sign, group_thousands(int_part))
    } else {
        format!("{}{}.{}", sign, group_thousands(int_part), frac)
    }
}

/// Grouped number with up to three decimals.
pub fn number(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => grouped(v, 0, 3),
        _ => MISSING.to_string(),
    }
}

/// US dollars with two decimals, e.g. `$1,234.50`.
pub fn currency(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => {
            let body = grouped(v.abs(), 2, 2);
            if v < 0.0 {
                format!("-${}", body)
            } else {
                format!("${}", body)
            }
        }
        _ => MISSING.to_string(),
    }
}

/// Abbreviated market cap: `2.95T`, `600B`, `12.5M`. Zero counts as unknown.
pub fn market_cap(value: Option<f64>) -> String {
    let Some(mut v) = value.filter(|v| v.is_finite() && *v != 0.0) else {
        return MISSING.to_string();
    };

    let mut unit = 0;
    while v >= 1000.0 && unit < MARKET_CAP_UNITS.len() - 1 {
        v /= 1000.0;
        unit += 1;
    }
    let decimals = if v >= 100.0 {
        0
    } else if v >= 10.0 {
        1
    } else {
        2
    };
    format!("{:.*}{}", decimals, v, MARKET_CAP_UNITS[unit])
}

/// Ratio as a percentage with one decimal: `0.771` -> `77.1%`.
pub fn percent(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{:.1}%", v * 100.0),
        _ => MISSING.to_string(),
    }
}

pub fn ratio(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{:.2}", v),
        _ => MISSING.to_string(),
    }
}

pub fn text(value: Option<&str>) -> String {
    match value {
        Some(s) if !s.trim().is_empty() => s.to_string(),
        _ => MISSING.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_values_render_dash() {
        assert_eq!(number(None), "-");
        assert_eq!(currency(None), "-");
        assert_eq!(market_cap(None), "-");
        assert_eq!(market_cap(Some(0.0)), "-");
        assert_eq!(percent(None), "-");
        assert_eq!(ratio(Some(f64::NAN)), "-");
        assert_eq!(text(Some("")), "-");
    }

    #[test]
    fn test_currency() {
        assert_eq!(currency(Some(190.1)), "$190.10");
        assert_eq!(currency(Some(1234.5)), "$1,234.50");
        assert_eq!(currency(Some(0.126)), "$0.13");
        assert_eq!(currency(Some(-5.0)), "-$5.00");
    }

    #[test]
    fn test_market_cap_units() {
        assert_eq!(market_cap(Some(2.95e12)), "2.95T");
        assert_eq!(market_cap(Some(3.1e12)), "3.10T");
        assert_eq!(market_cap(Some(6.0e11)), "600B");
        assert_eq!(market_cap(Some(2.8e11)), "280B");
        assert_eq!(market_cap(Some(12_500_000.0)), "12.5M");
        assert_eq!(market_cap(Some(950.0)), "950");
        // stops at trillions
        assert_eq!(market_cap(Some(4.2e15)), "4200T");
    }

    #[test]
    fn test_number_grouping() {
        assert_eq!(number(Some(32.3)), "32.3");
        assert_eq!(number(Some(1234567.0)), "1,234,567");
        assert_eq!(number(Some(1234.56789)), "1,234.568");
        assert_eq!(number(Some(-1000.5)), "-1,000.5");
        assert_eq!(number(Some(100.0)), "100");
    }

    #[test]
    fn test_ratios() {
        assert_eq!(percent(Some(0.77)), "77.0%");
        assert_eq!(percent(Some(1.4723)), "147.2%");
        assert_eq!(ratio(Some(1.7)), "1.70");
        assert_eq!(ratio(Some(0.0)), "0.00");
    }
}
