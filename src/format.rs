//! Display rules for metric values.
//!
//! Currency is whole US dollars with thousands separators, rounded half
//! away from zero. Percentages carry one decimal place. Counts are whole
//! numbers with thousands separators. Non-finite input renders as zero.

/// `1234.5` -> `$1,235`; `-80` -> `-$80`.
pub fn format_currency(amount: f64) -> String {
    let rounded = finite_or_zero(amount).round();
    let digits = group_thousands(&format!("{:.0}", rounded.abs()));
    if rounded < 0.0 {
        format!("-${digits}")
    } else {
        format!("${digits}")
    }
}

/// `50.0` -> `50.0%`.
pub fn format_percentage(value: f64) -> String {
    format!("{:.1}%", finite_or_zero(value))
}

/// `12345` -> `12,345`.
pub fn format_count(value: f64) -> String {
    let rounded = finite_or_zero(value).round();
    let digits = group_thousands(&format!("{:.0}", rounded.abs()));
    if rounded < 0.0 {
        format!("-{digits}")
    } else {
        digits
    }
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
