//! Human-readable number formatting shared by prompts and narratives.

/// `$383.29B`, `-$1.20M`, `$950.00K`, `$12`.
pub fn usd(value: f64) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    let abs = value.abs();
    let (scaled, suffix) = if abs >= 1e12 {
        (abs / 1e12, "T")
    } else if abs >= 1e9 {
        (abs / 1e9, "B")
    } else if abs >= 1e6 {
        (abs / 1e6, "M")
    } else if abs >= 1e3 {
        (abs / 1e3, "K")
    } else {
        return format!("{}${:.0}", sign, abs);
    };
    format!("{}${:.2}{}", sign, scaled, suffix)
}

/// Ratio rendered as a percentage with one decimal.
pub fn pct(ratio: f64) -> String {
    format!("{:.1}%", ratio * 100.0)
}
