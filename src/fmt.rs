/// Dollar amount with thousands separators: $1,234.56
pub fn money(val: f64) -> String {
    let cents = format!("{:.2}", val.abs());
    let (int_part, dec_part) = cents.split_once('.').unwrap_or((cents.as_str(), "00"));

    let mut grouped = String::new();
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    // -0.004 rounds to $0.00; don't print it as negative
    if val < 0.0 && cents != "0.00" {
        format!("-${grouped}.{dec_part}")
    } else {
        format!("${grouped}.{dec_part}")
    }
}

/// `part` as a share of `total`, one decimal place. A non-positive total yields 0.0%.
pub fn percent(part: f64, total: f64) -> String {
    let share = if total > 0.0 { part / total * 100.0 } else { 0.0 };
    format!("{share:.1}%")
}
