//! Display helpers for Chilean pesos and dates (es-CL conventions).

use chrono::{DateTime, Local, TimeZone, Utc};

/// `$1.234.567`; negatives get a leading minus: `-$1.500`.
pub fn fmt_money(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 2);
    if amount < 0 {
        out.push('-');
    }
    out.push('$');
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(c);
    }
    out
}

/// `dd-mm-yyyy, HH:MM` in the server's local time zone.
pub fn fmt_date(date: &DateTime<Utc>) -> String { fmt_date_in(date, &Local) }

pub fn fmt_date_in<Tz: TimeZone>(date: &DateTime<Utc>, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    date.with_timezone(tz).format("%d-%m-%Y, %H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    #[test]
    fn money_groups_thousands() {
        assert_eq!(fmt_money(0), "$0");
        assert_eq!(fmt_money(999), "$999");
        assert_eq!(fmt_money(1000), "$1.000");
        assert_eq!(fmt_money(1_234_567), "$1.234.567");
        assert_eq!(fmt_money(-1500), "-$1.500");
        assert_eq!(fmt_money(i64::MIN), "-$9.223.372.036.854.775.808");
    }

    #[test]
    fn date_uses_day_first_order() {
        let d = Utc.with_ymd_and_hms(2026, 3, 7, 14, 5, 0).unwrap();
        assert_eq!(fmt_date_in(&d, &Utc), "07-03-2026, 14:05");
        let santiago = FixedOffset::west_opt(3 * 3600).unwrap();
        assert_eq!(fmt_date_in(&d, &santiago), "07-03-2026, 11:05");
    }
}
