//! Month-end calendar arithmetic

use chrono::{Datelike, NaiveDate};

/// Last day of `month` in `year`
pub fn month_end(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()
}

/// Month ends of the `periods` months following the month of `latest`
pub fn month_ends_after(latest: NaiveDate, periods: usize) -> Vec<NaiveDate> {
    let base = latest.year() * 12 + latest.month0() as i32;
    (1..=periods as i32)
        .filter_map(|k| {
            let index = base + k;
            month_end(index.div_euclid(12), index.rem_euclid(12) as u32 + 1)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(2004, 2, 29)]
    #[case(2005, 2, 28)]
    #[case(2005, 12, 31)]
    #[case(2005, 4, 30)]
    fn test_month_end(#[case] year: i32, #[case] month: u32, #[case] day: u32) {
        assert_eq!(month_end(year, month), NaiveDate::from_ymd_opt(year, month, day));
    }

    #[test]
    fn test_months_wrap_year() {
        let latest = NaiveDate::from_ymd_opt(2004, 11, 17).unwrap();
        let months: Vec<(i32, u32)> = month_ends_after(latest, 6)
            .iter()
            .map(|d| (d.year(), d.month()))
            .collect();
        assert_eq!(
            months,
            vec![(2004, 12), (2005, 1), (2005, 2), (2005, 3), (2005, 4), (2005, 5)]
        );
    }

    #[test]
    fn test_zero_periods() {
        let latest = NaiveDate::from_ymd_opt(2005, 5, 31).unwrap();
        assert!(month_ends_after(latest, 0).is_empty());
    }
}
