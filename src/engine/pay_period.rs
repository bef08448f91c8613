// ==========================================
// 薪资导入对账系统 - 工资期间
// ==========================================
// 职责: 月份 → [当月 1 日, 当月最后一日]，闰年按日历处理
// ==========================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayPeriod {
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
}

impl PayPeriod {
    /// 构造自然月期间；月份越界或年份超出日历范围时返回 None
    pub fn for_month(year: i32, month: u32) -> Option<Self> {
        let date_from = NaiveDate::from_ymd_opt(year, month, 1)?;
        let next_month = if month == 12 {
            NaiveDate::from_ymd_opt(year.checked_add(1)?, 1, 1)?
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)?
        };
        let date_to = next_month.pred_opt()?;

        Some(Self { date_from, date_to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_february_leap_year() {
        let p = PayPeriod::for_month(2024, 2).unwrap();
        assert_eq!(p.date_from, d(2024, 2, 1));
        assert_eq!(p.date_to, d(2024, 2, 29));

        let p = PayPeriod::for_month(2023, 2).unwrap();
        assert_eq!(p.date_to, d(2023, 2, 28));
    }

    #[test]
    fn test_december_rolls_into_next_year() {
        let p = PayPeriod::for_month(2025, 12).unwrap();
        assert_eq!(p.date_to, d(2025, 12, 31));
    }

    #[test]
    fn test_invalid_month() {
        assert!(PayPeriod::for_month(2025, 0).is_none());
        assert!(PayPeriod::for_month(2025, 13).is_none());
    }
}
