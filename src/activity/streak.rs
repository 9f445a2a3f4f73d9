use chrono::NaiveDate;

use crate::models::Streak;

/// 最长连续活跃天数，长度相同时取最近的一段
///
/// `days` 必须升序且去重。
pub fn longest_streak(days: &[NaiveDate]) -> Option<Streak> {
    let mut best: Option<Streak> = None;

    for streak in runs(days) {
        match best {
            Some(current) if current.length > streak.length => {}
            _ => best = Some(streak),
        }
    }

    best
}

/// 以最后一个活跃日结尾的连续段
pub fn latest_streak(days: &[NaiveDate]) -> Option<Streak> {
    runs(days).last()
}

fn runs(days: &[NaiveDate]) -> impl Iterator<Item = Streak> + '_ {
    let mut index = 0;

    std::iter::from_fn(move || {
        let start = *days.get(index)?;
        let mut end = start;
        index += 1;

        while let Some(&next) = days.get(index) {
            if end.succ_opt() != Some(next) {
                break;
            }
            end = next;
            index += 1;
        }

        Some(Streak {
            start,
            end,
            length: ((end - start).num_days() + 1) as u32,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    #[test]
    fn test_empty_days() {
        assert_eq!(longest_streak(&[]), None);
        assert_eq!(latest_streak(&[]), None);
    }

    #[test]
    fn test_single_day() {
        let streak = longest_streak(&[d(1, 1)]).unwrap();
        assert_eq!(streak.length, 1);
        assert_eq!(streak.start, streak.end);
    }

    #[test]
    fn test_longest_run() {
        let days = [d(1, 1), d(1, 2), d(1, 4), d(1, 5), d(1, 6), d(1, 9)];
        let streak = longest_streak(&days).unwrap();
        assert_eq!(streak.start, d(1, 4));
        assert_eq!(streak.end, d(1, 6));
        assert_eq!(streak.length, 3);

        let latest = latest_streak(&days).unwrap();
        assert_eq!(latest.start, d(1, 9));
        assert_eq!(latest.length, 1);
    }

    #[test]
    fn test_tie_prefers_most_recent() {
        let days = [d(1, 1), d(1, 2), d(1, 10), d(1, 11)];
        let streak = longest_streak(&days).unwrap();
        assert_eq!(streak.start, d(1, 10));
        assert_eq!(streak.length, 2);
    }

    #[test]
    fn test_run_across_month_boundary() {
        let days = [d(1, 30), d(1, 31), d(2, 1)];
        assert_eq!(longest_streak(&days).unwrap().length, 3);
    }
}
