use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// 时间粒度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    Month,
    Year,
}

impl Granularity {
    pub const ALL: [Granularity; 3] = [Granularity::Day, Granularity::Month, Granularity::Year];

    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Day => "day",
            Granularity::Month => "month",
            Granularity::Year => "year",
        }
    }

    /// 日期在该粒度下的周期标识: `YYYY-MM-DD` / `YYYY-MM` / `YYYY`
    pub fn period_of(&self, date: NaiveDate) -> String {
        match self {
            Granularity::Day => date.format("%Y-%m-%d").to_string(),
            Granularity::Month => format!("{:04}-{:02}", date.year(), date.month()),
            Granularity::Year => format!("{:04}", date.year()),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 桶的键：粒度 + 周期标识
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BucketKey {
    pub granularity: Granularity,
    pub period: String,
}

impl BucketKey {
    pub fn new(granularity: Granularity, date: NaiveDate) -> Self {
        Self {
            granularity,
            period: granularity.period_of(date),
        }
    }

    pub fn day(date: NaiveDate) -> Self {
        Self::new(Granularity::Day, date)
    }

    pub fn month(date: NaiveDate) -> Self {
        Self::new(Granularity::Month, date)
    }

    pub fn year(date: NaiveDate) -> Self {
        Self::new(Granularity::Year, date)
    }

    /// 上一级粒度的键；年没有上级
    pub fn parent(&self) -> Option<BucketKey> {
        let parent = match self.granularity {
            Granularity::Day => Granularity::Month,
            Granularity::Month => Granularity::Year,
            Granularity::Year => return None,
        };
        // 周期标识是上级标识加后缀，截断即可
        let len = match parent {
            Granularity::Month => 7,
            _ => 4,
        };
        Some(BucketKey {
            granularity: parent,
            period: self.period.chars().take(len).collect(),
        })
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.granularity, self.period)
    }
}

/// 单个时间周期的活动汇总
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityBucket {
    pub granularity: Granularity,
    pub period: String,
    pub commit_count: u64,
    pub lines_changed: u64,
    pub active_repositories: BTreeSet<String>,
}

impl ActivityBucket {
    pub fn empty(key: &BucketKey) -> Self {
        Self {
            granularity: key.granularity,
            period: key.period.clone(),
            commit_count: 0,
            lines_changed: 0,
            active_repositories: BTreeSet::new(),
        }
    }

    pub fn key(&self) -> BucketKey {
        BucketKey {
            granularity: self.granularity,
            period: self.period.clone(),
        }
    }
}

pub type BucketMap = BTreeMap<BucketKey, ActivityBucket>;

/// 连续活跃天数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Streak {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub length: u32,
}

/// 汇总统计
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityStats {
    pub total_commits: u64,
    pub total_lines_changed: u64,
    pub active_days: u32,
    /// 首个到最后一个活跃日（含两端）的天数
    pub span_days: u32,
    pub active_day_ratio: f64,
    pub longest_streak: Option<Streak>,
    pub current_streak: Option<Streak>,
    pub busiest_day: Option<NaiveDate>,
}

impl ActivityStats {
    pub fn longest_streak_days(&self) -> u32 {
        self.longest_streak.map(|s| s.length).unwrap_or(0)
    }
}

/// 活动报告：全部桶 + 汇总统计
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityReport {
    #[serde(with = "bucket_list")]
    pub buckets: BucketMap,
    pub stats: ActivityStats,
}

impl ActivityReport {
    pub fn bucket(&self, key: &BucketKey) -> Option<&ActivityBucket> {
        self.buckets.get(key)
    }

    /// 指定粒度的桶，按周期升序
    pub fn buckets_at(&self, granularity: Granularity) -> impl Iterator<Item = &ActivityBucket> {
        self.buckets
            .values()
            .filter(move |bucket| bucket.granularity == granularity)
    }
}

/// 桶映射以数组形式序列化（JSON 的 key 只能是字符串）
mod bucket_list {
    use super::{ActivityBucket, BucketMap};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(map: &BucketMap, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(map.values())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BucketMap, D::Error> {
        let buckets = Vec::<ActivityBucket>::deserialize(deserializer)?;
        Ok(buckets.into_iter().map(|b| (b.key(), b)).collect())
    }
}
