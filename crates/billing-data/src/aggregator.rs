//! Grouping and summing of time entries.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::hash::Hash;

use billing_core::calendar::month_start;
use billing_core::models::TimeEntry;
use chrono::NaiveDate;

/// Stateless helpers that group entries by an arbitrary key.
pub struct EntryAggregator;

impl EntryAggregator {
    /// Sum `duration_minutes` per key.
    pub fn group_sum<'a, K, I, F>(entries: I, key_fn: F) -> HashMap<K, u64>
    where
        I: IntoIterator<Item = &'a TimeEntry>,
        K: Eq + Hash + Clone,
        F: FnMut(&TimeEntry) -> K,
    {
        Self::group_sum_ordered(entries, key_fn).into_iter().collect()
    }

    /// Sum `duration_minutes` per key, keeping keys in first-seen order.
    pub fn group_sum_ordered<'a, K, I, F>(entries: I, mut key_fn: F) -> Vec<(K, u64)>
    where
        I: IntoIterator<Item = &'a TimeEntry>,
        K: Eq + Hash + Clone,
        F: FnMut(&TimeEntry) -> K,
    {
        let mut slots: HashMap<K, usize> = HashMap::new();
        let mut sums: Vec<(K, u64)> = Vec::new();

        for entry in entries {
            let key = key_fn(entry);
            let minutes = u64::from(entry.duration_minutes);
            match slots.get(&key) {
                Some(&i) => sums[i].1 += minutes,
                None => {
                    slots.insert(key.clone(), sums.len());
                    sums.push((key, minutes));
                }
            }
        }

        sums
    }

    /// The key with the most minutes. Equal sums go to the key seen first.
    pub fn busiest_key<'a, K, I, F>(entries: I, key_fn: F) -> Option<(K, u64)>
    where
        I: IntoIterator<Item = &'a TimeEntry>,
        K: Eq + Hash + Clone,
        F: FnMut(&TimeEntry) -> K,
    {
        let mut best: Option<(K, u64)> = None;
        for (key, minutes) in Self::group_sum_ordered(entries, key_fn) {
            let better = best.as_ref().map_or(true, |(_, top)| minutes > *top);
            if better {
                best = Some((key, minutes));
            }
        }
        best
    }

    /// Number of distinct calendar days with at least one entry.
    pub fn distinct_days<'a, I>(entries: I) -> usize
    where
        I: IntoIterator<Item = &'a TimeEntry>,
    {
        entries
            .into_iter()
            .map(|e| e.date)
            .collect::<HashSet<NaiveDate>>()
            .len()
    }

    /// Distinct worked days per month, keyed by the month's first day.
    pub fn worked_days_by_month<'a, I>(entries: I) -> BTreeMap<NaiveDate, u32>
    where
        I: IntoIterator<Item = &'a TimeEntry>,
    {
        let days: HashSet<NaiveDate> = entries.into_iter().map(|e| e.date).collect();
        let mut by_month: BTreeMap<NaiveDate, u32> = BTreeMap::new();
        for day in days {
            *by_month.entry(month_start(day)).or_default() += 1;
        }
        by_month
    }

    pub fn total_minutes<'a, I>(entries: I) -> u64
    where
        I: IntoIterator<Item = &'a TimeEntry>,
    {
        entries
            .into_iter()
            .map(|e| u64::from(e.duration_minutes))
            .sum()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn entry(id: &str, mission: &str, kind: &str, date: NaiveDate, minutes: u32) -> TimeEntry {
        TimeEntry {
            id: id.to_string(),
            mission_id: mission.to_string(),
            type_id: kind.to_string(),
            date,
            duration_minutes: minutes,
            description: None,
        }
    }

    fn sample() -> Vec<TimeEntry> {
        vec![
            entry("e1", "m1", "dev", d(2025, 3, 3), 120),
            entry("e2", "m2", "meeting", d(2025, 3, 3), 60),
            entry("e3", "m1", "meeting", d(2025, 3, 4), 90),
            entry("e4", "m2", "dev", d(2025, 4, 1), 30),
        ]
    }

    // ── group_sum ─────────────────────────────────────────────────────────────

    #[test]
    fn test_group_sum_by_mission() {
        let sums = EntryAggregator::group_sum(&sample(), |e| e.mission_id.clone());
        assert_eq!(sums["m1"], 210);
        assert_eq!(sums["m2"], 90);
    }

    #[test]
    fn test_group_sum_by_day() {
        let sums = EntryAggregator::group_sum(&sample(), |e| e.date);
        assert_eq!(sums[&d(2025, 3, 3)], 180);
        assert_eq!(sums.len(), 3);
    }

    #[test]
    fn test_group_sum_ordered_keeps_first_seen_order() {
        let sums = EntryAggregator::group_sum_ordered(&sample(), |e| e.type_id.clone());
        assert_eq!(
            sums,
            vec![("dev".to_string(), 150), ("meeting".to_string(), 150)]
        );
    }

    #[test]
    fn test_group_sum_empty() {
        let sums = EntryAggregator::group_sum(&Vec::<TimeEntry>::new(), |e| e.date);
        assert!(sums.is_empty());
    }

    // ── busiest_key ───────────────────────────────────────────────────────────

    #[test]
    fn test_busiest_key_tie_goes_to_first_seen() {
        let busiest = EntryAggregator::busiest_key(&sample(), |e| e.type_id.clone());
        assert_eq!(busiest, Some(("dev".to_string(), 150)));

        let mut reversed = sample();
        reversed.reverse();
        let busiest = EntryAggregator::busiest_key(&reversed, |e| e.type_id.clone());
        assert_eq!(busiest, Some(("dev".to_string(), 150)));

        let meeting_first = vec![
            entry("a", "m1", "meeting", d(2025, 3, 3), 60),
            entry("b", "m1", "dev", d(2025, 3, 3), 60),
        ];
        let busiest = EntryAggregator::busiest_key(&meeting_first, |e| e.type_id.clone());
        assert_eq!(busiest, Some(("meeting".to_string(), 60)));
    }

    #[test]
    fn test_busiest_key_strict_winner() {
        let busiest = EntryAggregator::busiest_key(&sample(), |e| e.mission_id.clone());
        assert_eq!(busiest, Some(("m1".to_string(), 210)));
    }

    #[test]
    fn test_busiest_key_empty() {
        assert!(EntryAggregator::busiest_key(&Vec::<TimeEntry>::new(), |e| e.date).is_none());
    }

    // ── distinct days ─────────────────────────────────────────────────────────

    #[test]
    fn test_distinct_days_counts_each_day_once() {
        assert_eq!(EntryAggregator::distinct_days(&sample()), 3);
        assert_eq!(EntryAggregator::distinct_days(&Vec::<TimeEntry>::new()), 0);
    }

    #[test]
    fn test_worked_days_by_month() {
        let by_month = EntryAggregator::worked_days_by_month(&sample());
        assert_eq!(by_month[&d(2025, 3, 1)], 2);
        assert_eq!(by_month[&d(2025, 4, 1)], 1);
        assert_eq!(by_month.len(), 2);
    }

    #[test]
    fn test_total_minutes() {
        assert_eq!(EntryAggregator::total_minutes(&sample()), 300);
    }
}
