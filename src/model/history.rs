use std::collections::VecDeque;

use serde::{Deserialize, Deserializer, Serialize};

use super::AnalysisHistoryEntry;

/// Newest-first log of past analysis states, capped at
/// [`AnalysisHistory::CAPACITY`] entries. Pushing onto a full log evicts the
/// oldest entry.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct AnalysisHistory(VecDeque<AnalysisHistoryEntry>);

impl AnalysisHistory {
    pub const CAPACITY: usize = 30;

    pub fn push(&mut self, entry: AnalysisHistoryEntry) {
        if self.0.len() == Self::CAPACITY {
            self.0.pop_back();
        }
        self.0.push_front(entry);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn latest(&self) -> Option<&AnalysisHistoryEntry> {
        self.0.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AnalysisHistoryEntry> {
        self.0.iter()
    }
}

impl FromIterator<AnalysisHistoryEntry> for AnalysisHistory {
    /// Takes entries newest first; anything past the capacity is dropped.
    fn from_iter<I: IntoIterator<Item = AnalysisHistoryEntry>>(iter: I) -> Self {
        AnalysisHistory(iter.into_iter().take(Self::CAPACITY).collect())
    }
}

impl<'de> Deserialize<'de> for AnalysisHistory {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let entries = Vec::<AnalysisHistoryEntry>::deserialize(deserializer)?;
        Ok(entries.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SupplyDistribution;
    use crate::test_support::ts;

    fn entry(hour: i64) -> AnalysisHistoryEntry {
        AnalysisHistoryEntry {
            timestamp: ts(hour),
            decentralization_score: hour as f64,
            supply_distribution: SupplyDistribution::default(),
            top_holders_count: 10,
        }
    }

    #[test]
    fn push_keeps_newest_first_and_evicts_oldest() {
        let mut history = AnalysisHistory::default();
        for hour in 0..31 {
            history.push(entry(hour));
        }

        assert_eq!(history.len(), AnalysisHistory::CAPACITY);
        assert_eq!(history.latest().map(|e| e.timestamp), Some(ts(30)));

        let hours = history
            .iter()
            .map(|e| e.decentralization_score as i64)
            .collect::<Vec<_>>();
        assert_eq!(hours, (1..31).rev().collect::<Vec<_>>());
    }

    #[test]
    fn deserializing_truncates_oversized_logs() {
        let entries = (0..40).map(entry).collect::<Vec<_>>();
        let json = serde_json::to_string(&entries).unwrap();
        let history: AnalysisHistory = serde_json::from_str(&json).unwrap();

        assert_eq!(history.len(), AnalysisHistory::CAPACITY);
        assert_eq!(history.latest().map(|e| e.timestamp), Some(ts(0)));
    }
}
