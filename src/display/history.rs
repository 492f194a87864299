//! In-memory position history

use crate::core::Position;
use std::collections::VecDeque;

/// Positions received from a stream subscription, oldest first
#[derive(Debug, Clone, Default)]
pub struct PositionHistory {
    positions: VecDeque<Position>,
    limit: Option<usize>,
}

impl PositionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `limit` positions, dropping the oldest
    pub fn with_limit(limit: usize) -> Self {
        Self {
            positions: VecDeque::new(),
            limit: Some(limit.max(1)),
        }
    }

    /// Append a stream value; absent values are ignored
    ///
    /// Returns true if a position was appended.
    pub fn record(&mut self, value: Option<Position>) -> bool {
        let Some(position) = value else {
            return false;
        };

        if let Some(limit) = self.limit {
            while self.positions.len() >= limit {
                self.positions.pop_front();
            }
        }
        self.positions.push_back(position);
        true
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn latest(&self) -> Option<&Position> {
        self.positions.back()
    }

    pub fn to_vec(&self) -> Vec<Position> {
        self.positions.iter().cloned().collect()
    }
}
