//! Replaying multicast stream of position updates

use crate::core::Position;
use crate::utils::lock;
use log::warn;
use std::sync::Mutex;
use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

/// Subscription read failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubscriptionError {
    /// Nothing new has been published since the last read
    #[error("No position update available")]
    Empty,
    /// The stream owner has been dropped
    #[error("Position stream closed")]
    Closed,
}

/// Broadcast of positions that remembers the latest one
///
/// Every subscriber first sees the latest value (`None` before the first
/// fix) and then each position published after it subscribed.
pub struct PositionStream {
    latest: Mutex<Option<Position>>,
    sender: broadcast::Sender<Position>,
}

impl PositionStream {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            latest: Mutex::new(None),
            sender,
        }
    }

    /// Store `position` as the latest value and push it to every subscriber
    pub fn publish(&self, position: Position) {
        let mut latest = lock(&self.latest);
        *latest = Some(position.clone());
        // Sending only fails when nobody is subscribed
        let _ = self.sender.send(position);
    }

    pub fn latest(&self) -> Option<Position> {
        lock(&self.latest).clone()
    }

    pub fn subscribe(&self) -> PositionSubscription {
        // Holding the latest-value lock keeps a concurrent publish from
        // landing between the replay snapshot and the receiver.
        let latest = lock(&self.latest);
        PositionSubscription {
            replay: Some(latest.clone()),
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// One consumer's view of a [`PositionStream`]
pub struct PositionSubscription {
    replay: Option<Option<Position>>,
    receiver: broadcast::Receiver<Position>,
}

impl PositionSubscription {
    /// Wait for the next value
    ///
    /// The first call returns the value that was latest at subscription time,
    /// which is `None` when no fix had been obtained yet.
    pub async fn recv(&mut self) -> Result<Option<Position>, SubscriptionError> {
        if let Some(replay) = self.replay.take() {
            return Ok(replay);
        }

        loop {
            match self.receiver.recv().await {
                Ok(position) => return Ok(Some(position)),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Position subscriber lagged behind, skipped {} updates", skipped);
                }
                Err(RecvError::Closed) => return Err(SubscriptionError::Closed),
            }
        }
    }

    /// Read the next value without waiting
    pub fn try_recv(&mut self) -> Result<Option<Position>, SubscriptionError> {
        if let Some(replay) = self.replay.take() {
            return Ok(replay);
        }

        loop {
            match self.receiver.try_recv() {
                Ok(position) => return Ok(Some(position)),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!("Position subscriber lagged behind, skipped {} updates", skipped);
                }
                Err(TryRecvError::Empty) => return Err(SubscriptionError::Empty),
                Err(TryRecvError::Closed) => return Err(SubscriptionError::Closed),
            }
        }
    }

    /// Drain every value currently available
    pub fn drain(&mut self) -> Vec<Option<Position>> {
        let mut values = Vec::new();
        while let Ok(value) = self.try_recv() {
            values.push(value);
        }
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fix(latitude: f64) -> Position {
        Position::new(latitude, 0.0, 1.0).with_timestamp(latitude as u64)
    }

    #[test]
    fn test_initial_value_is_absent() {
        let stream = PositionStream::new(8);
        let mut subscription = stream.subscribe();

        assert_eq!(subscription.try_recv(), Ok(None));
        assert_eq!(subscription.try_recv(), Err(SubscriptionError::Empty));
    }

    #[test]
    fn test_late_subscriber_gets_latest_only() {
        let stream = PositionStream::new(8);
        stream.publish(fix(1.0));
        stream.publish(fix(2.0));

        let mut subscription = stream.subscribe();
        assert_eq!(subscription.drain(), vec![Some(fix(2.0))]);
        assert_eq!(stream.latest(), Some(fix(2.0)));
    }

    #[test]
    fn test_multicast_in_order() {
        let stream = PositionStream::new(8);
        let mut first = stream.subscribe();
        let mut second = stream.subscribe();
        assert_eq!(stream.subscriber_count(), 2);

        stream.publish(fix(1.0));
        stream.publish(fix(2.0));

        let expected = vec![None, Some(fix(1.0)), Some(fix(2.0))];
        assert_eq!(first.drain(), expected);
        assert_eq!(second.drain(), expected);
    }

    #[test]
    fn test_lagging_subscriber_skips_overwritten_values() {
        let stream = PositionStream::new(2);
        let mut subscription = stream.subscribe();
        for latitude in 1..=5 {
            stream.publish(fix(latitude as f64));
        }

        assert_eq!(
            subscription.drain(),
            vec![None, Some(fix(4.0)), Some(fix(5.0))]
        );
    }

    #[test]
    fn test_closed_stream() {
        let stream = PositionStream::new(8);
        let mut subscription = stream.subscribe();
        drop(stream);

        assert_eq!(subscription.try_recv(), Ok(None));
        assert_eq!(subscription.try_recv(), Err(SubscriptionError::Closed));
    }

    #[tokio::test]
    async fn test_async_recv() {
        let stream = PositionStream::new(8);
        let mut subscription = stream.subscribe();
        assert_eq!(subscription.recv().await, Ok(None));

        stream.publish(fix(3.0));
        assert_eq!(subscription.recv().await, Ok(Some(fix(3.0))));
    }
}
