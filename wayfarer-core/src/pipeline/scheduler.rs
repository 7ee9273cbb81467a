//! Scheduler: feeds route steps into the work channel

use tokio::sync::mpsc::UnboundedSender;

use crate::error::{Result, WayfarerError};
use crate::model::RouteStep;

use super::events::EventEmitter;
use super::Signal;

/// Pushes every step, in order, followed by one stop marker.
pub struct Scheduler {
    tx: UnboundedSender<Signal<RouteStep>>,
    events: EventEmitter,
}

impl Scheduler {
    pub fn new(tx: UnboundedSender<Signal<RouteStep>>, events: EventEmitter) -> Self {
        Self { tx, events }
    }

    /// Enqueue `steps` then the stop marker. Returns the number of steps queued.
    ///
    /// # Errors
    ///
    /// Fails if the work channel has been closed.
    pub fn schedule(&self, steps: Vec<RouteStep>) -> Result<usize> {
        tracing::info!(count = steps.len(), "Scheduling steps");
        let count = steps.len();

        for step in steps {
            let (id, instruction) = (step.id.clone(), step.instruction.clone());
            self.tx
                .send(Signal::Data(step))
                .map_err(|_| WayfarerError::Pipeline("work channel closed".to_string()))?;
            self.events.step_scheduled(&id, &instruction);
        }

        self.tx
            .send(Signal::Stop)
            .map_err(|_| WayfarerError::Pipeline("work channel closed".to_string()))?;
        tracing::info!("Scheduling complete");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn step(i: usize) -> RouteStep {
        RouteStep {
            id: RouteStep::id_for(i),
            instruction: format!("Instruction {}", i),
            distance: 10.0,
            duration: 1.0,
            start_location: None,
            end_location: None,
            address: None,
        }
    }

    #[tokio::test]
    async fn test_schedule_preserves_order_then_stops() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let scheduler = Scheduler::new(tx, EventEmitter::disabled());

        assert_eq!(scheduler.schedule((0..3).map(step).collect()).unwrap(), 3);

        for i in 0..3 {
            assert_eq!(rx.recv().await, Some(Signal::Data(step(i))));
        }
        assert_eq!(rx.recv().await, Some(Signal::Stop));
    }

    #[tokio::test]
    async fn test_schedule_empty_sends_only_stop() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        Scheduler::new(tx, EventEmitter::disabled())
            .schedule(Vec::new())
            .unwrap();
        assert_eq!(rx.recv().await, Some(Signal::Stop));
    }

    #[test]
    fn test_schedule_closed_channel() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let result = Scheduler::new(tx, EventEmitter::disabled()).schedule(vec![step(0)]);
        assert!(matches!(result, Err(WayfarerError::Pipeline(_))));
    }
}
