use crossbeam_channel::{Receiver, Sender};

use crate::collab::SimulationMut;

pub type MainThreadTask = Box<dyn FnOnce(&mut dyn SimulationMut) + Send>;

/// Work posted by network threads for the simulation thread. The host drains
/// it once per tick; tasks posted while a drain is running wait for the next
/// one.
#[derive(Clone)]
pub struct MainThreadQueue {
    tx: Sender<MainThreadTask>,
    rx: Receiver<MainThreadTask>,
}

impl Default for MainThreadQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MainThreadQueue {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self { tx, rx }
    }

    pub fn post<F>(&self, task: F)
    where
        F: FnOnce(&mut dyn SimulationMut) + Send + 'static,
    {
        // Both ends live in `self`, so the channel cannot be disconnected.
        let _ = self.tx.send(Box::new(task));
    }

    pub fn drain(&self, simulation: &mut dyn SimulationMut) -> usize {
        let queued = self.rx.len();
        let mut ran = 0;
        for _ in 0..queued {
            let Ok(task) = self.rx.try_recv() else {
                break;
            };
            task(simulation);
            ran += 1;
        }
        ran
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl std::fmt::Debug for MainThreadQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainThreadQueue")
            .field("pending", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use chrono::Utc;

    use super::*;
    use crate::collab::{HeadlessSimulation, SimulationView};

    #[test]
    fn tasks_from_other_threads_run_on_drain() {
        let queue = MainThreadQueue::new();
        let mut sim = HeadlessSimulation::new("1.0", Vec::new(), Utc::now());

        let handles: Vec<_> = (0..4u8)
            .map(|i| {
                let queue = queue.clone();
                thread::spawn(move || queue.post(move |sim| sim.set_speed(i % 3 + 1, false)))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(queue.len(), 4);
        assert_eq!(queue.drain(&mut sim), 4);
        assert!(queue.is_empty());
    }

    #[test]
    fn task_posted_during_drain_waits_for_next_tick() {
        let queue = MainThreadQueue::new();
        let mut sim = HeadlessSimulation::new("1.0", Vec::new(), Utc::now());

        let inner = queue.clone();
        queue.post(move |sim| {
            sim.load_world(b"first");
            inner.post(|sim| sim.load_world(b"second"));
        });

        assert_eq!(queue.drain(&mut sim), 1);
        assert_eq!(sim.view().world_snapshot(), b"first");
        assert_eq!(queue.drain(&mut sim), 1);
        assert_eq!(sim.view().world_snapshot(), b"second");
    }
}
