//! The pending-event queue.
//!
//! Events are ordered by time; simultaneous events are totalled by triangle
//! kind (more wavefront sides first) and then by the stable triangle id, so
//! that runs are reproducible. Each alive triangle owns at most one queued
//! event, which is also cached on the triangle itself; the queue stores only
//! the ordering key and the cache is the source of truth for the payload.

use crate::error::{SkeletonError, SkeletonResult};
use crate::kds::{Event, Skeleton, TriangleId};
use ordered_float::NotNan;
use std::collections::BTreeSet;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct QueueKey {
    time: NotNan<f64>,
    /// `3 - triangle_kind`, so that larger kinds sort first.
    kind_order: u8,
    triangle: TriangleId,
}

fn key_of(evt: &Event) -> SkeletonResult<QueueKey> {
    let time = NotNan::new(evt.time).map_err(|_| SkeletonError::InvariantViolation {
        message: "event time is not a number",
        time: f64::NAN,
    })?;
    Ok(QueueKey {
        time,
        kind_order: 3 - evt.triangle_kind.min(3) as u8,
        triangle: evt.triangle,
    })
}

#[derive(Debug, Default)]
pub(crate) struct EventQueue {
    keys: BTreeSet<QueueKey>,
}

impl EventQueue {
    pub fn new() -> Self {
        EventQueue {
            keys: BTreeSet::new(),
        }
    }

    pub fn insert(&mut self, evt: &Event) -> SkeletonResult<()> {
        self.keys.insert(key_of(evt)?);
        Ok(())
    }

    /// Remove the queue entry of `evt`, if present.
    pub fn remove(&mut self, evt: &Event) {
        if let Ok(key) = key_of(evt) {
            self.keys.remove(&key);
        }
    }

    /// Pop the earliest event. The payload is fetched from the triangle's
    /// event cache, which the scheduling paths keep coherent with the queue.
    pub fn pop(&mut self, skel: &Skeleton) -> SkeletonResult<Option<Event>> {
        let key = match self.keys.iter().next() {
            Some(k) => *k,
            None => return Ok(None),
        };
        self.keys.remove(&key);
        let cached = skel.tri(key.triangle).event.clone();
        match cached {
            Some(evt) if evt.time == key.time.into_inner() => Ok(Some(evt)),
            _ => Err(SkeletonError::InvariantViolation {
                message: "queued event does not match the triangle's cache",
                time: key.time.into_inner(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kds::{EventKind, KineticTriangle, VertexId};
    use arrayvec::ArrayVec;

    fn event(time: f64, triangle: u32, kind: usize) -> Event {
        let mut sides = ArrayVec::new();
        sides.push(0);
        Event {
            time,
            triangle: TriangleId(triangle),
            sides,
            kind: EventKind::Edge,
            triangle_kind: kind,
        }
    }

    fn skeleton_with_cached(events: &[Event]) -> Skeleton {
        let mut skel = Skeleton::default();
        let max = events.iter().map(|e| e.triangle.0).max().unwrap_or(0);
        for i in 0..=max {
            skel.triangles.push(KineticTriangle {
                vertices: [VertexId(0); 3],
                neighbours: [None; 3],
                wavefronts: [None; 3],
                info: i + 1,
                stops_at: None,
                event: None,
                internal: false,
            });
        }
        for e in events {
            skel.triangles[e.triangle.0 as usize].event = Some(e.clone());
        }
        skel
    }

    #[test]
    fn orders_by_time_then_kind_then_id() {
        let events = [
            event(2.0, 0, 0),
            event(1.0, 1, 0),
            event(1.0, 2, 2),
            event(1.0, 3, 1),
        ];
        let skel = skeleton_with_cached(&events);
        let mut queue = EventQueue::new();
        for e in &events {
            queue.insert(e).unwrap();
        }
        let order: Vec<u32> = std::iter::from_fn(|| queue.pop(&skel).unwrap())
            .map(|e| e.triangle.0)
            .collect();
        // Same time: larger triangle kind first, then by id; later times last.
        assert_eq!(order, vec![2, 3, 1, 0]);
    }

    #[test]
    fn remove_discards_entry() {
        let events = [event(1.0, 0, 0), event(2.0, 1, 0)];
        let skel = skeleton_with_cached(&events);
        let mut queue = EventQueue::new();
        for e in &events {
            queue.insert(e).unwrap();
        }
        queue.remove(&events[0]);
        let popped = queue.pop(&skel).unwrap().unwrap();
        assert_eq!(popped.triangle, TriangleId(1));
        assert!(queue.pop(&skel).unwrap().is_none());
    }
}
