// src/trajectory/scheduler.rs - Maps elapsed trajectory time onto curve segments

/// Lower bound on a segment's duration when normalizing time (seconds).
pub const MIN_SEGMENT_DURATION: f64 = 0.001;

/// Where a trajectory stands at a given elapsed time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SchedulePhase {
    /// Before the start time; nothing is commanded.
    Waiting,
    /// Following the curve at `segment`, local parameter `t` in [0, 1].
    InMotion { segment: usize, t: f64 },
    /// Past the last waypoint, holding the final point.
    Tolerating,
    /// Tolerance window expired.
    Done,
}

#[derive(Debug, Clone)]
pub struct TrajectoryScheduler {
    times: Vec<f64>,
    tolerance: f64,
}

impl TrajectoryScheduler {
    /// `times` are the waypoint offsets, sorted ascending, at least two of them.
    pub fn new(times: Vec<f64>, tolerance: f64) -> Self {
        Self {
            times,
            tolerance: tolerance.max(0.0),
        }
    }

    pub fn end_time(&self) -> f64 {
        self.times.last().copied().unwrap_or(0.0)
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn num_segments(&self) -> usize {
        self.times.len().saturating_sub(1)
    }

    /// Segment and local parameter for `elapsed`.
    ///
    /// Uses bisect-right over the waypoint times, so an elapsed time equal to a
    /// waypoint's offset resolves to the segment starting at that waypoint.
    pub fn locate(&self, elapsed: f64) -> (usize, f64) {
        let idx = self.times.partition_point(|&time| time <= elapsed);
        if idx == 0 {
            return (0, 0.0);
        }
        if idx >= self.times.len() {
            return (self.num_segments().saturating_sub(1), 1.0);
        }
        let start = self.times[idx - 1];
        let duration = (self.times[idx] - start).max(MIN_SEGMENT_DURATION);
        (idx - 1, ((elapsed - start) / duration).clamp(0.0, 1.0))
    }

    pub fn phase(&self, elapsed: f64) -> SchedulePhase {
        let end = self.end_time();
        if elapsed < 0.0 {
            SchedulePhase::Waiting
        } else if elapsed < end {
            let (segment, t) = self.locate(elapsed);
            SchedulePhase::InMotion { segment, t }
        } else if elapsed < end + self.tolerance {
            SchedulePhase::Tolerating
        } else {
            SchedulePhase::Done
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locate_within_segments() {
        let scheduler = TrajectoryScheduler::new(vec![0.0, 1.0, 3.0], 0.1);
        assert_eq!(scheduler.locate(0.5), (0, 0.5));
        assert_eq!(scheduler.locate(2.0), (1, 0.5));
    }

    #[test]
    fn test_ties_resolve_to_next_segment() {
        let scheduler = TrajectoryScheduler::new(vec![0.0, 1.0, 3.0], 0.1);
        assert_eq!(scheduler.locate(0.0), (0, 0.0));
        assert_eq!(scheduler.locate(1.0), (1, 0.0));
    }

    #[test]
    fn test_locate_outside_the_waypoints() {
        let scheduler = TrajectoryScheduler::new(vec![0.5, 1.0, 3.0], 0.1);
        assert_eq!(scheduler.locate(0.2), (0, 0.0));
        assert_eq!(scheduler.locate(3.0), (1, 1.0));
        assert_eq!(scheduler.locate(10.0), (1, 1.0));
    }

    #[test]
    fn test_zero_length_segment_is_skipped() {
        let scheduler = TrajectoryScheduler::new(vec![0.0, 1.0, 1.0, 2.0], 0.0);
        assert_eq!(scheduler.locate(1.0), (2, 0.0));
        let (segment, t) = scheduler.locate(0.9999);
        assert_eq!(segment, 0);
        assert!(t > 0.99 && t <= 1.0);
    }

    #[test]
    fn test_lookup_is_monotonic() {
        let scheduler = TrajectoryScheduler::new(vec![0.0, 0.3, 0.3, 0.9, 1.4, 2.0], 0.2);
        let mut last = (0, 0.0);
        for step in 0..300 {
            let elapsed = -0.2 + step as f64 * 0.01;
            let current = scheduler.locate(elapsed);
            assert!(current.0 >= last.0, "segment went backwards at {}", elapsed);
            if current.0 == last.0 {
                assert!(current.1 >= last.1);
            }
            last = current;
        }
    }

    #[test]
    fn test_phases() {
        let scheduler = TrajectoryScheduler::new(vec![0.0, 1.0], 0.1);
        assert_eq!(scheduler.phase(-0.01), SchedulePhase::Waiting);
        assert_eq!(scheduler.phase(0.5), SchedulePhase::InMotion { segment: 0, t: 0.5 });
        assert_eq!(scheduler.phase(1.0), SchedulePhase::Tolerating);
        assert_eq!(scheduler.phase(1.05), SchedulePhase::Tolerating);
        assert_eq!(scheduler.phase(1.15), SchedulePhase::Done);
        assert_eq!(scheduler.phase(1.2), SchedulePhase::Done);
    }

    #[test]
    fn test_zero_tolerance_skips_tolerating() {
        let scheduler = TrajectoryScheduler::new(vec![0.0, 1.0], 0.0);
        assert_eq!(scheduler.phase(1.0), SchedulePhase::Done);
    }
}
