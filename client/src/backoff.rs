//! The retransmission backoff module.
//!
//! Implements the classic DHCP client retry policy: the interval starts
//! at one second and on average doubles with every transmission, jittered
//! by re-randomizing within a band once it grows past thirty seconds.

use rand::{Rng, RngCore};

/// Per-exchange retransmission bookkeeping. Reset whenever the client
/// enters a new sending phase.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    /// When the first packet of the exchange went out.
    pub first_sending: i64,
    interval: i64,
}

impl Backoff {
    /// Starts an exchange; the first `next_interval` call yields 1.
    pub fn start(now: i64) -> Self {
        Backoff {
            first_sending: now,
            interval: 0,
        }
    }

    /// Seconds since the exchange started.
    pub fn elapsed(&self, now: i64) -> i64 {
        now - self.first_sending
    }

    /// Whether the phase ceiling has been exceeded. True exactly when
    /// `now - first_sending > ceiling`.
    pub fn past_ceiling(&self, now: i64, ceiling: i64) -> bool {
        self.elapsed(now) > ceiling
    }

    /// Grows the interval for the next retransmission.
    ///
    /// Adds a random amount between zero and twice the current interval,
    /// doubling it on average. Past thirty seconds the interval is
    /// re-randomized as `15 + random(0, interval)` rather than capped.
    pub fn next_interval(&mut self, rng: &mut dyn RngCore) -> i64 {
        if self.interval == 0 {
            self.interval = 1;
        } else {
            self.interval += rng.gen_range(0, 2 * self.interval);
        }
        if self.interval > 30 {
            self.interval = 15 + rng.gen_range(0, self.interval);
        }
        self.interval
    }

    /// The interval without growth, used while the medium list is still
    /// being cycled through.
    pub fn keep_interval(&mut self) -> i64 {
        if self.interval == 0 {
            self.interval = 1;
        }
        self.interval
    }

    /// If the next retransmission would land past `deadline`, shrinks
    /// the interval so the timer fires one tick after it, guaranteeing
    /// the ceiling check runs on the next cycle.
    pub fn clamp_to_deadline(&mut self, now: i64, deadline: i64) {
        if now + self.interval > deadline {
            self.interval = deadline - now + 1;
        }
    }

    pub fn interval(&self) -> i64 {
        self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn first_transmission_is_after_one_second() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut backoff = Backoff::start(1000);
        assert_eq!(backoff.next_interval(&mut rng), 1);
    }

    #[test]
    fn growth_stays_within_the_jitter_band() {
        for seed in 0..32 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut backoff = Backoff::start(0);
            let mut previous = backoff.next_interval(&mut rng);
            for _ in 0..50 {
                let next = backoff.next_interval(&mut rng);
                assert!(next >= 1);
                // Grown interval is < 3x the previous one; the band
                // re-randomization adds at most 15 on top of that.
                assert!(next < 3 * previous + 15, "{} after {}", next, previous);
                previous = next;
            }
        }
    }

    #[test]
    fn ceiling_boundary_is_exclusive() {
        let backoff = Backoff::start(100);
        assert!(!backoff.past_ceiling(160, 60));
        assert!(backoff.past_ceiling(161, 60));
    }

    #[test]
    fn deadline_clamp_lands_one_tick_past() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut backoff = Backoff::start(0);
        for _ in 0..10 {
            backoff.next_interval(&mut rng);
        }
        backoff.clamp_to_deadline(55, 60);
        assert!(backoff.interval() <= 6);
        if backoff.interval() == 6 {
            // 55 + 6 = 61, one past the deadline.
            assert!(55 + backoff.interval() == 61);
        }
    }

    #[test]
    fn medium_cycling_does_not_grow_the_interval() {
        let mut backoff = Backoff::start(0);
        assert_eq!(backoff.keep_interval(), 1);
        assert_eq!(backoff.keep_interval(), 1);
    }
}
