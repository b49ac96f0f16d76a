//! Hysteresis for "active section" tracking while the learner scrolls.

use std::time::{Duration, Instant};

pub const DEFAULT_HYSTERESIS: Duration = Duration::from_millis(100);
pub const MAX_HYSTERESIS: Duration = Duration::from_secs(5);

/// A section becomes active only after it has been observed for `delay`.
#[derive(Debug, Clone)]
pub struct ActiveSectionDebouncer<K> {
    delay: Duration,
    current: Option<K>,
    pending: Option<(K, Instant)>,
}

impl<K: Clone + PartialEq> ActiveSectionDebouncer<K> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay: delay.min(MAX_HYSTERESIS),
            current: None,
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn current(&self) -> Option<&K> {
        self.current.as_ref()
    }

    /// Records the section under the viewport. Returns the section when it becomes active.
    pub fn observe(&mut self, section: K, now: Instant) -> Option<K> {
        if self.current.as_ref() == Some(&section) {
            self.pending = None;
            return None;
        }
        match &self.pending {
            Some((pending, _)) if *pending == section => {}
            _ => self.pending = Some((section, now)),
        }
        self.poll(now)
    }

    /// Commits the pending section once its delay has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<K> {
        let ready = matches!(
            &self.pending,
            Some((_, since)) if now.saturating_duration_since(*since) >= self.delay
        );
        if !ready {
            return None;
        }
        let (section, _) = self.pending.take()?;
        self.current = Some(section.clone());
        Some(section)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_activates_after_delay() {
        let start = Instant::now();
        let mut spy = ActiveSectionDebouncer::new(DEFAULT_HYSTERESIS);

        assert_eq!(spy.observe("a", start), None);
        assert_eq!(spy.observe("a", start + Duration::from_millis(50)), None);
        assert_eq!(spy.observe("a", start + Duration::from_millis(100)), Some("a"));
        assert_eq!(spy.current(), Some(&"a"));
    }

    #[test]
    fn flicker_does_not_switch() {
        let start = Instant::now();
        let mut spy = ActiveSectionDebouncer::new(DEFAULT_HYSTERESIS);
        spy.observe("a", start);
        spy.poll(start + Duration::from_millis(120));

        assert_eq!(spy.observe("b", start + Duration::from_millis(130)), None);
        assert_eq!(spy.observe("a", start + Duration::from_millis(160)), None);
        assert_eq!(spy.poll(start + Duration::from_millis(400)), None);
        assert_eq!(spy.current(), Some(&"a"));
    }

    #[test]
    fn zero_delay_switches_immediately_and_delay_is_bounded() {
        let now = Instant::now();
        let mut spy = ActiveSectionDebouncer::new(Duration::ZERO);
        assert_eq!(spy.observe(1, now), Some(1));

        let bounded: ActiveSectionDebouncer<u8> = ActiveSectionDebouncer::new(Duration::from_secs(60));
        assert_eq!(bounded.delay(), MAX_HYSTERESIS);
    }
}
