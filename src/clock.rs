/// milliseconds since an arbitrary origin, wrapping after about 49 days
pub type Timestamp = u32;

/// monotonic millisecond clock shared by tap capture and beat scheduling
pub trait Clock {
    fn now(&self) -> Timestamp;
}
impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Timestamp {(**self).now()}
}

/// true if `time` is at or after `reference`, robust to clock wrapping
pub fn reached(time: Timestamp, reference: Timestamp) -> bool {
    (time.wrapping_sub(reference) as i32) >= 0
}

/// clock counting from its creation, for desktop builds
#[cfg(feature = "std")]
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: std::time::Instant,
}
#[cfg(feature = "std")]
impl SystemClock {
    pub fn new() -> Self {
        Self {origin: std::time::Instant::now()}
    }
}
#[cfg(feature = "std")]
impl Default for SystemClock {
    fn default() -> Self {Self::new()}
}
#[cfg(feature = "std")]
impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        // truncation is the wrapping behavior of the clock
        self.origin.elapsed().as_millis() as Timestamp
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reached_across_wrap() {
        assert!(reached(10, 10));
        assert!(reached(11, 10));
        assert!(!reached(9, 10));
        assert!(reached(5, u32::MAX - 5));
        assert!(!reached(u32::MAX - 5, 5));
    }

    #[cfg(feature = "std")]
    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let start = clock.now();
        std::thread::sleep(std::time::Duration::from_millis(3));
        assert!(reached(clock.now(), start + 3));
    }
}
