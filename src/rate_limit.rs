use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

/// Per-IP-per-route rate limiter using a sliding window. Applied to the
/// credential-sensitive routes (signup, login, forgetPassword); logout is
/// deliberately unlimited.
pub struct RouteRateLimiter {
    /// (route, ip) -> (count, window_start)
    entries: DashMap<(&'static str, IpAddr), (u32, Instant)>,
    limit: u32,
    window: Duration,
}

impl RouteRateLimiter {
    pub fn new(limit: u32, window_secs: u64) -> Self {
        Self {
            entries: DashMap::new(),
            limit,
            window: Duration::from_secs(window_secs),
        }
    }

    /// Check if a request is allowed. Returns Ok(()) or Err with retry-after seconds.
    pub fn check(&self, route: &'static str, ip: IpAddr) -> Result<(), u64> {
        let now = Instant::now();

        let mut entry = self.entries.entry((route, ip)).or_insert((0, now));
        let (count, start) = entry.value_mut();

        if now.duration_since(*start) > self.window {
            *count = 1;
            *start = now;
            return Ok(());
        }

        if *count >= self.limit {
            let elapsed = now.duration_since(*start).as_secs();
            return Err(self.window.as_secs().saturating_sub(elapsed));
        }

        *count += 1;
        Ok(())
    }

    /// Remove stale entries older than the given duration.
    pub fn cleanup(&self, max_age: Duration) {
        let now = Instant::now();
        self.entries
            .retain(|_, (_, start)| now.duration_since(*start) < max_age);
    }

    /// Periodically sweep out windows that have aged past twice the window
    /// length, so the (route, ip) map stays bounded under IP churn.
    pub async fn run_sweeper(self: Arc<Self>, every: Duration) {
        let max_age = self.window * 2;
        let mut tick = tokio::time::interval(every);
        loop {
            tick.tick().await;
            self.cleanup(max_age);
        }
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(last: u8) -> IpAddr {
        IpAddr::from([127, 0, 0, last])
    }

    #[tokio::test]
    async fn allows_up_to_limit_then_blocks() {
        let limiter = RouteRateLimiter::new(3, 60);
        for _ in 0..3 {
            assert!(limiter.check("login", ip(1)).is_ok());
        }
        let retry = limiter.check("login", ip(1)).unwrap_err();
        assert!(retry <= 60);
    }

    #[tokio::test]
    async fn routes_and_ips_are_independent() {
        let limiter = RouteRateLimiter::new(1, 60);
        assert!(limiter.check("login", ip(1)).is_ok());
        assert!(limiter.check("signup", ip(1)).is_ok());
        assert!(limiter.check("login", ip(2)).is_ok());
        assert!(limiter.check("login", ip(1)).is_err());
    }

    #[tokio::test]
    async fn cleanup_drops_all_fresh_entries_only_when_aged_out() {
        let limiter = RouteRateLimiter::new(1, 60);
        limiter.check("login", ip(1)).unwrap();
        limiter.cleanup(Duration::from_secs(0));
        // Entry dropped, so the next check starts a fresh window.
        assert!(limiter.check("login", ip(1)).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_prunes_aged_out_windows() {
        let limiter = Arc::new(RouteRateLimiter::new(1, 60));
        limiter.check("login", ip(1)).unwrap();
        assert!(limiter.check("login", ip(1)).is_err());

        tokio::spawn(limiter.clone().run_sweeper(Duration::from_secs(60)));

        // Well past 2x the window: the sweep has dropped the stale entry
        // rather than leaving the map slot around forever.
        tokio::time::sleep(Duration::from_secs(200)).await;
        assert_eq!(limiter.tracked(), 0);
        assert!(limiter.check("login", ip(1)).is_ok());
    }
}
