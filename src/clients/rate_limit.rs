//! Rate-limit bookkeeping for the catalog API.
//!
//! AniList reports the remaining request budget on every response. When the
//! budget falls under a low-water mark the client pauses before its next
//! request, longer the closer the budget is to zero.

use reqwest::header::HeaderMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const MIN_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Remaining budget under which requests start slowing down.
    pub low_water_mark: u32,
    /// Upper bound for any proactive wait.
    pub max_wait: Duration,
    /// Fixed pause after an HTTP 429.
    pub cooldown: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        // AniList allows 90 requests per minute.
        Self {
            low_water_mark: 10,
            max_wait: Duration::from_secs(60),
            cooldown: Duration::from_secs(60),
        }
    }
}

impl RateLimitPolicy {
    /// Wait before the next request given the remaining budget.
    ///
    /// Returns `None` while the budget is at or above the low-water mark.
    /// The delay grows linearly with the deficit and never exceeds `max_wait`.
    #[must_use]
    pub fn delay_for(&self, remaining: u32) -> Option<Duration> {
        if self.low_water_mark == 0 || remaining >= self.low_water_mark {
            return None;
        }

        let deficit = self.low_water_mark - remaining;
        let scaled = self.max_wait.saturating_mul(deficit) / self.low_water_mark;

        Some(scaled.max(MIN_DELAY).min(self.max_wait))
    }

    /// Delay recommended by a parsed response, if any.
    ///
    /// An exhausted budget with a known reset time waits for the reset; the
    /// cap still applies.
    #[must_use]
    pub fn delay_for_response(&self, info: &RateLimitInfo) -> Option<Duration> {
        let remaining = info.remaining?;
        let delay = self.delay_for(remaining)?;

        match info.reset_in {
            Some(reset) if remaining == 0 => Some(delay.max(reset).min(self.max_wait)),
            _ => Some(delay),
        }
    }
}

/// Rate-limit headers of a single response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub remaining: Option<u32>,
    pub limit: Option<u32>,
    /// Time until the budget resets, derived from `X-RateLimit-Reset`.
    pub reset_in: Option<Duration>,
}

impl RateLimitInfo {
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        Self::from_headers_at(headers, now)
    }

    /// Same as [`Self::from_headers`] with an explicit clock, in unix seconds.
    #[must_use]
    pub fn from_headers_at(headers: &HeaderMap, now_unix: u64) -> Self {
        let remaining = header_u64(headers, "x-ratelimit-remaining")
            .map(|v| u32::try_from(v).unwrap_or(u32::MAX));
        let limit =
            header_u64(headers, "x-ratelimit-limit").map(|v| u32::try_from(v).unwrap_or(u32::MAX));
        let reset_in = header_u64(headers, "x-ratelimit-reset")
            .map(|reset| Duration::from_secs(reset.saturating_sub(now_unix)));

        Self {
            remaining,
            limit,
            reset_in,
        }
    }
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RateLimitPolicy {
        RateLimitPolicy {
            low_water_mark: 10,
            max_wait: Duration::from_secs(30),
            cooldown: Duration::from_secs(60),
        }
    }

    #[test]
    fn no_wait_at_or_above_low_water_mark() {
        let policy = policy();
        assert_eq!(policy.delay_for(10), None);
        assert_eq!(policy.delay_for(85), None);
    }

    #[test]
    fn wait_grows_as_budget_shrinks_and_respects_cap() {
        let policy = policy();
        let mut previous = Duration::ZERO;

        for remaining in (0..10).rev() {
            let delay = policy.delay_for(remaining).expect("under low-water mark");
            assert!(delay >= previous, "delay shrank at remaining={remaining}");
            assert!(delay <= policy.max_wait);
            previous = delay;
        }

        assert_eq!(policy.delay_for(0), Some(Duration::from_secs(30)));
    }

    #[test]
    fn tiny_deficit_still_waits_at_least_a_second() {
        let policy = RateLimitPolicy {
            low_water_mark: 100,
            max_wait: Duration::from_secs(10),
            cooldown: Duration::from_secs(60),
        };
        assert_eq!(policy.delay_for(99), Some(Duration::from_secs(1)));
    }

    #[test]
    fn zero_low_water_mark_disables_throttling() {
        let policy = RateLimitPolicy {
            low_water_mark: 0,
            ..policy()
        };
        assert_eq!(policy.delay_for(0), None);
    }

    #[test]
    fn parses_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-remaining", "3".parse().unwrap());
        headers.insert("x-ratelimit-limit", "90".parse().unwrap());
        headers.insert("x-ratelimit-reset", "1000045".parse().unwrap());

        let info = RateLimitInfo::from_headers_at(&headers, 1_000_000);
        assert_eq!(info.remaining, Some(3));
        assert_eq!(info.limit, Some(90));
        assert_eq!(info.reset_in, Some(Duration::from_secs(45)));
    }

    #[test]
    fn exhausted_budget_waits_for_reset_but_not_past_cap() {
        let policy = RateLimitPolicy {
            low_water_mark: 10,
            max_wait: Duration::from_secs(60),
            cooldown: Duration::from_secs(60),
        };
        let info = RateLimitInfo {
            remaining: Some(0),
            limit: Some(90),
            reset_in: Some(Duration::from_secs(500)),
        };
        assert_eq!(policy.delay_for_response(&info), Some(Duration::from_secs(60)));

        let missing = RateLimitInfo::default();
        assert_eq!(policy.delay_for_response(&missing), None);
    }
}
