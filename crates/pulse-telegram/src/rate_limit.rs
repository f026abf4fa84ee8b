use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Per-user command budget: `max_commands_per_window` per rolling hour,
/// plus a minimum `cooldown` between consecutive `/run`s.
///
/// Backed by a timestamp deque per user so the window slides continuously
/// rather than resetting at a calendar boundary.
pub struct RateLimiter {
    window: Duration,
    max_per_window: u32,
    cooldown: Duration,
    state: Mutex<HashMap<i64, UserState>>,
}

#[derive(Default)]
struct UserState {
    command_times: VecDeque<Instant>,
    last_run_at: Option<Instant>,
}

pub enum CommandDecision {
    Allowed,
    RateLimited,
}

pub enum RunDecision {
    Allowed,
    Cooldown,
}

impl RateLimiter {
    pub fn new(window: Duration, max_per_window: u32, cooldown: Duration) -> Self {
        Self {
            window,
            max_per_window,
            cooldown,
            state: Mutex::new(HashMap::new()),
        }
    }

    /// Record an inbound command attempt for `user_id` and decide whether
    /// it is within the rolling-hour budget. Evicts entries older than the
    /// window before counting, so the window is always "now minus window".
    pub fn check_command(&self, user_id: i64) -> CommandDecision {
        let now = Instant::now();
        let mut state = self.state.lock().unwrap();
        let entry = state.entry(user_id).or_default();
        while let Some(&front) = entry.command_times.front() {
            if now.duration_since(front) > self.window {
                entry.command_times.pop_front();
            } else {
                break;
            }
        }
        if entry.command_times.len() as u32 >= self.max_per_window {
            return CommandDecision::RateLimited;
        }
        entry.command_times.push_back(now);
        CommandDecision::Allowed
    }

    /// Decide whether `user_id` may execute `/run` now, given the minimum
    /// cooldown between consecutive executions. Does not record the
    /// attempt; call `record_run` once the run is actually triggered.
    pub fn check_run_cooldown(&self, user_id: i64) -> RunDecision {
        let now = Instant::now();
        let state = self.state.lock().unwrap();
        match state.get(&user_id).and_then(|s| s.last_run_at) {
            Some(last) if now.duration_since(last) < self.cooldown => RunDecision::Cooldown,
            _ => RunDecision::Allowed,
        }
    }

    pub fn record_run(&self, user_id: i64) {
        let mut state = self.state.lock().unwrap();
        state.entry(user_id).or_default().last_run_at = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_the_window_limit() {
        let limiter = RateLimiter::new(Duration::from_secs(3600), 2, Duration::from_secs(300));
        assert!(matches!(limiter.check_command(1), CommandDecision::Allowed));
        assert!(matches!(limiter.check_command(1), CommandDecision::Allowed));
        assert!(matches!(
            limiter.check_command(1),
            CommandDecision::RateLimited
        ));
    }

    #[test]
    fn per_user_budgets_are_independent() {
        let limiter = RateLimiter::new(Duration::from_secs(3600), 1, Duration::from_secs(300));
        assert!(matches!(limiter.check_command(1), CommandDecision::Allowed));
        assert!(matches!(limiter.check_command(2), CommandDecision::Allowed));
    }

    #[test]
    fn run_cooldown_blocks_immediate_second_run() {
        let limiter = RateLimiter::new(Duration::from_secs(3600), 120, Duration::from_secs(300));
        assert!(matches!(
            limiter.check_run_cooldown(1),
            RunDecision::Allowed
        ));
        limiter.record_run(1);
        assert!(matches!(
            limiter.check_run_cooldown(1),
            RunDecision::Cooldown
        ));
    }

    #[test]
    fn run_cooldown_is_per_user() {
        let limiter = RateLimiter::new(Duration::from_secs(3600), 120, Duration::from_secs(300));
        limiter.record_run(1);
        assert!(matches!(
            limiter.check_run_cooldown(2),
            RunDecision::Allowed
        ));
    }
}
