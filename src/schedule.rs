//! Daily phase scheduler.
//!
//! Each phase (open, remind, close) is a cron expression evaluated against one wall clock.
//! The loop never sleeps longer than [`MAX_SLEEP`] before looking at the clock again, so
//! firings follow wall time even if the process was suspended.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Local, NaiveTime, TimeDelta, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use cron::Schedule;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Longest single sleep before re-reading the wall clock.
const MAX_SLEEP: Duration = Duration::from_secs(30);

/// Firings more than this many seconds late are dropped instead of delivered.
const MISSED_TOLERANCE_SECS: i64 = 300;

/// Delay before the catch-up open when starting mid-window.
pub const DEFAULT_CATCH_UP_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Open,
    Remind,
    Close,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Open => write!(f, "OPEN"),
            Phase::Remind => write!(f, "REMIND"),
            Phase::Close => write!(f, "CLOSE"),
        }
    }
}

/// The single wall clock everything is scheduled against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clock {
    /// The host's local time.
    Local,
    /// A fixed IANA zone.
    Zone(Tz),
}

impl Clock {
    pub fn time_of_day(&self, at: DateTime<Utc>) -> NaiveTime {
        match self {
            Clock::Local => at.with_timezone(&Local).time(),
            Clock::Zone(tz) => at.with_timezone(tz).time(),
        }
    }

    /// First occurrence of `schedule` strictly after `after`.
    fn next_after(&self, schedule: &Schedule, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Clock::Local => schedule
                .after(&after.with_timezone(&Local))
                .next()
                .map(|t| t.with_timezone(&Utc)),
            Clock::Zone(tz) => schedule
                .after(&after.with_timezone(tz))
                .next()
                .map(|t| t.with_timezone(&Utc)),
        }
    }
}

impl fmt::Display for Clock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Clock::Local => write!(f, "local"),
            Clock::Zone(tz) => write!(f, "{}", tz.name()),
        }
    }
}

/// When the poll runs each active day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailySchedule {
    pub open_time: NaiveTime,
    pub close_time: NaiveTime,
    pub remind_lead_minutes: u32,
    pub weekdays: Vec<Weekday>,
}

impl DailySchedule {
    /// `close_time - remind_lead_minutes`, wrapping past midnight.
    pub fn remind_time(&self) -> NaiveTime {
        let lead = TimeDelta::minutes(i64::from(self.remind_lead_minutes));
        self.close_time.overflowing_sub_signed(lead).0
    }
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Mon",
        Weekday::Tue => "Tue",
        Weekday::Wed => "Wed",
        Weekday::Thu => "Thu",
        Weekday::Fri => "Fri",
        Weekday::Sat => "Sat",
        Weekday::Sun => "Sun",
    }
}

/// 7-field cron expression (sec min hour day month dow year).
fn cron_expression(at: NaiveTime, weekdays: &[Weekday]) -> String {
    let days: Vec<&str> = weekdays.iter().copied().map(weekday_name).collect();
    format!("{} {} {} * * {} *", at.second(), at.minute(), at.hour(), days.join(","))
}

struct Job {
    phase: Phase,
    schedule: Schedule,
}

/// Emits [`Phase`] events on a channel at the configured local times.
pub struct Scheduler {
    jobs: Vec<Job>,
    open_time: NaiveTime,
    close_time: NaiveTime,
    clock: Clock,
    catch_up_delay: Duration,
}

impl Scheduler {
    pub fn new(daily: &DailySchedule, clock: Clock) -> Result<Self, String> {
        if daily.weekdays.is_empty() {
            return Err("No active weekdays".to_string());
        }

        let times = [
            (Phase::Open, daily.open_time),
            (Phase::Remind, daily.remind_time()),
            (Phase::Close, daily.close_time),
        ];
        let jobs = times
            .into_iter()
            .map(|(phase, at)| {
                let expr = cron_expression(at, &daily.weekdays);
                Schedule::from_str(&expr)
                    .map(|schedule| Job { phase, schedule })
                    .map_err(|e| format!("Invalid cron '{}' for {}: {}", expr, phase, e))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            jobs,
            open_time: daily.open_time,
            close_time: daily.close_time,
            clock,
            catch_up_delay: DEFAULT_CATCH_UP_DELAY,
        })
    }

    pub fn with_catch_up_delay(mut self, delay: Duration) -> Self {
        self.catch_up_delay = delay;
        self
    }

    /// Earliest scheduled phase strictly after `after`. Ties go to Open, then Remind, then Close.
    pub fn next_firing(&self, after: DateTime<Utc>) -> Option<(DateTime<Utc>, Phase)> {
        let mut best: Option<(DateTime<Utc>, Phase)> = None;
        for job in &self.jobs {
            if let Some(at) = self.clock.next_after(&job.schedule, after)
                && best.is_none_or(|(t, _)| at < t)
            {
                best = Some((at, job.phase));
            }
        }
        best
    }

    /// One-shot open time when `now` falls strictly inside the voting window.
    pub fn catch_up(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let t = self.clock.time_of_day(now);
        if self.open_time < t && t < self.close_time {
            let delay = TimeDelta::from_std(self.catch_up_delay).unwrap_or(TimeDelta::minutes(1));
            now.checked_add_signed(delay)
        } else {
            None
        }
    }

    /// Start the scheduler loop on the runtime.
    pub fn spawn(self, events: mpsc::UnboundedSender<Phase>) -> JoinHandle<()> {
        let now = Utc::now();
        let catch_up = self.catch_up(now);
        if let Some(at) = catch_up {
            info!("Started inside the voting window, catch-up open at {}", at);
        }
        if let Some((at, phase)) = self.next_firing(now) {
            info!("Next scheduled phase: {} at {} ({} clock)", phase, at, self.clock);
        }
        tokio::spawn(self.run(now, catch_up, events))
    }

    async fn run(
        self,
        start: DateTime<Utc>,
        mut catch_up: Option<DateTime<Utc>>,
        events: mpsc::UnboundedSender<Phase>,
    ) {
        let mut upcoming: Vec<Option<DateTime<Utc>>> = self
            .jobs
            .iter()
            .map(|job| self.clock.next_after(&job.schedule, start))
            .collect();

        loop {
            let Some(next) = upcoming.iter().flatten().chain(catch_up.iter()).min().copied() else {
                warn!("Nothing left to schedule, scheduler stopping");
                return;
            };

            let now = Utc::now();
            if next > now {
                let wait = (next - now).to_std().unwrap_or(Duration::ZERO).min(MAX_SLEEP);
                tokio::time::sleep(wait).await;
                continue;
            }

            if let Some(at) = catch_up
                && at <= now
            {
                catch_up = None;
                if !self.deliver(Phase::Open, at, now, &events) {
                    return;
                }
            }

            for (job, slot) in self.jobs.iter().zip(upcoming.iter_mut()) {
                let Some(at) = *slot else { continue };
                if at > now {
                    continue;
                }
                *slot = self.clock.next_after(&job.schedule, now);
                if !self.deliver(job.phase, at, now, &events) {
                    return;
                }
            }
        }
    }

    /// Returns false once nobody is listening.
    fn deliver(
        &self,
        phase: Phase,
        at: DateTime<Utc>,
        now: DateTime<Utc>,
        events: &mpsc::UnboundedSender<Phase>,
    ) -> bool {
        let late = (now - at).num_seconds();
        if late > MISSED_TOLERANCE_SECS {
            warn!("Skipping {} scheduled for {} ({}s late)", phase, at, late);
            return true;
        }
        debug!("Firing {} scheduled for {}", phase, at);
        if events.send(phase).is_err() {
            warn!("Phase channel closed, scheduler stopping");
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn weekdays() -> Vec<Weekday> {
        vec![Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri]
    }

    fn daily() -> DailySchedule {
        DailySchedule {
            open_time: hm(8, 0),
            close_time: hm(12, 0),
            remind_lead_minutes: 30,
            weekdays: weekdays(),
        }
    }

    fn scheduler() -> Scheduler {
        Scheduler::new(&daily(), Clock::Zone(chrono_tz::UTC)).unwrap()
    }

    /// 2026-10-19 is a Monday.
    fn utc(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, d, h, m, 0).unwrap()
    }

    #[test]
    fn test_remind_time() {
        assert_eq!(daily().remind_time(), hm(11, 30));
    }

    #[test]
    fn test_remind_time_wraps_midnight() {
        let mut d = daily();
        d.close_time = hm(0, 10);
        assert_eq!(d.remind_time(), hm(23, 40));
    }

    #[test]
    fn test_cron_expression() {
        assert_eq!(cron_expression(hm(11, 30), &weekdays()), "0 30 11 * * Mon,Tue,Wed,Thu,Fri *");
        assert!(Schedule::from_str(&cron_expression(hm(8, 5), &[Weekday::Sun])).is_ok());
    }

    #[test]
    fn test_empty_weekdays_rejected() {
        let mut d = daily();
        d.weekdays.clear();
        assert!(Scheduler::new(&d, Clock::Local).is_err());
    }

    #[test]
    fn test_next_firing_sequence_on_weekday() {
        let s = scheduler();
        assert_eq!(s.next_firing(utc(19, 7, 0)), Some((utc(19, 8, 0), Phase::Open)));
        assert_eq!(s.next_firing(utc(19, 8, 0)), Some((utc(19, 11, 30), Phase::Remind)));
        assert_eq!(s.next_firing(utc(19, 11, 30)), Some((utc(19, 12, 0), Phase::Close)));
        assert_eq!(s.next_firing(utc(19, 12, 0)), Some((utc(20, 8, 0), Phase::Open)));
    }

    #[test]
    fn test_next_firing_skips_weekend() {
        let s = scheduler();
        // Friday after close → Monday open
        assert_eq!(s.next_firing(utc(23, 13, 0)), Some((utc(26, 8, 0), Phase::Open)));
    }

    #[test]
    fn test_next_firing_respects_zone() {
        let s = Scheduler::new(&daily(), Clock::Zone(chrono_tz::Europe::Moscow)).unwrap();
        // Moscow is UTC+3, so 08:00 local is 05:00 UTC
        assert_eq!(s.next_firing(utc(19, 0, 0)), Some((utc(19, 5, 0), Phase::Open)));
    }

    #[test]
    fn test_zero_lead_remind_ties_with_close() {
        let mut d = daily();
        d.remind_lead_minutes = 0;
        let s = Scheduler::new(&d, Clock::Zone(chrono_tz::UTC)).unwrap();
        assert_eq!(s.next_firing(utc(19, 9, 0)), Some((utc(19, 12, 0), Phase::Remind)));
    }

    #[test]
    fn test_catch_up_inside_window() {
        let s = scheduler();
        assert_eq!(s.catch_up(utc(19, 10, 0)), Some(utc(19, 10, 1)));
    }

    #[test]
    fn test_catch_up_huge_delay_does_not_overflow() {
        let s = scheduler().with_catch_up_delay(Duration::from_secs(9_000_000_000_000_000));
        assert_eq!(s.catch_up(utc(19, 10, 0)), None);
    }

    #[test]
    fn test_catch_up_window_is_exclusive() {
        let s = scheduler();
        assert_eq!(s.catch_up(utc(19, 8, 0)), None);
        assert_eq!(s.catch_up(utc(19, 12, 0)), None);
        assert_eq!(s.catch_up(utc(19, 7, 59)), None);
        assert_eq!(s.catch_up(utc(19, 18, 0)), None);
    }

    #[test]
    fn test_catch_up_after_remind_only_close_ahead() {
        let s = scheduler();
        let now = utc(19, 11, 45);
        assert!(s.catch_up(now).is_some());
        // Remind already passed today; the next scheduled phase is close
        assert_eq!(s.next_firing(now), Some((utc(19, 12, 0), Phase::Close)));
    }

    #[tokio::test]
    async fn test_run_delivers_catch_up_open() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let s = scheduler();
        let now = Utc::now();
        let handle = tokio::spawn(s.run(now, Some(now + TimeDelta::milliseconds(20)), tx));

        let phase = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await;
        assert_eq!(phase.unwrap(), Some(Phase::Open));
        handle.abort();
    }

    #[tokio::test]
    async fn test_run_fires_scheduled_phases_in_order() {
        let now = Utc::now();
        let open_time = now.time().with_nanosecond(0).unwrap() + TimeDelta::seconds(2);
        let daily = DailySchedule {
            open_time,
            close_time: open_time + TimeDelta::seconds(2),
            remind_lead_minutes: 0,
            weekdays: vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
                Weekday::Sat,
                Weekday::Sun,
            ],
        };
        let s = Scheduler::new(&daily, Clock::Zone(chrono_tz::UTC)).unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(s.run(now, None, tx));

        let mut received = Vec::new();
        for _ in 0..3 {
            let phase = tokio::time::timeout(Duration::from_secs(10), rx.recv()).await;
            received.push(phase.expect("phase not delivered in time").unwrap());
        }
        // Remind and close share a time; remind goes first
        assert_eq!(received, vec![Phase::Open, Phase::Remind, Phase::Close]);
        handle.abort();
    }

    #[tokio::test]
    async fn test_run_skips_stale_firing() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let s = scheduler();
        let now = Utc::now();
        let handle = tokio::spawn(s.run(now, Some(now - TimeDelta::minutes(10)), tx));

        let phase = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
        assert!(phase.is_err(), "stale catch-up should not be delivered");
        handle.abort();
    }
}
