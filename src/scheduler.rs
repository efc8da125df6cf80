//! Scheduler for recurring automated searches.
//!
//! Polls once a minute for due schedules, with sleep/wake detection via
//! time-jump polling and a grace period for slots missed while the host
//! slept. Cadence + time-of-day is expressed as a cron expression for the
//! due-check; `next_run` is the user-facing derived field.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use tokio::sync::mpsc;

use crate::error::EngineError;
use crate::search::{RetryPolicy, SearchController, SearchEvent};
use crate::store::{
    AutomationSchedule, Cadence, RunStatus, ScheduleResult, StopCondition, StoreClient,
};
use crate::types::ExecutionTrigger;

/// Grace period for slots missed during sleep (2 hours).
const MISSED_SLOT_GRACE_SECS: i64 = 7200;

/// Time jump threshold to detect sleep/wake (5 minutes).
const TIME_JUMP_THRESHOLD_SECS: i64 = 300;

/// Poll interval for the scheduler loop (1 minute).
const POLL_INTERVAL_SECS: u64 = 60;

// ============================================================================
// next_run derivation
// ============================================================================

/// Compute the next run for a cadence: "today at `time_of_day`" pushed
/// forward one cadence step, in the evaluating timezone.
///
/// daily → +1 day, weekly → +7 days, monthly → +1 calendar month (clamped
/// to month length).
pub fn next_run(
    cadence: Cadence,
    time_of_day: &str,
    now: DateTime<Tz>,
) -> Result<DateTime<Tz>, EngineError> {
    let time = parse_time_of_day(time_of_day)?;
    let today = now.date_naive();

    let target_date = match cadence {
        Cadence::Daily => today
            .succ_opt()
            .ok_or_else(|| EngineError::Scheduler("date overflow".into()))?,
        Cadence::Weekly => today + chrono::Duration::days(7),
        Cadence::Monthly => today
            .checked_add_months(chrono::Months::new(1))
            .ok_or_else(|| EngineError::Scheduler("date overflow".into()))?,
    };

    let naive = target_date.and_time(time);
    now.timezone()
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| {
            EngineError::Scheduler(format!("no valid local time for {naive} in {}", now.timezone()))
        })
}

fn parse_time_of_day(raw: &str) -> Result<NaiveTime, EngineError> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|e| EngineError::Scheduler(format!("Invalid time of day '{raw}': {e}")))
}

/// Express a schedule's cadence as a 5-field cron expression for the
/// due-check. Weekly pins the weekday of the start date; monthly pins its
/// day of month.
pub fn cadence_to_cron(schedule: &AutomationSchedule) -> Result<String, EngineError> {
    let time = parse_time_of_day(&schedule.time_of_day)?;
    let start = parse_start_date(&schedule.start_date)?;
    let (minute, hour) = (time.format("%M").to_string(), time.format("%H").to_string());

    Ok(match schedule.cadence {
        Cadence::Daily => format!("{minute} {hour} * * *"),
        Cadence::Weekly => {
            // The cron crate numbers days of week 1-7 starting at Sunday.
            format!("{minute} {hour} * * {}", start.weekday().number_from_sunday())
        }
        Cadence::Monthly => format!("{minute} {hour} {} * *", start.day()),
    })
}

fn parse_start_date(raw: &str) -> Result<NaiveDate, EngineError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| EngineError::Scheduler(format!("Invalid start date '{raw}': {e}")))
}

/// Parse a 5-field cron expression (the `cron` crate expects seconds).
pub fn parse_cron(expr: &str) -> Result<Schedule, EngineError> {
    let full_expr = format!("0 {}", expr);
    full_expr
        .parse::<Schedule>()
        .map_err(|e| EngineError::Scheduler(format!("Invalid cron expression '{expr}': {e}")))
}

// ============================================================================
// Runner
// ============================================================================

pub struct Scheduler {
    store: StoreClient,
    workflow_url: String,
    timezone: Tz,
    last_runs: HashMap<String, DateTime<Utc>>,
}

impl Scheduler {
    pub fn new(store: StoreClient, workflow_url: &str, timezone: Tz) -> Self {
        Self {
            store,
            workflow_url: workflow_url.to_string(),
            timezone,
            last_runs: HashMap::new(),
        }
    }

    /// Run the scheduler loop indefinitely, checking for due schedules
    /// every minute and catching up missed slots after a wake.
    pub async fn run(&mut self) {
        let mut last_check = Utc::now();

        loop {
            tokio::time::sleep(Duration::from_secs(POLL_INTERVAL_SECS)).await;
            let now = Utc::now();

            let time_jump = (now - last_check).num_seconds();
            if time_jump > TIME_JUMP_THRESHOLD_SECS {
                log::info!(
                    "Detected system wake (time jumped {time_jump} seconds), checking for missed slots"
                );
                self.check_schedules(now, true).await;
            }

            self.check_schedules(now, false).await;
            last_check = now;
        }
    }

    async fn check_schedules(&mut self, now: DateTime<Utc>, include_missed: bool) {
        let schedules = match self.store.list_schedules().await {
            Ok(s) => s,
            Err(e) => {
                log::warn!("Failed to load schedules: {e}");
                return;
            }
        };

        for schedule in schedules.into_iter().filter(|s| s.enabled) {
            let Some(id) = schedule.id.clone() else {
                continue;
            };
            if self.start_date_in_future(&schedule, now) {
                continue;
            }

            let due = if include_missed {
                self.find_missed_slot(&schedule, &id, now)
            } else {
                self.due_now(&schedule, &id, now)
            };

            match due {
                Ok(Some(trigger)) => {
                    log::info!("Schedule {id} due ({trigger:?}): running '{}'", schedule.query);
                    self.last_runs.insert(id.clone(), now);
                    if let Err(e) = self.execute(&schedule, &id).await {
                        log::warn!("Schedule {id} execution failed: {e}");
                    }
                }
                Ok(None) => {}
                Err(e) => log::warn!("Schedule {id} skipped: {e}"),
            }
        }
    }

    fn start_date_in_future(&self, schedule: &AutomationSchedule, now: DateTime<Utc>) -> bool {
        match parse_start_date(&schedule.start_date) {
            Ok(start) => now.with_timezone(&self.timezone).date_naive() < start,
            Err(_) => false,
        }
    }

    /// Due when the cron slot is within a 2-minute window of now and has
    /// not already run for that slot.
    fn due_now(
        &self,
        schedule: &AutomationSchedule,
        id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ExecutionTrigger>, EngineError> {
        let cron = parse_cron(&cadence_to_cron(schedule)?)?;
        let now_local = now.with_timezone(&self.timezone);

        let mut upcoming = cron.after(&(now_local - chrono::Duration::minutes(2)));
        if let Some(slot) = upcoming.next() {
            let slot_utc = slot.with_timezone(&Utc);
            if (now - slot_utc).num_seconds().abs() < 120 {
                if let Some(last) = self.last_runs.get(id) {
                    if (*last - slot_utc).num_seconds().abs() < 60 {
                        return Ok(None);
                    }
                }
                return Ok(Some(ExecutionTrigger::Scheduled));
            }
        }
        Ok(None)
    }

    /// Find a slot missed within the grace period (sleep/wake catch-up).
    fn find_missed_slot(
        &self,
        schedule: &AutomationSchedule,
        id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ExecutionTrigger>, EngineError> {
        let cron = parse_cron(&cadence_to_cron(schedule)?)?;
        let now_local = now.with_timezone(&self.timezone);
        let grace_start = now_local - chrono::Duration::seconds(MISSED_SLOT_GRACE_SECS);

        for slot in cron.after(&grace_start) {
            let slot_utc = slot.with_timezone(&Utc);
            if slot_utc > now {
                break;
            }
            if let Some(last) = self.last_runs.get(id) {
                if *last >= slot_utc {
                    continue;
                }
            }
            return Ok(Some(ExecutionTrigger::Missed));
        }
        Ok(None)
    }

    /// Execute one schedule: honor the stop condition, run the search,
    /// optionally persist the found accounts, append a result row.
    pub async fn execute(
        &self,
        schedule: &AutomationSchedule,
        id: &str,
    ) -> Result<(), EngineError> {
        let history = self.store.list_schedule_results(id).await?;
        if self.stop_condition_met(schedule, &history) {
            log::info!("Schedule {id} reached its stop condition; pausing");
            self.store.set_schedule_enabled(id, false).await?;
            return Ok(());
        }

        let run_id = uuid::Uuid::new_v4();
        let started = std::time::Instant::now();

        // Drain controller events into the log; nothing renders them here.
        let (tx, mut rx) = mpsc::channel::<SearchEvent>(64);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                log::debug!("run {run_id}: {event:?}");
            }
        });

        let mut controller =
            SearchController::with_policy(&self.workflow_url, tx, RetryPolicy::default());
        let outcome = controller.run(&schedule.query).await;
        let duration_secs = started.elapsed().as_secs_f64();

        let result = match outcome {
            Ok(mut companies) => {
                companies.truncate(schedule.desired_count as usize);
                let found = companies.len() as u32;

                let saved = if schedule.auto_save && !companies.is_empty() {
                    let drafts: Vec<serde_json::Value> = companies
                        .iter()
                        .filter_map(|c| serde_json::to_value(c).ok())
                        .collect();
                    match self.store.save_found_accounts(&drafts).await {
                        Ok(n) => n as u32,
                        Err(e) => {
                            log::warn!("Auto-save failed for schedule {id}: {e}");
                            0
                        }
                    }
                } else {
                    0
                };

                let status = if found == 0 {
                    RunStatus::Partial
                } else if schedule.auto_save && saved < found {
                    RunStatus::Partial
                } else {
                    RunStatus::Success
                };

                if schedule.notify {
                    log::info!(
                        "Schedule {id}: {found} accounts found, {saved} saved ({status:?})"
                    );
                }

                ScheduleResult {
                    id: None,
                    schedule_id: id.to_string(),
                    ran_at: Utc::now().to_rfc3339(),
                    status,
                    accounts_found: found,
                    accounts_saved: saved,
                    duration_secs,
                    error: None,
                }
            }
            Err(e) => ScheduleResult {
                id: None,
                schedule_id: id.to_string(),
                ran_at: Utc::now().to_rfc3339(),
                status: RunStatus::Failure,
                accounts_found: 0,
                accounts_saved: 0,
                duration_secs,
                error: Some(e.to_string()),
            },
        };

        self.store.record_schedule_result(&result).await?;
        Ok(())
    }

    fn stop_condition_met(
        &self,
        schedule: &AutomationSchedule,
        history: &[ScheduleResult],
    ) -> bool {
        match schedule.stop {
            StopCondition::ByAttempts(max) => history.len() as u32 >= max,
            StopCondition::ByResults(max) => {
                history.iter().map(|r| r.accounts_saved).sum::<u32>() >= max
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule(cadence: Cadence) -> AutomationSchedule {
        AutomationSchedule {
            id: Some("sch-1".into()),
            query: "series B fintech".into(),
            desired_count: 10,
            cadence,
            time_of_day: "14:00".into(),
            start_date: "2026-09-02".into(),
            enabled: true,
            auto_save: false,
            notify: false,
            stop: StopCondition::ByAttempts(5),
            created_at: None,
        }
    }

    fn result(saved: u32) -> ScheduleResult {
        ScheduleResult {
            id: None,
            schedule_id: "sch-1".into(),
            ran_at: "2026-08-30T14:00:00Z".into(),
            status: RunStatus::Success,
            accounts_found: saved,
            accounts_saved: saved,
            duration_secs: 12.0,
            error: None,
        }
    }

    #[test]
    fn weekly_next_run_is_seven_days_from_today_at_time() {
        let tz: Tz = "America/New_York".parse().unwrap();
        let now = tz.with_ymd_and_hms(2026, 8, 31, 9, 30, 0).unwrap();
        let next = next_run(Cadence::Weekly, "14:00", now).unwrap();
        assert_eq!(next, tz.with_ymd_and_hms(2026, 9, 7, 14, 0, 0).unwrap());
    }

    #[test]
    fn daily_next_run_is_tomorrow_at_time() {
        let tz: Tz = "UTC".parse().unwrap();
        let now = tz.with_ymd_and_hms(2026, 8, 31, 23, 59, 0).unwrap();
        let next = next_run(Cadence::Daily, "06:15", now).unwrap();
        assert_eq!(next, tz.with_ymd_and_hms(2026, 9, 1, 6, 15, 0).unwrap());
    }

    #[test]
    fn monthly_next_run_clamps_to_month_length() {
        let tz: Tz = "UTC".parse().unwrap();
        // Jan 31 + 1 month clamps to Feb 28.
        let now = tz.with_ymd_and_hms(2026, 1, 31, 8, 0, 0).unwrap();
        let next = next_run(Cadence::Monthly, "09:00", now).unwrap();
        assert_eq!(next, tz.with_ymd_and_hms(2026, 2, 28, 9, 0, 0).unwrap());
    }

    #[test]
    fn invalid_time_of_day_is_rejected() {
        let tz: Tz = "UTC".parse().unwrap();
        let now = tz.with_ymd_and_hms(2026, 8, 31, 0, 0, 0).unwrap();
        assert!(next_run(Cadence::Daily, "25:99", now).is_err());
    }

    #[test]
    fn cadence_cron_pins_weekday_and_day_of_month() {
        // 2026-09-02 is a Wednesday.
        let weekly = cadence_to_cron(&schedule(Cadence::Weekly)).unwrap();
        assert_eq!(weekly, "00 14 * * 4");

        let monthly = cadence_to_cron(&schedule(Cadence::Monthly)).unwrap();
        assert_eq!(monthly, "00 14 2 * *");

        let daily = cadence_to_cron(&schedule(Cadence::Daily)).unwrap();
        assert_eq!(daily, "00 14 * * *");

        assert!(parse_cron(&weekly).is_ok());
        assert!(parse_cron(&monthly).is_ok());
    }

    #[test]
    fn stop_conditions_count_attempts_and_results() {
        let store = StoreClient::new(reqwest::Client::new(), "http://localhost", "key");
        let scheduler = Scheduler::new(store, "http://localhost", chrono_tz::UTC);

        let mut by_attempts = schedule(Cadence::Daily);
        by_attempts.stop = StopCondition::ByAttempts(3);
        let history: Vec<ScheduleResult> = (0..3).map(|_| result(2)).collect();
        assert!(scheduler.stop_condition_met(&by_attempts, &history));
        assert!(!scheduler.stop_condition_met(&by_attempts, &history[..2]));

        let mut by_results = schedule(Cadence::Daily);
        by_results.stop = StopCondition::ByResults(5);
        assert!(scheduler.stop_condition_met(&by_results, &history));
        let thin: Vec<ScheduleResult> = (0..2).map(|_| result(1)).collect();
        assert!(!scheduler.stop_condition_met(&by_results, &thin));
    }
}
