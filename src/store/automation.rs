//! Automation schedules and their execution history.
//!
//! Recurring searches are persisted in the store (`automation_schedules`)
//! with an append-only `schedule_results` log; the earlier in-memory mock
//! is gone. `next_run` is derived, never stored; see `scheduler`.

use serde::{Deserialize, Serialize};

use super::{StoreClient, StoreError};

/// Recurrence cadence for a scheduled search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cadence {
    Daily,
    Weekly,
    Monthly,
}

/// When a schedule stops re-running on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCondition {
    /// Stop after this many accounts have been saved in total.
    ByResults(u32),
    /// Stop after this many executions.
    ByAttempts(u32),
}

/// Outcome of one schedule execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Partial,
    Failure,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ScheduleRow {
    #[serde(default)]
    pub id: Option<String>,
    pub query: String,
    pub desired_count: u32,
    pub cadence: Cadence,
    /// "HH:MM", 24-hour clock.
    pub time_of_day: String,
    /// ISO date the schedule becomes eligible.
    pub start_date: String,
    pub enabled: bool,
    pub auto_save: bool,
    pub notify: bool,
    pub stop_kind: String,
    pub stop_value: u32,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AutomationSchedule {
    pub id: Option<String>,
    pub query: String,
    pub desired_count: u32,
    pub cadence: Cadence,
    pub time_of_day: String,
    pub start_date: String,
    pub enabled: bool,
    pub auto_save: bool,
    pub notify: bool,
    pub stop: StopCondition,
    pub created_at: Option<String>,
}

impl TryFrom<ScheduleRow> for AutomationSchedule {
    type Error = StoreError;

    fn try_from(row: ScheduleRow) -> Result<Self, StoreError> {
        let stop = match row.stop_kind.as_str() {
            "results" => StopCondition::ByResults(row.stop_value),
            "attempts" => StopCondition::ByAttempts(row.stop_value),
            other => {
                return Err(StoreError::InvalidRow(format!(
                    "unknown stop_kind '{other}' on schedule {:?}",
                    row.id
                )))
            }
        };
        Ok(AutomationSchedule {
            id: row.id,
            query: row.query,
            desired_count: row.desired_count,
            cadence: row.cadence,
            time_of_day: row.time_of_day,
            start_date: row.start_date,
            enabled: row.enabled,
            auto_save: row.auto_save,
            notify: row.notify,
            stop,
            created_at: row.created_at,
        })
    }
}

impl From<&AutomationSchedule> for ScheduleRow {
    fn from(schedule: &AutomationSchedule) -> Self {
        let (stop_kind, stop_value) = match schedule.stop {
            StopCondition::ByResults(n) => ("results".to_string(), n),
            StopCondition::ByAttempts(n) => ("attempts".to_string(), n),
        };
        ScheduleRow {
            id: schedule.id.clone(),
            query: schedule.query.clone(),
            desired_count: schedule.desired_count,
            cadence: schedule.cadence,
            time_of_day: schedule.time_of_day.clone(),
            start_date: schedule.start_date.clone(),
            enabled: schedule.enabled,
            auto_save: schedule.auto_save,
            notify: schedule.notify,
            stop_kind,
            stop_value,
            created_at: schedule.created_at.clone(),
        }
    }
}

/// Immutable record of one schedule execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleResult {
    #[serde(default)]
    pub id: Option<String>,
    pub schedule_id: String,
    pub ran_at: String,
    pub status: RunStatus,
    pub accounts_found: u32,
    pub accounts_saved: u32,
    pub duration_secs: f64,
    #[serde(default)]
    pub error: Option<String>,
}

impl StoreClient {
    pub async fn list_schedules(&self) -> Result<Vec<AutomationSchedule>, StoreError> {
        let rows: Vec<ScheduleRow> = self
            .select(
                "automation_schedules",
                &[("select", "*"), ("order", "created_at.asc")],
            )
            .await?;
        rows.into_iter().map(AutomationSchedule::try_from).collect()
    }

    pub async fn create_schedule(
        &self,
        schedule: &AutomationSchedule,
    ) -> Result<AutomationSchedule, StoreError> {
        let mut row = ScheduleRow::from(schedule);
        row.id = None;
        row.created_at = None;
        let mut stored: Vec<ScheduleRow> = self.insert("automation_schedules", &row).await?;
        stored
            .pop()
            .ok_or(StoreError::NotFound("automation_schedules"))
            .and_then(AutomationSchedule::try_from)
    }

    /// Flip the enabled flag (pause/resume).
    pub async fn set_schedule_enabled(&self, id: &str, enabled: bool) -> Result<(), StoreError> {
        self.update_by_id(
            "automation_schedules",
            id,
            &serde_json::json!({ "enabled": enabled }),
        )
        .await
    }

    pub async fn delete_schedule(&self, id: &str) -> Result<(), StoreError> {
        self.delete("automation_schedules", &[("id", &format!("eq.{id}"))])
            .await
    }

    /// Append one execution record. Results are never updated or deleted.
    pub async fn record_schedule_result(
        &self,
        result: &ScheduleResult,
    ) -> Result<(), StoreError> {
        let mut row = result.clone();
        row.id = None;
        let _: Vec<ScheduleResult> = self.insert("schedule_results", &row).await?;
        Ok(())
    }

    pub async fn list_schedule_results(
        &self,
        schedule_id: &str,
    ) -> Result<Vec<ScheduleResult>, StoreError> {
        self.select(
            "schedule_results",
            &[
                ("select", "*"),
                ("schedule_id", &format!("eq.{schedule_id}")),
                ("order", "ran_at.desc"),
            ],
        )
        .await
    }
}
