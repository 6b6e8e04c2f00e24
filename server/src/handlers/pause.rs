//! REST handlers for the pause subsystem.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        pause_reason::{CreatePauseReasonPayload, PauseReason, UpdatePauseReasonPayload},
        pause_session::PauseSession,
        queue_member::pjsip_interface,
        PaginationQuery,
    },
    repositories::{
        AgentRepository, PauseReasonRepository, PauseSessionFilter, PauseSessionRepository,
        QueueMemberRepository,
    },
    services::pause::{PauseOutcome, UnpauseOutcome},
    services::pause_scheduler::TimerSnapshot,
    state::AppState,
    utils::time,
    validation::rules,
};

const DEFAULT_HISTORY_LIMIT: i64 = 50;
const MAX_HISTORY_LIMIT: i64 = 500;

/// Presence value served when the extension has no directory row.
const UNKNOWN_PRESENCE: &str = "UNKNOWN";

// ---------------------------------------------------------------------------
// Reason catalog

pub async fn list_pause_reasons(
    State(state): State<AppState>,
) -> Result<Json<Vec<PauseReason>>, AppError> {
    let reasons = PauseReasonRepository::new().list_active(&state.pool).await?;
    Ok(Json(reasons))
}

pub async fn create_pause_reason(
    State(state): State<AppState>,
    Json(payload): Json<CreatePauseReasonPayload>,
) -> Result<(StatusCode, Json<PauseReason>), AppError> {
    payload.validate()?;

    let repo = PauseReasonRepository::new();
    let code = payload.code.to_uppercase();
    if repo.find_by_code(&state.pool, &code).await?.is_some() {
        return Err(AppError::Conflict(
            "Pause reason with this code already exists".to_string(),
        ));
    }

    let reason = repo
        .create(&state.pool, &PauseReason::new(payload, Utc::now()))
        .await?;
    Ok((StatusCode::CREATED, Json(reason)))
}

pub async fn update_pause_reason(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdatePauseReasonPayload>,
) -> Result<Json<PauseReason>, AppError> {
    payload.validate()?;
    let id = parse_reason_id(&id)?;

    let repo = PauseReasonRepository::new();
    let mut reason = repo
        .find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Pause reason not found".to_string()))?;
    reason.apply_update(payload, Utc::now());
    let reason = repo.update(&state.pool, &reason).await?;
    Ok(Json(reason))
}

/// Soft delete: the reason stops resolving for new pauses but stays referenced
/// by historical sessions.
pub async fn delete_pause_reason(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PauseReason>, AppError> {
    let id = parse_reason_id(&id)?;

    let reason = PauseReasonRepository::new()
        .deactivate(&state.pool, id, Utc::now())
        .await?
        .ok_or_else(|| AppError::NotFound("Pause reason not found".to_string()))?;
    Ok(Json(reason))
}

fn parse_reason_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::BadRequest("Invalid pause reason ID".to_string()))
}

// ---------------------------------------------------------------------------
// Pause / unpause

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PauseAgentPayload {
    #[validate(
        length(min = 1, max = 20),
        custom(function = "rules::validate_extension")
    )]
    pub extension: String,
    #[validate(length(min = 1, max = 50))]
    pub reason_code: String,
    /// Optional single queue override; when absent the agent's memberships
    /// decide.
    pub queue_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UnpauseAgentPayload {
    #[validate(
        length(min = 1, max = 20),
        custom(function = "rules::validate_extension")
    )]
    pub extension: String,
    pub queue_name: Option<String>,
}

pub async fn pause_agent(
    State(state): State<AppState>,
    Json(payload): Json<PauseAgentPayload>,
) -> Result<Json<PauseOutcome>, AppError> {
    payload.validate()?;

    let queues = payload.queue_name.map(|queue| vec![queue]);
    let outcome = state
        .coordinator
        .pause(&payload.extension, &payload.reason_code, queues)
        .await?;
    Ok(Json(outcome))
}

pub async fn unpause_agent(
    State(state): State<AppState>,
    Json(payload): Json<UnpauseAgentPayload>,
) -> Result<Json<UnpauseOutcome>, AppError> {
    payload.validate()?;

    let queues = payload.queue_name.map(|queue| vec![queue]);
    let outcome = state
        .coordinator
        .unpause(&payload.extension, queues)
        .await?;
    Ok(Json(outcome))
}

// ---------------------------------------------------------------------------
// Status

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuePauseStatus {
    pub paused: bool,
    pub reason: Option<String>,
}

/// Snapshot across all three stores, for reconciling drift between them.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentPauseStatusResponse {
    pub extension: String,
    /// True if either the session log or the mirror says paused.
    pub is_paused: bool,
    pub presence: String,
    /// Catalog row joined through the open session, when both exist.
    pub pause_reason: Option<PauseReason>,
    /// Reason text as recorded on the mirror row.
    pub pause_reason_code: Option<String>,
    pub pause_start_time: Option<DateTime<Utc>>,
    pub pause_duration_seconds: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_unpause_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_seconds: Option<i64>,
    pub last_presence_update: Option<DateTime<Utc>>,
    pub queue_pause_status: QueuePauseStatus,
}

pub async fn get_agent_pause_status(
    State(state): State<AppState>,
    Path(extension): Path<String>,
) -> Result<Json<AgentPauseStatusResponse>, AppError> {
    let extension = required_extension(&extension)?;

    let open = PauseSessionRepository::new()
        .find_open_by_extension(&state.pool, &extension)
        .await?;
    let agent = AgentRepository::new()
        .find_by_extension(&state.pool, &extension)
        .await?;
    let member = QueueMemberRepository::new()
        .find_first_by_interface(&state.pool, &pjsip_interface(&extension))
        .await?;

    let pause_reason = match open.as_ref().and_then(|session| session.pause_reason_id) {
        Some(id) => PauseReasonRepository::new().find_by_id(&state.pool, id).await?,
        None => None,
    };

    let now = Utc::now();
    let paused_in_mirror = member.as_ref().is_some_and(|m| m.paused);
    let is_paused = open.is_some() || paused_in_mirror;

    Ok(Json(AgentPauseStatusResponse {
        is_paused,
        presence: agent
            .as_ref()
            .map(|a| a.presence.as_str().to_string())
            .unwrap_or_else(|| UNKNOWN_PRESENCE.to_string()),
        pause_reason,
        pause_reason_code: member.as_ref().and_then(|m| m.paused_reason.clone()),
        pause_start_time: open.as_ref().map(|session| session.start_time),
        pause_duration_seconds: open
            .as_ref()
            .map(|session| session.elapsed_seconds(now))
            .unwrap_or(0),
        scheduled_unpause_at: open.as_ref().and_then(|session| session.scheduled_unpause_at),
        remaining_seconds: state.scheduler.remaining_seconds(&extension),
        last_presence_update: agent.as_ref().and_then(|a| a.last_presence_update),
        queue_pause_status: QueuePauseStatus {
            paused: paused_in_mirror,
            reason: member.and_then(|m| m.paused_reason),
        },
        extension,
    }))
}

// ---------------------------------------------------------------------------
// History and audit queries

/// Session row with the catalog entry joined in, mirroring what the session
/// itself captured at pause time plus the current catalog state.
#[derive(Debug, Serialize)]
pub struct PauseSessionView {
    #[serde(flatten)]
    pub session: PauseSession,
    #[serde(rename = "pauseReason", skip_serializing_if = "Option::is_none")]
    pub pause_reason: Option<PauseReason>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PauseHistoryResponse {
    pub extension: String,
    pub pause_logs: Vec<PauseSessionView>,
    /// Sum over the returned rows only; open sessions count as zero.
    pub total_pause_seconds: i64,
    pub total_pause_formatted: String,
    pub count: usize,
}

pub async fn get_agent_pause_history(
    State(state): State<AppState>,
    Path(extension): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<PauseHistoryResponse>, AppError> {
    let extension = required_extension(&extension)?;
    let tz = &state.config.time_zone;

    let filter = PauseSessionFilter {
        extension: Some(extension.clone()),
        start_from: parse_opt(query.start_date.as_deref(), tz)?,
        start_to: parse_opt(query.end_date.as_deref(), tz)?,
    };
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);

    let sessions = PauseSessionRepository::new()
        .list_filtered(&state.pool, &filter, limit, 0)
        .await?;

    let total_pause_seconds = sum_durations(&sessions);
    let count = sessions.len();
    let pause_logs = attach_reasons(&state, sessions).await?;

    Ok(Json(PauseHistoryResponse {
        extension,
        pause_logs,
        total_pause_seconds,
        total_pause_formatted: time::format_duration(total_pause_seconds),
        count,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogsQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub extension: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    pub has_more: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PauseLogsResponse {
    pub pause_logs: Vec<PauseSessionView>,
    pub total_pause_seconds: i64,
    pub total_pause_formatted: String,
    pub pagination: Pagination,
}

pub async fn get_all_pause_logs(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<PauseLogsResponse>, AppError> {
    let tz = &state.config.time_zone;
    let page = PaginationQuery {
        limit: query.limit.unwrap_or(100),
        offset: query.offset.unwrap_or(0),
    };

    let filter = PauseSessionFilter {
        extension: query
            .extension
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_string),
        start_from: parse_opt(query.start_date.as_deref(), tz)?,
        // The audit view is day-granular: any end bound covers its whole
        // local day.
        start_to: query
            .end_date
            .as_deref()
            .map(|raw| parse_end_of_day(raw, tz))
            .transpose()?,
    };

    let repo = PauseSessionRepository::new();
    let sessions = repo
        .list_filtered(&state.pool, &filter, page.limit(), page.offset())
        .await?;
    let total = repo.count_filtered(&state.pool, &filter).await?;

    let total_pause_seconds = sum_durations(&sessions);
    let has_more = page.offset() + (sessions.len() as i64) < total;
    let pause_logs = attach_reasons(&state, sessions).await?;

    Ok(Json(PauseLogsResponse {
        pause_logs,
        total_pause_seconds,
        total_pause_formatted: time::format_duration(total_pause_seconds),
        pagination: Pagination {
            total,
            limit: page.limit(),
            offset: page.offset(),
            has_more,
        },
    }))
}

// ---------------------------------------------------------------------------
// Live views

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PausedAgentView {
    pub extension: String,
    pub pause_reason: Option<PauseReason>,
    pub pause_reason_code: String,
    pub start_time: DateTime<Utc>,
    pub duration_seconds: i64,
    pub duration_formatted: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_unpause_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PausedAgentsResponse {
    pub agents: Vec<PausedAgentView>,
    pub count: usize,
}

/// All open sessions, oldest pause first, with live durations.
pub async fn get_paused_agents(
    State(state): State<AppState>,
) -> Result<Json<PausedAgentsResponse>, AppError> {
    let sessions = PauseSessionRepository::new().list_open(&state.pool).await?;
    let reason_map = load_reason_map(&state, &sessions).await?;

    let now = Utc::now();
    let agents: Vec<PausedAgentView> = sessions
        .into_iter()
        .map(|session| {
            let duration_seconds = session.elapsed_seconds(now);
            PausedAgentView {
                pause_reason: session
                    .pause_reason_id
                    .and_then(|id| reason_map.get(&id).cloned()),
                pause_reason_code: session.pause_reason_code,
                start_time: session.start_time,
                duration_seconds,
                duration_formatted: time::format_duration(duration_seconds),
                scheduled_unpause_at: session.scheduled_unpause_at,
                extension: session.extension,
            }
        })
        .collect();

    let count = agents.len();
    Ok(Json(PausedAgentsResponse { agents, count }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimersResponse {
    pub timers: Vec<TimerSnapshot>,
    pub count: usize,
}

/// Armed auto-unpause timers, for supervisor dashboards and debugging.
pub async fn get_unpause_timers(
    State(state): State<AppState>,
) -> Result<Json<TimersResponse>, AppError> {
    let timers = state.scheduler.snapshot();
    let count = timers.len();
    Ok(Json(TimersResponse { timers, count }))
}

// ---------------------------------------------------------------------------
// Helpers

fn required_extension(raw: &str) -> Result<String, AppError> {
    let extension = raw.trim();
    if extension.is_empty() {
        return Err(AppError::BadRequest("Extension is required".to_string()));
    }
    Ok(extension.to_string())
}

/// Accepts either an RFC 3339 timestamp or a plain date, which is taken as
/// midnight in the configured timezone.
fn parse_point(raw: &str, tz: &Tz) -> Result<DateTime<Utc>, AppError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    raw.parse::<NaiveDate>()
        .map(|date| time::day_start_utc(date, tz))
        .map_err(|_| AppError::BadRequest(format!("Invalid date value: {raw}")))
}

/// Like [`parse_point`] but lands on the last instant of the local day the
/// value falls in.
fn parse_end_of_day(raw: &str, tz: &Tz) -> Result<DateTime<Utc>, AppError> {
    let instant = parse_point(raw, tz)?;
    let local_date = instant.with_timezone(tz).date_naive();
    Ok(time::day_end_utc(local_date, tz))
}

fn parse_opt(raw: Option<&str>, tz: &Tz) -> Result<Option<DateTime<Utc>>, AppError> {
    raw.map(|value| parse_point(value, tz)).transpose()
}

fn sum_durations(sessions: &[PauseSession]) -> i64 {
    sessions
        .iter()
        .map(|session| session.duration_seconds.map(i64::from).unwrap_or(0))
        .sum()
}

async fn load_reason_map(
    state: &AppState,
    sessions: &[PauseSession],
) -> Result<HashMap<Uuid, PauseReason>, AppError> {
    let mut ids: Vec<Uuid> = sessions
        .iter()
        .filter_map(|session| session.pause_reason_id)
        .collect();
    ids.sort_unstable();
    ids.dedup();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let reasons = PauseReasonRepository::new()
        .find_by_ids(&state.pool, &ids)
        .await?;
    Ok(reasons.into_iter().map(|r| (r.id, r)).collect())
}

async fn attach_reasons(
    state: &AppState,
    sessions: Vec<PauseSession>,
) -> Result<Vec<PauseSessionView>, AppError> {
    let reason_map = load_reason_map(state, &sessions).await?;
    Ok(sessions
        .into_iter()
        .map(|session| PauseSessionView {
            pause_reason: session
                .pause_reason_id
                .and_then(|id| reason_map.get(&id).cloned()),
            session,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parse_point_accepts_rfc3339_and_plain_dates() {
        let tz = chrono_tz::UTC;
        let from_ts = parse_point("2025-03-01T10:30:00Z", &tz).unwrap();
        assert_eq!(from_ts, Utc.with_ymd_and_hms(2025, 3, 1, 10, 30, 0).unwrap());

        let from_date = parse_point("2025-03-01", &tz).unwrap();
        assert_eq!(from_date, Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap());

        assert!(parse_point("not-a-date", &tz).is_err());
    }

    #[test]
    fn parse_end_of_day_covers_the_whole_local_day() {
        let tz = chrono_tz::UTC;
        let end = parse_end_of_day("2025-03-01", &tz).unwrap();
        assert_eq!(end.to_rfc3339(), "2025-03-01T23:59:59.999+00:00");

        // A mid-day timestamp still widens to the end of its day.
        let end = parse_end_of_day("2025-03-01T10:30:00Z", &tz).unwrap();
        assert_eq!(end.to_rfc3339(), "2025-03-01T23:59:59.999+00:00");
    }

    #[test]
    fn sum_durations_treats_open_sessions_as_zero() {
        use crate::models::pause_reason::CreatePauseReasonPayload;

        let reason = PauseReason::new(
            CreatePauseReasonPayload {
                code: "BREAK".to_string(),
                label: "Short Break".to_string(),
                description: None,
                color: None,
                icon: None,
                max_duration_minutes: None,
                requires_approval: None,
                sort_order: None,
            },
            Utc::now(),
        );
        let open = PauseSession::new("1001", &reason, &[], Utc::now());
        let mut closed = PauseSession::new("1002", &reason, &[], Utc::now());
        closed.close(Utc::now() + chrono::Duration::seconds(90), false);

        assert_eq!(sum_durations(&[open, closed]), 90);
    }
}
