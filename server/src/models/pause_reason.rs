//! Pause reason catalog: the administrable list of reasons an agent can be
//! paused with, including the optional auto-unpause bound.

use crate::validation::rules;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
/// Catalog entry describing one pause reason.
pub struct PauseReason {
    /// Unique identifier.
    pub id: Uuid,
    /// Stable uppercase code (e.g. `BREAK`, `LUNCH`).
    pub code: String,
    /// Display label shown in agent UIs and forwarded to the PBX.
    pub label: String,
    pub description: Option<String>,
    /// Color code for UI display.
    pub color: Option<String>,
    /// Icon name for UI display.
    pub icon: Option<String>,
    /// Auto-unpause bound in minutes. `None` or a non-positive value means
    /// the pause runs until the agent unpauses manually.
    pub max_duration_minutes: Option<i32>,
    pub requires_approval: bool,
    /// Soft-delete flag; inactive reasons are hidden and unselectable.
    pub is_active: bool,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PauseReason {
    /// Builds a catalog row from a create payload, normalizing the code to
    /// uppercase and filling the UI defaults.
    pub fn new(payload: CreatePauseReasonPayload, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            code: payload.code.trim().to_uppercase(),
            label: payload.label,
            description: payload.description,
            color: payload.color.or_else(|| Some("#ff9800".to_string())),
            icon: payload.icon.or_else(|| Some("pause".to_string())),
            max_duration_minutes: payload.max_duration_minutes,
            requires_approval: payload.requires_approval.unwrap_or(false),
            is_active: true,
            sort_order: payload.sort_order.unwrap_or(0),
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies the provided fields of an update payload. Absent fields stay
    /// unchanged.
    pub fn apply_update(&mut self, payload: UpdatePauseReasonPayload, now: DateTime<Utc>) {
        if let Some(label) = payload.label {
            self.label = label;
        }
        if let Some(description) = payload.description {
            self.description = Some(description);
        }
        if let Some(color) = payload.color {
            self.color = Some(color);
        }
        if let Some(icon) = payload.icon {
            self.icon = Some(icon);
        }
        if let Some(minutes) = payload.max_duration_minutes {
            self.max_duration_minutes = Some(minutes);
        }
        if let Some(requires_approval) = payload.requires_approval {
            self.requires_approval = requires_approval;
        }
        if let Some(is_active) = payload.is_active {
            self.is_active = is_active;
        }
        if let Some(sort_order) = payload.sort_order {
            self.sort_order = sort_order;
        }
        self.updated_at = now;
    }

    /// Returns `true` when the reason carries a positive auto-unpause bound.
    pub fn is_bounded(&self) -> bool {
        self.max_duration_minutes.is_some_and(|m| m > 0)
    }

    /// The auto-unpause bound as a duration, if one is set.
    pub fn max_duration(&self) -> Option<ChronoDuration> {
        self.max_duration_minutes
            .filter(|m| *m > 0)
            .map(|m| ChronoDuration::minutes(i64::from(m)))
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePauseReasonPayload {
    #[validate(
        length(min = 1, max = 50),
        custom(function = "rules::validate_reason_code")
    )]
    pub code: String,
    #[validate(length(min = 1, max = 100))]
    pub label: String,
    #[validate(length(max = 255))]
    pub description: Option<String>,
    #[validate(length(max = 20))]
    pub color: Option<String>,
    #[validate(length(max = 50))]
    pub icon: Option<String>,
    /// Zero disables the bound; the pause then never auto-unpauses.
    #[validate(range(min = 0, max = 1440))]
    pub max_duration_minutes: Option<i32>,
    pub requires_approval: Option<bool>,
    pub sort_order: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePauseReasonPayload {
    #[validate(length(min = 1, max = 100))]
    pub label: Option<String>,
    #[validate(length(max = 255))]
    pub description: Option<String>,
    #[validate(length(max = 20))]
    pub color: Option<String>,
    #[validate(length(max = 50))]
    pub icon: Option<String>,
    #[validate(range(min = 0, max = 1440))]
    pub max_duration_minutes: Option<i32>,
    pub requires_approval: Option<bool>,
    pub is_active: Option<bool>,
    pub sort_order: Option<i32>,
}

/// One row of the built-in catalog seeded at startup.
pub struct SeedReason {
    pub code: &'static str,
    pub label: &'static str,
    pub description: &'static str,
    pub color: &'static str,
    pub icon: &'static str,
    pub max_duration_minutes: Option<i32>,
    pub sort_order: i32,
}

/// Default catalog inserted on first boot. Existing codes are left untouched
/// so operator edits survive restarts.
pub const DEFAULT_PAUSE_REASONS: &[SeedReason] = &[
    SeedReason {
        code: "BREAK",
        label: "Short Break",
        description: "Quick personal break",
        color: "#ff9800",
        icon: "coffee",
        max_duration_minutes: Some(5),
        sort_order: 1,
    },
    SeedReason {
        code: "LUNCH",
        label: "Lunch Break",
        description: "Lunch time break",
        color: "#4caf50",
        icon: "restaurant",
        max_duration_minutes: Some(60),
        sort_order: 2,
    },
    SeedReason {
        code: "MEETING",
        label: "In Meeting",
        description: "Attending a meeting",
        color: "#2196f3",
        icon: "groups",
        max_duration_minutes: Some(120),
        sort_order: 3,
    },
    SeedReason {
        code: "TRAINING",
        label: "Training",
        description: "Training session",
        color: "#9c27b0",
        icon: "school",
        max_duration_minutes: Some(180),
        sort_order: 4,
    },
    SeedReason {
        code: "PERSONAL",
        label: "Personal Time",
        description: "Personal matters",
        color: "#e91e63",
        icon: "person",
        max_duration_minutes: Some(30),
        sort_order: 5,
    },
    SeedReason {
        code: "TECHNICAL",
        label: "Technical Issue",
        description: "Resolving technical problems",
        color: "#f44336",
        icon: "build",
        max_duration_minutes: None,
        sort_order: 6,
    },
    SeedReason {
        code: "COACHING",
        label: "Coaching Session",
        description: "One-on-one coaching",
        color: "#00bcd4",
        icon: "support_agent",
        max_duration_minutes: Some(60),
        sort_order: 7,
    },
    SeedReason {
        code: "OTHER",
        label: "Other",
        description: "Other reason",
        color: "#607d8b",
        icon: "more_horiz",
        max_duration_minutes: None,
        sort_order: 99,
    },
];
