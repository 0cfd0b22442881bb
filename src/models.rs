use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    #[default]
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::InProgress => "In Progress",
            Self::Completed => "Completed",
            Self::Cancelled => "Cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "pending" => Some(Self::Pending),
            "in-progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    #[default]
    General,
    Work,
    Personal,
    Health,
    Education,
    Family,
    Travel,
    Shopping,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Work => "work",
            Self::Personal => "personal",
            Self::Health => "health",
            Self::Education => "education",
            Self::Family => "family",
            Self::Travel => "travel",
            Self::Shopping => "shopping",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "general" => Some(Self::General),
            "work" => Some(Self::Work),
            "personal" => Some(Self::Personal),
            "health" => Some(Self::Health),
            "education" => Some(Self::Education),
            "family" => Some(Self::Family),
            "travel" => Some(Self::Travel),
            "shopping" => Some(Self::Shopping),
            _ => None,
        }
    }
}

/// A user-owned, time-boxed task record as held by the engine.
///
/// `id`, `created_at` and `updated_at` are assigned by the remote store;
/// `owner_id` is fixed at creation from the signed-in session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub description: String,
    pub date: String,
    pub time: String,
    pub priority: Priority,
    pub status: Status,
    pub category: Category,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Schedule {
    /// Overdue is derived, never stored: the date parses, lies strictly
    /// before `today`, and the schedule is not completed.
    pub fn is_overdue_on(&self, today: NaiveDate) -> bool {
        if self.status == Status::Completed {
            return false;
        }
        match NaiveDate::parse_from_str(&self.date, "%Y-%m-%d") {
            Ok(date) => date < today,
            Err(_) => false,
        }
    }

    pub fn is_overdue(&self) -> bool {
        self.is_overdue_on(chrono::Local::now().date_naive())
    }
}

/// Field set accepted by add/update before the store has assigned
/// identity or timestamps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScheduleDraft {
    pub title: String,
    pub description: String,
    pub date: String,
    pub time: String,
    pub priority: Priority,
    pub status: Status,
    pub category: Category,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoadState {
    Idle,
    Loading,
    Loaded,
    Failed,
}

/// Read-only projection consumed by the presentation layer. `schedules`
/// is the filtered list; `total` counts the raw list behind it.
#[derive(Debug, Clone)]
pub struct ScheduleView {
    pub load: LoadState,
    pub schedules: Vec<Schedule>,
    pub total: usize,
    pub error: Option<String>,
}

impl ScheduleView {
    pub fn idle() -> Self {
        Self {
            load: LoadState::Idle,
            schedules: Vec::new(),
            total: 0,
            error: None,
        }
    }
}

/// What a patch or remove against an id the store no longer holds should
/// do: swallow it (the stores observed in production behave this way) or
/// surface a remote error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissingTargetPolicy {
    Accept,
    Reject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppSettings {
    pub collection: String,
    pub missing_target: MissingTargetPolicy,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            collection: "schedules".to_string(),
            missing_target: MissingTargetPolicy::Accept,
        }
    }
}

impl AppSettings {
    /// Reads settings from a JSON file. Absent fields fall back to
    /// their defaults, so a partial file is fine.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings file {}", path.display()))?;
        let settings = serde_json::from_str(&raw)
            .with_context(|| format!("parsing settings file {}", path.display()))?;
        Ok(settings)
    }
}
