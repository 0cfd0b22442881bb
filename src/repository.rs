use crate::adapters::{Document, RemoteStore};
use crate::errors::{AppError, AppResult};
use crate::models::{
    AppSettings, Category, MissingTargetPolicy, Priority, Schedule, ScheduleDraft, Status,
};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::sync::Arc;

/// The only component that talks to the remote store. Owns no state
/// beyond its configuration; tolerant decoding of external documents
/// happens here so the engine only ever sees the strict model.
pub struct ScheduleRepository {
    store: Arc<dyn RemoteStore>,
    collection: String,
    missing_target: MissingTargetPolicy,
}

impl ScheduleRepository {
    pub fn new(store: Arc<dyn RemoteStore>, settings: &AppSettings) -> Self {
        Self {
            store,
            collection: settings.collection.clone(),
            missing_target: settings.missing_target,
        }
    }

    /// Fetches the owner's records, newest first by `createdAt`. Records
    /// missing optional fields decode to their documented defaults; a
    /// missing or unreadable `createdAt` becomes "now at read time".
    pub async fn fetch_by_owner(&self, owner_id: &str) -> AppResult<Vec<Schedule>> {
        let documents = self.store.query(&self.collection, owner_id).await?;
        let read_at = Utc::now();

        let mut schedules: Vec<Schedule> = documents
            .into_iter()
            .map(|doc| decode(doc, owner_id, read_at))
            .collect();
        schedules.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(schedules)
    }

    /// Returns the id the store assigned. Timestamps are assigned by the
    /// store, never sent from here.
    pub async fn create(&self, draft: &ScheduleDraft, owner_id: &str) -> AppResult<String> {
        self.store
            .insert(&self.collection, encode_fields(draft, Some(owner_id)))
            .await
    }

    pub async fn update_fields(&self, id: &str, fields: Value) -> AppResult<()> {
        let applied = self.store.patch(&self.collection, id, fields).await?;
        if !applied {
            return self.on_missing_target(id, "patch");
        }
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> AppResult<()> {
        let removed = self.store.remove(&self.collection, id).await?;
        if !removed {
            return self.on_missing_target(id, "delete");
        }
        Ok(())
    }

    fn on_missing_target(&self, id: &str, operation: &str) -> AppResult<()> {
        match self.missing_target {
            MissingTargetPolicy::Accept => {
                tracing::debug!(id, operation, "target missing; accepted as no-op");
                Ok(())
            }
            MissingTargetPolicy::Reject => Err(AppError::Remote(format!(
                "{} target '{}' does not exist",
                operation, id
            ))),
        }
    }
}

/// Field set sent to the store for create and full update. `owner_id`
/// is only attached at creation; it is never reassigned afterwards.
pub fn encode_fields(draft: &ScheduleDraft, owner_id: Option<&str>) -> Value {
    let mut fields = json!({
        "title": draft.title,
        "description": draft.description,
        "date": draft.date,
        "time": draft.time,
        "priority": draft.priority.as_str(),
        "status": draft.status.as_str(),
        "category": draft.category.as_str(),
    });
    if let Some(owner_id) = owner_id {
        fields["ownerId"] = Value::String(owner_id.to_string());
    }
    fields
}

fn decode(doc: Document, owner_id: &str, read_at: DateTime<Utc>) -> Schedule {
    let fields = &doc.fields;
    let created_at = timestamp_field(fields, "createdAt").unwrap_or(read_at);
    Schedule {
        id: doc.id,
        owner_id: str_field(fields, "ownerId").unwrap_or_else(|| owner_id.to_string()),
        title: str_field(fields, "title").unwrap_or_default(),
        description: str_field(fields, "description").unwrap_or_default(),
        date: str_field(fields, "date").unwrap_or_default(),
        time: str_field(fields, "time").unwrap_or_default(),
        priority: enum_field(fields, "priority", Priority::parse),
        status: enum_field(fields, "status", Status::parse),
        category: enum_field(fields, "category", Category::parse),
        created_at,
        updated_at: timestamp_field(fields, "updatedAt").unwrap_or(created_at),
    }
}

fn str_field(fields: &Value, key: &str) -> Option<String> {
    fields.get(key).and_then(Value::as_str).map(str::to_string)
}

fn enum_field<T: Default>(fields: &Value, key: &str, parse: fn(&str) -> Option<T>) -> T {
    fields
        .get(key)
        .and_then(Value::as_str)
        .and_then(parse)
        .unwrap_or_default()
}

fn timestamp_field(fields: &Value, key: &str) -> Option<DateTime<Utc>> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|parsed| parsed.with_timezone(&Utc))
}
