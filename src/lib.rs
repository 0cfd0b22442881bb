pub mod adapters;
pub mod engine;
pub mod errors;
pub mod intents;
pub mod models;
pub mod repository;
pub mod session;
pub mod validators;

pub use engine::ScheduleEngine;
pub use errors::{AppError, AppResult, AuthError};
pub use models::{
    AppSettings, Category, LoadState, MissingTargetPolicy, Priority, Schedule, ScheduleDraft,
    ScheduleView, Status,
};
pub use repository::ScheduleRepository;
pub use session::{Session, SessionState};
