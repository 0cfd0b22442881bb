use crate::engine::ScheduleEngine;
use crate::errors::AppResult;
use crate::models::{Priority, ScheduleDraft, ScheduleView, Status};
use crate::session::Session;

/// Everything the presentation layer can ask for, one variant per
/// operation on the engine or session.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    Search(String),
    FilterStatus(Option<Status>),
    FilterPriority(Option<Priority>),
    Refresh,
    List,
    Add(ScheduleDraft),
    Update { id: String, draft: ScheduleDraft },
    Complete(String),
    Remove(String),
    SignUp { email: String, password: String },
    SignIn { email: String, password: String },
    SignOut,
    Help,
    Quit,
}

pub fn parse(line: &str) -> Result<Intent, String> {
    let line = line.trim();
    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };

    match command {
        "help" => Ok(Intent::Help),
        "quit" | "exit" => Ok(Intent::Quit),
        "list" => Ok(Intent::List),
        "refresh" => Ok(Intent::Refresh),
        "search" => Ok(Intent::Search(rest.to_string())),
        "status" => match rest {
            "all" => Ok(Intent::FilterStatus(None)),
            value => Status::parse(value)
                .map(|status| Intent::FilterStatus(Some(status)))
                .ok_or_else(|| format!("unknown status '{}'", value)),
        },
        "priority" => match rest {
            "all" => Ok(Intent::FilterPriority(None)),
            value => Priority::parse(value)
                .map(|priority| Intent::FilterPriority(Some(priority)))
                .ok_or_else(|| format!("unknown priority '{}'", value)),
        },
        "add" => Ok(Intent::Add(parse_draft(rest)?)),
        "update" => {
            let (id, fields) = rest
                .split_once(char::is_whitespace)
                .ok_or_else(|| "usage: update <id> key=value|key=value".to_string())?;
            Ok(Intent::Update {
                id: id.to_string(),
                draft: parse_draft(fields.trim())?,
            })
        }
        "done" | "complete" => require_id(rest, command).map(Intent::Complete),
        "rm" | "remove" => require_id(rest, command).map(Intent::Remove),
        "signup" => parse_credentials(rest, "signup")
            .map(|(email, password)| Intent::SignUp { email, password }),
        "signin" | "login" => parse_credentials(rest, "signin")
            .map(|(email, password)| Intent::SignIn { email, password }),
        "signout" | "logout" => Ok(Intent::SignOut),
        other => Err(format!("unknown command '{}'; try 'help'", other)),
    }
}

/// `key=value` segments separated by `|`, so values may contain spaces:
/// `add title=Gym session|date=2024-06-01|priority=high`.
fn parse_draft(input: &str) -> Result<ScheduleDraft, String> {
    if input.is_empty() {
        return Err("expected key=value pairs separated by '|'".to_string());
    }

    let mut draft = ScheduleDraft::default();
    for segment in input.split('|') {
        let (key, value) = segment
            .split_once('=')
            .ok_or_else(|| format!("expected key=value, got '{}'", segment.trim()))?;
        let value = value.trim();
        match key.trim() {
            "title" => draft.title = value.to_string(),
            "desc" | "description" => draft.description = value.to_string(),
            "date" => draft.date = value.to_string(),
            "time" => draft.time = value.to_string(),
            "priority" => {
                draft.priority = Priority::parse(value)
                    .ok_or_else(|| format!("unknown priority '{}'", value))?;
            }
            "status" => {
                draft.status = Status::parse(value)
                    .ok_or_else(|| format!("unknown status '{}'", value))?;
            }
            "category" => {
                draft.category = crate::models::Category::parse(value)
                    .ok_or_else(|| format!("unknown category '{}'", value))?;
            }
            other => return Err(format!("unknown field '{}'", other)),
        }
    }
    Ok(draft)
}

fn require_id(rest: &str, command: &str) -> Result<String, String> {
    if rest.is_empty() {
        return Err(format!("usage: {} <id>", command));
    }
    Ok(rest.to_string())
}

fn parse_credentials(rest: &str, command: &str) -> Result<(String, String), String> {
    let mut parts = rest.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(email), Some(password), None) => Ok((email.to_string(), password.to_string())),
        _ => Err(format!("usage: {} <email> <password>", command)),
    }
}

/// Applies an intent to the core and produces the line to show back.
/// Sign-in and sign-out wait for the session to reflect the provider's
/// notification before refreshing, so the engine always fetches (or
/// clears) against the settled identity.
pub async fn dispatch(
    intent: Intent,
    session: &Session,
    engine: &ScheduleEngine,
) -> AppResult<String> {
    match intent {
        Intent::Search(text) => {
            engine.set_search_text(text);
            Ok(match_count(&engine.snapshot()))
        }
        Intent::FilterStatus(filter) => {
            engine.set_status_filter(filter);
            Ok(match_count(&engine.snapshot()))
        }
        Intent::FilterPriority(filter) => {
            engine.set_priority_filter(filter);
            Ok(match_count(&engine.snapshot()))
        }
        Intent::Refresh => {
            engine.refresh().await?;
            Ok(match_count(&engine.snapshot()))
        }
        Intent::List => Ok(render(&engine.snapshot())),
        Intent::Add(draft) => {
            let id = engine.add_schedule(draft).await?;
            Ok(format!("created {}", id))
        }
        Intent::Update { id, draft } => {
            engine.update_schedule(&id, draft).await?;
            Ok(format!("updated {}", id))
        }
        Intent::Complete(id) => {
            engine.mark_completed(&id).await?;
            Ok(format!("completed {}", id))
        }
        Intent::Remove(id) => {
            engine.delete_schedule(&id).await?;
            Ok(format!("deleted {}", id))
        }
        Intent::SignUp { email, password } => {
            session.sign_up(&email, &password).await?;
            settle_signed_in(session).await;
            engine.refresh().await?;
            Ok("account created, signed in".to_string())
        }
        Intent::SignIn { email, password } => {
            session.sign_in(&email, &password).await?;
            settle_signed_in(session).await;
            engine.refresh().await?;
            Ok("signed in".to_string())
        }
        Intent::SignOut => {
            session.sign_out().await?;
            let mut updates = session.subscribe();
            let _ = updates.wait_for(|state| state.user_id.is_none()).await;
            engine.refresh().await?;
            Ok("signed out".to_string())
        }
        Intent::Help => Ok(usage().to_string()),
        Intent::Quit => Ok("bye".to_string()),
    }
}

async fn settle_signed_in(session: &Session) {
    let mut updates = session.subscribe();
    let _ = updates.wait_for(|state| state.user_id.is_some()).await;
}

fn match_count(view: &ScheduleView) -> String {
    format!("{} of {} schedules", view.schedules.len(), view.total)
}

fn render(view: &ScheduleView) -> String {
    if let Some(error) = &view.error {
        return format!("last load failed: {}", error);
    }
    if view.schedules.is_empty() {
        return "no schedules found".to_string();
    }

    let mut lines = Vec::with_capacity(view.schedules.len());
    for schedule in &view.schedules {
        let mut line = format!(
            "{}  [{}] {}  {} {}  {}/{}",
            schedule.id,
            schedule.priority.label(),
            schedule.title,
            if schedule.date.is_empty() { "no date" } else { schedule.date.as_str() },
            schedule.time,
            schedule.status.label(),
            schedule.category.as_str(),
        );
        if schedule.is_overdue() {
            line.push_str("  OVERDUE");
        }
        lines.push(line);
    }
    lines.join("\n")
}

fn usage() -> &'static str {
    "commands:\n  \
     signup <email> <password>\n  \
     signin <email> <password>\n  \
     signout\n  \
     list | refresh\n  \
     search <text>\n  \
     status all|pending|in-progress|completed|cancelled\n  \
     priority all|low|medium|high\n  \
     add title=...|date=YYYY-MM-DD[|time=HH:MM|desc=...|priority=...|status=...|category=...]\n  \
     update <id> key=value|key=value\n  \
     done <id> | rm <id>\n  \
     quit"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;

    #[test]
    fn parses_add_with_piped_fields() {
        let intent = parse("add title=Gym session|date=2024-06-01|time=07:30|priority=high|category=health")
            .unwrap();
        let Intent::Add(draft) = intent else {
            panic!("expected add intent");
        };
        assert_eq!(draft.title, "Gym session");
        assert_eq!(draft.date, "2024-06-01");
        assert_eq!(draft.time, "07:30");
        assert_eq!(draft.priority, Priority::High);
        assert_eq!(draft.category, Category::Health);
        assert_eq!(draft.status, Status::Pending);
    }

    #[test]
    fn parses_filters_including_all() {
        assert_eq!(parse("status all").unwrap(), Intent::FilterStatus(None));
        assert_eq!(
            parse("status in-progress").unwrap(),
            Intent::FilterStatus(Some(Status::InProgress))
        );
        assert_eq!(
            parse("priority high").unwrap(),
            Intent::FilterPriority(Some(Priority::High))
        );
        assert!(parse("status someday").is_err());
    }

    #[test]
    fn parses_update_and_mutation_commands() {
        let intent = parse("update abc123 title=New title|date=2024-07-01").unwrap();
        let Intent::Update { id, draft } = intent else {
            panic!("expected update intent");
        };
        assert_eq!(id, "abc123");
        assert_eq!(draft.title, "New title");

        assert_eq!(parse("done abc").unwrap(), Intent::Complete("abc".to_string()));
        assert_eq!(parse("rm abc").unwrap(), Intent::Remove("abc".to_string()));
        assert!(parse("done").is_err());
    }

    #[test]
    fn rejects_unknown_commands_and_fields() {
        assert!(parse("frobnicate").is_err());
        assert!(parse("add title=x|color=red").is_err());
        assert!(parse("add notpairs").is_err());
        assert!(parse("signup only-email").is_err());
    }

    #[test]
    fn search_with_no_argument_clears_the_search() {
        assert_eq!(parse("search").unwrap(), Intent::Search(String::new()));
        assert_eq!(
            parse("search gym time").unwrap(),
            Intent::Search("gym time".to_string())
        );
    }
}
