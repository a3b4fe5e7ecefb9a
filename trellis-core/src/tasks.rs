//! Task and user helpers for the task tracker.

use serde_json::Value as JsonValue;

use crate::model::Entity;
use crate::query::{Facet, QuerySchema, Search};
use crate::reactive::Collection;

/// URL root tasks are persisted under.
pub const TASKS_URL: &str = "/tasks";

/// Field holding a task's assigned users.
pub const ASSIGNED_USERS: &str = "assigned_users";

/// Search categories offered for tasks: title, assignee email, completion.
pub fn schema() -> QuerySchema {
    QuerySchema::new(vec![
        Facet::text("title", "title"),
        Facet::related("assignees", ASSIGNED_USERS, "email"),
        Facet::boolean("completed", "complete"),
    ])
    .unwrap_or_default()
}

/// A new, unsaved task.
pub fn new_task() -> Entity {
    Entity::new().with_url_root(TASKS_URL)
}

/// Load the task list the page was bootstrapped with.
pub fn load(json: JsonValue) -> Collection {
    let tasks = match json {
        JsonValue::Array(items) => items
            .into_iter()
            .filter_map(Entity::from_json)
            .map(|task| task.with_url_root(TASKS_URL))
            .collect(),
        _ => Vec::new(),
    };
    Collection::with_entities(tasks)
}

pub fn is_complete(task: &Entity) -> bool {
    task.get_bool("complete").unwrap_or(false)
}

/// Users assigned to a task. Empty for tasks without assignees.
pub fn assigned_users(task: &Entity) -> Collection {
    task.relation(ASSIGNED_USERS).unwrap_or_default()
}

pub fn find_by_email(users: &Collection, email: &str) -> Option<Entity> {
    users.find(|user| user.get_str("email").as_deref() == Some(email))
}

/// Search box over `tasks` using the task schema.
pub fn search(tasks: &Collection) -> Search {
    Search::new(tasks.clone(), schema())
}
