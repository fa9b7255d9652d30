//! Blueprint catalog: global categories and task templates.
//!
//! # Invariants
//! - A template belongs to exactly one category.
//! - `period` is an opaque schedule label; core never parses it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub type CategoryId = Uuid;
pub type TemplateId = Uuid;

/// Node in the account-wide classification tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalCategory {
    pub id: CategoryId,
    pub parent_category_id: Option<CategoryId>,
    pub name: String,
    pub archived_at: Option<i64>,
}

impl GlobalCategory {
    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }
}

/// Reusable maintenance task blueprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskTemplate {
    pub id: TemplateId,
    pub global_category_id: CategoryId,
    pub name: String,
    pub description: Option<String>,
    pub period: Option<String>,
    pub metadata: Option<Value>,
    pub archived_at: Option<i64>,
}

impl TaskTemplate {
    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }
}
