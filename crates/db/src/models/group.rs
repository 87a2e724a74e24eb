//! Group, membership and group-course link models.

use campus_core::enrollment::EntitlingLink;
use campus_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `groups` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Group {
    pub id: DbId,
    pub name: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A row from the `group_members` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct GroupMember {
    pub id: DbId,
    pub group_id: DbId,
    pub user_id: DbId,
    pub added_by: Option<DbId>,
    pub created_at: Timestamp,
}

/// A row from the `group_courses` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct GroupCourse {
    pub id: DbId,
    pub group_id: DbId,
    pub course_id: DbId,
    pub is_mandatory: bool,
    pub due_date: Option<Timestamp>,
    pub enrolled_by: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Metadata carried by a group-course link.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LinkCourse {
    #[serde(default)]
    pub is_mandatory: bool,
    pub due_date: Option<Timestamp>,
}

/// A link that entitles one student to one course through a group.
#[derive(Debug, Clone, FromRow)]
pub struct EntitlingLinkRow {
    pub group_id: DbId,
    pub link_id: DbId,
    pub linked_at: Timestamp,
}

impl From<EntitlingLinkRow> for EntitlingLink {
    fn from(row: EntitlingLinkRow) -> Self {
        EntitlingLink {
            group_id: row.group_id,
            link_id: row.link_id,
            linked_at: row.linked_at,
        }
    }
}
