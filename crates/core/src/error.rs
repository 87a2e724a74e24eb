use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),

    /// The cart (or the requested item list) had nothing to check out.
    #[error("Cart is empty")]
    EmptyCart,

    /// A free checkout was requested but no cart item qualifies as free.
    #[error("No free items in cart")]
    NoFreeItems,

    /// The student is already enrolled in the listed courses.
    #[error("Already enrolled in courses {course_ids:?}")]
    AlreadyEnrolled { course_ids: Vec<DbId> },

    /// An explicit bulk enrollment named students who are already enrolled.
    #[error("Students already enrolled: {user_ids:?}")]
    StudentsAlreadyEnrolled { user_ids: Vec<DbId> },

    /// None of the requested course links exist for the group.
    #[error("Group {group_id} is not linked to any of the requested courses")]
    NotLinked { group_id: DbId },
}
