//! Status helper enums mapping to SMALLINT lookup tables.
//!
//! Each enum variant's discriminant matches the seed data order (1-based)
//! in the corresponding `*_statuses` database table, and its label matches
//! the `name` column of that table.

use serde::{Serialize, Serializer};

/// Status ID type matching SMALLINT/SMALLSERIAL in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:literal => $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }

            /// Resolve a database status ID back to the enum.
            pub fn from_id(id: StatusId) -> Option<Self> {
                match id {
                    $( $val => Some(Self::$variant), )+
                    _ => None,
                }
            }

            /// The lookup-table name of this status.
            pub fn as_str(self) -> &'static str {
                match self {
                    $( Self::$variant => $label, )+
                }
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }
    };
}

define_status_enum! {
    /// Per-student-per-course enrollment status.
    EnrollmentStatus {
        Enrolled = 1 => "enrolled",
        NotEnrolled = 2 => "not_enrolled",
    }
}

define_status_enum! {
    /// Order lifecycle status.
    OrderStatus {
        Pending = 1 => "pending",
        AwaitingPayment = 2 => "awaiting_payment",
        Processing = 3 => "processing",
        Completed = 4 => "completed",
        Failed = 5 => "failed",
    }
}

impl OrderStatus {
    /// Whether no further transition is allowed out of this status.
    ///
    /// `failed` is not terminal: an approved payment arriving after an order
    /// was written off still completes it.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Whether an order may move from `self` to `next`.
    ///
    /// ```text
    /// pending          -> awaiting_payment | completed
    /// awaiting_payment -> processing | completed | failed
    /// processing       -> completed | failed
    /// failed           -> completed
    /// ```
    pub fn can_transition_to(self, next: Self) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, AwaitingPayment)
                | (Pending, Completed)
                | (AwaitingPayment, Processing)
                | (AwaitingPayment, Completed)
                | (AwaitingPayment, Failed)
                | (Processing, Completed)
                | (Processing, Failed)
                | (Failed, Completed)
        )
    }

    /// All statuses from which `target` is reachable in one step.
    ///
    /// Used to express a guarded transition as a single
    /// `UPDATE ... WHERE status_id = ANY(...)` statement.
    pub fn allowed_sources(target: Self) -> Vec<StatusId> {
        Self::ALL
            .iter()
            .copied()
            .filter(|s| s.can_transition_to(target))
            .map(Self::id)
            .collect()
    }

    const ALL: [Self; 5] = [
        Self::Pending,
        Self::AwaitingPayment,
        Self::Processing,
        Self::Completed,
        Self::Failed,
    ];
}
