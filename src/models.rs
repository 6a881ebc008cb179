//! # Database models
//!
//! Data structures that map to the session-store SQLite schema via **Diesel**.
//!
//! - [`Conversation`]: a named chat session.
//! - [`StoredMessage`]: one persisted history message ("human"/"assistant")
//!   within a conversation.
//!
//! The tables are declared in `crate::schema` and created on demand by
//! [`crate::session_store::SessionStore`]; no external migration step is
//! needed.

use diesel::prelude::*;

/// A named chat session.
#[derive(Queryable, Identifiable, Insertable, Debug, Selectable)]
#[diesel(table_name = crate::schema::conversations)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Conversation {
    /// Auto-increment primary key (set by the DB on insert).
    #[diesel(deserialize_as = i32)]
    pub id: Option<i32>,
    /// Unique session name for this conversation.
    pub session_name: String,
}

impl Conversation {
    /// Convenience accessor for the assigned primary key.
    ///
    /// Returns `Some(id)` once the row has been inserted.
    #[inline]
    pub fn id(&self) -> Option<i32> {
        self.id
    }
}

/// One persisted history message.
///
/// `role` holds the speaker tag (`"human"` or `"assistant"`); rows are
/// ordered by primary key, which matches append order.
#[derive(Queryable, Associations, Insertable, Debug, Selectable, Clone)]
#[diesel(belongs_to(Conversation))]
#[diesel(table_name = crate::schema::messages)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct StoredMessage {
    /// Auto-increment primary key (set by the DB on insert).
    #[diesel(deserialize_as = i32)]
    pub id: Option<i32>,
    /// Speaker tag: `"human"` or `"assistant"`.
    pub role: String,
    /// Raw message text.
    pub content: String,
    /// Foreign key to the owning [`Conversation`].
    pub conversation_id: Option<i32>,
}
