//! # Session store
//!
//! Optional durable history: persists the human/assistant message pairs of a
//! named session to SQLite (via Diesel) so a conversation survives process
//! restarts. The engine itself only requires the in-memory
//! [`SessionHistory`](crate::history::SessionHistory); attaching a
//! `SessionStore` is an explicit, injected extension.
//!
//! The store owns one conversation row (looked up or created on open) and
//! appends message rows in turn order. Reload returns at most the history
//! bound's worth of most recent messages, oldest first.

use diesel::prelude::*;
use diesel::sql_query;
use tracing::warn;

use crate::config::establish_connection;
use crate::history::{ChatMessage, Speaker, TurnPair};
use crate::models::{Conversation, StoredMessage};

/// Durable per-session message log backed by SQLite.
pub struct SessionStore {
    connection: SqliteConnection,
    conversation_id: i32,
    session_name: String,
}

impl SessionStore {
    /// Open (or create) the conversation `session_name` in the database at
    /// `db_url`. Creates the schema on first use.
    ///
    /// # Panics
    /// Panics if the SQLite connection cannot be established (mirrors
    /// [`establish_connection`]).
    pub fn open(db_url: &str, session_name: &str) -> Result<Self, diesel::result::Error> {
        let mut connection = establish_connection(db_url);
        create_schema(&mut connection)?;

        let conversation = ensure_conversation(&mut connection, session_name)?;
        let conversation_id = conversation
            .id()
            .expect("inserted conversation has no primary key");

        Ok(Self {
            connection,
            conversation_id,
            session_name: session_name.to_string(),
        })
    }

    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    /// Persist a completed turn as two message rows, in one transaction.
    pub fn append(&mut self, turn: &TurnPair) -> Result<(), diesel::result::Error> {
        let conversation_id = Some(self.conversation_id);
        let rows = [
            StoredMessage {
                id: None,
                role: Speaker::Human.as_str().to_string(),
                content: turn.question.clone(),
                conversation_id,
            },
            StoredMessage {
                id: None,
                role: Speaker::Assistant.as_str().to_string(),
                content: turn.answer.clone(),
                conversation_id,
            },
        ];

        self.connection.transaction(|conn| {
            for row in &rows {
                diesel::insert_into(crate::schema::messages::table)
                    .values(row)
                    .execute(conn)?;
            }
            Ok(())
        })
    }

    /// Load the most recent `limit` messages of this session, oldest first.
    ///
    /// Rows with an unrecognized role tag are skipped with a warning rather
    /// than failing the whole reload.
    pub fn load(&mut self, limit: usize) -> Result<Vec<ChatMessage>, diesel::result::Error> {
        use crate::schema::messages;

        let rows: Vec<StoredMessage> = messages::table
            .filter(messages::conversation_id.eq(Some(self.conversation_id)))
            .order(messages::id.asc())
            .load(&mut self.connection)?;

        let mut history: Vec<ChatMessage> = rows
            .into_iter()
            .filter_map(|row| match Speaker::parse(&row.role) {
                Some(speaker) => Some(ChatMessage {
                    speaker,
                    content: row.content,
                }),
                None => {
                    warn!("skipping persisted message with unknown role {:?}", row.role);
                    None
                }
            })
            .collect();

        if history.len() > limit {
            let excess = history.len() - limit;
            history.drain(..excess);
        }
        Ok(history)
    }

    /// Delete every persisted message of this session.
    pub fn clear(&mut self) -> Result<usize, diesel::result::Error> {
        use crate::schema::messages;

        diesel::delete(
            messages::table.filter(messages::conversation_id.eq(Some(self.conversation_id))),
        )
        .execute(&mut self.connection)
    }
}

fn create_schema(connection: &mut SqliteConnection) -> Result<(), diesel::result::Error> {
    sql_query(
        "CREATE TABLE IF NOT EXISTS conversations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_name TEXT NOT NULL UNIQUE
        )",
    )
    .execute(connection)?;
    sql_query(
        "CREATE TABLE IF NOT EXISTS messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            role TEXT NOT NULL,
            content TEXT NOT NULL,
            conversation_id INTEGER REFERENCES conversations (id)
        )",
    )
    .execute(connection)?;
    Ok(())
}

/// Look up the conversation by name, creating it if missing.
fn ensure_conversation(
    connection: &mut SqliteConnection,
    a_session_name: &str,
) -> Result<Conversation, diesel::result::Error> {
    connection.transaction(|conn| {
        let existing: Option<Conversation> = crate::schema::conversations::table
            .filter(crate::schema::conversations::session_name.eq(a_session_name))
            .first(conn)
            .optional()?;

        match existing {
            Some(conversation) => Ok(conversation),
            None => {
                let new_conversation = Conversation {
                    id: None,
                    session_name: a_session_name.to_string(),
                };
                diesel::insert_into(crate::schema::conversations::table)
                    .values(&new_conversation)
                    .returning(Conversation::as_returning())
                    .get_result(conn)
            }
        }
    })
}
