use crate::Database;
use crate::models::{
    ConversationSummaryRow, FriendRequestRow, FriendRow, MessageRow, PendingRequestRow,
    SettleOutcome, TransactionRow, TransferOutcome, UserRow,
};
use anyhow::{Result, bail};
use rusqlite::{Connection, OptionalExtension, params};
use wren_types::events::MessageKind;

/// Which side of the ledger to list for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionFilter {
    All,
    Sent,
    Received,
}

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        username: &str,
        email: Option<&str>,
        first_name: &str,
        last_name: &str,
        opening_balance: f64,
    ) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (username, email, first_name, last_name, balance)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![username, email, first_name, last_name, opening_balance],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Resolve a user by username or email — the friend-request form
    /// accepts either.
    pub fn find_user_by_handle(&self, handle: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            query_user(
                conn,
                "SELECT id, username, email, first_name, last_name, balance, is_online, created_at
                 FROM users WHERE username = ?1 OR email = ?1",
                params![handle],
            )
        })
    }

    pub fn get_user(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            query_user(
                conn,
                "SELECT id, username, email, first_name, last_name, balance, is_online, created_at
                 FROM users WHERE id = ?1",
                params![id],
            )
        })
    }

    /// Snapshot balance read. Never used for mutation decisions — the
    /// transfer path re-checks inside its own transaction.
    pub fn balance_of(&self, user_id: i64) -> Result<Option<f64>> {
        self.with_conn(|conn| {
            let balance = conn
                .query_row(
                    "SELECT balance FROM users WHERE id = ?1",
                    [user_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(balance)
        })
    }

    pub fn set_online(&self, user_id: i64, online: bool) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET is_online = ?1 WHERE id = ?2",
                params![online, user_id],
            )?;
            Ok(())
        })
    }

    // -- Conversations --

    pub fn create_conversation(
        &self,
        name: Option<&str>,
        is_group: bool,
        created_by: i64,
    ) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO conversations (name, is_group, created_by) VALUES (?1, ?2, ?3)",
                params![name, is_group, created_by],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Idempotent — the membership relation permits no duplicate pairs.
    pub fn add_member(&self, conversation_id: i64, user_id: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO conversation_members (conversation_id, user_id)
                 VALUES (?1, ?2)",
                params![conversation_id, user_id],
            )?;
            Ok(())
        })
    }

    pub fn conversation_members(&self, conversation_id: i64) -> Result<Vec<i64>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id FROM conversation_members WHERE conversation_id = ?1",
            )?;
            let ids = stmt
                .query_map([conversation_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<i64>, _>>()?;
            Ok(ids)
        })
    }

    pub fn is_member(&self, conversation_id: i64, user_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM conversation_members
                 WHERE conversation_id = ?1 AND user_id = ?2",
                params![conversation_id, user_id],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
    }

    pub fn conversations_for(&self, user_id: i64) -> Result<Vec<ConversationSummaryRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.name, c.is_group,
                        (SELECT content FROM messages
                         WHERE conversation_id = c.id
                         ORDER BY timestamp DESC, id DESC LIMIT 1) AS last_msg
                 FROM conversations c
                 JOIN conversation_members cm ON cm.conversation_id = c.id
                 WHERE cm.user_id = ?1
                 ORDER BY c.id",
            )?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(ConversationSummaryRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        is_group: row.get(2)?,
                        last_message: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Messages --

    pub fn insert_message(
        &self,
        conversation_id: i64,
        sender_id: i64,
        content: &str,
        kind: MessageKind,
    ) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (conversation_id, sender_id, content, message_type)
                 VALUES (?1, ?2, ?3, ?4)",
                params![conversation_id, sender_id, content, kind.as_str()],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Full history of a conversation in canonical (timestamp) order,
    /// with sender display names joined in a single query.
    pub fn messages_in(&self, conversation_id: i64) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.conversation_id, m.sender_id,
                        u.first_name, u.last_name,
                        m.content, m.message_type, m.is_read, m.timestamp
                 FROM messages m
                 LEFT JOIN users u ON m.sender_id = u.id
                 WHERE m.conversation_id = ?1
                 ORDER BY m.timestamp ASC, m.id ASC",
            )?;
            let rows = stmt
                .query_map([conversation_id], |row| {
                    let first: Option<String> = row.get(3)?;
                    let last: Option<String> = row.get(4)?;
                    let sender_name = match (first, last) {
                        (Some(f), Some(l)) => format!("{} {}", f, l).trim().to_string(),
                        _ => "unknown".to_string(),
                    };
                    Ok(MessageRow {
                        id: row.get(0)?,
                        conversation_id: row.get(1)?,
                        sender_id: row.get(2)?,
                        sender_name,
                        content: row.get(5)?,
                        message_type: row.get(6)?,
                        is_read: row.get(7)?,
                        timestamp: row.get(8)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// The reader marks everyone else's messages in the conversation as
    /// read. Own messages are never touched. Returns the affected count.
    pub fn mark_read(&self, conversation_id: i64, reader_id: i64) -> Result<usize> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE messages SET is_read = 1
                 WHERE conversation_id = ?1 AND sender_id != ?2 AND is_read = 0",
                params![conversation_id, reader_id],
            )?;
            Ok(changed)
        })
    }

    // -- Transfers --

    /// The one and only balance-mutating operation. Runs as a single
    /// SQLite transaction: membership check, conditional debit, credit,
    /// ledger row, payment message. The sender must belong to the
    /// conversation — payment messages carry the same membership
    /// invariant as chat messages. The debit's `balance >= amount`
    /// WHERE clause is the concurrency control — a zero rowcount means
    /// insufficient funds and the whole unit is abandoned with nothing
    /// written. Any failure after the debit rolls the unit back.
    pub fn transfer(
        &self,
        sender_id: i64,
        receiver_id: i64,
        amount: f64,
        conversation_id: i64,
        message_content: &str,
    ) -> Result<TransferOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let member: i64 = tx.query_row(
                "SELECT COUNT(*) FROM conversation_members
                 WHERE conversation_id = ?1 AND user_id = ?2",
                params![conversation_id, sender_id],
                |row| row.get(0),
            )?;
            if member == 0 {
                return Ok(TransferOutcome::NotAMember);
            }

            let debited = tx.execute(
                "UPDATE users SET balance = balance - ?1
                 WHERE id = ?2 AND balance >= ?1",
                params![amount, sender_id],
            )?;
            if debited == 0 {
                // Dropping the transaction rolls back; no writes happened.
                return Ok(TransferOutcome::InsufficientFunds);
            }

            let credited = tx.execute(
                "UPDATE users SET balance = balance + ?1 WHERE id = ?2",
                params![amount, receiver_id],
            )?;
            if credited == 0 {
                bail!("transfer receiver {} does not exist", receiver_id);
            }

            tx.execute(
                "INSERT INTO transactions (sender_id, receiver_id, amount, conversation_id, status)
                 VALUES (?1, ?2, ?3, ?4, 'completed')",
                params![sender_id, receiver_id, amount, conversation_id],
            )?;
            let transaction_id = tx.last_insert_rowid();

            tx.execute(
                "INSERT INTO messages (conversation_id, sender_id, content, message_type)
                 VALUES (?1, ?2, ?3, 'payment')",
                params![conversation_id, sender_id, message_content],
            )?;
            let message_id = tx.last_insert_rowid();

            tx.commit()?;
            Ok(TransferOutcome::Completed {
                transaction_id,
                message_id,
            })
        })
    }

    pub fn transactions_for(
        &self,
        user_id: i64,
        filter: TransactionFilter,
    ) -> Result<Vec<TransactionRow>> {
        let extra = match filter {
            TransactionFilter::All => "",
            TransactionFilter::Sent => "AND t.sender_id = ?1",
            TransactionFilter::Received => "AND t.receiver_id = ?1",
        };
        let sql = format!(
            "SELECT t.id, t.sender_id,
                    trim(s.first_name || ' ' || s.last_name),
                    t.receiver_id,
                    trim(r.first_name || ' ' || r.last_name),
                    t.amount, t.conversation_id, t.status, t.timestamp
             FROM transactions t
             LEFT JOIN users s ON t.sender_id = s.id
             LEFT JOIN users r ON t.receiver_id = r.id
             WHERE (t.sender_id = ?1 OR t.receiver_id = ?1) {}
             ORDER BY t.timestamp DESC, t.id DESC",
            extra
        );

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(TransactionRow {
                        id: row.get(0)?,
                        sender_id: row.get(1)?,
                        sender_name: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                        receiver_id: row.get(3)?,
                        receiver_name: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                        amount: row.get(5)?,
                        conversation_id: row.get(6)?,
                        status: row.get(7)?,
                        timestamp: row.get(8)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Friendships --

    pub fn are_friends(&self, user_id: i64, friend_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM friendships WHERE user_id = ?1 AND friend_id = ?2",
                params![user_id, friend_id],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
    }

    pub fn has_pending_request(&self, sender_id: i64, receiver_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM friend_requests
                 WHERE sender_id = ?1 AND receiver_id = ?2 AND status = 'pending'",
                params![sender_id, receiver_id],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
    }

    pub fn insert_friend_request(&self, sender_id: i64, receiver_id: i64) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO friend_requests (sender_id, receiver_id, status)
                 VALUES (?1, ?2, 'pending')",
                params![sender_id, receiver_id],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_friend_request(&self, id: i64) -> Result<Option<FriendRequestRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, sender_id, receiver_id, status, created_at
                     FROM friend_requests WHERE id = ?1",
                    [id],
                    |row| {
                        Ok(FriendRequestRow {
                            id: row.get(0)?,
                            sender_id: row.get(1)?,
                            receiver_id: row.get(2)?,
                            status: row.get(3)?,
                            created_at: row.get(4)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Settle a pending friend request, atomically. On accept this
    /// creates both friendship directions (idempotent), a fresh
    /// one-on-one conversation owned by the responder with both users
    /// as members, and flips the request status — all in one
    /// transaction, so a crash can never leave half a friendship.
    /// Terminal requests are left untouched.
    pub fn settle_friend_request(&self, request_id: i64, accept: bool) -> Result<SettleOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let request = tx
                .query_row(
                    "SELECT sender_id, receiver_id, status FROM friend_requests WHERE id = ?1",
                    [request_id],
                    |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, i64>(1)?,
                            row.get::<_, String>(2)?,
                        ))
                    },
                )
                .optional()?;

            let Some((sender_id, receiver_id, status)) = request else {
                return Ok(SettleOutcome::NotFound);
            };
            if status != "pending" {
                return Ok(SettleOutcome::AlreadySettled);
            }

            if !accept {
                tx.execute(
                    "UPDATE friend_requests SET status = 'rejected' WHERE id = ?1",
                    [request_id],
                )?;
                tx.commit()?;
                return Ok(SettleOutcome::Rejected);
            }

            tx.execute(
                "INSERT OR IGNORE INTO friendships (user_id, friend_id)
                 VALUES (?1, ?2), (?2, ?1)",
                params![sender_id, receiver_id],
            )?;

            // The responder (the request's receiver) owns the new conversation
            tx.execute(
                "INSERT INTO conversations (is_group, created_by) VALUES (0, ?1)",
                [receiver_id],
            )?;
            let conversation_id = tx.last_insert_rowid();

            tx.execute(
                "INSERT INTO conversation_members (conversation_id, user_id)
                 VALUES (?1, ?2), (?1, ?3)",
                params![conversation_id, sender_id, receiver_id],
            )?;

            tx.execute(
                "UPDATE friend_requests SET status = 'accepted' WHERE id = ?1",
                [request_id],
            )?;

            tx.commit()?;
            Ok(SettleOutcome::Accepted {
                sender_id,
                receiver_id,
                conversation_id,
            })
        })
    }

    pub fn pending_requests_for(&self, user_id: i64) -> Result<Vec<PendingRequestRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT fr.id, fr.sender_id, u.username, u.first_name, u.last_name
                 FROM friend_requests fr
                 JOIN users u ON fr.sender_id = u.id
                 WHERE fr.receiver_id = ?1 AND fr.status = 'pending'
                 ORDER BY fr.id",
            )?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(PendingRequestRow {
                        id: row.get(0)?,
                        sender_id: row.get(1)?,
                        sender_username: row.get(2)?,
                        sender_first_name: row.get(3)?,
                        sender_last_name: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn friends_of(&self, user_id: i64, online_only: bool) -> Result<Vec<FriendRow>> {
        let sql = if online_only {
            "SELECT u.id, u.username, u.first_name, u.last_name, u.is_online
             FROM users u JOIN friendships f ON u.id = f.friend_id
             WHERE f.user_id = ?1 AND u.is_online = 1
             ORDER BY u.username"
        } else {
            "SELECT u.id, u.username, u.first_name, u.last_name, u.is_online
             FROM users u JOIN friendships f ON u.id = f.friend_id
             WHERE f.user_id = ?1
             ORDER BY u.username"
        };

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(FriendRow {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        first_name: row.get(2)?,
                        last_name: row.get(3)?,
                        is_online: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_user(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Option<UserRow>> {
    let row = conn
        .query_row(sql, params, |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                email: row.get(2)?,
                first_name: row.get(3)?,
                last_name: row.get(4)?,
                balance: row.get(5)?,
                is_online: row.get(6)?,
                created_at: row.get(7)?,
            })
        })
        .optional()?;
    Ok(row)
}
