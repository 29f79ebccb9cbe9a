use super::forum_store::ForumStore;
use super::models::{
    Category, CategorySeed, Page, Reply, Thread, ThreadFilter, ThreadSort,
    DEFAULT_CATEGORY_COLOR,
};
use crate::sqlite_column;
use crate::sqlite_persistence::{
    open_versioned_db, unix_now, Column, ForeignKey, ForeignKeyOnChange, SqlType, Table,
    VersionedSchema, DEFAULT_TIMESTAMP,
};
use crate::votes::{
    AppliedVote, TargetKind, VoteDirection, VoteStore, VoteTally, VoteTarget, VoteTransition,
};
use anyhow::{Context, Result};
use rusqlite::{
    params, params_from_iter, types::Value, Connection, OptionalExtension, Row,
    TransactionBehavior,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

const CATEGORY_FK: ForeignKey = ForeignKey {
    foreign_table: "category",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};
const THREAD_FK: ForeignKey = ForeignKey {
    foreign_table: "thread",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};
const REPLY_FK: ForeignKey = ForeignKey {
    foreign_table: "reply",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

/// V 0
const CATEGORY_TABLE_V_0: Table = Table {
    name: "category",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("slug", &SqlType::Text, non_null = true),
        sqlite_column!("description", &SqlType::Text),
        sqlite_column!(
            "color",
            &SqlType::Text,
            non_null = true,
            default_value = Some("'#3B82F6'")
        ),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[],
    unique_constraints: &[&["slug"]],
};
const THREAD_TABLE_V_0: Table = Table {
    name: "thread",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!("content", &SqlType::Text, non_null = true),
        sqlite_column!("author_id", &SqlType::Integer, non_null = true),
        sqlite_column!(
            "category_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&CATEGORY_FK)
        ),
        sqlite_column!(
            "upvotes",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!(
            "downvotes",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!(
            "reply_count",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!(
            "updated",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[
        ("idx_thread_category_id", "category_id"),
        ("idx_thread_author_id", "author_id"),
        ("idx_thread_created", "created"),
    ],
    unique_constraints: &[],
};
const REPLY_TABLE_V_0: Table = Table {
    name: "reply",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("content", &SqlType::Text, non_null = true),
        sqlite_column!("author_id", &SqlType::Integer, non_null = true),
        sqlite_column!(
            "thread_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&THREAD_FK)
        ),
        sqlite_column!("parent_id", &SqlType::Text, foreign_key = Some(&REPLY_FK)),
        sqlite_column!(
            "upvotes",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!(
            "downvotes",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!(
            "updated",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[
        ("idx_reply_thread_id", "thread_id"),
        ("idx_reply_parent_id", "parent_id"),
        ("idx_reply_author_id", "author_id"),
    ],
    unique_constraints: &[],
};
const VOTE_TABLE_V_0: Table = Table {
    name: "vote",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("user_id", &SqlType::Integer, non_null = true),
        sqlite_column!("target_kind", &SqlType::Integer, non_null = true),
        sqlite_column!("target_id", &SqlType::Text, non_null = true),
        sqlite_column!("direction", &SqlType::Integer, non_null = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!(
            "updated",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[("idx_vote_target_id", "target_id")],
    unique_constraints: &[&["user_id", "target_kind", "target_id"]],
};

/// V 1
const VOTE_TABLE_V_1: Table = Table {
    name: "vote",
    columns: VOTE_TABLE_V_0.columns,
    indices: &[
        ("idx_vote_target_id", "target_id"),
        ("idx_vote_user_id", "user_id"),
    ],
    unique_constraints: VOTE_TABLE_V_0.unique_constraints,
};

pub const VERSIONED_SCHEMAS: &[VersionedSchema] = &[
    VersionedSchema {
        version: 0,
        tables: &[
            CATEGORY_TABLE_V_0,
            THREAD_TABLE_V_0,
            REPLY_TABLE_V_0,
            VOTE_TABLE_V_0,
        ],
        migration: None,
    },
    VersionedSchema {
        version: 1,
        tables: &[
            CATEGORY_TABLE_V_0,
            THREAD_TABLE_V_0,
            REPLY_TABLE_V_0,
            VOTE_TABLE_V_1,
        ],
        migration: Some(|conn: &Connection| {
            conn.execute("CREATE INDEX idx_vote_user_id ON vote(user_id);", [])?;
            Ok(())
        }),
    },
];

const CATEGORY_COLUMNS: &str = "id, name, slug, description, color, created";
const THREAD_COLUMNS: &str =
    "t.id, t.title, t.content, t.author_id, t.category_id, t.upvotes, t.downvotes, t.reply_count, t.created, t.updated";
const REPLY_COLUMNS: &str =
    "id, content, author_id, thread_id, parent_id, upvotes, downvotes, created, updated";

fn category_from_row(row: &Row) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        description: row.get(3)?,
        color: row.get(4)?,
        created: row.get(5)?,
    })
}

fn thread_from_row(row: &Row) -> rusqlite::Result<Thread> {
    Ok(Thread {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        author_id: row.get(3)?,
        category_id: row.get(4)?,
        upvotes: row.get(5)?,
        downvotes: row.get(6)?,
        reply_count: row.get(7)?,
        created: row.get(8)?,
        updated: row.get(9)?,
    })
}

fn reply_from_row(row: &Row) -> rusqlite::Result<Reply> {
    Ok(Reply {
        id: row.get(0)?,
        content: row.get(1)?,
        author_id: row.get(2)?,
        thread_id: row.get(3)?,
        parent_id: row.get(4)?,
        upvotes: row.get(5)?,
        downvotes: row.get(6)?,
        created: row.get(7)?,
        updated: row.get(8)?,
    })
}

/// Upper bound of ids bound into a single `IN (...)` list.
const MAX_IN_LIST_PARAMS: usize = 500;

fn target_table(kind: TargetKind) -> &'static str {
    match kind {
        TargetKind::Thread => THREAD_TABLE_V_0.name,
        TargetKind::Reply => REPLY_TABLE_V_0.name,
    }
}

fn read_thread(conn: &Connection, thread_id: &str) -> Result<Option<Thread>> {
    conn.query_row(
        &format!("SELECT {THREAD_COLUMNS} FROM thread t WHERE t.id = ?1"),
        params![thread_id],
        thread_from_row,
    )
    .optional()
    .with_context(|| format!("Failed to read thread {}", thread_id))
}

fn read_reply(conn: &Connection, reply_id: &str) -> Result<Option<Reply>> {
    conn.query_row(
        &format!("SELECT {REPLY_COLUMNS} FROM reply WHERE id = ?1"),
        params![reply_id],
        reply_from_row,
    )
    .optional()
    .with_context(|| format!("Failed to read reply {}", reply_id))
}

fn read_tally(conn: &Connection, target: &VoteTarget) -> Result<Option<VoteTally>> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT upvotes, downvotes FROM {} WHERE id = ?1",
                target_table(target.kind)
            ),
            params![target.id],
            |row| Ok(VoteTally::new(row.get(0)?, row.get(1)?)),
        )
        .optional()?)
}

fn read_vote(
    conn: &Connection,
    user_id: usize,
    target: &VoteTarget,
) -> Result<Option<VoteDirection>> {
    let direction = conn
        .query_row(
            "SELECT direction FROM vote WHERE user_id = ?1 AND target_kind = ?2 AND target_id = ?3",
            params![user_id, target.kind.to_int(), target.id],
            |row| row.get::<_, i32>(0),
        )
        .optional()?;
    direction.map(VoteDirection::from_int).transpose()
}

/// SQLite integers are signed 64 bit.
fn page_bound(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Escapes LIKE wildcards so that user input matches literally.
fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[derive(Clone)]
pub struct SqliteForumStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteForumStore {
    pub fn new<T: AsRef<Path>>(db_path: T) -> Result<Self> {
        let conn = open_versioned_db(db_path, VERSIONED_SCHEMAS, "forum")?;
        Ok(SqliteForumStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn query_threads(
        &self,
        where_clause: &str,
        mut args: Vec<Value>,
        sort: ThreadSort,
        page: Page,
    ) -> Result<Vec<Thread>> {
        args.push(Value::Integer(page_bound(page.limit)));
        let limit_param = args.len();
        args.push(Value::Integer(page_bound(page.offset)));
        let offset_param = args.len();

        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT {THREAD_COLUMNS} FROM thread t {where_clause} ORDER BY {} LIMIT ?{} OFFSET ?{}",
            sort.order_by(),
            limit_param,
            offset_param
        );
        let mut stmt = conn.prepare(&sql)?;
        let threads = stmt
            .query_map(params_from_iter(args), thread_from_row)?
            .collect::<Result<Vec<Thread>, _>>()?;
        Ok(threads)
    }

    fn query_replies(&self, where_clause: &str, id: &str) -> Result<Vec<Reply>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {REPLY_COLUMNS} FROM reply WHERE {where_clause} ORDER BY created ASC, rowid ASC"
        ))?;
        let replies = stmt
            .query_map(params![id], reply_from_row)?
            .collect::<Result<Vec<Reply>, _>>()?;
        Ok(replies)
    }
}

impl VoteStore for SqliteForumStore {
    fn apply_vote(
        &self,
        user_id: usize,
        target: &VoteTarget,
        direction: VoteDirection,
    ) -> Result<Option<AppliedVote>> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing = read_vote(&tx, user_id, target)?;
        let transition = VoteTransition::resolve(existing, direction);

        match transition {
            VoteTransition::Created(direction) => {
                tx.execute(
                    "INSERT INTO vote (user_id, target_kind, target_id, direction) VALUES (?1, ?2, ?3, ?4)",
                    params![user_id, target.kind.to_int(), target.id, direction.to_int()],
                )?;
            }
            VoteTransition::Removed(_) => {
                tx.execute(
                    "DELETE FROM vote WHERE user_id = ?1 AND target_kind = ?2 AND target_id = ?3",
                    params![user_id, target.kind.to_int(), target.id],
                )?;
            }
            VoteTransition::Flipped { to, .. } => {
                tx.execute(
                    "UPDATE vote SET direction = ?1, updated = ?2 WHERE user_id = ?3 AND target_kind = ?4 AND target_id = ?5",
                    params![to.to_int(), unix_now(), user_id, target.kind.to_int(), target.id],
                )?;
            }
        }

        let (up_delta, down_delta) = transition.counter_delta();
        let updated = tx.execute(
            &format!(
                "UPDATE {} SET upvotes = upvotes + ?1, downvotes = downvotes + ?2 WHERE id = ?3",
                target_table(target.kind)
            ),
            params![up_delta, down_delta, target.id],
        )?;
        if updated == 0 {
            // Dropping the transaction rolls back the vote row written above.
            debug!("Vote on missing target {} rolled back", target);
            return Ok(None);
        }

        let tally = read_tally(&tx, target)?
            .with_context(|| format!("Target {} vanished during vote", target))?;
        tx.commit()?;

        Ok(Some(AppliedVote { transition, tally }))
    }

    fn get_user_vote(&self, user_id: usize, target: &VoteTarget) -> Result<Option<VoteDirection>> {
        let conn = self.conn.lock().unwrap();
        read_vote(&conn, user_id, target)
    }

    fn get_user_votes(
        &self,
        user_id: usize,
        targets: &[VoteTarget],
    ) -> Result<HashMap<VoteTarget, VoteDirection>> {
        let conn = self.conn.lock().unwrap();
        let mut votes = HashMap::new();
        for kind in [TargetKind::Thread, TargetKind::Reply] {
            let ids: Vec<&str> = targets
                .iter()
                .filter(|t| t.kind == kind)
                .map(|t| t.id.as_str())
                .collect();
            for chunk in ids.chunks(MAX_IN_LIST_PARAMS) {
                let placeholders = (0..chunk.len())
                    .map(|i| format!("?{}", i + 3))
                    .collect::<Vec<_>>()
                    .join(", ");
                let mut args = vec![
                    Value::Integer(user_id as i64),
                    Value::Integer(kind.to_int() as i64),
                ];
                args.extend(chunk.iter().map(|id| Value::Text(id.to_string())));

                let mut stmt = conn.prepare(&format!(
                    "SELECT target_id, direction FROM vote
                     WHERE user_id = ?1 AND target_kind = ?2 AND target_id IN ({placeholders})"
                ))?;
                let rows = stmt.query_map(params_from_iter(args), |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i32>(1)?))
                })?;
                for row in rows {
                    let (id, direction) = row?;
                    votes.insert(
                        VoteTarget { kind, id },
                        VoteDirection::from_int(direction)?,
                    );
                }
            }
        }
        Ok(votes)
    }

    fn get_tally(&self, target: &VoteTarget) -> Result<Option<VoteTally>> {
        let conn = self.conn.lock().unwrap();
        read_tally(&conn, target)
    }

    fn reconcile_tally(&self, target: &VoteTarget) -> Result<Option<VoteTally>> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let (upvotes, downvotes): (i64, i64) = tx.query_row(
            "SELECT COALESCE(SUM(direction = 1), 0), COALESCE(SUM(direction = -1), 0)
             FROM vote WHERE target_kind = ?1 AND target_id = ?2",
            params![target.kind.to_int(), target.id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let updated = tx.execute(
            &format!(
                "UPDATE {} SET upvotes = ?1, downvotes = ?2 WHERE id = ?3",
                target_table(target.kind)
            ),
            params![upvotes, downvotes, target.id],
        )?;
        if updated == 0 {
            return Ok(None);
        }
        tx.commit()?;

        info!(
            "Reconciled counters of {} to {} up / {} down",
            target, upvotes, downvotes
        );
        Ok(Some(VoteTally::new(upvotes, downvotes)))
    }

    fn list_vote_targets(&self) -> Result<Vec<VoteTarget>> {
        let conn = self.conn.lock().unwrap();
        let mut targets = Vec::new();
        for kind in [TargetKind::Thread, TargetKind::Reply] {
            let mut stmt = conn.prepare(&format!(
                "SELECT id FROM {} ORDER BY rowid",
                target_table(kind)
            ))?;
            let ids = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<String>, _>>()?;
            targets.extend(ids.into_iter().map(|id| VoteTarget { kind, id }));
        }
        Ok(targets)
    }

    fn count_upvotes_cast(&self, user_id: usize) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM vote WHERE user_id = ?1 AND direction = ?2",
            params![user_id, VoteDirection::Up.to_int()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

impl ForumStore for SqliteForumStore {
    fn ensure_category(&self, seed: &CategorySeed) -> Result<Category> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO category (name, slug, description, color) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(slug) DO UPDATE SET
                name = excluded.name,
                description = excluded.description,
                color = excluded.color",
            params![
                seed.name,
                seed.slug,
                seed.description,
                seed.color.as_deref().unwrap_or(DEFAULT_CATEGORY_COLOR)
            ],
        )
        .with_context(|| format!("Failed to upsert category {}", seed.slug))?;
        let category = conn.query_row(
            &format!("SELECT {CATEGORY_COLUMNS} FROM category WHERE slug = ?1"),
            params![seed.slug],
            category_from_row,
        )?;
        Ok(category)
    }

    fn list_categories(&self) -> Result<Vec<Category>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM category ORDER BY name ASC"
        ))?;
        let categories = stmt
            .query_map([], category_from_row)?
            .collect::<Result<Vec<Category>, _>>()?;
        Ok(categories)
    }

    fn get_category_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                &format!("SELECT {CATEGORY_COLUMNS} FROM category WHERE slug = ?1"),
                params![slug],
                category_from_row,
            )
            .optional()?)
    }

    fn get_category(&self, category_id: usize) -> Result<Option<Category>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                &format!("SELECT {CATEGORY_COLUMNS} FROM category WHERE id = ?1"),
                params![category_id],
                category_from_row,
            )
            .optional()?)
    }

    fn insert_thread(
        &self,
        author_id: usize,
        category_id: usize,
        title: &str,
        content: &str,
    ) -> Result<Thread> {
        let conn = self.conn.lock().unwrap();
        let id = uuid::Uuid::new_v4().to_string();
        let now = unix_now();
        conn.execute(
            "INSERT INTO thread (id, title, content, author_id, category_id, created, updated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![id, title, content, author_id, category_id, now],
        )
        .context("Failed to insert thread")?;
        read_thread(&conn, &id)?.context("Inserted thread not found")
    }

    fn get_thread(&self, thread_id: &str) -> Result<Option<Thread>> {
        let conn = self.conn.lock().unwrap();
        read_thread(&conn, thread_id)
    }

    fn list_threads(
        &self,
        filter: &ThreadFilter,
        sort: ThreadSort,
        page: Page,
    ) -> Result<Vec<Thread>> {
        let mut conditions = Vec::new();
        let mut args: Vec<Value> = Vec::new();
        if let Some(category_id) = filter.category_id {
            args.push(Value::Integer(category_id as i64));
            conditions.push(format!("t.category_id = ?{}", args.len()));
        }
        if let Some(author_id) = filter.author_id {
            args.push(Value::Integer(author_id as i64));
            conditions.push(format!("t.author_id = ?{}", args.len()));
        }
        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        self.query_threads(&where_clause, args, sort, page)
    }

    fn search_threads(
        &self,
        query: &str,
        category_id: Option<usize>,
        sort: ThreadSort,
        page: Page,
    ) -> Result<Vec<Thread>> {
        let mut args = vec![Value::Text(like_pattern(query))];
        let mut where_clause =
            "WHERE (t.title LIKE ?1 ESCAPE '\\' OR t.content LIKE ?1 ESCAPE '\\')".to_string();
        if let Some(category_id) = category_id {
            args.push(Value::Integer(category_id as i64));
            where_clause.push_str(" AND t.category_id = ?2");
        }
        self.query_threads(&where_clause, args, sort, page)
    }

    fn insert_reply(
        &self,
        author_id: usize,
        thread_id: &str,
        parent_id: Option<&str>,
        content: &str,
    ) -> Result<Option<Reply>> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let bumped = tx.execute(
            "UPDATE thread SET reply_count = reply_count + 1 WHERE id = ?1",
            params![thread_id],
        )?;
        if bumped == 0 {
            return Ok(None);
        }

        let id = uuid::Uuid::new_v4().to_string();
        let now = unix_now();
        tx.execute(
            "INSERT INTO reply (id, content, author_id, thread_id, parent_id, created, updated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![id, content, author_id, thread_id, parent_id, now],
        )
        .context("Failed to insert reply")?;
        let reply = read_reply(&tx, &id)?.context("Inserted reply not found")?;
        tx.commit()?;
        Ok(Some(reply))
    }

    fn get_reply(&self, reply_id: &str) -> Result<Option<Reply>> {
        let conn = self.conn.lock().unwrap();
        read_reply(&conn, reply_id)
    }

    fn list_top_level_replies(&self, thread_id: &str) -> Result<Vec<Reply>> {
        self.query_replies("thread_id = ?1 AND parent_id IS NULL", thread_id)
    }

    fn list_child_replies(&self, reply_id: &str) -> Result<Vec<Reply>> {
        self.query_replies("parent_id = ?1", reply_id)
    }

    fn count_threads_by_author(&self, author_id: usize) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM thread WHERE author_id = ?1",
            params![author_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn count_replies_by_author(&self, author_id: usize) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM reply WHERE author_id = ?1",
            params![author_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn sum_upvotes_received(&self, author_id: usize) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let total: i64 = conn.query_row(
            "SELECT
                (SELECT COALESCE(SUM(upvotes), 0) FROM thread WHERE author_id = ?1)
              + (SELECT COALESCE(SUM(upvotes), 0) FROM reply WHERE author_id = ?1)",
            params![author_id],
            |row| row.get(0),
        )?;
        Ok(total)
    }
}
