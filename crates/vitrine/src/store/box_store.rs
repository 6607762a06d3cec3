//! SQLite persistence for boxes and memberships.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Row, params};
use vitrine_core::PerfSpan;
use vitrine_core::logging::targets;

use super::error::{StoreError, StoreResult};
use super::record::{
    BoxId, BoxKind, CollectionBox, DefaultNames, ExhibitId, Membership, MembershipId, ReparentOutcome,
};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS box (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        parent_id INTEGER,
        name TEXT NOT NULL,
        kind TEXT NOT NULL,
        filter TEXT,
        last_sequence INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS box_item (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        box_id INTEGER NOT NULL,
        exhibit_id INTEGER NOT NULL,
        sequence INTEGER NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_box_parent ON box(parent_id);
    CREATE INDEX IF NOT EXISTS idx_box_item_box ON box_item(box_id, sequence);
";

const BOX_COLUMNS: &str = "id, parent_id, name, kind, filter";

/// Tuning knobs for a [`BoxStore`].
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    /// Upper bound on ancestor-walk steps. The box count is always a bound.
    pub max_ancestor_walk: Option<usize>,
    /// Names given by [`BoxStore::new_box`].
    pub default_names: DefaultNames,
}

/// Durable storage of boxes and memberships.
///
/// The store knows nothing about the in-memory tree and never branches on a
/// box's kind. All access goes through one connection behind a mutex, and
/// every multi-statement write runs in a transaction while holding it.
pub struct BoxStore {
    conn: Mutex<Connection>,
    options: StoreOptions,
}

struct BoxRow {
    id: i64,
    parent_id: Option<i64>,
    name: String,
    kind: String,
    filter: Option<String>,
}

impl BoxRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            parent_id: row.get(1)?,
            name: row.get(2)?,
            kind: row.get(3)?,
            filter: row.get(4)?,
        })
    }

    fn into_box(self) -> StoreResult<CollectionBox> {
        Ok(CollectionBox {
            id: Some(BoxId(self.id)),
            parent_id: self.parent_id.map(BoxId),
            name: self.name,
            kind: BoxKind::from_columns(&self.kind, self.filter)?,
        })
    }
}

impl BoxStore {
    /// Wrap an open connection, creating the schema if it is missing.
    pub fn new(conn: Connection) -> StoreResult<Self> {
        Self::with_options(conn, StoreOptions::default())
    }

    /// Like [`new`](Self::new), with explicit options.
    pub fn with_options(conn: Connection, options: StoreOptions) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA)?;
        tracing::debug!(target: targets::STORE, "box schema ready");
        Ok(Self {
            conn: Mutex::new(conn),
            options,
        })
    }

    /// Open (or create) a database file, creating parent directories.
    pub fn open(path: impl AsRef<Path>, options: StoreOptions) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|source| StoreError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        tracing::debug!(target: targets::STORE, path = %path.display(), "opening box database");
        Self::with_options(Connection::open(path)?, options)
    }

    /// Create a private in-memory database.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::new(Connection::open_in_memory()?)
    }

    /// The options this store was built with.
    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Build an unpersisted box with the default name for its kind.
    pub fn new_box(&self, kind: BoxKind) -> CollectionBox {
        CollectionBox {
            id: None,
            parent_id: None,
            name: self.options.default_names.for_kind(&kind).to_string(),
            kind,
        }
    }

    /// Insert or update a box.
    ///
    /// An unpersisted box is inserted and receives its id. A persisted box is
    /// updated in place. `false` means a row the write depends on is gone:
    /// the box itself, or the parent it names. Nothing is written then.
    #[tracing::instrument(skip_all, target = "vitrine::store", level = "trace")]
    pub fn store(&self, record: &mut CollectionBox) -> StoreResult<bool> {
        let (kind, filter) = record.kind.to_columns();
        let parent_id = record.parent_id.map(|p| p.0);
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        if let Some(parent) = record.parent_id {
            if find_on(&tx, parent)?.is_none() {
                tracing::debug!(target: targets::STORE, %parent, "parent box is gone");
                return Ok(false);
            }
        }

        match record.id {
            None => {
                tx.execute(
                    "INSERT INTO box (parent_id, name, kind, filter) VALUES (?1, ?2, ?3, ?4)",
                    params![parent_id, record.name, kind, filter],
                )?;
                let id = BoxId(tx.last_insert_rowid());
                tx.commit()?;
                record.id = Some(id);
                tracing::debug!(target: targets::STORE, %id, kind, "inserted box");
                Ok(true)
            }
            Some(id) => {
                let changed = tx.execute(
                    "UPDATE box SET parent_id = ?1, name = ?2, kind = ?3, filter = ?4 WHERE id = ?5",
                    params![parent_id, record.name, kind, filter, id.0],
                )?;
                tx.commit()?;
                if changed == 0 {
                    tracing::debug!(target: targets::STORE, %id, "update hit no rows");
                }
                Ok(changed == 1)
            }
        }
    }

    /// Load one box.
    pub fn find(&self, id: BoxId) -> StoreResult<Option<CollectionBox>> {
        let conn = self.conn.lock();
        find_on(&conn, id)
    }

    /// The boxes whose parent is `parent` (`None` for root level), in id order.
    pub fn children(&self, parent: Option<BoxId>) -> StoreResult<Vec<CollectionBox>> {
        let conn = self.conn.lock();
        let rows = match parent {
            Some(parent) => {
                let mut stmt = conn
                    .prepare_cached(&format!("SELECT {BOX_COLUMNS} FROM box WHERE parent_id = ?1 ORDER BY id"))?;
                let rows = stmt
                    .query_map(params![parent.0], BoxRow::from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
            None => {
                let mut stmt =
                    conn.prepare_cached(&format!("SELECT {BOX_COLUMNS} FROM box WHERE parent_id IS NULL ORDER BY id"))?;
                let rows = stmt
                    .query_map([], BoxRow::from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
        };
        rows.into_iter().map(BoxRow::into_box).collect()
    }

    /// Delete a box, every descendant box, and all of their memberships.
    ///
    /// Returns whether the box row existed. An unpersisted box is a no-op.
    #[tracing::instrument(skip_all, target = "vitrine::store", level = "trace")]
    pub fn delete(&self, record: &CollectionBox) -> StoreResult<bool> {
        let Some(id) = record.id else {
            return Ok(false);
        };
        let _perf = PerfSpan::new("box_store::delete");

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let subtree: Vec<i64> = {
            let mut stmt = tx.prepare(
                "WITH RECURSIVE subtree(id) AS (
                     SELECT id FROM box WHERE id = ?1
                     UNION
                     SELECT box.id FROM box JOIN subtree ON box.parent_id = subtree.id
                 )
                 SELECT id FROM subtree",
            )?;
            let ids = stmt
                .query_map(params![id.0], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            ids
        };
        if subtree.is_empty() {
            return Ok(false);
        }

        let mut memberships = 0;
        for box_id in &subtree {
            memberships += tx.execute("DELETE FROM box_item WHERE box_id = ?1", params![box_id])?;
            tx.execute("DELETE FROM box WHERE id = ?1", params![box_id])?;
        }
        tx.commit()?;

        tracing::debug!(
            target: targets::STORE,
            %id,
            boxes = subtree.len(),
            memberships,
            "deleted box subtree"
        );
        Ok(true)
    }

    /// Whether `maybe_ancestor` is a strict ancestor of `candidate`.
    ///
    /// The walk is bounded by the box count (and [`StoreOptions::max_ancestor_walk`]).
    /// Hitting the bound means the stored hierarchy is corrupt; the walk then
    /// answers `false` and logs a warning.
    pub fn is_ancestor(&self, candidate: BoxId, maybe_ancestor: BoxId) -> StoreResult<bool> {
        let conn = self.conn.lock();
        is_ancestor_on(&conn, candidate, maybe_ancestor, self.options.max_ancestor_walk)
    }

    /// Atomically move a box under `new_parent` (`None` for root level).
    ///
    /// The existence checks, the cycle check and the update share one
    /// transaction, so no concurrent writer can slip a cycle in between.
    #[tracing::instrument(skip_all, target = "vitrine::store", level = "trace")]
    pub fn reparent(&self, box_id: BoxId, new_parent: Option<BoxId>) -> StoreResult<ReparentOutcome> {
        let _perf = PerfSpan::new("box_store::reparent");
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        if find_on(&tx, box_id)?.is_none() {
            return Ok(ReparentOutcome::Missing);
        }
        if let Some(parent) = new_parent {
            if find_on(&tx, parent)?.is_none() {
                return Ok(ReparentOutcome::Missing);
            }
            if parent == box_id || is_ancestor_on(&tx, parent, box_id, self.options.max_ancestor_walk)? {
                return Ok(ReparentOutcome::WouldCycle);
            }
        }

        tx.execute(
            "UPDATE box SET parent_id = ?1 WHERE id = ?2",
            params![new_parent.map(|p| p.0), box_id.0],
        )?;
        let moved = find_on(&tx, box_id)?;
        tx.commit()?;

        tracing::debug!(target: targets::STORE, %box_id, parent = ?new_parent, "reparented box");
        Ok(moved.map_or(ReparentOutcome::Missing, ReparentOutcome::Reparented))
    }

    /// Memberships of a box in sequence order.
    pub fn memberships(&self, box_id: BoxId) -> StoreResult<Vec<Membership>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT id, box_id, exhibit_id, sequence FROM box_item WHERE box_id = ?1 ORDER BY sequence",
        )?;
        let rows = stmt
            .query_map(params![box_id.0], membership_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Append an exhibit to a box.
    ///
    /// Returns `None` when the box no longer exists. The sequence comes from
    /// the box's high-water mark, so a value is never handed out twice.
    #[tracing::instrument(skip_all, target = "vitrine::store", level = "trace")]
    pub fn add_membership(&self, box_id: BoxId, exhibit_id: ExhibitId) -> StoreResult<Option<Membership>> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let bumped = tx.execute(
            "UPDATE box SET last_sequence = last_sequence + 1 WHERE id = ?1",
            params![box_id.0],
        )?;
        if bumped == 0 {
            return Ok(None);
        }
        let sequence: i64 = tx.query_row(
            "SELECT last_sequence FROM box WHERE id = ?1",
            params![box_id.0],
            |row| row.get(0),
        )?;
        tx.execute(
            "INSERT INTO box_item (box_id, exhibit_id, sequence) VALUES (?1, ?2, ?3)",
            params![box_id.0, exhibit_id.0, sequence],
        )?;
        let id = MembershipId(tx.last_insert_rowid());
        tx.commit()?;

        tracing::debug!(target: targets::STORE, %box_id, %exhibit_id, sequence, "added membership");
        Ok(Some(Membership {
            id,
            box_id,
            exhibit_id,
            sequence,
        }))
    }

    /// Delete one membership. Returns whether it existed.
    pub fn remove_membership(&self, id: MembershipId) -> StoreResult<bool> {
        let conn = self.conn.lock();
        let removed = conn.execute("DELETE FROM box_item WHERE id = ?1", params![id.0])?;
        Ok(removed == 1)
    }

    /// Total number of boxes.
    pub fn box_count(&self) -> StoreResult<usize> {
        let conn = self.conn.lock();
        box_count_on(&conn)
    }

    #[cfg(test)]
    pub(crate) fn with_connection<R>(&self, f: impl FnOnce(&Connection) -> R) -> R {
        f(&self.conn.lock())
    }
}

impl std::fmt::Debug for BoxStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxStore").field("options", &self.options).finish()
    }
}

fn find_on(conn: &Connection, id: BoxId) -> StoreResult<Option<CollectionBox>> {
    let row = conn
        .query_row(
            &format!("SELECT {BOX_COLUMNS} FROM box WHERE id = ?1"),
            params![id.0],
            BoxRow::from_row,
        )
        .optional()?;
    row.map(BoxRow::into_box).transpose()
}

fn parent_of(conn: &Connection, id: BoxId) -> StoreResult<Option<BoxId>> {
    let parent: Option<Option<i64>> = conn
        .query_row("SELECT parent_id FROM box WHERE id = ?1", params![id.0], |row| row.get(0))
        .optional()?;
    Ok(parent.flatten().map(BoxId))
}

fn box_count_on(conn: &Connection) -> StoreResult<usize> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM box", [], |row| row.get(0))?;
    Ok(usize::try_from(count).unwrap_or(0))
}

fn is_ancestor_on(
    conn: &Connection,
    candidate: BoxId,
    maybe_ancestor: BoxId,
    max_walk: Option<usize>,
) -> StoreResult<bool> {
    let mut bound = box_count_on(conn)?;
    if let Some(max) = max_walk {
        bound = bound.min(max);
    }

    let mut current = parent_of(conn, candidate)?;
    for _ in 0..bound {
        match current {
            None => return Ok(false),
            Some(id) if id == maybe_ancestor => return Ok(true),
            Some(id) => current = parent_of(conn, id)?,
        }
    }

    if current.is_some() {
        tracing::warn!(
            target: targets::STORE,
            %candidate,
            %maybe_ancestor,
            bound,
            "ancestor walk exceeded bound; hierarchy may contain a cycle"
        );
    }
    Ok(false)
}

fn membership_from_row(row: &Row<'_>) -> rusqlite::Result<Membership> {
    Ok(Membership {
        id: MembershipId(row.get(0)?),
        box_id: BoxId(row.get(1)?),
        exhibit_id: ExhibitId(row.get(2)?),
        sequence: row.get(3)?,
    })
}

static_assertions::assert_impl_all!(BoxStore: Send, Sync);
