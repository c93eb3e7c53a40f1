use crate::document::{DocId, Document, Filter};
use crate::error::{Result, SqliteResultExt, StoreError};
use crate::store::StoreFile;
use rusqlite::{params, params_from_iter, types::Value, OptionalExtension};
use std::marker::PhantomData;

/// What `upsert` ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upserted {
    Inserted,
    Updated,
}

/// Typed view of one collection inside a `StoreFile`
///
/// Every collection is a table of `(seq, key, data)`: `seq` is the
/// auto-increment row id, `key` the optional natural key and `data` the
/// document as JSON. Scans come back in `seq` order, i.e. insertion order.
pub struct Collection<'a, D> {
    file: &'a StoreFile,
    _doc: PhantomData<D>,
}

impl<'a, D: Document> Collection<'a, D> {
    pub(crate) fn bind(file: &'a StoreFile) -> Result<Self> {
        file.conn()
            .execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS {} (
                        seq INTEGER PRIMARY KEY AUTOINCREMENT,
                        key TEXT UNIQUE,
                        data TEXT NOT NULL
                    )",
                    Self::table()
                ),
                [],
            )
            .at(file.path())?;

        Ok(Self {
            file,
            _doc: PhantomData,
        })
    }

    fn table() -> String {
        format!("\"{}\"", D::COLLECTION)
    }

    fn load(seq: i64, data: &str) -> Result<D> {
        let mut doc: D = serde_json::from_str(data)?;
        doc.assign_seq(seq);
        Ok(doc)
    }

    /// Column + bound value addressing a single document
    fn locate(id: &DocId) -> Option<(&'static str, Value)> {
        match id {
            DocId::Key(key) => Some(("key", Value::Text(key.clone()))),
            DocId::Seq(seq) => Some(("seq", Value::Integer(*seq))),
            DocId::Unassigned => None,
        }
    }

    /// Point lookup by key or sequence
    pub fn get(&self, id: &DocId) -> Result<Option<D>> {
        let Some((column, value)) = Self::locate(id) else {
            return Ok(None);
        };

        let row: Option<(i64, String)> = self
            .file
            .conn()
            .query_row(
                &format!(
                    "SELECT seq, data FROM {} WHERE {} = ?1",
                    Self::table(),
                    column
                ),
                params![value],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .at(self.file.path())?;

        row.map(|(seq, data)| Self::load(seq, &data)).transpose()
    }

    /// Every document in insertion order
    pub fn all(&self) -> Result<Vec<D>> {
        self.find(&Filter::new())
    }

    /// Documents matching every clause of `filter`, in insertion order
    pub fn find(&self, filter: &Filter) -> Result<Vec<D>> {
        let (clause, values) = filter.to_sql();
        let sql = format!(
            "SELECT seq, data FROM {} WHERE {} ORDER BY seq",
            Self::table(),
            clause
        );
        self.collect_rows(&sql, values)
    }

    pub fn find_one(&self, filter: &Filter) -> Result<Option<D>> {
        Ok(self.find(filter)?.into_iter().next())
    }

    /// Insert a new document. Auto-keyed documents get their sequence assigned.
    pub fn insert(&self, doc: &mut D) -> Result<()> {
        let key = match doc.id() {
            DocId::Key(key) => Some(key),
            DocId::Seq(_) | DocId::Unassigned => None,
        };
        let data = serde_json::to_string(doc)?;

        let conn = self.file.conn();
        conn.execute(
            &format!("INSERT INTO {} (key, data) VALUES (?1, ?2)", Self::table()),
            params![key, data],
        )
        .at(self.file.path())?;

        doc.assign_seq(conn.last_insert_rowid());
        Ok(())
    }

    /// Overwrite an existing document. Returns false if there was nothing to overwrite.
    pub fn update(&self, doc: &D) -> Result<bool> {
        let (column, value) =
            Self::locate(&doc.id()).ok_or(StoreError::Unassigned {
                collection: D::COLLECTION,
            })?;
        let data = serde_json::to_string(doc)?;

        let changed = self
            .file
            .conn()
            .execute(
                &format!(
                    "UPDATE {} SET data = ?1 WHERE {} = ?2",
                    Self::table(),
                    column
                ),
                params![data, value],
            )
            .at(self.file.path())?;

        Ok(changed > 0)
    }

    /// Full overwrite if the document exists, insert otherwise
    pub fn upsert(&self, doc: &mut D) -> Result<Upserted> {
        if doc.id() != DocId::Unassigned && self.update(doc)? {
            return Ok(Upserted::Updated);
        }
        self.insert(doc)?;
        Ok(Upserted::Inserted)
    }

    /// Delete by key or sequence. Missing documents aren't an error.
    pub fn delete(&self, id: &DocId) -> Result<bool> {
        let Some((column, value)) = Self::locate(id) else {
            return Ok(false);
        };

        let changed = self
            .file
            .conn()
            .execute(
                &format!("DELETE FROM {} WHERE {} = ?1", Self::table(), column),
                params![value],
            )
            .at(self.file.path())?;

        Ok(changed > 0)
    }

    /// Delete everything matching `filter` and hand back what was removed
    pub fn delete_where(&self, filter: &Filter) -> Result<Vec<D>> {
        let (clause, values) = filter.to_sql();
        let sql = format!(
            "DELETE FROM {} WHERE {} RETURNING seq, data",
            Self::table(),
            clause
        );

        let mut removed = self.collect_rows(&sql, values)?;
        // RETURNING order is unspecified
        removed.sort_by_key(|doc| match doc.id() {
            DocId::Seq(seq) => seq,
            _ => 0,
        });
        Ok(removed)
    }

    pub fn count(&self) -> Result<usize> {
        let n: i64 = self
            .file
            .conn()
            .query_row(&format!("SELECT COUNT(*) FROM {}", Self::table()), [], |row| {
                row.get(0)
            })
            .at(self.file.path())?;
        Ok(n as usize)
    }

    fn collect_rows(&self, sql: &str, values: Vec<Value>) -> Result<Vec<D>> {
        let path = self.file.path();
        let mut stmt = self.file.conn().prepare(sql).at(path)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })
            .at(path)?;

        let mut docs = Vec::new();
        for row in rows {
            let (seq, data) = row.at(path)?;
            docs.push(Self::load(seq, &data)?);
        }
        Ok(docs)
    }
}
