use std::collections::BTreeSet;
use std::fmt;

use anyhow::{anyhow, Result};
use err_derive::Error;
use log::*;
use r2d2::ManageConnection;
use r2d2_postgres::PostgresConnectionManager;
use serde::{de::DeserializeOwned, Serialize};

use crate::documents::{HasMeta, Version};
use crate::ids::{Entity, Id, DIVIDER};

#[derive(Debug, Error, PartialEq, Eq)]
#[error(display = "stale version")]
pub struct ConcurrencyError;

#[derive(Debug, Error, PartialEq, Eq)]
#[error(display = "store unavailable")]
pub struct StoreUnavailable;

/// Document storage. Every document lives under its typed id, so the entity
/// prefix doubles as the collection name.
pub trait Storage {
    fn load<D: DeserializeOwned + Entity>(&self, id: &Id<D>) -> Result<Option<D>>;
    /// Inserts new documents and updates existing ones, failing with
    /// `ConcurrencyError` when the stored version has moved on.
    fn save<D: Serialize + Entity + HasMeta>(&self, document: &mut D) -> Result<()>;
    fn delete<D: Entity + HasMeta>(&self, document: &D) -> Result<()>;
    fn list<D: DeserializeOwned + Entity>(&self) -> Result<Vec<D>>;
    fn any<D: Entity>(&self) -> Result<bool>;
}

pub trait Migrations {
    fn can_connect(&self) -> bool;
    fn pending_upgrades(&self) -> Result<Vec<u32>>;
    fn apply_upgrades(&self) -> Result<()>;
}

pub const MIGRATIONS: &[(u32, &str)] = &[
    (
        1,
        "CREATE TABLE IF NOT EXISTS documents (id TEXT PRIMARY KEY, body JSONB NOT NULL)",
    ),
    (
        2,
        "CREATE INDEX IF NOT EXISTS documents_id_prefix ON documents (id text_pattern_ops)",
    ),
];

const SETUP_MIGRATIONS_SQL: &str =
    "CREATE TABLE IF NOT EXISTS schema_migrations (version INTEGER PRIMARY KEY)";
const LOAD_SQL: &str = "SELECT body FROM documents WHERE id = $1";
const LIST_SQL: &str =
    "SELECT body FROM documents WHERE left(id, char_length($1)) = $1 ORDER BY id";
const ANY_SQL: &str =
    "SELECT EXISTS (SELECT 1 FROM documents WHERE left(id, char_length($1)) = $1)";
const DELETE_SQL: &str = "DELETE FROM documents WHERE id = $1 AND body ->> '_version' = $2";
const VERSION_SQL: &str = "SELECT to_hex(txid_current())";
const INSERT_SQL: &str = "WITH a AS (SELECT $1::jsonb AS body)
    INSERT INTO documents (id, body)
    SELECT a.body ->> '_id',
        jsonb_set(a.body, '{_version}', to_jsonb(to_hex(txid_current())))
    FROM a
    WHERE NOT EXISTS (SELECT 1 FROM documents d WHERE d.id = a.body ->> '_id')";
const UPDATE_SQL: &str = "WITH a AS (SELECT $1::jsonb AS body)
    UPDATE documents AS d
    SET body = jsonb_set(a.body, '{_version}', to_jsonb(to_hex(txid_current())))
    FROM a
    WHERE id = a.body ->> '_id'
    AND d.body -> '_version' = a.body -> '_version'";

pub fn collection_prefix<D: Entity>() -> String {
    format!("{}{}", D::PREFIX, DIVIDER)
}

pub fn pending_of(applied: &BTreeSet<u32>) -> Vec<u32> {
    MIGRATIONS
        .iter()
        .map(|(version, _)| *version)
        .filter(|version| !applied.contains(version))
        .collect()
}

pub struct Documents {
    connection: postgres::Connection,
}

impl Documents {
    pub fn wrap(connection: postgres::Connection) -> Self {
        Documents { connection }
    }

    pub fn get_ref(&self) -> &postgres::Connection {
        &self.connection
    }

    fn applied_upgrades(&self) -> Result<BTreeSet<u32>> {
        let rows = self
            .connection
            .query("SELECT to_regclass('schema_migrations') IS NOT NULL", &[])?;
        let has_table = match rows.iter().next() {
            Some(row) => row
                .get_opt::<_, bool>(0)
                .ok_or_else(|| anyhow!("Missing column in row?"))??,
            None => false,
        };
        if !has_table {
            return Ok(BTreeSet::new());
        }

        let rows = self
            .connection
            .query("SELECT version FROM schema_migrations", &[])?;
        let mut applied = BTreeSet::new();
        for row in rows.iter() {
            let version: i32 = row
                .get_opt(0)
                .ok_or_else(|| anyhow!("Missing version column?"))??;
            applied.insert(version as u32);
        }
        Ok(applied)
    }
}

impl fmt::Debug for Documents {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("Documents").finish()
    }
}

impl Storage for Documents {
    fn load<D: DeserializeOwned + Entity>(&self, id: &Id<D>) -> Result<Option<D>> {
        let load = self.connection.prepare_cached(LOAD_SQL)?;
        let res = load.query(&[&id.to_string()])?;

        if let Some(row) = res.iter().next() {
            let json: serde_json::Value = row
                .get_opt(0)
                .ok_or_else(|| anyhow!("Missing column in row?"))??;
            let doc = serde_json::from_value(json)?;

            Ok(Some(doc))
        } else {
            Ok(None)
        }
    }

    fn save<D: Serialize + Entity + HasMeta>(&self, document: &mut D) -> Result<()> {
        let json = serde_json::to_value(&*document)?;
        let t = self.connection.transaction()?;
        let sql = if document.meta().version.is_new() {
            INSERT_SQL
        } else {
            UPDATE_SQL
        };
        let nrows = t.prepare_cached(sql)?.execute(&[&json])?;
        debug!("Save of {} modified {} rows", document.meta().id, nrows);
        if nrows != 1 {
            warn!("Save impacted {} rows not 1", nrows);
            return Err(ConcurrencyError.into());
        }
        let version: String = {
            let res = t.prepare_cached(VERSION_SQL)?.query(&[])?;
            let row = res
                .iter()
                .next()
                .ok_or_else(|| anyhow!("Missing version row?"))?;
            row.get_opt(0)
                .ok_or_else(|| anyhow!("Missing version column?"))??
        };
        t.commit()?;
        document.meta_mut().version = Version::from(version);
        Ok(())
    }

    fn delete<D: Entity + HasMeta>(&self, document: &D) -> Result<()> {
        let meta = document.meta();
        let nrows = self
            .connection
            .prepare_cached(DELETE_SQL)?
            .execute(&[&meta.id.to_string(), &meta.version.to_string()])?;
        debug!("Delete of {} modified {} rows", meta.id, nrows);
        if nrows != 1 {
            warn!("Delete impacted {} rows not 1", nrows);
            return Err(ConcurrencyError.into());
        }
        Ok(())
    }

    fn list<D: DeserializeOwned + Entity>(&self) -> Result<Vec<D>> {
        let res = self
            .connection
            .prepare_cached(LIST_SQL)?
            .query(&[&collection_prefix::<D>()])?;
        let mut docs = Vec::with_capacity(res.len());
        for row in res.iter() {
            let json: serde_json::Value = row
                .get_opt(0)
                .ok_or_else(|| anyhow!("Missing column in row?"))??;
            docs.push(serde_json::from_value(json)?);
        }
        Ok(docs)
    }

    fn any<D: Entity>(&self) -> Result<bool> {
        let res = self
            .connection
            .prepare_cached(ANY_SQL)?
            .query(&[&collection_prefix::<D>()])?;
        let row = res
            .iter()
            .next()
            .ok_or_else(|| anyhow!("Missing exists row?"))?;
        let exists = row
            .get_opt(0)
            .ok_or_else(|| anyhow!("Missing exists column?"))??;
        Ok(exists)
    }
}

impl Migrations for Documents {
    fn can_connect(&self) -> bool {
        match self.connection.batch_execute("SELECT 1") {
            Ok(()) => true,
            Err(e) => {
                warn!("Connectivity check failed: {}", e);
                false
            }
        }
    }

    fn pending_upgrades(&self) -> Result<Vec<u32>> {
        Ok(pending_of(&self.applied_upgrades()?))
    }

    fn apply_upgrades(&self) -> Result<()> {
        let pending = self.pending_upgrades()?;
        let t = self.connection.transaction()?;
        t.batch_execute(SETUP_MIGRATIONS_SQL)?;
        for (version, sql) in MIGRATIONS.iter() {
            if !pending.contains(version) {
                continue;
            }
            info!("Applying schema upgrade {}", version);
            t.batch_execute(sql)?;
            t.execute(
                "INSERT INTO schema_migrations (version) VALUES ($1)",
                &[&(*version as i32)],
            )?;
        }
        t.commit()?;
        Ok(())
    }
}

pub struct DocumentConnectionManager(PostgresConnectionManager);

impl DocumentConnectionManager {
    pub fn new(manager: PostgresConnectionManager) -> Self {
        DocumentConnectionManager(manager)
    }
}

impl fmt::Debug for DocumentConnectionManager {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("DocumentConnectionManager").finish()
    }
}

impl ManageConnection for DocumentConnectionManager {
    type Connection = Documents;
    type Error = postgres::Error;

    fn connect(&self) -> Result<Documents, postgres::Error> {
        self.0.connect().map(Documents::wrap)
    }

    fn is_valid(&self, conn: &mut Documents) -> Result<(), postgres::Error> {
        self.0.is_valid(&mut conn.connection)
    }

    fn has_broken(&self, conn: &mut Documents) -> bool {
        self.0.has_broken(&mut conn.connection)
    }
}

/// Confines pooled connections to one schema, creating it on first use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UseSchema(String);

impl UseSchema {
    pub fn new(schema: &str) -> Self {
        UseSchema(schema.to_string())
    }

    fn quoted(&self) -> String {
        format!("\"{}\"", self.0.replace('"', "\"\""))
    }
}

impl r2d2::CustomizeConnection<Documents, postgres::Error> for UseSchema {
    fn on_acquire(&self, conn: &mut Documents) -> Result<(), postgres::Error> {
        let schema = self.quoted();
        debug!("Use schema {}", schema);
        conn.get_ref().batch_execute(&format!(
            "CREATE SCHEMA IF NOT EXISTS {0}; SET search_path TO {0}",
            schema
        ))
    }
}
