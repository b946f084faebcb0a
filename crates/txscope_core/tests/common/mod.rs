#![allow(dead_code)]

use rusqlite::types::Value;
use rusqlite::{Connection, Row};
use txscope_core::{open_db_in_memory, Entity, RepoError, RepoResult, TxError};

/// Opens an in-memory store with the tables the test entities persist to.
pub fn setup_db() -> Connection {
    let conn = open_db_in_memory().expect("in-memory open should succeed");
    conn.execute_batch(
        "CREATE TABLE people (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            age INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        );
        CREATE TABLE pets (
            id INTEGER PRIMARY KEY,
            owner_id INTEGER NOT NULL REFERENCES people(id),
            name TEXT NOT NULL
        );",
    )
    .expect("schema setup should succeed");
    conn
}

/// Error type for units of work that mix repository and injected failures.
#[derive(Debug)]
pub enum TestError {
    Repo(RepoError),
    Tx(TxError),
    Injected,
}

impl From<RepoError> for TestError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<TxError> for TestError {
    fn from(value: TxError) -> Self {
        Self::Tx(value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Person {
    pub id: Option<i64>,
    pub name: String,
    pub age: i64,
    pub created_at: i64,
    pub pets: Vec<Pet>,
}

impl Person {
    pub fn new(name: &str, age: i64) -> Self {
        Self {
            name: name.to_string(),
            age,
            created_at: 1_700_000_000_000,
            ..Self::default()
        }
    }
}

impl Entity for Person {
    const TABLE: &'static str = "people";

    fn columns() -> &'static [&'static str] {
        &["name", "age", "created_at"]
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.name.clone()),
            Value::Integer(self.age),
            Value::Integer(self.created_at),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            name: row.get(1)?,
            age: row.get(2)?,
            created_at: row.get(3)?,
            pets: Vec::new(),
        })
    }

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    fn is_zero(&self) -> bool {
        self == &Self::default()
    }

    fn load_relation(&mut self, conn: &Connection, relation: &str) -> RepoResult<()> {
        match relation {
            "pets" => {
                let owner_id = self.id.unwrap_or_default();
                let mut stmt = conn
                    .prepare("SELECT id, owner_id, name FROM pets WHERE owner_id = ? ORDER BY id")
                    .map_err(preload_error)?;
                let mut rows = stmt.query([Value::Integer(owner_id)]).map_err(preload_error)?;

                self.pets.clear();
                while let Some(row) = rows.next().map_err(preload_error)? {
                    self.pets.push(Pet::from_row(row).map_err(preload_error)?);
                }
                Ok(())
            }
            other => Err(RepoError::UnknownRelation {
                entity: Self::TABLE,
                relation: other.to_string(),
            }),
        }
    }
}

fn preload_error(source: rusqlite::Error) -> RepoError {
    RepoError::Query {
        entity: "people",
        operation: "preload",
        source,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pet {
    pub id: Option<i64>,
    pub owner_id: i64,
    pub name: String,
}

impl Pet {
    pub fn new(owner_id: i64, name: &str) -> Self {
        Self {
            id: None,
            owner_id,
            name: name.to_string(),
        }
    }
}

impl Entity for Pet {
    const TABLE: &'static str = "pets";

    fn columns() -> &'static [&'static str] {
        &["owner_id", "name"]
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.owner_id),
            Value::Text(self.name.clone()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            owner_id: row.get(1)?,
            name: row.get(2)?,
        })
    }

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    fn is_zero(&self) -> bool {
        self == &Self::default()
    }
}
