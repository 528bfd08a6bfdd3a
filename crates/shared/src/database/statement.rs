// Prepared statements, parameter binding and row decoding

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Value};
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteRow};
use sqlx::Row;

use super::{DatabaseError, DatabaseManager, Result};

/// Column storage classes understood by the binding helpers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Integer,
    Real,
    Text,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Integer => write!(f, "INTEGER"),
            DataType::Real => write!(f, "REAL"),
            DataType::Text => write!(f, "TEXT"),
        }
    }
}

/// A single bound parameter value
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl SqlValue {
    /// Convert a JSON value to the requested column type.
    /// Booleans are accepted for INTEGER columns as 0/1.
    pub fn from_json(value: &Value, data_type: DataType) -> Option<SqlValue> {
        match (data_type, value) {
            (_, Value::Null) => Some(SqlValue::Null),
            (DataType::Integer, Value::Bool(b)) => Some(SqlValue::Integer(i64::from(*b))),
            (DataType::Integer, Value::Number(n)) => n.as_i64().map(SqlValue::Integer),
            (DataType::Real, Value::Number(n)) => n.as_f64().map(SqlValue::Real),
            (DataType::Text, Value::String(s)) => Some(SqlValue::Text(s.clone())),
            _ => None,
        }
    }
}

/// JSON type name for diagnostics
pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "real",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Result of executing a statement that returns no rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecuteOutcome {
    pub rows_affected: u64,
    pub last_insert_id: i64,
}

/// A statement that has been validated against the schema and is collecting
/// its parameters. Indexes are 1-based. The first binding error poisons the
/// statement: later binds are ignored and execution returns that error.
#[must_use]
#[derive(Debug)]
pub struct PreparedStatement<'db> {
    db: &'db DatabaseManager,
    sql: String,
    placeholders: usize,
    params: BTreeMap<usize, SqlValue>,
    error: Option<DatabaseError>,
}

impl<'db> PreparedStatement<'db> {
    pub(super) fn new(db: &'db DatabaseManager, sql: &str, placeholders: usize) -> Self {
        PreparedStatement {
            db,
            sql: sql.to_string(),
            placeholders,
            params: BTreeMap::new(),
            error: None,
        }
    }

    /// Bind a value at `index`
    pub fn bind(mut self, index: usize, value: SqlValue) -> Self {
        if self.error.is_some() {
            tracing::error!("Error in bind({}): previous error prevents further modification", index);
            return self;
        }
        if index == 0 {
            self.poison(DatabaseError::BadIndex(index));
            return self;
        }
        self.params.insert(index, value);
        self
    }

    pub fn bind_text(self, index: usize, value: impl Into<String>) -> Self {
        self.bind(index, SqlValue::Text(value.into()))
    }

    pub fn bind_int(self, index: usize, value: i64) -> Self {
        self.bind(index, SqlValue::Integer(value))
    }

    pub fn bind_double(self, index: usize, value: f64) -> Self {
        self.bind(index, SqlValue::Real(value))
    }

    pub fn bind_bool(self, index: usize, value: bool) -> Self {
        self.bind(index, SqlValue::Integer(i64::from(value)))
    }

    pub fn bind_null(self, index: usize) -> Self {
        self.bind(index, SqlValue::Null)
    }

    /// Bind `json[key]` if present and non-null, else `default` if given,
    /// else NULL. A value of the wrong JSON type poisons the statement.
    pub fn bind_optional(
        mut self,
        index: usize,
        json: &Value,
        key: &str,
        data_type: DataType,
        default: Option<SqlValue>,
    ) -> Self {
        match json.get(key) {
            Some(value) if !value.is_null() => match SqlValue::from_json(value, data_type) {
                Some(converted) => self.bind(index, converted),
                None => {
                    if self.error.is_none() {
                        self.poison(DatabaseError::TypeMismatch {
                            index,
                            key: key.to_string(),
                            expected: data_type,
                            found: json_type_name(value).to_string(),
                        });
                    }
                    self
                }
            },
            _ => self.bind(index, default.unwrap_or(SqlValue::Null)),
        }
    }

    /// True once a binding error has been recorded
    pub fn is_poisoned(&self) -> bool {
        self.error.is_some()
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Number of `?` placeholders in the statement
    pub fn placeholders(&self) -> usize {
        self.placeholders
    }

    fn poison(&mut self, error: DatabaseError) {
        tracing::error!("Statement binding failed: {}", error);
        self.error = Some(error);
    }

    /// Check the statement is executable and hand back its parts
    fn into_parts(self) -> Result<(&'db DatabaseManager, String, Vec<SqlValue>)> {
        if let Some(error) = self.error {
            tracing::error!("Refusing to execute poisoned statement: {}", self.sql);
            return Err(DatabaseError::Poisoned(Box::new(error)));
        }
        let last = self.params.keys().next_back().copied().unwrap_or(0);
        if let Some(missing) = (1..=last.max(self.placeholders)).find(|i| !self.params.contains_key(i)) {
            tracing::error!("Parameter {} of '{}' was never bound", missing, self.sql);
            return Err(DatabaseError::Unbound(missing));
        }
        Ok((self.db, self.sql, self.params.into_values().collect()))
    }

    /// Execute a statement that returns no rows
    pub async fn execute(self) -> Result<ExecuteOutcome> {
        let (db, sql, params) = self.into_parts()?;
        let result = build_query(&sql, params)
            .execute(db.pool())
            .await
            .inspect_err(|e| tracing::error!("Error in execute: {}", e))?;

        Ok(ExecuteOutcome {
            rows_affected: result.rows_affected(),
            last_insert_id: result.last_insert_rowid(),
        })
    }

    /// Fetch at most one row
    pub async fn fetch_optional(self) -> Result<Option<SqliteRow>> {
        let (db, sql, params) = self.into_parts()?;
        Ok(build_query(&sql, params).fetch_optional(db.pool()).await?)
    }

    /// Fetch every row
    pub async fn fetch_all(self) -> Result<Vec<SqliteRow>> {
        let (db, sql, params) = self.into_parts()?;
        Ok(build_query(&sql, params).fetch_all(db.pool()).await?)
    }

    /// Read the first column of the first row as a boolean; no row is false
    pub async fn fetch_boolean(self) -> Result<bool> {
        Ok(match self.fetch_optional().await? {
            Some(row) => row.try_get::<Option<i64>, _>(0)?.unwrap_or(0) != 0,
            None => false,
        })
    }
}

fn build_query(sql: &str, params: Vec<SqlValue>) -> Query<'_, Sqlite, SqliteArguments<'_>> {
    params.into_iter().fold(sqlx::query(sql), |query, value| match value {
        SqlValue::Null => query.bind(None::<String>),
        SqlValue::Integer(v) => query.bind(v),
        SqlValue::Real(v) => query.bind(v),
        SqlValue::Text(v) => query.bind(v),
    })
}

/// Typed column extraction into JSON
pub trait RowExt {
    /// Read `column` as `data_type`. SQL NULL (or an undecodable value) is None.
    fn get_json(&self, column: &str, data_type: DataType) -> Option<Value>;

    /// Build a JSON object from the listed columns, omitting NULLs
    fn columns_to_json<'a>(&self, columns: impl IntoIterator<Item = (&'a str, DataType)>) -> Value {
        let mut object = Map::new();
        for (column, data_type) in columns {
            if let Some(value) = self.get_json(column, data_type) {
                object.insert(column.to_string(), value);
            }
        }
        Value::Object(object)
    }
}

impl RowExt for SqliteRow {
    fn get_json(&self, column: &str, data_type: DataType) -> Option<Value> {
        let decoded = match data_type {
            DataType::Integer => self.try_get::<Option<i64>, _>(column).map(|v| v.map(Value::from)),
            DataType::Real => self.try_get::<Option<f64>, _>(column).map(|v| v.map(Value::from)),
            DataType::Text => self.try_get::<Option<String>, _>(column).map(|v| v.map(Value::from)),
        };
        decoded.unwrap_or_else(|e| {
            tracing::trace!("get_json({}): decode failed: {}", column, e);
            None
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MEMORY_PATH;
    use serde_json::json;

    async fn items_db() -> DatabaseManager {
        let db = DatabaseManager::open(MEMORY_PATH).await.unwrap();
        db.create_table_if_not_exists(
            "Items",
            "item_id INTEGER PRIMARY KEY AUTOINCREMENT, \
             item_name TEXT NOT NULL, \
             item_price REAL, \
             item_count INTEGER NOT NULL DEFAULT 0",
        )
        .await
        .unwrap();
        db
    }

    const ITEM_COLUMNS: [(&str, DataType); 4] = [
        ("item_id", DataType::Integer),
        ("item_name", DataType::Text),
        ("item_price", DataType::Real),
        ("item_count", DataType::Integer),
    ];

    #[tokio::test]
    async fn test_prepare_bind_execute() {
        let db = items_db().await;
        let outcome = db
            .prepare("INSERT INTO Items (item_name, item_price, item_count) VALUES (?, ?, ?);")
            .await
            .unwrap()
            .bind_text(1, "widget")
            .bind_double(2, 2.5)
            .bind_int(3, 4)
            .execute()
            .await
            .unwrap();
        assert_eq!(outcome.rows_affected, 1);
        assert_eq!(outcome.last_insert_id, 1);

        let row = db
            .prepare("SELECT * FROM Items WHERE item_id = ?;")
            .await
            .unwrap()
            .bind_int(1, 1)
            .fetch_optional()
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            row.columns_to_json(ITEM_COLUMNS),
            json!({"item_id": 1, "item_name": "widget", "item_price": 2.5, "item_count": 4})
        );
    }

    #[tokio::test]
    async fn test_null_columns_are_omitted() {
        let db = items_db().await;
        db.prepare("INSERT INTO Items (item_name, item_price) VALUES (?, ?);")
            .await
            .unwrap()
            .bind_text(1, "bare")
            .bind_null(2)
            .execute()
            .await
            .unwrap();

        let rows = db.prepare("SELECT * FROM Items;").await.unwrap().fetch_all().await.unwrap();
        assert_eq!(rows.len(), 1);
        let record = rows[0].columns_to_json(ITEM_COLUMNS);
        assert!(record.get("item_price").is_none());
        assert_eq!(record["item_count"], 0);
    }

    #[tokio::test]
    async fn test_bind_optional_prefers_json_then_default_then_null() {
        let db = items_db().await;
        let data = json!({"item_name": "gadget", "item_price": null});

        db.prepare("INSERT INTO Items (item_name, item_price, item_count) VALUES (?, ?, ?);")
            .await
            .unwrap()
            .bind_optional(1, &data, "item_name", DataType::Text, None)
            .bind_optional(2, &data, "item_price", DataType::Real, None)
            .bind_optional(3, &data, "item_count", DataType::Integer, Some(SqlValue::Integer(9)))
            .execute()
            .await
            .unwrap();

        let row = db
            .prepare("SELECT * FROM Items WHERE item_name = ?;")
            .await
            .unwrap()
            .bind_text(1, "gadget")
            .fetch_optional()
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.get_json("item_price", DataType::Real), None);
        assert_eq!(row.get_json("item_count", DataType::Integer), Some(json!(9)));
    }

    #[tokio::test]
    async fn test_type_mismatch_poisons_statement() {
        let db = items_db().await;
        let data = json!({"item_name": 42});

        let statement = db
            .prepare("INSERT INTO Items (item_name) VALUES (?);")
            .await
            .unwrap()
            .bind_optional(1, &data, "item_name", DataType::Text, None);
        assert!(statement.is_poisoned());

        // Later binds do not clear the error
        let err = statement.bind_text(1, "fine").execute().await.unwrap_err();
        match err {
            DatabaseError::Poisoned(inner) => {
                assert!(matches!(*inner, DatabaseError::TypeMismatch { index: 1, .. }))
            }
            other => panic!("unexpected error: {}", other),
        }

        let count = db
            .prepare("SELECT COUNT(*) FROM Items;")
            .await
            .unwrap()
            .fetch_boolean()
            .await
            .unwrap();
        assert!(!count);
    }

    #[tokio::test]
    async fn test_zero_index_and_gaps_are_rejected() {
        let db = items_db().await;
        let err = db
            .prepare("INSERT INTO Items (item_name) VALUES (?);")
            .await
            .unwrap()
            .bind_text(0, "x")
            .execute()
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Poisoned(_)));

        let err = db
            .prepare("INSERT INTO Items (item_name, item_count) VALUES (?, ?);")
            .await
            .unwrap()
            .bind_int(2, 1)
            .execute()
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Unbound(1)));
    }

    #[tokio::test]
    async fn test_missing_trailing_parameter_is_rejected() {
        let db = items_db().await;
        let statement = db
            .prepare("INSERT INTO Items (item_name, item_count) VALUES (?, ?);")
            .await
            .unwrap();
        assert_eq!(statement.placeholders(), 2);

        let err = statement.bind_text(1, "x").execute().await.unwrap_err();
        assert!(matches!(err, DatabaseError::Unbound(2)));

        let err = db
            .prepare("SELECT * FROM Items WHERE item_id = ?;")
            .await
            .unwrap()
            .fetch_all()
            .await
            .err()
            .unwrap();
        assert!(matches!(err, DatabaseError::Unbound(1)));

        let count = db
            .prepare("SELECT COUNT(*) FROM Items;")
            .await
            .unwrap()
            .fetch_boolean()
            .await
            .unwrap();
        assert!(!count);
    }

    #[tokio::test]
    async fn test_constraint_violation_is_an_error() {
        let db = items_db().await;
        let result = db
            .prepare("INSERT INTO Items (item_name) VALUES (?);")
            .await
            .unwrap()
            .bind_null(1)
            .execute()
            .await;
        assert!(matches!(result, Err(DatabaseError::Sqlx(_))));
    }

    #[tokio::test]
    async fn test_fetch_boolean_without_rows_is_false() {
        let db = items_db().await;
        let found = db
            .prepare("SELECT 1 FROM Items WHERE item_id = ?;")
            .await
            .unwrap()
            .bind_int(1, 99)
            .fetch_boolean()
            .await
            .unwrap();
        assert!(!found);
    }

    #[test]
    fn test_sql_value_from_json() {
        assert_eq!(SqlValue::from_json(&json!(true), DataType::Integer), Some(SqlValue::Integer(1)));
        assert_eq!(SqlValue::from_json(&json!(3), DataType::Real), Some(SqlValue::Real(3.0)));
        assert_eq!(SqlValue::from_json(&json!("x"), DataType::Integer), None);
        assert_eq!(SqlValue::from_json(&json!(1.5), DataType::Integer), None);
        assert_eq!(SqlValue::from_json(&json!(null), DataType::Text), Some(SqlValue::Null));
        assert_eq!(json_type_name(&json!([1])), "array");
    }
}
