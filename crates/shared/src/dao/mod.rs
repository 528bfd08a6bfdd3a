// DAO module - per-table record access over DatabaseManager
//
// Records cross this boundary as JSON objects keyed by column name. Each DAO
// describes its table (name, schema, columns) and implements the CRUD set on
// top of prepared statements.

pub mod login;
pub mod user;

use serde_json::Value;

use crate::database::{json_type_name, DataType, DatabaseError, DatabaseManager, SqlValue};

pub use login::LoginDao;
pub use user::{UserDao, UserRecord};

/// Errors raised by the DAO layer
#[derive(Debug, thiserror::Error)]
pub enum DaoError {
    #[error("missing required field '{0}'")]
    MissingField(String),
    #[error("field '{field}' must be {expected}, got {found}")]
    WrongType {
        field: String,
        expected: DataType,
        found: String,
    },
    #[error("record data must be a JSON object")]
    NotAnObject,
    #[error("unknown field '{0}'")]
    UnknownField(String),
    #[error("field '{0}' cannot be modified")]
    FieldNotEditable(String),
    #[error("update contains no fields")]
    EmptyUpdate,
    #[error("{0} are append only")]
    AppendOnly(&'static str),
    #[error("malformed record: {0}")]
    Decode(#[from] serde_json::Error),
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<sqlx::Error> for DaoError {
    fn from(e: sqlx::Error) -> Self {
        DaoError::Database(DatabaseError::Sqlx(e))
    }
}

pub type DaoResult<T> = std::result::Result<T, DaoError>;

/// Description of one table column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub data_type: DataType,
    /// Whether updates may change this column
    pub editable: bool,
}

impl Column {
    pub const fn new(name: &'static str, data_type: DataType, editable: bool) -> Self {
        Column { name, data_type, editable }
    }
}

/// Common record access interface
#[allow(async_fn_in_trait)]
pub trait GenericDao {
    /// Table name
    const TABLE: &'static str;
    /// Primary key column
    const ID_COLUMN: &'static str;
    /// Column definitions used by CREATE TABLE
    const SCHEMA: &'static str;
    /// Every column, in table order
    const COLUMNS: &'static [Column];

    fn database(&self) -> &DatabaseManager;

    /// Look up a column by name
    fn column(name: &str) -> Option<&'static Column> {
        Self::COLUMNS.iter().find(|c| c.name == name)
    }

    /// Column list for row decoding
    fn column_types() -> impl Iterator<Item = (&'static str, DataType)> {
        Self::COLUMNS.iter().map(|c| (c.name, c.data_type))
    }

    /// Create the backing table if it does not exist
    async fn create_table(&self) -> DaoResult<()> {
        self.database()
            .create_table_if_not_exists(Self::TABLE, Self::SCHEMA)
            .await?;
        Ok(())
    }

    /// Insert a record, returning its id
    async fn insert_record(&self, json_data: &Value) -> DaoResult<i64>;

    /// Fetch a record by id
    async fn retrieve_record_by_id(&self, id: i64) -> DaoResult<Option<Value>>;

    /// Apply the fields in `json_data` to a record; true when a row changed
    async fn update_record_by_id(&self, id: i64, json_data: &Value) -> DaoResult<bool>;

    /// Remove a record; true when a row was removed
    async fn delete_record_by_id(&self, id: i64) -> DaoResult<bool>;

    /// Is there any record whose `field` equals `value`?
    async fn existence_of_record_by_field(&self, field: &str, value: &Value) -> DaoResult<bool> {
        let column = Self::column(field).ok_or_else(|| DaoError::UnknownField(field.to_string()))?;
        // `col = NULL` never matches
        if value.is_null() {
            return Err(DaoError::WrongType {
                field: column.name.to_string(),
                expected: column.data_type,
                found: json_type_name(value).to_string(),
            });
        }
        let bound = typed_value(column, value)?;

        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = ?);",
            Self::TABLE,
            column.name
        );
        let exists = self
            .database()
            .prepare(&sql)
            .await?
            .bind(1, bound)
            .fetch_boolean()
            .await?;
        Ok(exists)
    }
}

/// Convert a JSON value to the column's type or report the mismatch
pub(crate) fn typed_value(column: &Column, value: &Value) -> DaoResult<SqlValue> {
    SqlValue::from_json(value, column.data_type).ok_or_else(|| DaoError::WrongType {
        field: column.name.to_string(),
        expected: column.data_type,
        found: json_type_name(value).to_string(),
    })
}

/// Check that every required field is present, non-null and of the right type
pub(crate) fn validate_required(json_data: &Value, required: &[(&str, DataType)]) -> DaoResult<()> {
    let object = json_data.as_object().ok_or(DaoError::NotAnObject)?;

    for &(field, data_type) in required {
        let value = match object.get(field) {
            Some(value) if !value.is_null() => value,
            _ => return Err(DaoError::MissingField(field.to_string())),
        };
        if SqlValue::from_json(value, data_type).is_none() {
            return Err(DaoError::WrongType {
                field: field.to_string(),
                expected: data_type,
                found: json_type_name(value).to_string(),
            });
        }
    }

    Ok(())
}
