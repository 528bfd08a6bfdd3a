// UserDao - account records in the Users table
//
// Deleting a user only clears user_visibility. Hidden rows keep their name
// reserved (user_name is UNIQUE) but are invisible to every lookup here.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::database::{DataType, DatabaseManager, RowExt, SqlValue};
use crate::PERMISSION_BASE;

use super::{typed_value, validate_required, Column, DaoError, DaoResult, GenericDao};

const USER_COLUMNS: [Column; 11] = [
    Column::new("user_id", DataType::Integer, false),
    Column::new("user_name", DataType::Text, true),
    Column::new("user_salt", DataType::Text, true),
    Column::new("user_passhash", DataType::Text, true),
    Column::new("user_legalname", DataType::Text, true),
    Column::new("user_phonenumber", DataType::Text, true),
    Column::new("user_emailaddress", DataType::Text, true),
    Column::new("user_description", DataType::Text, true),
    Column::new("user_permission", DataType::Integer, true),
    Column::new("user_visibility", DataType::Integer, false),
    Column::new("user_timestamp", DataType::Integer, false),
];

/// Fields every insert must carry
const REQUIRED_FIELDS: [(&str, DataType); 3] = [
    ("user_name", DataType::Text),
    ("user_salt", DataType::Text),
    ("user_passhash", DataType::Text),
];

const INSERT_SQL: &str = "INSERT INTO Users (user_name, user_salt, user_passhash, \
     user_legalname, user_phonenumber, user_emailaddress, user_description, \
     user_permission, user_timestamp) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?);";

/// A visible user row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: i64,
    pub user_name: String,
    pub user_salt: String,
    pub user_passhash: String,
    #[serde(default)]
    pub user_legalname: Option<String>,
    #[serde(default)]
    pub user_phonenumber: Option<String>,
    #[serde(default)]
    pub user_emailaddress: Option<String>,
    #[serde(default)]
    pub user_description: Option<String>,
    pub user_permission: i64,
    pub user_visibility: i64,
    pub user_timestamp: i64,
}

/// Record access for the Users table
#[derive(Clone, Debug)]
pub struct UserDao {
    db: DatabaseManager,
}

impl UserDao {
    pub fn new(db: DatabaseManager) -> Self {
        UserDao { db }
    }

    /// Check the fields an insert requires
    pub fn validate_json_fields(json_data: &Value) -> DaoResult<()> {
        validate_required(json_data, &REQUIRED_FIELDS).inspect_err(|e| {
            tracing::warn!("Rejected user data: {}", e);
        })
    }

    /// Id of the visible user called `user_name`
    pub async fn get_id_given_username(&self, user_name: &str) -> DaoResult<Option<i64>> {
        let row = self
            .db
            .prepare("SELECT user_id FROM Users WHERE user_name = ? AND user_visibility = 1;")
            .await?
            .bind_text(1, user_name)
            .fetch_optional()
            .await?;

        match row {
            Some(row) => Ok(Some(sqlx::Row::try_get::<i64, _>(&row, 0)?)),
            None => Ok(None),
        }
    }

    /// Full record of the visible user called `user_name`
    pub async fn retrieve_record_by_username(&self, user_name: &str) -> DaoResult<Option<UserRecord>> {
        let row = self
            .db
            .prepare("SELECT * FROM Users WHERE user_name = ? AND user_visibility = 1;")
            .await?
            .bind_text(1, user_name)
            .fetch_optional()
            .await?;

        match row {
            Some(row) => Ok(Some(serde_json::from_value(row.columns_to_json(Self::column_types()))?)),
            None => Ok(None),
        }
    }

    /// Read one column of a visible user. None when the user is missing or
    /// the column is NULL.
    pub async fn query_field_by_id(&self, id: i64, field_name: &str) -> DaoResult<Option<Value>> {
        let column =
            Self::column(field_name).ok_or_else(|| DaoError::UnknownField(field_name.to_string()))?;

        let sql = format!(
            "SELECT {} FROM Users WHERE user_id = ? AND user_visibility = 1;",
            column.name
        );
        let row = self.db.prepare(&sql).await?.bind_int(1, id).fetch_optional().await?;
        Ok(row.and_then(|row| row.get_json(column.name, column.data_type)))
    }
}

impl GenericDao for UserDao {
    const TABLE: &'static str = "Users";
    const ID_COLUMN: &'static str = "user_id";
    const SCHEMA: &'static str = "\
        user_id            INTEGER     PRIMARY KEY     AUTOINCREMENT, \
        user_name          TEXT        NOT NULL        UNIQUE, \
        user_salt          TEXT        NOT NULL, \
        user_passhash      TEXT        NOT NULL, \
        user_legalname     TEXT, \
        user_phonenumber   TEXT, \
        user_emailaddress  TEXT, \
        user_description   TEXT, \
        user_permission    INTEGER     NOT NULL        DEFAULT 1, \
        user_visibility    BOOLEAN     NOT NULL        DEFAULT 1, \
        user_timestamp     INTEGER     NOT NULL        DEFAULT (strftime('%s', 'now'))";
    const COLUMNS: &'static [Column] = &USER_COLUMNS;

    fn database(&self) -> &DatabaseManager {
        &self.db
    }

    async fn insert_record(&self, json_data: &Value) -> DaoResult<i64> {
        Self::validate_json_fields(json_data)?;

        let outcome = self
            .db
            .prepare(INSERT_SQL)
            .await?
            .bind_optional(1, json_data, "user_name", DataType::Text, None)
            .bind_optional(2, json_data, "user_salt", DataType::Text, None)
            .bind_optional(3, json_data, "user_passhash", DataType::Text, None)
            .bind_optional(4, json_data, "user_legalname", DataType::Text, None)
            .bind_optional(5, json_data, "user_phonenumber", DataType::Text, None)
            .bind_optional(6, json_data, "user_emailaddress", DataType::Text, None)
            .bind_optional(7, json_data, "user_description", DataType::Text, None)
            .bind_optional(
                8,
                json_data,
                "user_permission",
                DataType::Integer,
                Some(SqlValue::Integer(PERMISSION_BASE)),
            )
            .bind_int(9, chrono::Utc::now().timestamp())
            .execute()
            .await?;

        tracing::debug!("Inserted user {}", outcome.last_insert_id);
        Ok(outcome.last_insert_id)
    }

    async fn retrieve_record_by_id(&self, id: i64) -> DaoResult<Option<Value>> {
        let row = self
            .db
            .prepare("SELECT * FROM Users WHERE user_id = ? AND user_visibility = 1;")
            .await?
            .bind_int(1, id)
            .fetch_optional()
            .await?;

        Ok(row.map(|row| row.columns_to_json(Self::column_types())))
    }

    async fn update_record_by_id(&self, id: i64, json_data: &Value) -> DaoResult<bool> {
        let object = json_data.as_object().ok_or(DaoError::NotAnObject)?;
        if object.is_empty() {
            return Err(DaoError::EmptyUpdate);
        }

        let mut assignments = Vec::with_capacity(object.len());
        let mut values = Vec::with_capacity(object.len());
        for (key, value) in object {
            let column = Self::column(key).ok_or_else(|| DaoError::UnknownField(key.clone()))?;
            if !column.editable {
                return Err(DaoError::FieldNotEditable(key.clone()));
            }
            assignments.push(format!("{} = ?", column.name));
            values.push(typed_value(column, value)?);
        }

        let sql = format!(
            "UPDATE Users SET {} WHERE user_id = ? AND user_visibility = 1;",
            assignments.join(", ")
        );
        let id_index = values.len() + 1;
        let statement = values
            .into_iter()
            .enumerate()
            .fold(self.db.prepare(&sql).await?, |statement, (i, value)| statement.bind(i + 1, value));

        let outcome = statement.bind_int(id_index, id).execute().await?;
        tracing::debug!("Updated user {} ({} rows)", id, outcome.rows_affected);
        Ok(outcome.rows_affected > 0)
    }

    async fn delete_record_by_id(&self, id: i64) -> DaoResult<bool> {
        let outcome = self
            .db
            .prepare("UPDATE Users SET user_visibility = 0 WHERE user_id = ? AND user_visibility = 1;")
            .await?
            .bind_int(1, id)
            .execute()
            .await?;

        if outcome.rows_affected == 0 {
            tracing::debug!("No visible user {} to delete", id);
        }
        Ok(outcome.rows_affected > 0)
    }
}
