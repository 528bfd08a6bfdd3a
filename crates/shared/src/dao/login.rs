// LoginDao - append-only login audit trail

use serde_json::Value;

use crate::database::{json_type_name, DataType, DatabaseManager, RowExt};

use super::{validate_required, Column, DaoError, DaoResult, GenericDao};

const LOGIN_COLUMNS: [Column; 4] = [
    Column::new("login_id", DataType::Integer, false),
    Column::new("login_user", DataType::Integer, false),
    Column::new("login_success", DataType::Integer, false),
    Column::new("login_timestamp", DataType::Integer, false),
];

const REQUIRED_FIELDS: [(&str, DataType); 2] = [
    ("login_user", DataType::Integer),
    ("login_success", DataType::Integer),
];

/// Record access for the Logins table. Rows can be added and read, never
/// changed or removed.
#[derive(Clone, Debug)]
pub struct LoginDao {
    db: DatabaseManager,
}

impl LoginDao {
    pub fn new(db: DatabaseManager) -> Self {
        LoginDao { db }
    }

    /// `login_success` must be a boolean or the integers 0 and 1
    fn validate_success_flag(json_data: &Value) -> DaoResult<()> {
        let flag = &json_data["login_success"];
        match flag {
            Value::Bool(_) => Ok(()),
            Value::Number(n) if matches!(n.as_i64(), Some(0 | 1)) => Ok(()),
            _ => Err(DaoError::WrongType {
                field: "login_success".to_string(),
                expected: DataType::Integer,
                found: format!("{} {}", json_type_name(flag), flag),
            }),
        }
    }

    /// Every login attempt recorded for `user_id`, oldest first
    pub async fn retrieve_records_by_user(&self, user_id: i64) -> DaoResult<Vec<Value>> {
        let rows = self
            .db
            .prepare("SELECT * FROM Logins WHERE login_user = ? ORDER BY login_id ASC;")
            .await?
            .bind_int(1, user_id)
            .fetch_all()
            .await?;

        Ok(rows
            .iter()
            .map(|row| row.columns_to_json(Self::column_types()))
            .collect())
    }
}

impl GenericDao for LoginDao {
    const TABLE: &'static str = "Logins";
    const ID_COLUMN: &'static str = "login_id";
    const SCHEMA: &'static str = "\
        login_id           INTEGER     PRIMARY KEY     AUTOINCREMENT, \
        login_user         INTEGER     NOT NULL, \
        login_success      BOOLEAN     NOT NULL        DEFAULT 0, \
        login_timestamp    INTEGER     NOT NULL        DEFAULT (strftime('%s', 'now')), \
        FOREIGN KEY (login_user) REFERENCES Users(user_id)";
    const COLUMNS: &'static [Column] = &LOGIN_COLUMNS;

    fn database(&self) -> &DatabaseManager {
        &self.db
    }

    async fn insert_record(&self, json_data: &Value) -> DaoResult<i64> {
        validate_required(json_data, &REQUIRED_FIELDS)?;
        Self::validate_success_flag(json_data)?;

        let outcome = self
            .db
            .prepare("INSERT INTO Logins (login_user, login_success, login_timestamp) VALUES (?, ?, ?);")
            .await?
            .bind_optional(1, json_data, "login_user", DataType::Integer, None)
            .bind_optional(2, json_data, "login_success", DataType::Integer, None)
            .bind_int(3, chrono::Utc::now().timestamp())
            .execute()
            .await?;

        tracing::debug!("Recorded login {} for user {}", outcome.last_insert_id, json_data["login_user"]);
        Ok(outcome.last_insert_id)
    }

    async fn retrieve_record_by_id(&self, id: i64) -> DaoResult<Option<Value>> {
        let row = self
            .db
            .prepare("SELECT * FROM Logins WHERE login_id = ?;")
            .await?
            .bind_int(1, id)
            .fetch_optional()
            .await?;

        Ok(row.map(|row| row.columns_to_json(Self::column_types())))
    }

    async fn update_record_by_id(&self, id: i64, _json_data: &Value) -> DaoResult<bool> {
        tracing::warn!("Refusing to update login {}: logins are append only", id);
        Err(DaoError::AppendOnly(Self::TABLE))
    }

    async fn delete_record_by_id(&self, id: i64) -> DaoResult<bool> {
        tracing::warn!("Refusing to delete login {}: logins are append only", id);
        Err(DaoError::AppendOnly(Self::TABLE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::UserDao;
    use crate::database::MEMORY_PATH;
    use serde_json::json;

    async fn daos() -> (UserDao, LoginDao) {
        let db = DatabaseManager::open(MEMORY_PATH).await.unwrap();
        let users = UserDao::new(db.clone());
        let logins = LoginDao::new(db);
        users.create_table().await.unwrap();
        logins.create_table().await.unwrap();
        users
            .insert_record(&json!({"user_name": "test_user", "user_salt": "s", "user_passhash": "h"}))
            .await
            .unwrap();
        (users, logins)
    }

    #[tokio::test]
    async fn test_insert_and_retrieve() {
        let (_, logins) = daos().await;
        let before = chrono::Utc::now().timestamp();
        let id = logins
            .insert_record(&json!({"login_user": 1, "login_success": true}))
            .await
            .unwrap();

        let record = logins.retrieve_record_by_id(id).await.unwrap().unwrap();
        assert_eq!(record["login_user"], 1);
        assert_eq!(record["login_success"], 1);
        assert!(record["login_timestamp"].as_i64().unwrap() >= before);
        assert_eq!(logins.retrieve_record_by_id(id + 1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_records_by_user_in_order() {
        let (_, logins) = daos().await;
        for success in [false, false, true] {
            logins
                .insert_record(&json!({"login_user": 1, "login_success": success}))
                .await
                .unwrap();
        }

        let records = logins.retrieve_records_by_user(1).await.unwrap();
        let outcomes: Vec<i64> = records.iter().map(|r| r["login_success"].as_i64().unwrap()).collect();
        assert_eq!(outcomes, vec![0, 0, 1]);
        assert!(logins.retrieve_records_by_user(2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_insert_requires_fields() {
        let (_, logins) = daos().await;
        let err = logins.insert_record(&json!({"login_user": 1})).await.unwrap_err();
        assert!(matches!(err, DaoError::MissingField(_)));

        let err = logins
            .insert_record(&json!({"login_user": "test_user", "login_success": 1}))
            .await
            .unwrap_err();
        assert!(matches!(err, DaoError::WrongType { .. }));

        for flag in [json!(7), json!(-1), json!(2)] {
            let err = logins
                .insert_record(&json!({"login_user": 1, "login_success": flag}))
                .await
                .unwrap_err();
            assert!(matches!(err, DaoError::WrongType { ref field, .. } if field == "login_success"));
        }
        assert!(logins.retrieve_records_by_user(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_user_violates_foreign_key() {
        let (_, logins) = daos().await;
        let result = logins
            .insert_record(&json!({"login_user": 77, "login_success": 0}))
            .await;
        assert!(matches!(result, Err(DaoError::Database(_))));
    }

    #[tokio::test]
    async fn test_append_only() {
        let (_, logins) = daos().await;
        let id = logins
            .insert_record(&json!({"login_user": 1, "login_success": 1}))
            .await
            .unwrap();

        let err = logins
            .update_record_by_id(id, &json!({"login_success": 0}))
            .await
            .unwrap_err();
        assert!(matches!(err, DaoError::AppendOnly("Logins")));
        assert!(matches!(logins.delete_record_by_id(id).await, Err(DaoError::AppendOnly(_))));

        let record = logins.retrieve_record_by_id(id).await.unwrap().unwrap();
        assert_eq!(record["login_success"], 1);
    }

    #[tokio::test]
    async fn test_existence_by_field() {
        let (_, logins) = daos().await;
        logins
            .insert_record(&json!({"login_user": 1, "login_success": 0}))
            .await
            .unwrap();
        assert!(logins.existence_of_record_by_field("login_user", &json!(1)).await.unwrap());
        assert!(!logins.existence_of_record_by_field("login_success", &json!(true)).await.unwrap());

        let err = logins
            .existence_of_record_by_field("login_user", &json!(null))
            .await
            .unwrap_err();
        assert!(matches!(err, DaoError::WrongType { ref found, .. } if found == "null"));
    }
}
