// AccountService - registration and password checks on top of the DAOs
//
// Every authentication attempt against a known user leaves a row in Logins,
// successful or not. Attempts for unknown names are only logged.

use serde_json::{json, Map, Value};

use crate::auth::{Credential, PasswordScheme};
use crate::dao::{DaoError, DaoResult, GenericDao, LoginDao, UserDao, UserRecord};
use crate::database::DatabaseManager;

pub struct AccountService {
    users: UserDao,
    logins: LoginDao,
    scheme: Box<dyn PasswordScheme>,
}

impl AccountService {
    pub fn new(db: DatabaseManager, scheme: Box<dyn PasswordScheme>) -> Self {
        AccountService {
            users: UserDao::new(db.clone()),
            logins: LoginDao::new(db),
            scheme,
        }
    }

    /// Create the Users and Logins tables if needed
    pub async fn initialize(&self) -> DaoResult<()> {
        self.users.create_table().await?;
        self.logins.create_table().await?;
        tracing::info!("Account tables ready (password scheme: {})", self.scheme.name());
        Ok(())
    }

    /// Register a new user. `profile` may carry any optional user columns
    /// (e-mail, legal name, ...); credentials in it are ignored.
    pub async fn register(&self, user_name: &str, password: &str, profile: &Value) -> DaoResult<i64> {
        let mut record = match profile {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            _ => return Err(DaoError::NotAnObject),
        };

        let Credential { salt, passhash } = self.scheme.hash(password);
        record.insert("user_name".to_string(), json!(user_name));
        record.insert("user_salt".to_string(), json!(salt));
        record.insert("user_passhash".to_string(), json!(passhash));

        let id = self.users.insert_record(&Value::Object(record)).await?;
        tracing::info!("Registered user '{}' with id {}", user_name, id);
        Ok(id)
    }

    /// Check a password, recording the attempt for known users
    pub async fn authenticate(&self, user_name: &str, password: &str) -> DaoResult<bool> {
        let Some(user) = self.users.retrieve_record_by_username(user_name).await? else {
            tracing::info!("Login attempt for unknown user '{}'", user_name);
            return Ok(false);
        };

        let credential = Credential {
            salt: user.user_salt,
            passhash: user.user_passhash,
        };
        let success = self.scheme.verify(&credential, password);

        self.logins
            .insert_record(&json!({"login_user": user.user_id, "login_success": success}))
            .await?;

        if success {
            tracing::info!("User '{}' logged in", user_name);
        } else {
            tracing::warn!("Failed login for user '{}'", user_name);
        }
        Ok(success)
    }

    /// Replace a user's password with a freshly salted hash
    pub async fn change_password(&self, user_id: i64, new_password: &str) -> DaoResult<bool> {
        let Credential { salt, passhash } = self.scheme.hash(new_password);
        let changed = self
            .users
            .update_record_by_id(user_id, &json!({"user_salt": salt, "user_passhash": passhash}))
            .await?;
        if changed {
            tracing::info!("Password changed for user {}", user_id);
        }
        Ok(changed)
    }

    /// Look up a visible user by name
    pub async fn find_user(&self, user_name: &str) -> DaoResult<Option<UserRecord>> {
        self.users.retrieve_record_by_username(user_name).await
    }

    pub fn users(&self) -> &UserDao {
        &self.users
    }

    pub fn logins(&self) -> &LoginDao {
        &self.logins
    }

    pub fn scheme(&self) -> &dyn PasswordScheme {
        self.scheme.as_ref()
    }
}
