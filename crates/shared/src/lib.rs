// userdb - shared library
// SHA-1 digest, salted password schemes, SQLite access and the account DAOs

pub mod auth;
pub mod config;
pub mod dao;
pub mod database;
pub mod log;
pub mod service;

pub use service::AccountService;

/// Permission levels stored in user_permission
pub type PermissionLevel = i64;

pub const PERMISSION_LOCK: PermissionLevel = 0;
pub const PERMISSION_BASE: PermissionLevel = 1;
pub const PERMISSION_SUPER: PermissionLevel = 2;
pub const PERMISSION_ADMIN: PermissionLevel = 3;

/// Human readable name of a permission level
pub fn permission_name(level: PermissionLevel) -> &'static str {
    match level {
        PERMISSION_LOCK => "LOCK",
        PERMISSION_BASE => "BASE",
        PERMISSION_SUPER => "SUPER",
        PERMISSION_ADMIN => "ADMIN",
        _ => "UNKNOWN",
    }
}
