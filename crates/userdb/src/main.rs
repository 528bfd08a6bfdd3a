// userdb - account store command line
//
// Manages the Users/Logins SQLite database:
// - schema bootstrap
// - registration with salted password hashes
// - password checks, each attempt written to the login audit table
// - record inspection and soft removal

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};

use userdb_shared::auth::sha1;
use userdb_shared::config::{Config, Settings};
use userdb_shared::dao::GenericDao;
use userdb_shared::database::DatabaseManager;
use userdb_shared::log::initialize_logging;
use userdb_shared::{permission_name, AccountService};

/// Default config file name
const DEFAULT_CONFIG: &str = "userdb.conf";

/// Log file name inside LogsDir
const LOG_FILE: &str = "userdb.log";

/// CLI arguments
#[derive(Parser, Debug)]
#[command(name = "userdb")]
#[command(about = "User account store with salted password hashes")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    config: String,

    /// Database file, overriding the configuration
    #[arg(short, long)]
    database: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the Users and Logins tables
    Init,
    /// Register a new user
    Register {
        name: String,
        password: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        legal_name: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Check a password and record the attempt
    Login { name: String, password: String },
    /// Print a user record
    Show { id: i64 },
    /// Hide a user record
    Remove { id: i64 },
    /// Change a user's password
    Passwd { id: i64, password: String },
    /// List recorded login attempts for a user
    Logins { user_id: i64 },
    /// Print the SHA-1 digest of a string
    Hash { text: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Hashing needs neither config nor database
    if let Command::Hash { text } = &args.command {
        println!("{}", sha1::hash(text.as_bytes()));
        return Ok(());
    }

    let mut config = Config::default();
    let config_loaded = config.set_source(&args.config);
    let mut settings = config.settings().context("Invalid configuration")?;
    if let Some(path) = &args.database {
        settings.database_path = path.clone();
    }

    let _log_guard = initialize_logging(settings.logs_dir.as_deref(), LOG_FILE, &settings.log_level);

    tracing::info!("userdb v{}", env!("CARGO_PKG_VERSION"));
    match config_loaded {
        Ok(()) => tracing::info!("Using configuration file: {}", args.config),
        Err(e) => tracing::warn!("{}; using defaults", e),
    }

    let service = open_service(&settings).await?;
    run(&service, args.command).await
}

async fn open_service(settings: &Settings) -> anyhow::Result<AccountService> {
    let db = DatabaseManager::open_with(&settings.database_path, settings.max_connections)
        .await
        .with_context(|| format!("Cannot open database {}", settings.database_path))?;

    let service = AccountService::new(db, settings.password_scheme.build(settings.salt_length));
    service.initialize().await.context("Cannot create account tables")?;
    Ok(service)
}

async fn run(service: &AccountService, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Init => {
            println!("Database ready");
        }
        Command::Register { name, password, email, legal_name, phone, description } => {
            let mut profile = Map::new();
            for (key, value) in [
                ("user_emailaddress", email),
                ("user_legalname", legal_name),
                ("user_phonenumber", phone),
                ("user_description", description),
            ] {
                if let Some(value) = value {
                    profile.insert(key.to_string(), json!(value));
                }
            }

            let id = service
                .register(&name, &password, &Value::Object(profile))
                .await
                .with_context(|| format!("Cannot register user '{}'", name))?;
            println!("Registered '{}' with id {}", name, id);
        }
        Command::Login { name, password } => {
            if !service.authenticate(&name, &password).await? {
                bail!("Login failed for '{}'", name);
            }
            println!("Login succeeded for '{}'", name);
        }
        Command::Show { id } => {
            let Some(mut record) = service.users().retrieve_record_by_id(id).await? else {
                bail!("No user with id {}", id);
            };
            if let Some(level) = record["user_permission"].as_i64() {
                record["user_permission_name"] = json!(permission_name(level));
            }
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Command::Remove { id } => {
            if !service.users().delete_record_by_id(id).await? {
                bail!("No user with id {}", id);
            }
            println!("Removed user {}", id);
        }
        Command::Passwd { id, password } => {
            if !service.change_password(id, &password).await? {
                bail!("No user with id {}", id);
            }
            println!("Password changed for user {}", id);
        }
        Command::Logins { user_id } => {
            let attempts = service.logins().retrieve_records_by_user(user_id).await?;
            println!("{}", serde_json::to_string_pretty(&attempts)?);
        }
        Command::Hash { .. } => unreachable!("hash is answered in main before the database is opened"),
    }

    Ok(())
}
