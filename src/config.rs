//! Layered configuration.
//!
//! Values are resolved lowest to highest precedence:
//!
//! 1. built-in defaults,
//! 2. the optional TOML file (`--config`, default `./config/migrate.toml`),
//! 3. the `.env` file (`--env-file`, default `.env`),
//! 4. the process environment,
//! 5. command-line overrides.
//!
//! Missing files are not errors; malformed ones are.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use sqlx::postgres::PgConnectOptions;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub source: SourceConfig,
    pub target: TargetConfig,
    pub migrate: MigrateConfig,
    /// Log filter from `CONTRACT_MIGRATE_LOG`, in the process env or `.env`.
    pub log_filter: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceConfig {
    pub path: PathBuf,
}

/// Target connection settings.
///
/// `url` wins over the individual fields when present.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetConfig {
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MigrateConfig {
    pub batch_size: usize,
    pub max_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: SourceConfig {
                path: PathBuf::from("./contracts.db"),
            },
            target: TargetConfig {
                url: None,
                host: "localhost".to_string(),
                port: 5432,
                database: "contract_intelligence".to_string(),
                user: "contract_user".to_string(),
                password: "contract_password".to_string(),
                connect_timeout_secs: 10,
            },
            migrate: MigrateConfig {
                batch_size: 100,
                max_retries: 1,
            },
            log_filter: None,
        }
    }
}

// ─── TOML file shape ───────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    #[serde(default)]
    source: FileSource,
    #[serde(default)]
    target: FileTarget,
    #[serde(default)]
    migrate: FileMigrate,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct FileSource {
    path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct FileTarget {
    url: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    database: Option<String>,
    user: Option<String>,
    password: Option<String>,
    connect_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct FileMigrate {
    batch_size: Option<usize>,
    max_retries: Option<u32>,
}

/// Command-line overrides, applied last.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub source: Option<PathBuf>,
    pub target_url: Option<String>,
    pub batch_size: Option<usize>,
}

/// Load configuration from files, the process environment and overrides.
pub fn load_config(config_path: &Path, env_file: &Path, overrides: &Overrides) -> Result<Config> {
    let file = read_config_file(config_path)?;

    let mut env = read_env_file(env_file)?;
    // Process environment wins over the .env file.
    env.extend(process_env());

    resolve(file, &env, overrides)
}

fn read_config_file(path: &Path) -> Result<Option<FileConfig>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let parsed: FileConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
    Ok(Some(parsed))
}

/// Read variables from a dotenv file. A missing file yields no variables.
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let iter = dotenvy::from_path_iter(path)
        .with_context(|| format!("Failed to read env file: {}", path.display()))?;
    iter.collect::<std::result::Result<_, _>>()
        .with_context(|| format!("Failed to parse env file: {}", path.display()))
}

/// Parse dotenv-formatted text.
pub fn parse_env(content: &str) -> Result<HashMap<String, String>> {
    dotenvy::from_read_iter(content.as_bytes())
        .collect::<std::result::Result<_, _>>()
        .context("Failed to parse env content")
}

/// The process environment, skipping entries that are not valid UTF-8.
fn process_env() -> impl Iterator<Item = (String, String)> {
    std::env::vars_os().filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
}

/// Merge the layers into a validated [`Config`].
fn resolve(
    file: Option<FileConfig>,
    env: &HashMap<String, String>,
    overrides: &Overrides,
) -> Result<Config> {
    let mut cfg = Config::default();

    if let Some(file) = file {
        if let Some(path) = file.source.path {
            cfg.source.path = path;
        }
        let t = file.target;
        if t.url.is_some() {
            cfg.target.url = t.url;
        }
        if let Some(v) = t.host {
            cfg.target.host = v;
        }
        if let Some(v) = t.port {
            cfg.target.port = v;
        }
        if let Some(v) = t.database {
            cfg.target.database = v;
        }
        if let Some(v) = t.user {
            cfg.target.user = v;
        }
        if let Some(v) = t.password {
            cfg.target.password = v;
        }
        if let Some(v) = t.connect_timeout_secs {
            cfg.target.connect_timeout_secs = v;
        }
        if let Some(v) = file.migrate.batch_size {
            cfg.migrate.batch_size = v;
        }
        if let Some(v) = file.migrate.max_retries {
            cfg.migrate.max_retries = v;
        }
    }

    let get = |key: &str| env.get(key).filter(|v| !v.is_empty()).cloned();

    // The service's own DATABASE_URL points either at the embedded store
    // (pre-migration) or at the server (post-migration).
    if let Some(url) = get("DATABASE_URL") {
        if let Some(path) = sqlite_path_from_url(&url) {
            cfg.source.path = path;
        } else if is_postgres_url(&url) {
            cfg.target.url = Some(url);
        } else {
            bail!("DATABASE_URL has an unsupported scheme: {}", redact_url(&url));
        }
    }
    if let Some(path) = get("SQLITE_DB_PATH") {
        cfg.source.path = PathBuf::from(path);
    }
    if let Some(v) = get("POSTGRES_HOST") {
        cfg.target.host = v;
    }
    if let Some(v) = get("POSTGRES_PORT") {
        cfg.target.port = v
            .parse()
            .with_context(|| format!("POSTGRES_PORT is not a port number: {}", v))?;
    }
    if let Some(v) = get("POSTGRES_DB") {
        cfg.target.database = v;
    }
    if let Some(v) = get("POSTGRES_USER") {
        cfg.target.user = v;
    }
    if let Some(v) = get("POSTGRES_PASSWORD") {
        cfg.target.password = v;
    }
    cfg.log_filter = get(crate::logging::LOG_ENV);
    if let Some(v) = get("MIGRATION_BATCH_SIZE") {
        cfg.migrate.batch_size = v
            .parse()
            .with_context(|| format!("MIGRATION_BATCH_SIZE is not a number: {}", v))?;
    }

    if let Some(path) = &overrides.source {
        cfg.source.path = path.clone();
    }
    if let Some(url) = &overrides.target_url {
        if !is_postgres_url(url) {
            bail!("--target-url must be a postgres:// URL");
        }
        cfg.target.url = Some(url.clone());
    }
    if let Some(n) = overrides.batch_size {
        cfg.migrate.batch_size = n;
    }

    validate(&cfg)?;
    Ok(cfg)
}

fn validate(cfg: &Config) -> Result<()> {
    if cfg.migrate.batch_size == 0 {
        bail!("migrate.batch_size must be > 0");
    }
    if cfg.target.connect_timeout_secs == 0 {
        bail!("target.connect_timeout_secs must be > 0");
    }
    if cfg.target.url.is_none() && cfg.target.database.is_empty() {
        bail!("target database name is empty (set POSTGRES_DB)");
    }
    Ok(())
}

fn is_postgres_url(url: &str) -> bool {
    url.starts_with("postgres://") || url.starts_with("postgresql://")
}

/// `sqlite:///./contracts.db` → `./contracts.db`.
fn sqlite_path_from_url(url: &str) -> Option<PathBuf> {
    let rest = url.strip_prefix("sqlite:")?;
    let rest = rest.strip_prefix("///").or_else(|| rest.strip_prefix("//")).unwrap_or(rest);
    let rest = rest.split('?').next().unwrap_or(rest);
    if rest.is_empty() {
        None
    } else {
        Some(PathBuf::from(rest))
    }
}

/// Hide the password part of a connection URL.
pub fn redact_url(url: &str) -> String {
    let Some(scheme_end) = url.find("://") else {
        return url.to_string();
    };
    let (scheme, rest) = url.split_at(scheme_end + 3);
    let Some(at) = rest.find('@') else {
        return url.to_string();
    };
    let userinfo = &rest[..at];
    match userinfo.split_once(':') {
        Some((user, _)) => format!("{}{}:***{}", scheme, user, &rest[at..]),
        None => url.to_string(),
    }
}

impl TargetConfig {
    pub fn connect_options(&self) -> Result<PgConnectOptions> {
        match &self.url {
            Some(url) => PgConnectOptions::from_str(url)
                .with_context(|| format!("Invalid target URL: {}", redact_url(url))),
            None => Ok(PgConnectOptions::new()
                .host(&self.host)
                .port(self.port)
                .database(&self.database)
                .username(&self.user)
                .password(&self.password)),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Connection description safe to print.
    pub fn describe(&self) -> String {
        match &self.url {
            Some(url) => redact_url(url),
            None => format!(
                "postgresql://{}@{}:{}/{}",
                self.user, self.host, self.port, self.database
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_match_the_service() {
        let cfg = resolve(None, &HashMap::new(), &Overrides::default()).unwrap();
        assert_eq!(cfg.source.path, PathBuf::from("./contracts.db"));
        assert_eq!(cfg.migrate.batch_size, 100);
        assert_eq!(cfg.migrate.max_retries, 1);
        assert_eq!(
            cfg.target.describe(),
            "postgresql://contract_user@localhost:5432/contract_intelligence"
        );
    }

    #[test]
    fn postgres_database_url_selects_target() {
        let e = env(&[("DATABASE_URL", "postgresql://u:secret@db:5433/contracts")]);
        let cfg = resolve(None, &e, &Overrides::default()).unwrap();
        assert_eq!(
            cfg.target.url.as_deref(),
            Some("postgresql://u:secret@db:5433/contracts")
        );
        assert_eq!(cfg.target.describe(), "postgresql://u:***@db:5433/contracts");
    }

    #[test]
    fn sqlite_database_url_selects_source() {
        let e = env(&[("DATABASE_URL", "sqlite:///./data/contracts.db")]);
        let cfg = resolve(None, &e, &Overrides::default()).unwrap();
        assert_eq!(cfg.source.path, PathBuf::from("./data/contracts.db"));
        assert!(cfg.target.url.is_none());
    }

    #[test]
    fn unsupported_database_url_is_rejected() {
        let e = env(&[("DATABASE_URL", "mysql://root@localhost/x")]);
        assert!(resolve(None, &e, &Overrides::default()).is_err());
    }

    #[test]
    fn postgres_parts_compose() {
        let e = env(&[
            ("POSTGRES_HOST", "db"),
            ("POSTGRES_PORT", "6543"),
            ("POSTGRES_DB", "ci"),
            ("POSTGRES_USER", "ci_user"),
            ("POSTGRES_PASSWORD", "pw"),
        ]);
        let cfg = resolve(None, &e, &Overrides::default()).unwrap();
        assert_eq!(cfg.target.describe(), "postgresql://ci_user@db:6543/ci");
        assert_eq!(cfg.target.password, "pw");
    }

    #[test]
    fn layers_apply_in_order() {
        let file: FileConfig = toml::from_str(
            r#"
            [source]
            path = "from-file.db"

            [migrate]
            batch_size = 10
            "#,
        )
        .unwrap();
        let e = env(&[("MIGRATION_BATCH_SIZE", "20")]);
        let overrides = Overrides {
            source: Some(PathBuf::from("from-cli.db")),
            ..Default::default()
        };
        let cfg = resolve(Some(file), &e, &overrides).unwrap();
        assert_eq!(cfg.source.path, PathBuf::from("from-cli.db"));
        assert_eq!(cfg.migrate.batch_size, 20);
    }

    #[test]
    fn log_filter_comes_from_the_env_layers() {
        let cfg = resolve(None, &env(&[("CONTRACT_MIGRATE_LOG", "debug")]), &Overrides::default())
            .unwrap();
        assert_eq!(cfg.log_filter.as_deref(), Some("debug"));

        let tmp = tempfile::TempDir::new().unwrap();
        let env_file = tmp.path().join(".env");
        std::fs::write(&env_file, "CONTRACT_MIGRATE_LOG=contract_migrate=trace\n").unwrap();
        let vars = read_env_file(&env_file).unwrap();
        let cfg = resolve(None, &vars, &Overrides::default()).unwrap();
        assert_eq!(cfg.log_filter.as_deref(), Some("contract_migrate=trace"));
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let overrides = Overrides {
            batch_size: Some(0),
            ..Default::default()
        };
        let err = resolve(None, &HashMap::new(), &overrides).unwrap_err();
        assert!(err.to_string().contains("batch_size"));
    }

    #[test]
    fn unknown_file_keys_are_rejected() {
        let parsed: std::result::Result<FileConfig, _> = toml::from_str("[target]\nhots = \"x\"\n");
        assert!(parsed.is_err());
    }

    #[test]
    fn env_file_parsing() {
        let vars = parse_env(
            "# comment\n\
             POSTGRES_DB=contract_intelligence\n\
             export POSTGRES_USER=\"contract_user\"\n\
             POSTGRES_PASSWORD='p=ss'\n\
             APP_PORT=8000 # inline\n\
             API_KEY=\"s3cret\" # prod\n\
             \n",
        )
        .unwrap();
        assert_eq!(vars["POSTGRES_DB"], "contract_intelligence");
        assert_eq!(vars["POSTGRES_USER"], "contract_user");
        assert_eq!(vars["POSTGRES_PASSWORD"], "p=ss");
        assert_eq!(vars["APP_PORT"], "8000");
        assert_eq!(vars["API_KEY"], "s3cret");
        assert!(parse_env("NOT A PAIR").is_err());
    }

    #[test]
    fn missing_files_fall_back_to_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let file = read_config_file(&tmp.path().join("nope.toml")).unwrap();
        assert!(file.is_none());
        let vars = read_env_file(&tmp.path().join(".env")).unwrap();
        assert!(vars.is_empty());
    }

    #[test]
    fn redaction_leaves_urls_without_password_alone() {
        assert_eq!(redact_url("postgres://u@h/db"), "postgres://u@h/db");
        assert_eq!(redact_url("postgres://h/db"), "postgres://h/db");
    }
}
