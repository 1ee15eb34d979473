//! Connection options.

use url::Url;

use crate::error::Error;
use crate::value::NumericalPrecisionPolicy;

/// Database driver used to open worker connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Driver {
    /// SQLite through rusqlite
    #[default]
    Sqlite,
    /// PostgreSQL through the `postgres` client
    Postgres,
}

impl Driver {
    /// Short driver name, used in logs and URLs.
    pub fn name(self) -> &'static str {
        match self {
            Driver::Sqlite => "sqlite",
            Driver::Postgres => "postgres",
        }
    }
}

impl std::str::FromStr for Driver {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sqlite" | "sqlite3" | "QSQLITE" => Ok(Driver::Sqlite),
            "postgres" | "postgresql" | "pg" | "QPSQL" => Ok(Driver::Postgres),
            _ => Err(Error::Unsupported(format!("unknown driver: {}", s))),
        }
    }
}

/// Connection options shared by every worker connection.
///
/// A connection copies the options when it is opened; later changes only
/// affect connections opened afterwards.
#[derive(Debug, Clone)]
pub struct Opts {
    /// Driver kind.
    ///
    /// Default: `Driver::Sqlite`
    pub driver: Driver,

    /// Hostname or IP address. Ignored by SQLite.
    ///
    /// Default: `""`
    pub host: String,

    /// Port number. `None` lets the driver pick its default.
    ///
    /// Default: `None`
    pub port: Option<u16>,

    /// Database name. For SQLite this is a file path or `:memory:`.
    ///
    /// Default: `""` (in-memory for SQLite)
    pub database: String,

    /// Username for authentication.
    ///
    /// Default: `""`
    pub user: String,

    /// Password for authentication.
    ///
    /// Default: `None`
    pub password: Option<String>,

    /// How floating point and exact numeric cells are materialized.
    ///
    /// Default: `NumericalPrecisionPolicy::LowPrecisionDouble`
    pub precision: NumericalPrecisionPolicy,

    /// Additional driver parameters, passed through unchanged.
    ///
    /// Default: `[]`
    pub params: Vec<(String, String)>,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            driver: Driver::Sqlite,
            host: String::new(),
            port: None,
            database: String::new(),
            user: String::new(),
            password: None,
            precision: NumericalPrecisionPolicy::LowPrecisionDouble,
            params: Vec::new(),
        }
    }
}

impl Opts {
    /// Options for a SQLite database file (or `:memory:`).
    pub fn sqlite(path: impl Into<String>) -> Self {
        Self {
            driver: Driver::Sqlite,
            database: path.into(),
            ..Self::default()
        }
    }

    /// Look up a pass-through parameter.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl TryFrom<&Url> for Opts {
    type Error = Error;

    /// Parse a connection URL.
    ///
    /// Formats:
    /// - `sqlite::memory:`
    /// - `sqlite:///absolute/path.db` or `sqlite://relative/path.db`
    /// - `postgres://[user[:password]@]host[:port][/database][?param1=value1&..]`
    ///
    /// Supported query parameters:
    /// - `precision`: int32, int64, double, high
    ///
    /// Any other query parameter is kept in `params` and handed to the driver.
    fn try_from(url: &Url) -> Result<Self, Self::Error> {
        let driver: Driver = url.scheme().parse().map_err(|_| {
            Error::InvalidUsage(format!(
                "Invalid scheme: expected 'sqlite:' or 'postgres://', got '{}:'",
                url.scheme()
            ))
        })?;

        let mut opts = match driver {
            Driver::Sqlite => {
                let path = match url.host_str() {
                    Some(host) => format!("{}{}", host, url.path()),
                    None => url.path().to_string(),
                };
                let database = if path.is_empty() || path == ":memory:" {
                    ":memory:".to_string()
                } else {
                    path
                };
                Opts::sqlite(database)
            }
            Driver::Postgres => Opts {
                driver,
                host: url.host_str().unwrap_or("localhost").to_string(),
                port: url.port(),
                user: url.username().to_string(),
                password: url.password().map(|s| s.to_string()),
                database: url.path().trim_start_matches('/').to_string(),
                ..Opts::default()
            },
        };

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "precision" => {
                    opts.precision = value.parse()?;
                }
                _ => {
                    opts.params.push((key.to_string(), value.to_string()));
                }
            }
        }

        Ok(opts)
    }
}

impl TryFrom<&str> for Opts {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        let url = Url::parse(s).map_err(|e| Error::InvalidUsage(format!("Invalid URL: {}", e)))?;
        Self::try_from(&url)
    }
}
