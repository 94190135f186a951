//! Command-line and environment configuration.
//!
//! Every option can be given as a flag or through its environment variable;
//! flags win. `larder --help` lists them with their defaults.
//!
//! | Flag                 | Variable           | Default           |
//! |----------------------|--------------------|-------------------|
//! | `--bind`             | `LARDER_BIND`      | `127.0.0.1:8000`  |
//! | `--database`         | `LARDER_DATABASE`  | `larder.sqlite3`  |
//! | `--seed`             | `LARDER_SEED`      | off               |
//! | `--redis-url`        | `REDIS_URL`        | *(in-process)*    |
//! | `--key-prefix`       | `CACHE_KEY_PREFIX` | *(empty)*         |
//! | `--cache-version`    | `CACHE_VERSION`    | `1`               |
//! | `--ttl`              | `CACHE_TTL_SECS`   | `300`             |
//! | `--fail-open`        | `CACHE_FAIL_OPEN`  | `true`            |

use std::time::Duration;

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args, Parser};

use crate::cache::KeyNamespace;

#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(name = "larder", version, about = "Read-through cached recipe API")]
pub struct AppConfig {
    /// Address to listen on
    #[arg(long, env = "LARDER_BIND", default_value = "127.0.0.1:8000")]
    pub bind: String,

    /// SQLite database file, or `:memory:` for a private database
    #[arg(long, env = "LARDER_DATABASE", default_value = "larder.sqlite3")]
    pub database: String,

    /// Seed the demo cookbook when the database has no recipes
    #[arg(long, env = "LARDER_SEED", value_parser = BoolishValueParser::new())]
    pub seed: bool,

    #[command(flatten)]
    pub cache: CacheConfig,
}

/// Cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct CacheConfig {
    /// Redis URL; the in-process store is used when unset
    #[arg(long, env = "REDIS_URL")]
    pub redis_url: Option<String>,

    /// Prefix of every physical cache key
    #[arg(long, env = "CACHE_KEY_PREFIX", default_value = "")]
    pub key_prefix: String,

    /// Version segment of every physical cache key
    #[arg(id = "cache_version", long = "cache-version", env = "CACHE_VERSION", default_value_t = 1)]
    pub version: u32,

    /// Entry expiry in seconds, or `none` to keep entries until cleared
    #[arg(long, env = "CACHE_TTL_SECS", default_value = "300", value_parser = parse_ttl)]
    pub ttl: Ttl,

    /// Serve from the database when the cache backend fails
    #[arg(
        long,
        env = "CACHE_FAIL_OPEN",
        default_value_t = true,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub fail_open: bool,
}

impl CacheConfig {
    pub fn namespace(&self) -> KeyNamespace {
        KeyNamespace::new(self.key_prefix.clone(), self.version)
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl.0
    }
}

/// Entry expiry; `None` disables it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ttl(pub Option<Duration>);

fn parse_ttl(raw: &str) -> Result<Ttl, String> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("none") {
        return Ok(Ttl(None));
    }
    match raw.parse::<u64>() {
        Ok(0) => Err("must be at least 1 second; use `none` to disable expiry".to_owned()),
        Ok(secs) => Ok(Ttl(Some(Duration::from_secs(secs)))),
        Err(e) => Err(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<AppConfig, clap::Error> {
        AppConfig::try_parse_from(std::iter::once("larder").chain(args.iter().copied()))
    }

    #[test]
    fn defaults() {
        let config = parse(&[]).unwrap();
        assert_eq!(config.bind, "127.0.0.1:8000");
        assert_eq!(config.database, "larder.sqlite3");
        assert!(!config.seed);
        assert_eq!(config.cache.redis_url, None);
        assert_eq!(config.cache.namespace().make_key("recipes"), ":1:recipes");
        assert_eq!(config.cache.ttl(), Some(Duration::from_secs(300)));
        assert!(config.cache.fail_open);
    }

    #[test]
    fn reads_every_flag() {
        let config = parse(&[
            "--bind",
            "0.0.0.0:9000",
            "--database",
            ":memory:",
            "--seed",
            "--redis-url",
            "redis://127.0.0.1:6379/1",
            "--key-prefix",
            "cookbook",
            "--cache-version",
            "4",
            "--ttl",
            "60",
            "--fail-open",
            "no",
        ])
        .unwrap();

        assert_eq!(config.bind, "0.0.0.0:9000");
        assert_eq!(config.database, ":memory:");
        assert!(config.seed);
        assert_eq!(config.cache.redis_url.as_deref(), Some("redis://127.0.0.1:6379/1"));
        assert_eq!(config.cache.namespace().make_key("recipes"), "cookbook:4:recipes");
        assert_eq!(config.cache.ttl(), Some(Duration::from_secs(60)));
        assert!(!config.cache.fail_open);
    }

    #[test]
    fn ttl_none_disables_expiry() {
        let config = parse(&["--ttl", "None"]).unwrap();
        assert_eq!(config.cache.ttl(), None);
    }

    #[test]
    fn rejects_zero_or_garbage_ttl() {
        let err = parse(&["--ttl", "0"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
        assert!(parse(&["--ttl", "soon"]).is_err());
    }

    #[test]
    fn rejects_bad_flags_and_versions() {
        assert!(parse(&["--fail-open", "maybe"]).is_err());
        assert!(parse(&["--cache-version", "-1"]).is_err());
    }

    #[test]
    fn ttl_parser_accepts_whitespace() {
        assert_eq!(parse_ttl(" 45 "), Ok(Ttl(Some(Duration::from_secs(45)))));
        assert_eq!(parse_ttl("NONE"), Ok(Ttl(None)));
    }

    #[test]
    fn command_definition_is_consistent() {
        use clap::CommandFactory;
        AppConfig::command().debug_assert();
    }
}
