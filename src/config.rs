//! Runtime configuration.
//!
//! Every setting can come from a command-line flag or an environment
//! variable; flags win. [`Config::default`] gives the same values the binary
//! starts with when nothing is set.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::upload::UploadDir;

/// Accept POSTed files and write them to disk.
#[derive(Debug, Clone, Parser)]
#[clap(author, version, about, long_about = None)]
pub struct Config {
    /// Address to listen on.
    #[clap(long, env = "STASH_HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    /// Port to listen on. `0` picks a free one.
    #[clap(long, env = "STASH_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Directory uploaded filenames are resolved against.
    #[clap(long, env = "STASH_UPLOAD_DIR", default_value = ".")]
    pub upload_dir: PathBuf,

    /// Reject filenames that are absolute or contain `..`.
    #[clap(long, env = "STASH_STRICT_FILENAMES")]
    pub strict_filenames: bool,

    /// Largest accepted upload, in bytes. Unlimited when unset.
    #[clap(long, env = "STASH_MAX_BODY_BYTES")]
    pub max_body_bytes: Option<u64>,

    /// Seconds allowed for the request body to arrive.
    #[clap(long, env = "STASH_BODY_TIMEOUT_SECS", default_value_t = 30)]
    pub body_timeout_secs: u64,

    /// Seconds allowed for the request head to arrive on a new connection.
    #[clap(long, env = "STASH_HEADER_TIMEOUT_SECS", default_value_t = 30)]
    pub header_timeout_secs: u64,
}

impl Config {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn body_timeout(&self) -> Duration {
        Duration::from_secs(self.body_timeout_secs)
    }

    pub fn header_timeout(&self) -> Duration {
        Duration::from_secs(self.header_timeout_secs)
    }

    pub fn uploads(&self) -> UploadDir {
        UploadDir::new(&self.upload_dir).strict(self.strict_filenames)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8000,
            upload_dir: PathBuf::from("."),
            strict_filenames: false,
            max_body_bytes: None,
            body_timeout_secs: 30,
            header_timeout_secs: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_cli_defaults() {
        let parsed = Config::try_parse_from(["stash"]).unwrap();
        let default = Config::default();
        assert_eq!(parsed.addr(), default.addr());
        assert_eq!(parsed.addr(), "0.0.0.0:8000".parse().unwrap());
        assert_eq!(parsed.upload_dir, default.upload_dir);
        assert_eq!(parsed.strict_filenames, default.strict_filenames);
        assert_eq!(parsed.max_body_bytes, default.max_body_bytes);
        assert_eq!(parsed.body_timeout(), default.body_timeout());
        assert_eq!(parsed.header_timeout(), default.header_timeout());
    }

    #[test]
    fn flags_override_defaults() {
        let config = Config::try_parse_from([
            "stash",
            "--host", "127.0.0.1",
            "--port", "9001",
            "--upload-dir", "/tmp/drop",
            "--strict-filenames",
            "--max-body-bytes", "1024",
            "--body-timeout-secs", "5",
        ])
        .unwrap();
        assert_eq!(config.addr(), "127.0.0.1:9001".parse().unwrap());
        assert_eq!(config.uploads().root(), std::path::Path::new("/tmp/drop"));
        assert!(config.strict_filenames);
        assert_eq!(config.max_body_bytes, Some(1024));
        assert_eq!(config.body_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn rejects_bad_port() {
        assert!(Config::try_parse_from(["stash", "--port", "http"]).is_err());
    }
}
