// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is loaded once from the environment at startup. Missing or
//! invalid required values are fatal; nothing here is re-read per request.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Database and signature artifacts | `./data` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `SESSION_JWT_SECRET` | HMAC secret for session tokens (>= 32 bytes) | Required |
//! | `SESSION_TTL_SECS` | Session token lifetime | `86400` |
//! | `SIWE_DOMAIN` | Required domain in sign-in messages | Unset |
//! | `CHAIN_RPC_URL` | Read-only EVM JSON-RPC endpoint | Avalanche Fuji |
//! | `TREASURY_ADDRESS` | Seeds the treasury setting if not stored | Unset |
//! | `ADMIN_WALLETS` | Comma-separated admin wallet addresses | Empty |
//! | `PAYMENT_WINDOW_DAYS` | Days between approval and payment deadline | `7` |
//! | `PRODUCTS_FILE` | JSON array of products to seed | Unset |
//! | `PUBLIC_BASE_URL` | Prefix of artifact URLs | `/artifacts` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | Serve HTTPS when both are set | Unset |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::blockchain::AVAX_FUJI;
use crate::models::WalletAddress;
use crate::policy::MAX_PAYMENT_WINDOW_DAYS;

pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const SESSION_SECRET_ENV: &str = "SESSION_JWT_SECRET";
pub const SESSION_TTL_ENV: &str = "SESSION_TTL_SECS";
pub const SIWE_DOMAIN_ENV: &str = "SIWE_DOMAIN";
pub const CHAIN_RPC_URL_ENV: &str = "CHAIN_RPC_URL";
pub const TREASURY_ADDRESS_ENV: &str = "TREASURY_ADDRESS";
pub const ADMIN_WALLETS_ENV: &str = "ADMIN_WALLETS";
pub const PAYMENT_WINDOW_DAYS_ENV: &str = "PAYMENT_WINDOW_DAYS";
pub const PRODUCTS_FILE_ENV: &str = "PRODUCTS_FILE";
pub const PUBLIC_BASE_URL_ENV: &str = "PUBLIC_BASE_URL";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Shortest accepted HMAC secret.
pub const MIN_SESSION_SECRET_BYTES: usize = 32;

const DEFAULT_DATA_DIR: &str = "./data";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_SESSION_TTL_SECS: i64 = 86_400;
const DEFAULT_PAYMENT_WINDOW_DAYS: u32 = 7;
const DEFAULT_PUBLIC_BASE_URL: &str = "/artifacts";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    /// Read `LOG_FORMAT` on its own, before the rest of the config loads.
    pub fn from_env() -> Self {
        match std::env::var(LOG_FORMAT_ENV) {
            Ok(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// Certificate and key for HTTPS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Validated service configuration.
#[derive(Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub session_secret: Vec<u8>,
    pub session_ttl_secs: i64,
    pub siwe_domain: Option<String>,
    pub chain_rpc_url: String,
    pub treasury_address: Option<WalletAddress>,
    pub admin_wallets: HashSet<WalletAddress>,
    pub payment_window_days: u32,
    pub products_file: Option<PathBuf>,
    pub public_base_url: String,
    pub tls: Option<TlsPaths>,
}

// The session secret never reaches the logs.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("data_dir", &self.data_dir)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("session_secret", &"<redacted>")
            .field("session_ttl_secs", &self.session_ttl_secs)
            .field("siwe_domain", &self.siwe_domain)
            .field("chain_rpc_url", &self.chain_rpc_url)
            .field("treasury_address", &self.treasury_address)
            .field("admin_wallets", &self.admin_wallets.len())
            .field("payment_window_days", &self.payment_window_days)
            .field("products_file", &self.products_file)
            .field("public_base_url", &self.public_base_url)
            .field("tls", &self.tls)
            .finish()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_number<T: std::str::FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.parse::<T>().map_err(|e| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })
}

impl Config {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| non_empty(lookup(name));

        let session_secret = get(SESSION_SECRET_ENV)
            .ok_or(ConfigError::Missing(SESSION_SECRET_ENV))?
            .into_bytes();
        if session_secret.len() < MIN_SESSION_SECRET_BYTES {
            return Err(ConfigError::Invalid {
                name: SESSION_SECRET_ENV,
                reason: format!("must be at least {MIN_SESSION_SECRET_BYTES} bytes"),
            });
        }

        let port = match get(PORT_ENV) {
            Some(raw) => parse_number(PORT_ENV, &raw)?,
            None => DEFAULT_PORT,
        };

        let session_ttl_secs = match get(SESSION_TTL_ENV) {
            Some(raw) => parse_number::<i64>(SESSION_TTL_ENV, &raw)?,
            None => DEFAULT_SESSION_TTL_SECS,
        };
        if session_ttl_secs <= 0 {
            return Err(ConfigError::Invalid {
                name: SESSION_TTL_ENV,
                reason: "must be positive".to_string(),
            });
        }

        let payment_window_days = match get(PAYMENT_WINDOW_DAYS_ENV) {
            Some(raw) => parse_number::<u32>(PAYMENT_WINDOW_DAYS_ENV, &raw)?,
            None => DEFAULT_PAYMENT_WINDOW_DAYS,
        };
        if payment_window_days == 0 || payment_window_days > MAX_PAYMENT_WINDOW_DAYS {
            return Err(ConfigError::Invalid {
                name: PAYMENT_WINDOW_DAYS_ENV,
                reason: format!("must be between 1 and {MAX_PAYMENT_WINDOW_DAYS}"),
            });
        }

        let chain_rpc_url = get(CHAIN_RPC_URL_ENV).unwrap_or_else(|| AVAX_FUJI.rpc_url.to_string());
        url::Url::parse(&chain_rpc_url).map_err(|e| ConfigError::Invalid {
            name: CHAIN_RPC_URL_ENV,
            reason: e.to_string(),
        })?;

        let treasury_address = get(TREASURY_ADDRESS_ENV)
            .map(|raw| {
                WalletAddress::parse(&raw).map_err(|e| ConfigError::Invalid {
                    name: TREASURY_ADDRESS_ENV,
                    reason: e.to_string(),
                })
            })
            .transpose()?;

        let admin_wallets = get(ADMIN_WALLETS_ENV)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| {
                        WalletAddress::parse(s).map_err(|e| ConfigError::Invalid {
                            name: ADMIN_WALLETS_ENV,
                            reason: e.to_string(),
                        })
                    })
                    .collect::<Result<HashSet<_>, _>>()
            })
            .transpose()?
            .unwrap_or_default();

        let tls = match (get(TLS_CERT_PATH_ENV), get(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: cert.into(),
                key: key.into(),
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing(TLS_KEY_PATH_ENV)),
            (None, Some(_)) => return Err(ConfigError::Missing(TLS_CERT_PATH_ENV)),
        };

        Ok(Self {
            data_dir: get(DATA_DIR_ENV).unwrap_or_else(|| DEFAULT_DATA_DIR.to_string()).into(),
            host: get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            session_secret,
            session_ttl_secs,
            siwe_domain: get(SIWE_DOMAIN_ENV),
            chain_rpc_url,
            treasury_address,
            admin_wallets,
            payment_window_days,
            products_file: get(PRODUCTS_FILE_ENV).map(PathBuf::from),
            public_base_url: get(PUBLIC_BASE_URL_ENV)
                .unwrap_or_else(|| DEFAULT_PUBLIC_BASE_URL.to_string()),
            tls,
        })
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                name: HOST_ENV,
                reason: e.to_string(),
            })
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("cover.redb")
    }

    pub fn signatures_dir(&self) -> PathBuf {
        self.data_dir.join("signatures")
    }
}
