// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Environment-driven configuration.

use crate::notification::RetryPolicy;
use std::collections::HashMap;
use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub support_email: String,
    pub gateway_timeout: Duration,
    pub email_retry: RetryPolicy,
    /// Admin capture also transfers the payout when the payee can receive it.
    pub transfer_on_capture: bool,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_map(&env::vars().collect())
    }

    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let log_format = match env_or(vars, "LOG_FORMAT", "text").to_ascii_lowercase().as_str() {
            "text" => LogFormat::Text,
            "json" => LogFormat::Json,
            other => {
                return Err(ConfigError::Invalid {
                    key: "LOG_FORMAT",
                    value: other.to_string(),
                });
            }
        };

        Ok(Self {
            listen_addr: env_parse(vars, "LISTEN_ADDR", "127.0.0.1:3000")?,
            support_email: env_or(vars, "SUPPORT_EMAIL", "support@localhost"),
            gateway_timeout: Duration::from_millis(env_parse(vars, "GATEWAY_TIMEOUT_MS", "10000")?),
            email_retry: RetryPolicy {
                max_retries: env_parse(vars, "EMAIL_MAX_RETRIES", "3")?,
                base_delay: Duration::from_millis(env_parse(vars, "EMAIL_BACKOFF_MS", "10000")?),
                max_delay: Duration::from_millis(env_parse(
                    vars,
                    "EMAIL_BACKOFF_MAX_MS",
                    "300000",
                )?),
            },
            transfer_on_capture: env_bool(vars, "TRANSFER_ON_CAPTURE", true)?,
            log_format,
        })
    }
}

fn env_or(vars: &HashMap<String, String>, key: &str, default: &str) -> String {
    vars.get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
        .to_string()
}

fn env_parse<T: FromStr>(
    vars: &HashMap<String, String>,
    key: &'static str,
    default: &str,
) -> Result<T, ConfigError> {
    let value = env_or(vars, key, default);
    value
        .parse()
        .map_err(|_| ConfigError::Invalid { key, value })
}

fn env_bool(
    vars: &HashMap<String, String>,
    key: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    let Some(value) = vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty()) else {
        return Ok(default);
    };
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
        }),
    }
}
