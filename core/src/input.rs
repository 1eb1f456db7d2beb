/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use std::collections::BTreeMap;
use std::net::{SocketAddr, ToSocketAddrs};
use unicode_normalization::UnicodeNormalization;

use super::consts::*;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("invalid parameter `{0}`, parameters must be newline separated KEY=VALUE pairs")]
    MalformedParameter(String),
    #[error("`{0}` is not a valid name")]
    InvalidName(String),
    #[error("failed to read secret from `{path}`: {message}")]
    Secret { path: String, message: String },
}

pub fn url_to_addr(
    host: &str,
    port: i32,
) -> Result<SocketAddr, Box<dyn std::error::Error + Send + Sync>> {
    let port = usize::try_from(port).unwrap_or(0);

    if !PORT_RANGE.contains(&port) {
        return Err(format!(
            "port out of range {}-{}",
            PORT_RANGE.start(),
            PORT_RANGE.end()
        )
        .into());
    }

    let uri = format!("{}:{}", host, port);
    let url = uri
        .to_socket_addrs()?
        .next()
        .ok_or(format!("{} is not a valid address", uri))?;
    Ok(url)
}

pub fn port_in_range(s: &str) -> Result<u16, String> {
    let port: usize = s
        .parse()
        .map_err(|_| format!("`{s}` is not a port number"))?;

    if PORT_RANGE.contains(&port) {
        Ok(port as u16)
    } else {
        Err(format!(
            "port not in range {}-{}",
            PORT_RANGE.start(),
            PORT_RANGE.end()
        ))
    }
}

pub fn greater_than_zero<
    T: std::str::FromStr + std::cmp::PartialOrd + std::fmt::Display + Default,
>(
    s: &str,
) -> Result<T, String> {
    let num: T = s
        .parse()
        .map_err(|_| format!("`{}` is not a valid number", s))?;

    if num > T::default() {
        Ok(num)
    } else {
        Err(format!("`{}` is not larger than 0", s))
    }
}

pub fn load_secret(f: &str) -> Result<String, InputError> {
    let s = std::fs::read_to_string(f).map_err(|e| InputError::Secret {
        path: f.to_string(),
        message: e.to_string(),
    })?;

    Ok(s.trim().replace(char::from(25), ""))
}

/// Parses newline separated `KEY=VALUE` build parameters.
///
/// Blank lines are skipped, keys and values are trimmed. An entry without
/// exactly one `=` rejects the whole input.
pub fn split_parameters(parameters: Option<&str>) -> Result<BTreeMap<String, String>, InputError> {
    let mut build_parameters = BTreeMap::new();

    let Some(parameters) = parameters else {
        return Ok(build_parameters);
    };

    for line in parameters.split('\n').filter(|l| !l.trim().is_empty()) {
        let mut parts = line.split('=');

        let (Some(key), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(InputError::MalformedParameter(line.trim().to_string()));
        };

        build_parameters.insert(key.trim().to_string(), value.trim().to_string());
    }

    Ok(build_parameters)
}

pub fn valid_parameters(parameters: Option<&str>) -> bool {
    split_parameters(parameters).is_ok()
}

/// Lossy ASCII slug used for archive directory names.
///
/// Letters are decomposed first, so accents are dropped rather than the
/// whole letter. A name without any ASCII left falls back to the hex of its
/// UTF-8 bytes.
pub fn slugify(s: &str) -> String {
    let mut slug = String::with_capacity(s.len());
    let mut separator = false;

    for c in s.nfkd() {
        if c.is_ascii_alphanumeric() || c == '_' {
            if separator && !slug.is_empty() {
                slug.push('-');
            }

            separator = false;
            slug.push(c.to_ascii_lowercase());
        } else if c == '-' || c.is_whitespace() {
            separator = true;
        }
    }

    if slug.is_empty() {
        return s.trim().bytes().map(|b| format!("{:02x}", b)).collect();
    }

    slug
}

pub fn check_name(s: &str) -> Result<(), InputError> {
    if s.trim().is_empty() || s.trim() != s || s.contains('/') {
        return Err(InputError::InvalidName(s.to_string()));
    }

    Ok(())
}
