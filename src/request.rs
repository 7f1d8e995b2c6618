use std::collections::HashMap;

use axum::extract::Query;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, Uri};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::config::UpdateConfig;
use crate::error::{Error, Result};

const MALFORMED_AUTHORIZATION: &str = "Malformed authorization header.";
const INVALID_AUTHORIZATION: &str = "Invalid authorization value.";
const MISSING_TARGETS: &str = "You must specify both hostname(s) and IP address(es).";
const MISSING_TOKEN: &str = "Missing API token.";
const HTTPS_REQUIRED: &str = "Please use a HTTPS connection.";

const HOSTNAME_PARAMS: &[&str] = &["hostname", "host", "domains"];
const IP_PARAMS: &[&str] = &["ips", "ip", "myip"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    // favicon / robots, answered with an empty 204
    Ignored,
    Update,
}

pub fn route(path: &str) -> Result<Route> {
    match path {
        "/favicon.ico" | "/robots.txt" => Ok(Route::Ignored),
        p if p.ends_with("/update") => Ok(Route::Update),
        _ => Err(Error::RoutingMiss),
    }
}

// Empty fields are stored as `None`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Credentials {
    pub fn parse(header: &str) -> Result<Self> {
        let mut parts = header.split_whitespace();
        let (Some(scheme), Some(payload)) = (parts.next(), parts.next()) else {
            return Err(Error::bad_request(MALFORMED_AUTHORIZATION));
        };
        if !scheme.eq_ignore_ascii_case("basic") {
            return Err(Error::bad_request(MALFORMED_AUTHORIZATION));
        }

        let decoded = STANDARD
            .decode(payload)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .ok_or_else(|| Error::bad_request(INVALID_AUTHORIZATION))?;

        // 0x00-0x1F and 0x7F
        if decoded.chars().any(|c| c.is_ascii_control()) {
            return Err(Error::bad_request(INVALID_AUTHORIZATION));
        }

        let (username, password) = decoded
            .split_once(':')
            .ok_or_else(|| Error::bad_request(INVALID_AUTHORIZATION))?;

        Ok(Self {
            username: non_empty(username),
            password: non_empty(password),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRequest {
    pub hostnames: Vec<String>,
    pub ips: Vec<String>,
    pub token: String,
    pub username: Option<String>,
    pub account_id: Option<String>,
    pub access_group_id: Option<String>,
}

impl UpdateRequest {
    // Query values win over `config`
    pub fn interpret(config: &UpdateConfig, uri: &Uri, headers: &HeaderMap) -> Result<Self> {
        let Query(params) = Query::<HashMap<String, String>>::try_from_uri(uri)
            .map_err(|e| Error::bad_request(format!("Malformed query string: {e}")))?;

        // Anonymous callers get 404 before any other check can reveal the endpoint
        let authorization = headers.get(AUTHORIZATION);
        let query_token = first_param(&params, &["token"]);
        if authorization.is_none() && query_token.is_none() {
            return Err(Error::RoutingMiss);
        }

        if config.require_https && !is_https(uri, headers) {
            return Err(Error::bad_request(HTTPS_REQUIRED));
        }

        let credentials = match authorization {
            Some(value) => {
                let value = value
                    .to_str()
                    .map_err(|_| Error::bad_request(MALFORMED_AUTHORIZATION))?;
                Credentials::parse(value)?
            }
            None => Credentials::default(),
        };

        let hostnames = first_param(&params, HOSTNAME_PARAMS)
            .map(split_list)
            .unwrap_or_default();
        let ips = first_param(&params, IP_PARAMS)
            .or_else(|| client_ip(config, headers))
            .map(split_list)
            .unwrap_or_default();
        if hostnames.is_empty() || ips.is_empty() {
            return Err(Error::bad_request(MISSING_TARGETS));
        }

        let token = credentials
            .password
            .or_else(|| query_token.map(str::to_string))
            .or_else(|| config.token.clone().filter(|t| !t.is_empty()))
            .ok_or_else(|| Error::bad_request(MISSING_TOKEN))?;

        Ok(Self {
            hostnames,
            ips,
            token,
            username: credentials.username,
            account_id: first_param(&params, &["account"])
                .map(str::to_string)
                .or_else(|| config.account.clone()),
            access_group_id: first_param(&params, &["group"])
                .map(str::to_string)
                .or_else(|| config.group.clone()),
        })
    }

    pub fn access_group(&self) -> Option<(&str, &str)> {
        match (&self.account_id, &self.access_group_id) {
            (Some(account), Some(group)) => Some((account.as_str(), group.as_str())),
            _ => None,
        }
    }
}

fn first_param<'a>(params: &'a HashMap<String, String>, names: &[&str]) -> Option<&'a str> {
    names
        .iter()
        .filter_map(|name| params.get(*name))
        .map(String::as_str)
        .find(|v| !v.is_empty())
}

fn client_ip<'a>(config: &UpdateConfig, headers: &'a HeaderMap) -> Option<&'a str> {
    headers
        .get(config.client_ip_header.to_ascii_lowercase().as_str())
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn is_https(uri: &Uri, headers: &HeaderMap) -> bool {
    headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .or_else(|| uri.scheme_str())
        .unwrap_or("http")
        .eq_ignore_ascii_case("https")
}
