//! Affinity cookie codec
//!
//! The cookie value is a dot-separated list of route tokens, primary first:
//! `node-a.node-b.node-c`. A single token is single-owner affinity.

use crate::error::{AffinityError, Result};

/// Whether `token` can appear as one segment of a cookie value
pub fn is_valid_route(token: &str) -> bool {
    !token.is_empty()
        && !token
            .chars()
            .any(|c| c == '.' || c == ';' || c == '=' || c == ',' || c.is_whitespace())
}

/// Join route tokens into a cookie value
pub fn encode_routes<S: AsRef<str>>(routes: &[S]) -> Result<String> {
    let mut value = String::new();
    for (i, route) in routes.iter().enumerate() {
        let route = route.as_ref();
        if !is_valid_route(route) {
            return Err(AffinityError::InvalidRoute(route.to_string()));
        }
        if i > 0 {
            value.push('.');
        }
        value.push_str(route);
    }
    if value.is_empty() {
        return Err(AffinityError::InvalidCookie(value));
    }
    Ok(value)
}

/// Split a cookie value into route tokens
pub fn parse_routes(value: &str) -> Result<Vec<String>> {
    let value = value.trim().trim_matches('"');
    if value.is_empty() {
        return Err(AffinityError::InvalidCookie(value.to_string()));
    }
    value
        .split('.')
        .map(|segment| {
            if is_valid_route(segment) {
                Ok(segment.to_string())
            } else {
                Err(AffinityError::InvalidCookie(value.to_string()))
            }
        })
        .collect()
}

/// `Set-Cookie` header value for an affinity cookie
pub fn set_cookie_header(name: &str, value: &str) -> String {
    format!("{}={}; Path=/; HttpOnly", name, value)
}

/// Find the value of cookie `name` in a request `Cookie` header
pub fn find_cookie<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key.trim() == name).then(|| value.trim())
    })
}
