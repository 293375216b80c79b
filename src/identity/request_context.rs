//! Bearer-token extraction shared by whatever frontend sits above the core.
//! Pure string logic so the crate stays independent of any HTTP stack.

/// Cookie under which frontends store the session token.
pub const TOKEN_COOKIE: &str = "token";

#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub token: Option<String>,
    pub request_id: Option<String>,
}

impl RequestContext {
    pub fn from_parts(
        authorization: Option<&str>,
        token_header: Option<&str>,
        cookie_header: Option<&str>,
        request_id: Option<&str>,
    ) -> Self {
        Self {
            token: token_from_parts(authorization, token_header, cookie_header),
            request_id: request_id.map(str::to_string),
        }
    }
}

/// Resolve the bearer token from the authorization header, an alternate
/// token header, or the session cookie, in that precedence order. A
/// malformed authorization value falls through to the next source.
pub fn token_from_parts(
    authorization: Option<&str>,
    token_header: Option<&str>,
    cookie_header: Option<&str>,
) -> Option<String> {
    if let Some(value) = authorization {
        if let Some(token) = bearer_token(value) {
            return Some(token.to_string());
        }
    }
    if let Some(value) = token_header {
        let value = value.trim();
        if !value.is_empty() {
            return Some(value.to_string());
        }
    }
    if let Some(value) = cookie_header {
        if let Some(token) = cookie_value(value, TOKEN_COOKIE) {
            return Some(token.to_string());
        }
    }
    None
}

fn bearer_token(value: &str) -> Option<&str> {
    let value = value.trim();
    let (scheme, rest) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = rest.trim();
    if token.is_empty() { None } else { Some(token) }
}

fn cookie_value<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        if k.trim() == name {
            let v = v.trim();
            if v.is_empty() { None } else { Some(v) }
        } else {
            None
        }
    })
}
