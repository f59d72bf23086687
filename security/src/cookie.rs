// security/src/cookie.rs

/// Name of the identity cookie.
pub const COOKIE_NAME: &str = "token";

/// Builds the `Set-Cookie` value for a fresh identity token. HTTP-only,
/// site-wide path, `Secure` outside local development, and no Max-Age:
/// the cookie is session-scoped and the embedded JWT expiry bounds the
/// session.
pub fn session_cookie(token: &str, secure: bool) -> String {
    let mut cookie = format!("{}={}; HttpOnly; Path=/; SameSite=Lax", COOKIE_NAME, token);
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Logout overwrites the cookie with an already-expired empty value.
pub fn expired_cookie(secure: bool) -> String {
    let mut cookie = format!(
        "{}=; HttpOnly; Path=/; SameSite=Lax; Expires=Thu, 01 Jan 1970 00:00:00 GMT",
        COOKIE_NAME
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Extracts the identity token from a raw `Cookie` request header.
pub fn token_from_cookie_header(header: &str) -> Option<&str> {
    header.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        if name == COOKIE_NAME && !value.is_empty() {
            Some(value)
        } else {
            None
        }
    })
}
