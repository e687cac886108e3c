use warp::{Filter, Rejection};

use crate::error::Error;

use super::jwt::{verify_jwt_session, SessionData};

/// Strips the auth scheme from an `Authorization` header value. Both
/// `Bearer` and `Token` schemes are accepted.
pub fn bearer_token(header: &str) -> Result<&str, Error> {
    let token = header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("Token "))
        .ok_or(Error::InvalidSession("unsupported authorization scheme"))?
        .trim();

    if token.is_empty() {
        return Err(Error::InvalidSession("empty token"));
    }

    Ok(token)
}

fn session_from_header(header: &str) -> Result<SessionData, Error> {
    let token = bearer_token(header)?;
    Ok(verify_jwt_session(token)?.into())
}

/// Rejects the request unless it carries a valid bearer token.
pub fn with_session() -> impl Filter<Extract = (SessionData,), Error = Rejection> + Copy {
    warp::header::<String>("authorization").and_then(|header: String| async move {
        session_from_header(&header).map_err(warp::reject::custom)
    })
}

/// Like [`with_session`], but anonymous requests pass through with `None`.
/// A present but invalid token still rejects.
pub fn with_possible_session(
) -> impl Filter<Extract = (Option<SessionData>,), Error = Rejection> + Copy {
    warp::header::optional::<String>("authorization").and_then(
        |header: Option<String>| async move {
            match header {
                Some(header) => session_from_header(&header)
                    .map(Some)
                    .map_err(warp::reject::custom),
                None => Ok(None),
            }
        },
    )
}
