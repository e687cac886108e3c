use chrono::Duration;
use chrono::Local;
use hmac::{Hmac, Mac};
use jwt::SignWithKey;
use jwt::VerifyWithKey;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;

use crate::database::schema::{Id, User, UserRole};
use crate::error::Error;

use super::permissions::ActionType;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtSessionData {
    pub user_id: Id,
    pub username: String,
    pub role: UserRole,
    iat: i64,
    exp: i64,
}

impl JwtSessionData {
    pub fn new(id: Id, username: String, role: UserRole) -> Self {
        let now = Local::now();
        let iat = now.timestamp();
        let exp = (now + Duration::hours(24)).timestamp();

        Self {
            user_id: id,
            username,
            role,
            iat,
            exp,
        }
    }
}

/// The acting user resolved from a verified bearer token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionData {
    pub user_id: Id,
    pub username: String,
    pub role: UserRole,
    pub is_admin: bool,
}

impl SessionData {
    pub fn authenticate(&self, action: ActionType) -> Result<(), Error> {
        if !action.authenticate(self) {
            return Err(Error::Forbidden);
        }
        Ok(())
    }
}

impl From<JwtSessionData> for SessionData {
    fn from(data: JwtSessionData) -> Self {
        SessionData {
            user_id: data.user_id,
            username: data.username,
            is_admin: data.role == UserRole::Admin,
            role: data.role,
        }
    }
}

fn session_key() -> Result<Hmac<Sha256>, Error> {
    let secret =
        std::env::var("SESSION_SECRET").unwrap_or_else(|_| String::from("insecure-dev-secret"));

    Hmac::new_from_slice(secret.as_bytes())
        .map_err(|_| Error::InvalidSession("invalid session key"))
}

pub fn generate_jwt_session(user: &User) -> Result<String, Error> {
    let key = session_key()?;
    let claims = JwtSessionData::new(user.id, user.username.to_owned(), user.role.to_owned());

    claims
        .sign_with_key(&key)
        .map_err(|_| Error::InvalidSession("failed to sign token"))
}

pub fn verify_jwt_session(token: &str) -> Result<JwtSessionData, Error> {
    let key = session_key()?;

    let session: JwtSessionData = token
        .verify_with_key(&key)
        .map_err(|_| Error::InvalidSession("invalid token"))?;

    let now = Local::now().timestamp();
    if (session.exp - now).is_negative() {
        return Err(Error::InvalidSession("token expired"));
    }

    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: 7,
            username: String::from("alice"),
            email: String::from("alice@example.org"),
            first_name: String::from("Alice"),
            last_name: String::from("Lidell"),
            password: String::from("<hashed>"),
            avatar: None,
            role: UserRole::User,
        }
    }

    #[test]
    fn token_round_trip_restores_the_claims() {
        let token = generate_jwt_session(&user()).unwrap();
        let session = verify_jwt_session(&token).unwrap();
        assert_eq!(session.user_id, 7);
        assert_eq!(session.username, "alice");
        assert_eq!(session.role, UserRole::User);
    }

    #[test]
    fn tampered_token_is_rejected() {
        let mut token = generate_jwt_session(&user()).unwrap();
        token.push('x');
        assert!(verify_jwt_session(&token).is_err());
    }

    #[test]
    fn session_data_carries_the_admin_flag() {
        let mut admin = user();
        admin.role = UserRole::Admin;
        let token = generate_jwt_session(&admin).unwrap();
        let session: SessionData = verify_jwt_session(&token).unwrap().into();
        assert!(session.is_admin);
    }
}
