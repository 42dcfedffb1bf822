use chrono::Duration;
use chrono::Local;
use hmac::{Hmac, Mac};
use jwt::SignWithKey;
use jwt::VerifyWithKey;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;

use crate::config::Config;
use crate::error::{Error, HtmlError};
use crate::schema::{User, UserRole, Uuid};

use super::permissions::ActionType;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtSessionData {
    pub user_id: Uuid,
    pub email: String,
    pub role: UserRole,
    iat: i64,
    exp: i64,
}

impl JwtSessionData {
    pub fn new(id: Uuid, email: String, role: UserRole, lifetime_hours: i64) -> Self {
        let now = Local::now();
        let iat = now.timestamp();
        let exp = (now + Duration::hours(lifetime_hours)).timestamp();

        Self {
            user_id: id,
            email,
            role,
            iat,
            exp,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionData {
    pub user_id: Uuid,
    pub email: String,
    pub role: UserRole,
    pub is_admin: bool,
}

impl SessionData {
    pub fn authenticate(&self, action: ActionType) -> Result<(), Error> {
        if !action.authenticate(self) {
            return Err(HtmlError::Forbidden.default());
        }
        Ok(())
    }
}

impl From<JwtSessionData> for SessionData {
    fn from(value: JwtSessionData) -> Self {
        SessionData {
            user_id: value.user_id,
            email: value.email,
            is_admin: value.role == UserRole::Admin,
            role: value.role,
        }
    }
}

fn signing_key(secret: &[u8]) -> Result<Hmac<Sha256>, Error> {
    Hmac::new_from_slice(secret).map_err(|e| {
        log::error!("Unusable session key: {e}");
        HtmlError::InternalServerError.default()
    })
}

pub fn generate_jwt_session(user: &User, config: &Config) -> Result<String, Error> {
    let key = signing_key(&config.secret_key)?;
    let claims = JwtSessionData::new(
        user.id,
        user.email.to_owned(),
        user.role.to_owned(),
        config.token_lifetime_hours,
    );

    claims.sign_with_key(&key).map_err(|e| {
        log::error!("Could not sign session: {e}");
        HtmlError::InternalServerError.default()
    })
}

pub fn verify_jwt_session(token: &str, secret: &[u8]) -> Result<SessionData, Error> {
    let key = signing_key(secret)?;

    let session: JwtSessionData = token
        .verify_with_key(&key)
        .map_err(|_| HtmlError::InvalidSession.new("Invalid token"))?;

    let now = Local::now().timestamp();
    if (session.exp - now).is_negative() {
        return Err(HtmlError::InvalidSession.new("Token expired"));
    }

    Ok(session.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: UserRole) -> User {
        User {
            id: 7,
            email: "cook@example.com".to_owned(),
            username: "cook".to_owned(),
            first_name: "Ann".to_owned(),
            last_name: "Cook".to_owned(),
            password: String::new(),
            avatar: None,
            role,
        }
    }

    fn config(secret: &str, lifetime: i64) -> Config {
        let secret = secret.to_owned();
        let lifetime = lifetime.to_string();
        Config::from_lookup(move |key| match key {
            "SECRET_KEY" => Some(secret.clone()),
            "TOKEN_LIFETIME_HOURS" => Some(lifetime.clone()),
            _ => None,
        })
        .expect("valid config")
    }

    #[test]
    fn issued_token_verifies() {
        let config = config("secret", 1);
        let token = generate_jwt_session(&user(UserRole::Admin), &config).expect("signs");

        let session = verify_jwt_session(&token, &config.secret_key).expect("verifies");

        assert_eq!(session.user_id, 7);
        assert_eq!(session.email, "cook@example.com");
        assert!(session.is_admin);
    }

    #[test]
    fn foreign_key_is_rejected() {
        let token = generate_jwt_session(&user(UserRole::User), &config("secret", 1)).expect("signs");

        let error = verify_jwt_session(&token, b"other").expect_err("wrong key");

        assert_eq!(error.code, 401);
    }

    #[test]
    fn expired_token_is_rejected() {
        let config = config("secret", -1);
        let token = generate_jwt_session(&user(UserRole::User), &config).expect("signs");

        let error = verify_jwt_session(&token, &config.secret_key).expect_err("expired");

        assert_eq!(error.message(), "Token expired");
    }

    #[test]
    fn forbidden_actions_are_403() {
        let session: SessionData =
            JwtSessionData::new(1, "a@b.c".to_owned(), UserRole::User, 1).into();

        assert_eq!(
            session.authenticate(ActionType::ManageAllRecipes).map_err(|e| e.code),
            Err(403)
        );
        assert!(session.authenticate(ActionType::CreateRecipes).is_ok());
    }
}
