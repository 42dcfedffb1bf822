use std::sync::Arc;

use warp::{reject::Rejection, Filter};

use crate::{
    config::Config,
    error::{Error, HtmlError},
};

use super::jwt::{verify_jwt_session, SessionData};

const TOKEN_SCHEMES: &[&str] = &["Token ", "Bearer "];

fn parse_authorization(header: &str, secret: &[u8]) -> Result<SessionData, Error> {
    let token = TOKEN_SCHEMES
        .iter()
        .find_map(|scheme| header.strip_prefix(*scheme))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(HtmlError::InvalidSession.new("Invalid authorization header"))?;

    verify_jwt_session(token, secret)
}

pub fn with_session(
    config: Arc<Config>,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").and_then(move |header: Option<String>| {
        let config = config.clone();
        async move {
            match header {
                Some(header) => parse_authorization(&header, &config.secret_key)
                    .map_err(Rejection::from),
                None => Err(Rejection::from(HtmlError::Unauthorized.default())),
            }
        }
    })
}

/// Anonymous requests pass as `None`; a malformed or expired token is still
/// rejected.
pub fn with_possible_session(
    config: Arc<Config>,
) -> impl Filter<Extract = (Option<SessionData>,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").and_then(move |header: Option<String>| {
        let config = config.clone();
        async move {
            match header {
                Some(header) => parse_authorization(&header, &config.secret_key)
                    .map(Some)
                    .map_err(Rejection::from),
                None => Ok(None),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{jwt::generate_jwt_session, schema::{User, UserRole}};

    fn config() -> Config {
        Config::from_lookup(|key| (key == "SECRET_KEY").then(|| "secret".to_owned()))
            .expect("valid config")
    }

    fn token(config: &Config) -> String {
        let user = User {
            id: 3,
            email: "cook@example.com".to_owned(),
            username: "cook".to_owned(),
            first_name: String::new(),
            last_name: String::new(),
            password: String::new(),
            avatar: None,
            role: UserRole::User,
        };
        generate_jwt_session(&user, config).expect("signs")
    }

    #[test]
    fn both_schemes_are_accepted() {
        let config = config();
        let token = token(&config);

        for scheme in ["Token", "Bearer"] {
            let session = parse_authorization(&format!("{scheme} {token}"), &config.secret_key)
                .expect("valid header");
            assert_eq!(session.user_id, 3);
        }
    }

    #[test]
    fn unknown_scheme_is_rejected() {
        let config = config();
        let token = token(&config);

        let error = parse_authorization(&format!("Basic {token}"), &config.secret_key)
            .expect_err("unsupported scheme");

        assert_eq!(error.code, 401);
    }

    #[tokio::test]
    async fn missing_header_is_unauthorized() {
        let filter = with_session(Arc::new(config()));

        let result = warp::test::request().filter(&filter).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn missing_header_is_anonymous_when_optional() {
        let filter = with_possible_session(Arc::new(config()));

        let session = warp::test::request().filter(&filter).await.expect("anonymous");

        assert!(session.is_none());
    }
}
