use std::convert::Infallible;

use serde_json::json;
use warp::{
    http::StatusCode,
    reject::Rejection,
    reply::{self, Reply},
};

use crate::error::Error;

/// Renders an error as `{"<field>": "<message>"}`, `detail` when it belongs to
/// no field.
pub fn error_reply(error: &Error) -> reply::Response {
    let body = match error.field {
        Some(field) => json!({ field: error.message() }),
        None => json!({ "detail": error.message() }),
    };

    reply::with_status(reply::json(&body), error.status()).into_response()
}

pub async fn handle_rejection(err: Rejection) -> Result<reply::Response, Infallible> {
    let error = if let Some(error) = err.find::<Error>() {
        error.to_owned()
    } else if err.is_not_found() {
        status_error(StatusCode::NOT_FOUND, "Not found")
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        status_error(StatusCode::BAD_REQUEST, &format!("Invalid request body: {e}"))
    } else if err.find::<warp::reject::InvalidQuery>().is_some() {
        status_error(StatusCode::BAD_REQUEST, "Invalid query string")
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        status_error(StatusCode::PAYLOAD_TOO_LARGE, "Request body is too large")
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        status_error(StatusCode::UNSUPPORTED_MEDIA_TYPE, "Expected a JSON body")
    } else if err.find::<warp::reject::LengthRequired>().is_some() {
        status_error(StatusCode::LENGTH_REQUIRED, "Content-Length is required")
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        status_error(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
    } else {
        log::error!("Unhandled rejection: {err:?}");
        status_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    };

    Ok(error_reply(&error))
}

fn status_error(status: StatusCode, info: &str) -> Error {
    Error {
        code: status.as_u16(),
        info: Some(info.to_owned()),
        field: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::HtmlError, validation::ValidationError};

    async fn body_of(response: reply::Response) -> serde_json::Value {
        let bytes = warp::hyper::body::to_bytes(response.into_body())
            .await
            .expect("readable body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn field_errors_are_keyed_by_field() {
        let response = error_reply(&ValidationError::EmptyTags.into());

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_of(response).await,
            json!({ "tags": "Recipe must contain at least one tag" })
        );
    }

    #[tokio::test]
    async fn other_errors_use_detail() {
        let response = error_reply(&HtmlError::NotFound.new("No recipe exists with specified id"));

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_of(response).await,
            json!({ "detail": "No recipe exists with specified id" })
        );
    }

    #[tokio::test]
    async fn unknown_routes_are_404() {
        let response = handle_rejection(warp::reject::not_found())
            .await
            .expect("infallible");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
