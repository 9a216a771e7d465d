//! JSON body extractor whose rejections use the `{ "error": ... }` shape with status 400.

use super::error::ApiError;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::Json;

pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Payload {
        account_id: i64,
    }

    fn request(body: &'static str) -> Request {
        Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn rejections_are_bad_requests() {
        for body in ["{", r#"{"accountId":"one"}"#] {
            match JsonBody::<Payload>::from_request(request(body), &()).await {
                Ok(JsonBody(p)) => panic!("accepted {body}: {p:?}"),
                Err(e) => assert_eq!(e.status(), StatusCode::BAD_REQUEST, "{body}"),
            }
        }
    }

    #[tokio::test]
    async fn valid_body_is_extracted() {
        let JsonBody(payload) = JsonBody::<Payload>::from_request(request(r#"{"accountId":5}"#), &())
            .await
            .unwrap_or_else(|e| panic!("rejected: {e:?}"));
        assert_eq!(payload.account_id, 5);
    }
}
