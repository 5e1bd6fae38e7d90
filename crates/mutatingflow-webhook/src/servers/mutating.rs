use std::{marker::PhantomData, sync::Arc};

use axum::{
    Json, Router,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use kube::{
    Resource,
    core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview},
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::Webhook;

/// Mutating webhook, which lets you intercept object creations and modifications and patch the
/// object on the fly.
///
/// The webhook decodes the [`AdmissionReview`] posted to `http_path`, passes the contained
/// [`AdmissionRequest`] to the handler and sends back the [`AdmissionResponse`] wrapped in a
/// review. Malformed requests are rejected on the HTTP level:
///
/// - missing or non JSON content type: `415 Unsupported Media Type`
/// - empty body or malformed JSON: `400 Bad Request`
///
/// Well-formed JSON which is not a valid review (e.g. an object with broken metadata) and a review
/// without a request are answered with an invalid (denied) response, echoing the request uid if
/// there is one.
///
/// ```
/// use std::sync::Arc;
///
/// use axum::Router;
/// use kube::core::{
///     DynamicObject,
///     admission::{AdmissionRequest, AdmissionResponse},
/// };
/// use mutatingflow_webhook::{Webhook, servers::MutatingWebhook};
///
/// async fn allow_all(_state: Arc<()>, request: AdmissionRequest<DynamicObject>) -> AdmissionResponse {
///     AdmissionResponse::from(&request)
/// }
///
/// let webhook = MutatingWebhook::new("/mutate", allow_all, Arc::new(()));
/// let router = webhook.register_routes(Router::new());
/// ```
pub struct MutatingWebhook<H, S, R> {
    http_path: String,

    /// The async handler that gets an [`AdmissionRequest`] and returns an [`AdmissionResponse`]
    handler: H,

    /// The state passed to every invocation of the handler.
    handler_state: Arc<S>,

    /// Tracks the type of the Kubernetes resource which is mutated
    _resource: PhantomData<R>,
}

impl<H, S, R> MutatingWebhook<H, S, R> {
    pub fn new(http_path: impl Into<String>, handler: H, handler_state: Arc<S>) -> Self {
        Self {
            http_path: http_path.into(),
            handler,
            handler_state,
            _resource: PhantomData,
        }
    }
}

impl<H, S, R, Fut> Webhook for MutatingWebhook<H, S, R>
where
    H: Fn(Arc<S>, AdmissionRequest<R>) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = AdmissionResponse> + Send + 'static,
    R: Resource + Send + Sync + DeserializeOwned + Serialize + 'static,
    S: Send + Sync + 'static,
{
    fn register_routes(&self, router: Router) -> Router {
        let handler_state = self.handler_state.clone();
        let handler = self.handler.clone();
        let handler_fn = |payload: Result<Json<Value>, JsonRejection>| async move {
            let Json(payload) = match payload {
                Ok(payload) => payload,
                Err(rejection) => return reject(&rejection),
            };

            let uid = request_uid(&payload);
            let review: AdmissionReview<R> = match serde_json::from_value(payload) {
                Ok(review) => review,
                Err(err) => {
                    tracing::warn!(
                        %err,
                        admission.uid = uid.as_str(),
                        "admission review does not match the expected schema"
                    );
                    let mut response = AdmissionResponse::invalid(format!(
                        "failed to deserialize admission review: {err}"
                    ));
                    response.uid = uid;
                    return Json(response.into_review()).into_response();
                }
            };

            let request: AdmissionRequest<R> = match review.try_into() {
                Ok(request) => request,
                Err(err) => {
                    tracing::warn!(%err, "admission review carries no request");
                    return Json(
                        AdmissionResponse::invalid(format!("failed to convert to request: {err}"))
                            .into_review(),
                    )
                    .into_response();
                }
            };

            let response = handler(handler_state, request).await;
            Json(response.into_review()).into_response()
        };

        tracing::debug!(http.path = self.http_path.as_str(), "registering mutating webhook");
        router.route(&self.http_path, post(handler_fn))
    }
}

/// The uid of the request, if the payload carries one. Echoed in responses to reviews which could
/// not be decoded.
fn request_uid(payload: &Value) -> String {
    payload
        .pointer("/request/uid")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned()
}

/// Answers bodies which are not JSON at all. Well-formed JSON is always handed on.
fn reject(rejection: &JsonRejection) -> Response {
    let status = match rejection {
        JsonRejection::MissingJsonContentType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        _ => StatusCode::BAD_REQUEST,
    };

    let body = rejection.body_text();
    tracing::warn!(%status, reason = body, "rejecting admission review");
    (status, body).into_response()
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use http::{Request, header::CONTENT_TYPE};
    use http_body_util::BodyExt;
    use kube::core::DynamicObject;
    use rstest::{fixture, rstest};
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;

    async fn deny_pods(
        denied_kind: Arc<String>,
        request: AdmissionRequest<DynamicObject>,
    ) -> AdmissionResponse {
        let response = AdmissionResponse::from(&request);
        if request.kind.kind == *denied_kind {
            response.deny(format!("{denied_kind} objects are not allowed"))
        } else {
            response
        }
    }

    #[fixture]
    fn router() -> Router {
        MutatingWebhook::new("/mutate", deny_pods, Arc::new("Pod".to_owned()))
            .register_routes(Router::new())
    }

    fn review(kind: &str) -> Value {
        json!({
            "apiVersion": "admission.k8s.io/v1",
            "kind": "AdmissionReview",
            "request": {
                "uid": "3a2a6e9b-0f0c-4e9b-a1a1-0c5e6f1b2c3d",
                "kind": { "group": "", "version": "v1", "kind": kind },
                "resource": { "group": "", "version": "v1", "resource": "pods" },
                "name": "example",
                "namespace": "team-a",
                "operation": "CREATE",
                "userInfo": { "username": "admin" },
                "object": { "apiVersion": "v1", "kind": kind, "metadata": { "name": "example" } }
            }
        })
    }

    async fn post(router: Router, content_type: Option<&str>, body: String) -> (StatusCode, Vec<u8>) {
        let mut request = Request::post("/mutate");
        if let Some(content_type) = content_type {
            request = request.header(CONTENT_TYPE, content_type);
        }

        let response = router
            .oneshot(request.body(Body::from(body)).expect("valid request"))
            .await
            .expect("router is infallible");

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body must be readable")
            .to_bytes();
        (status, bytes.to_vec())
    }

    #[rstest]
    #[case::allowed("Notebook", true)]
    #[case::denied("Pod", false)]
    #[tokio::test]
    async fn review_is_answered(router: Router, #[case] kind: &str, #[case] allowed: bool) {
        let (status, body) = post(
            router,
            Some("application/json"),
            review(kind).to_string(),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let answer: Value = serde_json::from_slice(&body).expect("answer must be JSON");
        assert_eq!(answer["kind"], "AdmissionReview");
        assert_eq!(answer["response"]["uid"], "3a2a6e9b-0f0c-4e9b-a1a1-0c5e6f1b2c3d");
        assert_eq!(answer["response"]["allowed"], allowed);
    }

    #[rstest]
    #[case::missing(None)]
    #[case::text(Some("text/plain"))]
    #[tokio::test]
    async fn non_json_content_type_is_rejected(router: Router, #[case] content_type: Option<&str>) {
        let (status, _) = post(router, content_type, review("Pod").to_string()).await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[rstest]
    #[case::empty("")]
    #[case::garbage("{ not json")]
    #[case::truncated(r#"{ "request": { "uid": "#)]
    #[tokio::test]
    async fn malformed_body_is_rejected(router: Router, #[case] body: &str) {
        let (status, _) = post(router, Some("application/json"), body.to_owned()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[rstest]
    #[tokio::test]
    async fn review_without_request_is_invalid(router: Router) {
        let body = json!({ "apiVersion": "admission.k8s.io/v1", "kind": "AdmissionReview" });
        let (status, body) = post(router, Some("application/json"), body.to_string()).await;

        assert_eq!(status, StatusCode::OK);
        let answer: Value = serde_json::from_slice(&body).expect("answer must be JSON");
        assert_eq!(answer["response"]["allowed"], false);
    }

    #[rstest]
    #[tokio::test]
    async fn object_with_invalid_metadata_is_invalid(router: Router) {
        let mut body = review("Pod");
        body["request"]["object"]["metadata"]["annotations"] = json!(["not-a-map"]);

        let (status, body) = post(router, Some("application/json"), body.to_string()).await;

        assert_eq!(status, StatusCode::OK);
        let answer: Value = serde_json::from_slice(&body).expect("answer must be JSON");
        assert_eq!(answer["response"]["uid"], "3a2a6e9b-0f0c-4e9b-a1a1-0c5e6f1b2c3d");
        assert_eq!(answer["response"]["allowed"], false);
        let message = answer["response"]["status"]["message"]
            .as_str()
            .expect("denial must carry a message");
        assert!(
            message.contains("failed to deserialize admission review"),
            "unexpected message: {message}"
        );
    }

    #[rstest]
    #[tokio::test]
    async fn json_which_is_no_review_is_invalid(router: Router) {
        let (status, body) = post(
            router,
            Some("application/json"),
            r#"{ "request": 42 }"#.to_owned(),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let answer: Value = serde_json::from_slice(&body).expect("answer must be JSON");
        assert_eq!(answer["response"]["uid"], "");
        assert_eq!(answer["response"]["allowed"], false);
    }
}
