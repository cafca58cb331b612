#![allow(clippy::new_without_default)]

use app::{ApiCall, App, AppError};
use chrono::{DateTime, SubsecRound, Utc};
use hyper::{
    body::Buf,
    header::{self, HeaderValue},
    Body, Method, Request, Response, StatusCode, Uri,
};
use model::Action;
use serde::Serialize;
use serde_json::{json, Value as JsonValue};
use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
    str::FromStr,
    sync::Arc,
};

pub mod app;
pub mod controller;
pub mod notification;
pub mod websocket;

#[macro_use]
extern crate log;

#[derive(Clone, Debug)]
pub struct AppSettings {
    pub port: u16,
    pub bind_addr: IpAddr,
    pub data_file: PathBuf,
}

impl AppSettings {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }
}

const INDEX_HTML: &str = include_str!("../static/index.html");

pub async fn entry_point(
    webserver: Arc<Webserver>,
    request: Request<Body>,
) -> Result<Response<Body>, hyper::Error> {
    Ok(webserver.handle_request(request).await)
}

pub struct Webserver {
    app: Arc<App>,
}

impl Webserver {
    pub fn new(app: Arc<App>) -> Self {
        Self { app }
    }

    pub async fn handle_request(&self, request: Request<Body>) -> Response<Body> {
        let timer = std::time::Instant::now();
        let method = request.method().clone();
        let uri = request.uri().clone();

        let response = match self.route(request).await {
            Ok(response) => response,
            Err(error) => error_response(error),
        };

        info!(
            "{} {} -> {} in {:?}",
            method,
            uri,
            response.status().as_u16(),
            timer.elapsed()
        );
        response
    }

    async fn route(&self, request: Request<Body>) -> Result<Response<Body>, AppError> {
        let method = request.method().clone();
        let segments = path_segments(request.uri());
        let segments: Vec<&str> = segments.iter().map(String::as_str).collect();
        trace!("matching route {:?} {:?}", method, segments);

        let call = match (&method, segments.as_slice()) {
            (&Method::GET, []) | (&Method::GET, ["index.html"]) => {
                return Ok(html_response(INDEX_HTML));
            }
            (_, ["ws"]) => {
                return websocket::upgrade(request, self.app.notifications()).await;
            }
            (_, ["api", "ping"]) => return Ok(ping_pong_response()),
            (&Method::GET, ["api", "items"]) => ApiCall::GetItems,
            (&Method::POST, ["api", "items"]) => {
                ApiCall::AddItem(Self::get_body_as_json(request).await?)
            }
            (&Method::GET, ["api", "summary"]) => ApiCall::GetSummary,
            (&Method::POST, ["api", "items", id, action]) => {
                let action = parse_action(action)?;
                let id = id.to_string();
                ApiCall::ItemAction {
                    id,
                    action,
                    body: Self::get_body_as_json(request).await?,
                }
            }
            (&Method::POST, ["api", "items", id]) => {
                let action = query_param(request.uri(), "action").unwrap_or_default();
                let action = parse_action(&action)?;
                let id = id.to_string();
                ApiCall::ItemAction {
                    id,
                    action,
                    body: Self::get_body_as_json(request).await?,
                }
            }
            (&Method::DELETE, ["api", "items", id]) => ApiCall::DeleteItem(id.to_string()),
            _invalid => {
                debug!("invalid http method or route: {} {}", method, request.uri());
                return Err(AppError::not_found());
            }
        };

        let body = self.app.handle_call(call).await?;
        Ok(generic_json_response(body, StatusCode::OK))
    }

    /// Attempts to parse the body of a request as json, treating an empty body as `{}`
    async fn get_body_as_json(request: Request<Body>) -> Result<JsonValue, AppError> {
        let buf = hyper::body::aggregate(request.into_body())
            .await
            .map_err(|hyper_error| AppError::invalid_request().with_context(&hyper_error))?;

        if !buf.has_remaining() {
            return Ok(json!({}));
        }

        let json: JsonValue = serde_json::from_reader(buf.reader()).map_err(|serde_error| {
            AppError::invalid_request()
                .with_message(&format!("request body is not valid JSON: {}", serde_error))
        })?;

        Ok(json)
    }
}

fn parse_action(action: &str) -> Result<Action, AppError> {
    Action::from_str(action).map_err(|_| {
        AppError::invalid_request().with_message(&format!("unknown action '{}'", action))
    })
}

/// Percent-decoded, non-empty path segments
fn path_segments(uri: &Uri) -> Vec<String> {
    uri.path()
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(decode)
        .collect()
}

fn query_param(uri: &Uri, name: &str) -> Option<String> {
    uri.query()?
        .split('&')
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            Some((parts.next()?, parts.next().unwrap_or("")))
        })
        .find(|(key, _)| *key == name)
        .map(|(_, value)| decode(value))
}

fn decode(text: &str) -> String {
    urlencoding::decode(text)
        .map(|decoded| decoded.to_string())
        .unwrap_or_else(|_| text.to_owned())
}

fn generic_json_response<T>(body: T, status: StatusCode) -> Response<Body>
where
    T: Serialize,
{
    match serde_json::to_vec(&body) {
        Ok(bytes) => response_with(status, "application/json", Body::from(bytes)),
        Err(serde_error) => {
            error!("failed to serialize response body: {}", serde_error);
            response_with(
                StatusCode::INTERNAL_SERVER_ERROR,
                "text/plain; charset=utf-8",
                Body::from("internal error"),
            )
        }
    }
}

fn error_response(error: AppError) -> Response<Body> {
    debug!("request rejected with {}: '{}'", error.status, error.message);

    generic_json_response(json!({ "error": error.message }), error.status)
}

fn html_response(html: &'static str) -> Response<Body> {
    response_with(StatusCode::OK, "text/html; charset=utf-8", Body::from(html))
}

fn ping_pong_response() -> Response<Body> {
    response_with(StatusCode::OK, "text/plain; charset=utf-8", Body::from("pong"))
}

fn response_with(status: StatusCode, content_type: &'static str, body: Body) -> Response<Body> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

/// The current time at the precision timestamps are persisted with
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use database::Database;
    use notification::NotificationHandler;
    use std::path::Path;
    use tempfile::TempDir;

    struct TestServer {
        _dir: TempDir,
        notifications: Arc<NotificationHandler>,
        webserver: Webserver,
    }

    fn server_with_file(path: &Path, dir: TempDir) -> TestServer {
        let notifications = Arc::new(NotificationHandler::new());
        let app = App::new(Arc::new(Database::new(path)), notifications.clone());
        TestServer {
            _dir: dir,
            notifications,
            webserver: Webserver::new(Arc::new(app)),
        }
    }

    fn test_server() -> TestServer {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("einkaufsliste.json");
        server_with_file(&path, dir)
    }

    impl TestServer {
        async fn send(&self, method: Method, uri: &str, body: Option<JsonValue>) -> Response<Body> {
            let body = match body {
                Some(json) => Body::from(json.to_string()),
                None => Body::empty(),
            };
            let request = Request::builder()
                .method(method)
                .uri(uri)
                .body(body)
                .unwrap();
            self.webserver.handle_request(request).await
        }

        async fn call(
            &self,
            method: Method,
            uri: &str,
            body: Option<JsonValue>,
        ) -> (StatusCode, JsonValue) {
            let response = self.send(method, uri, body).await;
            let status = response.status();
            let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
            (status, serde_json::from_slice(&bytes).unwrap())
        }

        async fn add(&self, name: &str) -> String {
            let (status, item) = self
                .call(
                    Method::POST,
                    "/api/items",
                    Some(json!({ "artikel": name, "username": "Max" })),
                )
                .await;
            assert_eq!(status, StatusCode::OK);
            item["id"].as_str().unwrap().to_owned()
        }
    }

    #[tokio::test]
    async fn empty_store_lists_no_items() {
        let server = test_server();

        let (status, body) = server.call(Method::GET, "/api/items", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "items": [] }));
    }

    #[tokio::test]
    async fn created_items_are_listed() {
        let server = test_server();

        let (status, item) = server
            .call(
                Method::POST,
                "/api/items",
                Some(json!({ "artikel": "Chips", "anzahl": 2, "preis": 1.5, "username": "Max" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(item["status"], "todo");
        assert_eq!(item["letzterUser"], "Max");
        assert_eq!(item["kommentarHistory"], json!([]));

        let (_, body) = server.call(Method::GET, "/api/items/", None).await;
        assert_eq!(body["items"], json!([item]));
    }

    #[tokio::test]
    async fn blank_names_are_rejected() {
        let server = test_server();

        let (status, body) = server
            .call(Method::POST, "/api/items", Some(json!({ "artikel": " " })))
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
        let (_, list) = server.call(Method::GET, "/api/items", None).await;
        assert_eq!(list, json!({ "items": [] }));
    }

    #[tokio::test]
    async fn malformed_json_is_a_bad_request() {
        let server = test_server();
        let request = Request::post("/api/items")
            .body(Body::from("{ artikel"))
            .unwrap();

        let response = server.webserver.handle_request(request).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn toggle_by_path_and_by_query() {
        let server = test_server();
        let id = server.add("Chips").await;

        let (status, body) = server
            .call(
                Method::POST,
                &format!("/api/items/{}/toggle", id),
                Some(json!({ "username": "Mia" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["item"]["status"], "done");
        assert_eq!(body["item"]["letzterUser"], "Mia");

        let (status, body) = server
            .call(
                Method::POST,
                &format!("/api/items/{}?action=toggle", id),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["item"]["status"], "todo");
        assert_eq!(body["item"]["letzterUser"], "Anonym");
    }

    #[tokio::test]
    async fn comments_build_history() {
        let server = test_server();
        let id = server.add("Chips").await;

        server
            .call(
                Method::POST,
                &format!("/api/items/{}/comment", id),
                Some(json!({ "kommentar": "bring extra", "username": "Max" })),
            )
            .await;
        let (status, body) = server
            .call(
                Method::POST,
                &format!("/api/items/{}?action=comment", id),
                Some(json!({ "kommentar": "never mind", "username": "Mia" })),
            )
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["item"]["kommentar"], "never mind");
        let history = body["item"]["kommentarHistory"].as_array().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0]["kommentar"], "bring extra");
        assert_eq!(history[0]["username"], "Max");
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let server = test_server();

        for uri in &[
            "/api/items/nope/toggle",
            "/api/items/nope/comment",
            "/api/items/nope?action=toggle",
        ] {
            let (status, body) = server.call(Method::POST, uri, Some(json!({}))).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
            assert_eq!(body, json!({ "error": "Item not found" }));
        }
    }

    #[tokio::test]
    async fn unknown_actions_are_bad_requests() {
        let server = test_server();
        let id = server.add("Chips").await;

        let (status, _) = server
            .call(Method::POST, &format!("/api/items/{}?action=rename", id), None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = server
            .call(Method::POST, &format!("/api/items/{}", id), None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn delete_always_succeeds() {
        let server = test_server();
        let id = server.add("Chips").await;
        let uri = format!("/api/items/{}", id);

        for _ in 0..2 {
            let (status, body) = server.call(Method::DELETE, &uri, None).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, json!({ "success": true }));
        }

        let (_, list) = server.call(Method::GET, "/api/items", None).await;
        assert_eq!(list, json!({ "items": [] }));
    }

    #[tokio::test]
    async fn percent_encoded_ids_are_decoded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("einkaufsliste.json");
        std::fs::write(
            &path,
            json!({ "items": [{
                "id": "a b",
                "artikel": "Eis",
                "status": "todo",
                "updatedAt": "2024-05-01T18:00:00.000Z"
            }] })
            .to_string(),
        )
        .unwrap();
        let server = server_with_file(&path, dir);

        let (status, body) = server
            .call(Method::POST, "/api/items/a%20b/toggle", None)
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["item"]["id"], "a b");
    }

    #[tokio::test]
    async fn summary_sums_by_status() {
        let server = test_server();
        server
            .call(
                Method::POST,
                "/api/items",
                Some(json!({ "artikel": "Chips", "anzahl": 2, "preis": 1.5 })),
            )
            .await;

        let (status, body) = server.call(Method::GET, "/api/summary", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["overall"], 3.0);
        assert_eq!(body["todo"], 3.0);
        assert_eq!(body["done"], 0.0);
        assert_eq!(body["itemCount"], 1);
        assert_eq!(body["items"][0]["artikel"], "Chips");
        assert_eq!(body["items"][0]["subtotal"], 3.0);
    }

    #[tokio::test]
    async fn failed_saves_are_server_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("einkaufsliste.json");
        let server = server_with_file(&path, dir);

        let (status, body) = server
            .call(Method::POST, "/api/items", Some(json!({ "artikel": "Chips" })))
            .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn mutations_are_broadcast() {
        let server = test_server();
        let mut subscription = server.notifications.subscribe().await;

        let id = server.add("Chips").await;

        let message: JsonValue =
            serde_json::from_str(&subscription.receiver.recv().await.unwrap()).unwrap();
        assert_eq!(message["type"], "update");
        assert_eq!(message["data"]["items"][0]["id"], json!(id));
    }

    #[tokio::test]
    async fn serves_the_page_and_ping() {
        let server = test_server();

        for uri in &["/", "/index.html"] {
            let response = server.send(Method::GET, uri, None).await;
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(
                response.headers()[header::CONTENT_TYPE],
                "text/html; charset=utf-8"
            );
        }

        let response = server.send(Method::GET, "/api/ping", None).await;
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        assert_eq!(&bytes[..], b"pong");
    }

    #[test]
    fn page_renders_from_the_summary_and_keeps_failed_entries() {
        assert!(INDEX_HTML.contains(r#"request("GET", "/api/summary")"#));
        assert!(INDEX_HTML.contains(
            r#"if (await mutate("POST", "/api/items", body)) {
      event.target.reset();
    }"#
        ));
    }

    #[tokio::test]
    async fn websocket_route_requires_an_upgrade() {
        let server = test_server();

        let (status, body) = server.call(Method::GET, "/ws", None).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Expected WebSocket" }));
    }

    #[tokio::test]
    async fn unknown_routes_are_not_found() {
        let server = test_server();

        for (method, uri) in vec![
            (Method::GET, "/nowhere"),
            (Method::PUT, "/api/items"),
            (Method::DELETE, "/api/items"),
        ] {
            let (status, body) = server.call(method, uri, None).await;
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert_eq!(body, json!({ "error": "Not Found" }));
        }
    }

    #[test]
    fn query_params_are_decoded() {
        let uri: Uri = "/api/items/1?foo=bar&action=com%6Dent".parse().unwrap();
        assert_eq!(query_param(&uri, "action"), Some("comment".to_owned()));
        assert_eq!(query_param(&uri, "missing"), None);
    }
}
