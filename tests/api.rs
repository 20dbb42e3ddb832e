use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use tower::ServiceExt;

use plotdash::app::{AppState, router};
use plotdash::login::UserRegistry;
use plotdash::render::PlottersRenderer;
use plotdash::store::FileStore;

const BOUNDARY: &str = "plotdash-test-boundary";

async fn test_app(dir: &tempfile::TempDir) -> Router {
    let store = FileStore::new(dir.path());
    store.init().await.unwrap();
    let users = UserRegistry::open(dir.path().join("users.json")).unwrap();
    let renderer = Arc::new(PlottersRenderer::new(store.scratch_dir()));

    router(Arc::new(AppState {
        store,
        users,
        renderer,
    }))
}

async fn send_json(app: &Router, method: &str, uri: &str, body: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn send_get(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

// Hand-rolled multipart body: fields first, then the file part
fn multipart_body(fields: &[(&str, &str)], file_name: &str, file_bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(file_bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

async fn send_upload(
    app: &Router,
    username: &str,
    fields: &[(&str, &str)],
    file_name: &str,
    file_bytes: &[u8],
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(format!("/upload/{username}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(fields, file_name, file_bytes)))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn register(app: &Router, username: &str) {
    let (status, body) = send_json(
        app,
        "POST",
        "/auth/register",
        &format!(r#"{{"username":"{username}","password":"long-enough-password"}}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "registration failed: {body}");
    assert_eq!(body["success"], true);
    assert!(body["token"].is_string());
}

#[tokio::test]
async fn register_login_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir).await;

    register(&app, "Ana@Example.com").await;

    // Login is case-insensitive on the username and returns the profile
    let (status, body) = send_json(
        &app,
        "POST",
        "/auth/login",
        r#"{"username":"ana@example.com","password":"long-enough-password"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body["token"].is_string());
    assert_eq!(body["data"]["username"], "ana@example.com");

    // Wrong password is a structured failure
    let (status, body) = send_json(
        &app,
        "POST",
        "/auth/login",
        r#"{"username":"ana@example.com","password":"wrong-password!"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().contains("Wrong password"));
}

#[tokio::test]
async fn duplicate_registration_is_a_structured_failure() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir).await;

    register(&app, "ana@example.com").await;
    let (status, body) = send_json(
        &app,
        "POST",
        "/auth/register",
        r#"{"username":"ana@example.com","password":"long-enough-password"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().contains("already exists"));
}

#[tokio::test]
async fn transient_upload_returns_inline_plots_and_saves_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir).await;
    register(&app, "ana@example.com").await;

    let fields = [
        ("y_axis_key", "B"),
        ("plot_type", "multiple"),
        ("graph_type", "line"),
        ("save_plot", "false"),
    ];
    let (status, body) = send_upload(
        &app,
        "ana@example.com",
        &fields,
        "data.csv",
        b"A,B\n1,10\n2,20\n",
    )
    .await;
    assert_eq!(status, StatusCode::OK, "upload failed: {body}");
    assert_eq!(body["success"], true);

    let plots = body["data"]["plots"].as_array().unwrap();
    assert_eq!(plots.len(), 1);
    assert_eq!(plots[0]["series_name"], "B vs A");
    assert_eq!(plots[0]["data"]["x"], serde_json::json!([1.0, 2.0]));
    assert_eq!(plots[0]["data"]["y"], serde_json::json!([10.0, 20.0]));
    assert_eq!(body["data"]["plot_type"], "multiple");

    // Nothing appeared in the saved namespace
    let (status, body) = send_get(&app, "/fetch/ana@example.com").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["files"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn saved_upload_is_listable_fetchable_renamable_deletable() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir).await;
    register(&app, "ana@example.com").await;

    let fields = [
        ("y_axis_key", "B"),
        ("plot_type", "single"),
        ("graph_type", "scatter"),
        ("save_plot", "true"),
    ];
    let (status, body) = send_upload(
        &app,
        "ana@example.com",
        &fields,
        "data.csv",
        b"A,B\n1,10\n2,20\n",
    )
    .await;
    assert_eq!(status, StatusCode::OK, "upload failed: {body}");
    let saved = body["data"]["saved"].as_array().unwrap();
    assert_eq!(saved.len(), 1);
    let saved_name = saved[0].as_str().unwrap().to_string();
    assert!(saved_name.ends_with(".json"));

    // Listed with a nonzero size
    let (_, body) = send_get(&app, "/fetch/ana@example.com").await;
    let files = body["files"].as_array().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0]["filename"], saved_name.as_str());
    assert!(files[0]["size"].as_u64().unwrap() > 0);

    // Fetched content is the series document
    let (status, body) =
        send_get(&app, &format!("/fetch/ana@example.com/file/{saved_name}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["encoding"], "utf-8");
    let series: serde_json::Value =
        serde_json::from_str(body["content"].as_str().unwrap()).unwrap();
    assert_eq!(series["series_name"], "B vs A");
    assert_eq!(series["kind"], "scatter");

    // Rename keeps the extension and the content
    let (status, _) = send_json(
        &app,
        "PUT",
        "/fetch/ana@example.com/edit",
        &format!(r#"{{"oldFilename":"{saved_name}","newFilename":"my-plot"}}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send_get(&app, "/fetch/ana@example.com/file/my-plot.json").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["content"].as_str().unwrap().contains("B vs A"));

    // Old name no longer resolves
    let (status, _) = send_get(&app, &format!("/fetch/ana@example.com/file/{saved_name}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Delete removes it from the listing
    let (status, _) = send_json(
        &app,
        "DELETE",
        "/fetch/ana@example.com/delete",
        r#"{"filename":"my-plot.json"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send_get(&app, "/fetch/ana@example.com").await;
    assert_eq!(body["files"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn bad_specs_fail_before_anything_is_written() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir).await;
    register(&app, "ana@example.com").await;

    // Y-axis key not among the parsed columns
    let fields = [
        ("y_axis_key", "Z"),
        ("plot_type", "multiple"),
        ("graph_type", "line"),
        ("save_plot", "true"),
    ];
    let (status, body) = send_upload(
        &app,
        "ana@example.com",
        &fields,
        "data.csv",
        b"A,B\n1,10\n",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(
        body["message"]
            .as_str()
            .unwrap()
            .contains("not found in the data columns")
    );

    // The raw upload was never persisted: only the profile is in the namespace
    let user_dir = dir.path().join("ana");
    let names: Vec<String> = std::fs::read_dir(&user_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(names, vec!["ana.json".to_string()]);

    // Invalid plot type
    let fields = [
        ("y_axis_key", "B"),
        ("plot_type", "both"),
        ("graph_type", "line"),
        ("save_plot", "false"),
    ];
    let (status, body) = send_upload(
        &app,
        "ana@example.com",
        &fields,
        "data.csv",
        b"A,B\n1,10\n",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("invalid plot type"));

    // Unsupported file format
    let fields = [
        ("y_axis_key", "B"),
        ("plot_type", "multiple"),
        ("graph_type", "line"),
        ("save_plot", "false"),
    ];
    let (status, body) = send_upload(
        &app,
        "ana@example.com",
        &fields,
        "data.tsv",
        b"A\tB\n1\t10\n",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(
        body["message"]
            .as_str()
            .unwrap()
            .contains("unsupported file type")
    );
}

#[tokio::test]
async fn upload_for_unknown_user_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir).await;

    let fields = [
        ("y_axis_key", "B"),
        ("plot_type", "multiple"),
        ("graph_type", "line"),
        ("save_plot", "false"),
    ];
    let (status, body) = send_upload(
        &app,
        "ghost@example.com",
        &fields,
        "data.csv",
        b"A,B\n1,10\n",
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}
