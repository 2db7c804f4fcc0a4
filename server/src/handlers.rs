use std::sync::{Arc, MutexGuard, PoisonError};

use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use uuid::Uuid;

use image_suite_core::{
    dispatch, Action, BatchOutcome, ConversionRequest, ItemStatus, ResultKey, SessionResultStore,
    TargetFormat, Tool, UploadedItem,
};

use crate::state::{AppState, SharedStore};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ItemView {
    source_name: String,
    status: &'static str,
    output_name: Option<String>,
    error: Option<String>,
    download_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BatchView {
    session: String,
    summary: String,
    converted: usize,
    skipped: usize,
    failed: usize,
    items: Vec<ItemView>,
    archive_url: Option<String>,
    single_url: Option<String>,
}

impl BatchView {
    fn new(session: Uuid, outcome: &BatchOutcome) -> Self {
        let url = |key: ResultKey| format!("/sessions/{}/files/{}", session, key);

        let items = outcome
            .results
            .iter()
            .enumerate()
            .map(|(index, result)| {
                let converted = result.status == ItemStatus::Converted;
                ItemView {
                    source_name: result.source_name.clone(),
                    status: result.status.as_str(),
                    output_name: converted.then(|| result.output_name.clone()),
                    error: result.error.clone(),
                    download_url: converted.then(|| url(ResultKey::Item(index))),
                }
            })
            .collect();

        Self {
            session: session.to_string(),
            summary: outcome.summary(),
            converted: outcome.converted,
            skipped: outcome.skipped,
            failed: outcome.failed,
            items,
            archive_url: outcome.archive.as_ref().map(|_| url(ResultKey::Archive)),
            single_url: outcome.single_output().map(|_| url(ResultKey::SingleOutput)),
        }
    }
}

/// Fields shared by both upload forms.
#[derive(Debug, Default)]
struct UploadForm {
    files: Vec<UploadedItem>,
    target: Option<String>,
    session: Option<String>,
}

async fn read_form(mut multipart: Multipart, tool: Tool) -> Result<UploadForm, StatusCode> {
    let mut form = UploadForm::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(f)) => f,
            Ok(None) => break,
            Err(_) => return Err(StatusCode::BAD_REQUEST),
        };

        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" => {
                let file_name = clean_file_name(field.file_name().unwrap_or(""));
                if !tool.accepts(&file_name) {
                    log::warn!("Rejected upload {:?} for {:?}", file_name, tool);
                    return Err(StatusCode::UNSUPPORTED_MEDIA_TYPE);
                }
                let bytes = field.bytes().await.map_err(|_| StatusCode::BAD_REQUEST)?;
                form.files.push(UploadedItem::new(file_name, bytes.to_vec()));
            }
            "to" => {
                let text = field.text().await.map_err(|_| StatusCode::BAD_REQUEST)?;
                form.target = Some(text);
            }
            "session" => {
                let text = field.text().await.map_err(|_| StatusCode::BAD_REQUEST)?;
                form.session = Some(text);
            }
            _ => {}
        }
    }

    if form.files.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    Ok(form)
}

/// Final path component of a client-supplied file name, with control
/// characters removed. Some browsers send full paths such as `C:\dir\a.png`.
fn clean_file_name(raw: &str) -> String {
    let base = raw.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(raw);
    let cleaned: String = base.chars().filter(|c| !c.is_control()).collect();
    match cleaned.trim() {
        "" | "." | ".." => String::new(),
        name => name.to_string(),
    }
}

fn lock(store: &SharedStore) -> MutexGuard<'_, SessionResultStore> {
    store.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Existing session id from the form, or a fresh one.
fn session_id(raw: Option<&str>) -> Result<Uuid, StatusCode> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(text) => Uuid::parse_str(text).map_err(|_| StatusCode::BAD_REQUEST),
        None => Ok(Uuid::new_v4()),
    }
}

/// Run one batch for a session on the blocking pool.
///
/// The session store is locked only to drop the previous downloads and to
/// stage the new ones, never while items are processed. When two runs of one
/// session overlap, the one that finishes last is what the session offers.
async fn run_batch(
    state: Arc<AppState>,
    session: Uuid,
    items: Vec<UploadedItem>,
    request: ConversionRequest,
) -> Result<Response, StatusCode> {
    let outcome = tokio::task::spawn_blocking(move || {
        lock(&state.session(session)).clear_all();
        let outcome = state.runner.run(items, &request);
        lock(&state.session(session)).stage(&outcome);
        outcome
    })
    .await
    .map_err(|e| {
        log::error!("Batch task panicked: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    log::info!("Session {}: {}", session, outcome.summary());
    Ok(Json(ApiResponse::ok(BatchView::new(session, &outcome))).into_response())
}

/// POST /convert
///
/// Convert uploaded images to one target format.
///
/// Form fields:
/// - file: repeated, binary file data with file name
/// - to: target format (jpeg, jpg, png, webp)
/// - session (optional): session id from an earlier response
pub async fn convert(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response, StatusCode> {
    let form = read_form(multipart, Tool::Converter).await?;

    let target = form
        .target
        .as_deref()
        .ok_or(StatusCode::BAD_REQUEST)?
        .parse::<TargetFormat>()
        .map_err(|_| StatusCode::BAD_REQUEST)?;
    let session = session_id(form.session.as_deref())?;

    run_batch(state, session, form.files, ConversionRequest::convert(target)).await
}

/// POST /remove-background
///
/// Remove backgrounds from uploaded PNG/JPEG images.
///
/// Form fields:
/// - file: repeated, binary file data with file name
/// - session (optional): session id from an earlier response
pub async fn remove_background(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response, StatusCode> {
    let form = read_form(multipart, Tool::BackgroundRemover).await?;
    let session = session_id(form.session.as_deref())?;

    run_batch(state, session, form.files, ConversionRequest::remove_background()).await
}

/// GET /sessions/:id/files/:key
///
/// Download a staged output: `archive`, `single` or `item-N`.
pub async fn download(
    State(state): State<Arc<AppState>>,
    Path((id, key)): Path<(Uuid, String)>,
) -> Result<Response, StatusCode> {
    let key = key.parse::<ResultKey>().map_err(|_| StatusCode::NOT_FOUND)?;
    let store = state.existing_session(id).ok_or(StatusCode::NOT_FOUND)?;
    let file = lock(&store).get(key).cloned().ok_or(StatusCode::NOT_FOUND)?;

    let disposition = format!("attachment; filename=\"{}\"", file.file_name.replace('"', "'"));

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, file.mime.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        file.bytes,
    )
        .into_response())
}

/// POST /sessions/:id/reset
///
/// Drop every staged output of a session and forget the session.
pub async fn reset(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<String>>, StatusCode> {
    let store = state.remove_session(id).ok_or(StatusCode::NOT_FOUND)?;
    dispatch(&state.runner, &mut lock(&store), Action::Reset);

    log::info!("Session {} reset", id);
    Ok(Json(ApiResponse::ok(id.to_string())))
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Read};
    use std::time::{Duration, Instant};

    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use axum::Router;
    use image_suite_core::removal::{CutoutModel, MemoizedRemover};
    use image_suite_core::{BatchRunner, MattingParams, ProcessingError};
    use tower::ServiceExt;

    use super::*;

    const BOUNDARY: &str = "image-suite-test-boundary";

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut out = Vec::new();
        image::RgbaImage::from_pixel(width, height, image::Rgba([20, 40, 60, 255]))
            .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
            .unwrap();
        out
    }

    enum Part<'a> {
        File(&'a str, Vec<u8>),
        Text(&'a str, &'a str),
    }

    fn multipart_body(parts: &[Part]) -> Vec<u8> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match part {
                Part::File(name, bytes) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n\
                             Content-Type: application/octet-stream\r\n\r\n",
                            name
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(bytes);
                }
                Part::Text(name, value) => {
                    let header = format!("Content-Disposition: form-data; name=\"{}\"", name);
                    body.extend_from_slice(format!("{}\r\n\r\n{}", header, value).as_bytes());
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn upload(uri: &str, parts: &[Part]) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(multipart_body(parts)))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn app() -> Router {
        app_with(Arc::new(AppState::new(BatchRunner::default())))
    }

    fn app_with(state: Arc<AppState>) -> Router {
        crate::app(state, 10 * 1024 * 1024)
    }

    /// Returns its input unchanged after a pause.
    struct SlowModel;

    impl CutoutModel for SlowModel {
        fn cut_out(&self, png: &[u8], _: &MattingParams) -> Result<Vec<u8>, ProcessingError> {
            std::thread::sleep(Duration::from_millis(800));
            Ok(png.to_vec())
        }
    }

    async fn json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_convert_batch_and_download_archive() {
        let app = app();
        let response = app
            .clone()
            .oneshot(upload(
                "/convert",
                &[
                    Part::File("a.png", png(8, 8)),
                    Part::File("b.png", png(6, 4)),
                    Part::File("c.webp", b"broken".to_vec()),
                    Part::Text("to", "webp"),
                ],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json(response).await;
        let data = &body["data"];
        assert_eq!(body["success"], true);
        assert_eq!(data["converted"], 2);
        assert_eq!(data["skipped"], 1);
        assert_eq!(data["items"][2]["status"], "skipped");
        assert!(data["single_url"].is_null());

        let archive_url = data["archive_url"].as_str().unwrap().to_string();
        let response = app.clone().oneshot(get(&archive_url)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/zip");

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
        assert_eq!(archive.len(), 2);
        let mut entry = archive.by_name("a.webp").unwrap();
        let mut data = Vec::new();
        entry.read_to_end(&mut data).unwrap();
        assert_eq!(&data[..4], b"RIFF");
    }

    #[tokio::test]
    async fn test_single_file_and_reset() {
        let app = app();
        let response = app
            .clone()
            .oneshot(upload(
                "/convert",
                &[Part::File("photo.png", png(4, 4)), Part::Text("to", "jpg")],
            ))
            .await
            .unwrap();
        let body = json(response).await;
        let session = body["data"]["session"].as_str().unwrap().to_string();
        let single_url = body["data"]["single_url"].as_str().unwrap().to_string();

        let response = app.clone().oneshot(get(&single_url)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"photo.jpg\""
        );

        let reset = Request::builder()
            .method("POST")
            .uri(format!("/sessions/{}/reset", session))
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(reset).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.clone().oneshot(get(&single_url)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_new_run_replaces_session_downloads() {
        let app = app();
        let first = json(
            app.clone()
                .oneshot(upload(
                    "/convert",
                    &[
                        Part::File("a.png", png(4, 4)),
                        Part::File("b.png", png(4, 4)),
                        Part::Text("to", "jpeg"),
                    ],
                ))
                .await
                .unwrap(),
        )
        .await;
        let session = first["data"]["session"].as_str().unwrap().to_string();
        let archive_url = first["data"]["archive_url"].as_str().unwrap().to_string();

        let second = json(
            app.clone()
                .oneshot(upload(
                    "/convert",
                    &[
                        Part::File("a.jpg", png(4, 4)),
                        Part::Text("to", "jpeg"),
                        Part::Text("session", &session),
                    ],
                ))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(second["data"]["session"], session.as_str());
        assert_eq!(second["data"]["skipped"], 1);

        let response = app.oneshot(get(&archive_url)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_rejects_files_outside_whitelist() {
        let response = app()
            .oneshot(upload(
                "/remove-background",
                &[Part::File("anim.gif", vec![1, 2, 3])],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn test_convert_requires_target() {
        let response = app()
            .oneshot(upload("/convert", &[Part::File("a.png", png(2, 2))]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_remove_background_without_model_reports_failure() {
        let response = app()
            .oneshot(upload("/remove-background", &[Part::File("cat.png", png(4, 4))]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body["data"]["failed"], 1);
        assert!(body["data"]["archive_url"].is_null());
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let uri = format!("/sessions/{}/files/archive", Uuid::new_v4());
        let response = app().oneshot(get(&uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_download_does_not_wait_for_running_batch() {
        let runner = BatchRunner::default().with_remover(Arc::new(MemoizedRemover::new(SlowModel)));
        let app = app_with(Arc::new(AppState::new(runner)));
        let session = Uuid::new_v4().to_string();
        let archive_url = format!("/sessions/{}/files/archive", session);

        let batch = tokio::spawn(app.clone().oneshot(upload(
            "/remove-background",
            &[
                Part::File("cat.png", png(4, 4)),
                Part::File("dog.png", png(5, 5)),
                Part::Text("session", &session),
            ],
        )));
        tokio::time::sleep(Duration::from_millis(200)).await;

        let started = Instant::now();
        let response = app.clone().oneshot(get(&archive_url)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(started.elapsed() < Duration::from_millis(400));

        let health = app.clone().oneshot(get("/health")).await.unwrap();
        assert_eq!(health.status(), StatusCode::OK);
        assert!(started.elapsed() < Duration::from_millis(400));

        let response = batch.await.unwrap().unwrap();
        assert_eq!(json(response).await["data"]["converted"], 2);
        let response = app.oneshot(get(&archive_url)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_anonymous_uploads_keep_session_count_bounded() {
        let state = Arc::new(AppState::with_capacity(BatchRunner::default(), 2));
        let app = app_with(Arc::clone(&state));

        let mut sessions = Vec::new();
        for _ in 0..5 {
            let response = app
                .clone()
                .oneshot(upload(
                    "/convert",
                    &[Part::File("a.png", png(2, 2)), Part::Text("to", "jpeg")],
                ))
                .await
                .unwrap();
            let body = json(response).await;
            sessions.push(body["data"]["session"].as_str().unwrap().to_string());
        }

        assert_eq!(state.session_count(), 2);
        let oldest = format!("/sessions/{}/files/single", sessions[0]);
        let newest = format!("/sessions/{}/files/single", sessions[4]);
        let response = app.clone().oneshot(get(&oldest)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let response = app.oneshot(get(&newest)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_reset_forgets_session() {
        let state = Arc::new(AppState::new(BatchRunner::default()));
        let app = app_with(Arc::clone(&state));
        let body = json(
            app.clone()
                .oneshot(upload(
                    "/convert",
                    &[Part::File("a.png", png(2, 2)), Part::Text("to", "webp")],
                ))
                .await
                .unwrap(),
        )
        .await;
        let session = body["data"]["session"].as_str().unwrap().to_string();
        assert_eq!(state.session_count(), 1);

        let reset = |session: &str| {
            Request::builder()
                .method("POST")
                .uri(format!("/sessions/{}/reset", session))
                .body(Body::empty())
                .unwrap()
        };
        let response = app.clone().oneshot(reset(&session)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.session_count(), 0);

        let response = app.oneshot(reset(&session)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_uploaded_paths_are_reduced_to_file_names() {
        let response = app()
            .oneshot(upload(
                "/convert",
                &[
                    Part::File("../../etc/evil.png", png(2, 2)),
                    Part::File("photos/2024/beach.png", png(3, 3)),
                    Part::Text("to", "jpeg"),
                ],
            ))
            .await
            .unwrap();
        let body = json(response).await;
        let items = &body["data"]["items"];
        assert_eq!(items[0]["source_name"], "evil.png");
        assert_eq!(items[0]["output_name"], "evil.jpg");
        assert_eq!(items[1]["output_name"], "beach.jpg");
    }

    #[test]
    fn test_clean_file_name() {
        assert_eq!(clean_file_name("photo.png"), "photo.png");
        assert_eq!(clean_file_name("../../x/evil.png"), "evil.png");
        assert_eq!(clean_file_name("C:\\Users\\me\\cat.jpg"), "cat.jpg");
        assert_eq!(clean_file_name("bad\r\nname\u{7}.png"), "badname.png");
        assert_eq!(clean_file_name("dir/.."), "");
        assert_eq!(clean_file_name(""), "");
    }
}
