//! End-to-end pipeline tests against a mock Mineru endpoint.
//!
//! Every network interaction — upload-target request, pre-signed PUT, status
//! poll, archive download — is served by a wiremock server, so these tests
//! exercise the full upload → poll → unpack → relocate flow without touching
//! the real service.

use mineru2md::{
    convert_directory_pdfs_to_markdown, convert_single_pdf_to_markdown, ConversionParams,
    DirectoryParams, Mineru2MdError, OutcomeStatus, SinglePdfParams, Stage, ToolContext,
};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Test helpers ─────────────────────────────────────────────────────────

fn params(token: &str) -> ConversionParams {
    ConversionParams {
        api_token: Some(token.to_string()),
        poll_interval_secs: Some(1.0),
        ..ConversionParams::default()
    }
}

fn write_pdf(dir: &Path, name: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, b"%PDF-1.4 test fixture").unwrap();
    path
}

/// Build an in-memory result archive from (member path, contents) pairs.
fn make_zip(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::FileOptions::default();
    for (name, contents) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(contents.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Mount the happy-path batch flow for one file on `server`.
async fn mount_happy_path(server: &MockServer, file_name: &str, zip_bytes: Vec<u8>) {
    let batch_id = "batch-e2e-1";
    Mock::given(method("POST"))
        .and(path("/api/v4/file-urls/batch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 0,
            "msg": "ok",
            "data": {
                "batch_id": batch_id,
                "file_urls": [format!("{}/upload/{file_name}", server.uri())],
            }
        })))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("PUT"))
        .and(path(format!("/upload/{file_name}")))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/api/v4/extract-results/batch/{batch_id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 0,
            "msg": "ok",
            "data": {
                "extract_result": [{
                    "file_name": file_name,
                    "state": "done",
                    "full_zip_url": format!("{}/zips/result.zip", server.uri()),
                }]
            }
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/zips/result.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(zip_bytes))
        .expect(1)
        .mount(server)
        .await;
}

// ── Tests ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn single_pdf_happy_path_produces_markdown_and_renamed_assets() {
    let server = MockServer::start().await;
    let zip_bytes = make_zip(&[
        ("paper/paper.md", "# Title\n\n<img src=\"images/fig-3aa1.png\">\n"),
        ("paper/images/fig-3aa1.png", "png-bytes"),
    ]);
    mount_happy_path(&server, "paper.pdf", zip_bytes).await;

    let src = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let pdf = write_pdf(src.path(), "paper.pdf");

    let ctx = ToolContext::with_base_url(server.uri());
    let report = convert_single_pdf_to_markdown(
        &ctx,
        SinglePdfParams {
            pdf_path: pdf.display().to_string(),
            output_dir: out.path().display().to_string(),
            options: params("test-token"),
        },
    )
    .await
    .unwrap();

    assert_eq!(report.pdf_total, 1);
    assert_eq!(report.uploaded, 1);
    assert_eq!(report.completed, 1);
    assert_eq!(report.details.len(), 2, "one upload + one download outcome");
    assert_eq!(report.details[0].stage, Stage::Upload);
    assert_eq!(report.details[0].status, OutcomeStatus::Success);
    assert_eq!(report.details[1].stage, Stage::Download);
    assert_eq!(report.details[1].status, OutcomeStatus::Success);
    assert_eq!(
        report.output_directory.as_deref(),
        Some(out.path().display().to_string().as_str())
    );

    let doc = fs::read_to_string(out.path().join("paper.md")).unwrap();
    assert!(doc.contains("\"images/paper_1.png\""), "got: {doc}");
    assert!(out.path().join("images/paper_1.png").is_file());
    // scratch space must be gone
    let leftovers: Vec<_> = fs::read_dir(out.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with('.'))
        .collect();
    assert!(leftovers.is_empty(), "scratch dirs left behind: {leftovers:?}");
}

#[tokio::test]
async fn upload_target_request_sends_batch_options() {
    let server = MockServer::start().await;
    // Assert the request body carries the table flag, language and the
    // normalised extra-formats list including markdown.
    Mock::given(method("POST"))
        .and(path("/api/v4/file-urls/batch"))
        .and(body_partial_json(serde_json::json!({
            "enable_table": false,
            "language": "en",
            "extra_formats": ["html", "markdown"],
            "files": [{"name": "paper.pdf", "is_ocr": false}],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 0,
            "data": { "batch_id": "b-1", "file_urls": [format!("{}/up", server.uri())] }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/up"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v4/extract-results/batch/b-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 0,
            "data": { "extract_result": [{
                "file_name": "paper.pdf", "state": "failed", "err_msg": "kaput"
            }]}
        })))
        .mount(&server)
        .await;

    let src = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let pdf = write_pdf(src.path(), "paper.pdf");

    let mut options = params("test-token");
    options.enable_table = Some(false);
    options.language = Some("en".to_string());
    options.is_ocr = Some(false);

    let ctx = ToolContext::with_base_url(server.uri());
    let report = convert_single_pdf_to_markdown(
        &ctx,
        SinglePdfParams {
            pdf_path: pdf.display().to_string(),
            output_dir: out.path().display().to_string(),
            options,
        },
    )
    .await
    .unwrap();

    // Remote conversion failed: uploaded but not completed, with the remote
    // error text surfaced in the convert-stage outcome.
    assert_eq!(report.uploaded, 1);
    assert_eq!(report.completed, 0);
    let convert_outcome = report
        .details
        .iter()
        .find(|o| o.stage == Stage::Convert)
        .unwrap();
    assert_eq!(convert_outcome.status, OutcomeStatus::Error);
    assert_eq!(convert_outcome.message, "kaput");
}

#[tokio::test]
async fn nonzero_api_code_on_target_request_raises() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v4/file-urls/batch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 1003, "msg": "token expired", "data": null
        })))
        .mount(&server)
        .await;

    let src = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let pdf = write_pdf(src.path(), "paper.pdf");

    let ctx = ToolContext::with_base_url(server.uri());
    let err = convert_single_pdf_to_markdown(
        &ctx,
        SinglePdfParams {
            pdf_path: pdf.display().to_string(),
            output_dir: out.path().display().to_string(),
            options: params("test-token"),
        },
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Mineru2MdError::Api { .. }));
    assert!(err.to_string().contains("token expired"));
}

#[tokio::test]
async fn mismatched_upload_url_count_raises_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v4/file-urls/batch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 0,
            "data": { "batch_id": "b-1", "file_urls": [] }
        })))
        .mount(&server)
        .await;

    let src = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let pdf = write_pdf(src.path(), "paper.pdf");

    let ctx = ToolContext::with_base_url(server.uri());
    let err = convert_single_pdf_to_markdown(
        &ctx,
        SinglePdfParams {
            pdf_path: pdf.display().to_string(),
            output_dir: out.path().display().to_string(),
            options: params("test-token"),
        },
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Mineru2MdError::Protocol { .. }));
}

#[tokio::test]
async fn duplicate_names_fail_before_any_network_call() {
    let server = MockServer::start().await;
    // Any request reaching the server would fail the expect(0) assertions.
    Mock::given(method("POST"))
        .and(path("/api/v4/file-urls/batch"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let src = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write_pdf(src.path(), "a/report.pdf");
    write_pdf(src.path(), "b/report.pdf");

    let ctx = ToolContext::with_base_url(server.uri());
    let err = convert_directory_pdfs_to_markdown(
        &ctx,
        DirectoryParams {
            pdf_dir: src.path().display().to_string(),
            output_dir: out.path().display().to_string(),
            options: params("test-token"),
        },
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Mineru2MdError::DuplicateNames { .. }));
    assert!(err.to_string().contains("report.pdf"));
}

#[tokio::test]
async fn empty_directory_returns_zero_report_without_network() {
    let src = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();

    // Base URL is unreachable on purpose: an empty batch must never dial out.
    let ctx = ToolContext::with_base_url("http://127.0.0.1:1");
    let report = convert_directory_pdfs_to_markdown(
        &ctx,
        DirectoryParams {
            pdf_dir: src.path().display().to_string(),
            output_dir: out.path().display().to_string(),
            options: params("test-token"),
        },
    )
    .await
    .unwrap();

    assert_eq!(report.pdf_total, 0);
    assert_eq!(report.uploaded, 0);
    assert_eq!(report.completed, 0);
    assert!(report.details.is_empty());
    assert!(report.message.unwrap().contains("no PDF files"));
}

#[tokio::test]
async fn missing_token_is_a_config_error() {
    let src = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let pdf = write_pdf(src.path(), "paper.pdf");

    std::env::remove_var(mineru2md::API_TOKEN_ENV);
    let ctx = ToolContext::with_base_url("http://127.0.0.1:1");
    let err = convert_single_pdf_to_markdown(
        &ctx,
        SinglePdfParams {
            pdf_path: pdf.display().to_string(),
            output_dir: out.path().display().to_string(),
            options: ConversionParams::default(),
        },
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Mineru2MdError::MissingApiToken { .. }));
}
