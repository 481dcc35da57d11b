use std::fs;

use docqa_core::ingest::{load_document_file, PlainTextExtractor, TextExtractor};

#[test]
fn loads_and_extracts_a_text_file_from_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("handbook.md");
    fs::write(&path, b"# Handbook\r\n\r\nAlpha causes Beta.\r\n").expect("write");

    let (filename, bytes) = load_document_file(&path).expect("load");
    assert_eq!(filename, "handbook.md");

    let text = PlainTextExtractor.extract(&filename, &bytes).expect("extract");
    assert_eq!(text, "# Handbook\n\nAlpha causes Beta.\n");
}

#[test]
fn missing_files_and_directories_are_upload_errors() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = load_document_file(&dir.path().join("missing.txt")).expect_err("missing");
    assert_eq!(err.code(), "UPLOAD_ERROR");

    let err = load_document_file(dir.path()).expect_err("directory");
    assert_eq!(err.code(), "UPLOAD_ERROR");
}

#[test]
fn binary_payloads_are_rejected() {
    let pdf = b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n1 0 obj";
    let err = PlainTextExtractor.extract("report.pdf", pdf).expect_err("pdf");
    assert_eq!(err.code(), "UPLOAD_ERROR");
    assert!(err.to_string().contains("PDF"));

    let err = PlainTextExtractor
        .extract("image.png", &[0x89, b'P', b'N', b'G', 0, 0])
        .expect_err("binary");
    assert_eq!(err.code(), "UPLOAD_ERROR");

    let err = PlainTextExtractor
        .extract("latin1.txt", &[b'c', b'a', b'f', 0xe9])
        .expect_err("invalid utf-8");
    assert!(err.to_string().contains("offset 3"));
}
