use std::fs;
use std::path::Path;
use std::process::Command;

use tempfile::tempdir;

fn write_file(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn python_module(functions: usize, body_lines: usize) -> String {
    let mut src = String::from("import os\n\n");
    for f in 0..functions {
        src.push_str(&format!("def handler_{}(request):\n", f));
        src.push_str("    \"\"\"Handle one request.\"\"\"\n");
        for i in 0..body_lines {
            src.push_str(&format!("    value_{} = request.get('field_{}')\n", i, i));
        }
        src.push_str("    return request\n\n");
    }
    src
}

#[test]
fn cli_condense_fits_budget_and_reports_stats() {
    let dir = tempdir().unwrap();
    let py = dir.path().join("service.py");
    let json_file = dir.path().join("config.json");
    write_file(&py, &python_module(6, 20));
    write_file(
        &json_file,
        r#"{"name": "svc", "deps": {"a": "1.0", "b": "2.0"}, "scripts": ["build", "test"]}"#,
    );

    let output = Command::new(env!("CARGO_BIN_EXE_tokenfit"))
        .args([
            "condense",
            py.to_str().unwrap(),
            json_file.to_str().unwrap(),
            "--budget",
            "60",
            "--priority",
            "medium",
            "--json",
            "--encoding",
            "heuristic",
        ])
        .output()
        .unwrap();

    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let v: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let files = v.get("files").and_then(|f| f.as_array()).unwrap();
    assert_eq!(files.len(), 2);

    // Input order is kept.
    assert!(files[0]["path"].as_str().unwrap().ends_with("service.py"));
    assert_eq!(files[0]["language"], "python");
    assert_ne!(files[0]["level"], "none");
    let content = files[0]["content"].as_str().unwrap();
    assert!(content.contains("handler_0"));
    assert!(!content.contains("value_3"));

    assert_eq!(files[1]["language"], "json");

    let stats = v.get("stats").unwrap();
    assert_eq!(stats["files_processed"], 2);
    assert!(stats["tokens_saved"].as_i64().unwrap() > 0);
}

#[test]
fn cli_condense_leaves_fitting_file_alone() {
    let dir = tempdir().unwrap();
    let py = dir.path().join("small.py");
    let source = "def f(x):\n    return x\n";
    write_file(&py, source);

    let output = Command::new(env!("CARGO_BIN_EXE_tokenfit"))
        .args(["condense", py.to_str().unwrap(), "--budget", "1000", "--json"])
        .output()
        .unwrap();

    assert!(output.status.success());

    let v: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let file = &v["files"][0];
    assert_eq!(file["level"], "none");
    assert_eq!(file["content"], source);
    assert_eq!(file["tokens_saved"], 0);
}

#[test]
fn cli_chunk_keeps_functions_whole() {
    let dir = tempdir().unwrap();
    let py = dir.path().join("handlers.py");
    let source = python_module(4, 10);
    write_file(&py, &source);

    let output = Command::new(env!("CARGO_BIN_EXE_tokenfit"))
        .args([
            "chunk",
            py.to_str().unwrap(),
            "--max-tokens",
            "150",
            "--encoding",
            "heuristic",
            "--json",
        ])
        .output()
        .unwrap();

    assert!(output.status.success());

    let v: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let chunks = v.get("chunks").and_then(|c| c.as_array()).unwrap();
    assert!(chunks.len() > 1);

    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk["chunk_id"], i + 1);
        assert_eq!(chunk["total_chunks"], chunks.len());
        assert_eq!(chunk["chunk_type"], "content");
        let content = chunk["content"].as_str().unwrap();
        assert!(content.contains(&format!("(Part {}/{})", i + 1, chunks.len())));
    }

    // Each handler's return sits in the same chunk as its signature.
    for f in 0..4 {
        let signature = format!("def handler_{}(request):", f);
        let holder = chunks
            .iter()
            .find(|c| c["content"].as_str().unwrap().contains(&signature))
            .unwrap();
        let content = holder["content"].as_str().unwrap();
        let after = &content[content.find(&signature).unwrap()..];
        assert!(after.contains("return request"));
    }

    // Line ranges cover the file exactly once, in order.
    let lines: Vec<&str> = source.split('\n').collect();
    let mut next = 0;
    for chunk in chunks {
        assert_eq!(chunk["start_line"], next);
        next = chunk["end_line"].as_u64().unwrap() as usize + 1;
    }
    assert_eq!(next, lines.len());
}

#[test]
fn cli_chunk_plain_output_without_headers() {
    let dir = tempdir().unwrap();
    let notes = dir.path().join("notes.txt");
    let source: String = (1..=40).map(|i| format!("note number {}\n", i)).collect();
    write_file(&notes, &source);

    let output = Command::new(env!("CARGO_BIN_EXE_tokenfit"))
        .args([
            "chunk",
            notes.to_str().unwrap(),
            "--max-tokens",
            "50",
            "--encoding",
            "heuristic",
            "--no-context-headers",
        ])
        .output()
        .unwrap();

    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.starts_with("--- chunk 1/"));
    assert!(!stdout.contains("(Part "));
    assert!(stdout.contains("note number 40"));
}

#[test]
fn cli_tokens_per_file() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.py");
    let b = dir.path().join("b.txt");
    write_file(&a, "abcdefgh");
    write_file(&b, "abcd");

    let output = Command::new(env!("CARGO_BIN_EXE_tokenfit"))
        .args([
            "tokens",
            a.to_str().unwrap(),
            b.to_str().unwrap(),
            "--encoding",
            "heuristic",
            "--json",
        ])
        .output()
        .unwrap();

    assert!(output.status.success());

    let v: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(v["total"], 3);
    assert_eq!(v["encoding"], "heuristic");
    let files = v.get("files").and_then(|f| f.as_object()).unwrap();
    assert_eq!(files.len(), 2);
    assert_eq!(files[a.to_str().unwrap()], 2);
}

#[test]
fn cli_languages_lists_extensions() {
    let output = Command::new(env!("CARGO_BIN_EXE_tokenfit"))
        .args(["languages", "--json"])
        .output()
        .unwrap();

    assert!(output.status.success());

    let v: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let languages = v["languages"].as_array().unwrap();
    let python = languages.iter().find(|l| l["name"] == "python").unwrap();
    let extensions: Vec<&str> = python["extensions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e.as_str().unwrap())
        .collect();
    assert!(extensions.contains(&".py"));
    assert!(!languages.iter().any(|l| l["name"] == "other"));
}

#[test]
fn cli_missing_file_exits_with_path_not_found() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("missing.py");

    let output = Command::new(env!("CARGO_BIN_EXE_tokenfit"))
        .args(["condense", missing.to_str().unwrap(), "--budget", "10"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("path not found"));
}

#[test]
fn cli_json_error_output_is_valid_json_even_with_quotes_in_path() {
    let dir = tempdir().unwrap();

    let bad_path = dir.path().join("does-not-exist-\"quoted\"");

    let output = Command::new(env!("CARGO_BIN_EXE_tokenfit"))
        .args([
            "chunk",
            bad_path.to_str().unwrap(),
            "--max-tokens",
            "10",
            "--json",
        ])
        .output()
        .unwrap();

    assert!(!output.status.success());

    let stderr = String::from_utf8(output.stderr).unwrap();
    let v: serde_json::Value = serde_json::from_str(stderr.trim()).unwrap();
    assert!(v["error"].as_str().unwrap().contains("path not found"));
}
