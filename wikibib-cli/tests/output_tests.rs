use std::collections::BTreeMap;
use wikibib::{entries_as_documents, write_output, Document};

fn docs() -> Vec<Document> {
    vec![
        Document::new("First page").with_metadata("source", "First"),
        Document::new("Second page").with_metadata("source", "Second"),
    ]
}

#[test]
fn writes_json_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("records.json");
    write_output(&docs(), Some(&path), "json").unwrap();

    let written: Vec<Document> =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(written, docs());
}

#[test]
fn writes_text_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("records.txt");
    write_output(&docs(), Some(&path), "text").unwrap();
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "First page\n\nSecond page\n"
    );
}

#[test]
fn unwritable_output_reports_path() {
    let err = write_output(&docs(), Some(std::path::Path::new("/nonexistent/dir/out.json")), "json")
        .unwrap_err();
    assert!(err.to_string().contains("/nonexistent/dir/out.json"));
}

#[test]
fn raw_entries_become_metadata_only_records() {
    let entry: BTreeMap<String, String> = [("ID", "k"), ("ENTRYTYPE", "misc"), ("title", "T")]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let docs = entries_as_documents(vec![entry.clone()]);
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].page_content, "");
    assert_eq!(docs[0].metadata, entry);
}
