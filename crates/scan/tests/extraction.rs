use std::fs;

use harvester_scan::{scan_tree, Harvest, ScanOptions};
use tempfile::tempdir;

#[test]
fn walks_a_source_tree_and_aggregates() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let src = dir.path().join("src");
    fs::create_dir_all(src.join("sheet"))?;
    fs::write(
        src.join("main.rs"),
        "fn main() { println!(\"{}\", tr!(\"Character Sheet\")); }\n",
    )?;
    fs::write(
        src.join("sheet").join("notes.rs"),
        "let title = tr!(\"Notes\");\nlet plural = trc!(1, \"Notes\");\nlet hint = tr!(\"Markdown\");\n",
    )?;
    // Non-source and excluded files must not contribute.
    fs::write(src.join("README.md"), "tr!(\"not code\")\n")?;
    fs::write(src.join("i18n.rs"), "macro_rules! tr { ... } tr!(\"definition\")\n")?;

    let mut harvest = Harvest::new();
    scan_tree(dir.path(), &ScanOptions::default(), &mut harvest)?;

    let keys: Vec<&str> = harvest.keys().iter().map(String::as_str).collect();
    assert_eq!(keys, vec!["Character Sheet", "Markdown", "Notes"]);
    assert_eq!(harvest.files_scanned(), 2);
    assert_eq!(harvest.literals_found(), 4);
    Ok(())
}

#[test]
fn codec_failure_names_the_offending_file() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    fs::write(dir.path().join("bad.rs"), "tr!(\"oops \\z\");\n")?;

    let mut harvest = Harvest::new();
    let err = scan_tree(dir.path(), &ScanOptions::default(), &mut harvest)
        .expect_err("malformed escape must abort the run");
    assert!(err.to_string().contains("bad.rs"));
    assert!(err.to_string().contains("invalid escape sequence"));
    Ok(())
}

#[test]
fn custom_markers_are_honored() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    fs::write(
        dir.path().join("widget.rs"),
        "label(i18n::text(\"Advantages\"));\nlabel(i18n::text_ctx(3, \"Edit\"));\n",
    )?;

    let options = ScanOptions {
        text_marker: "i18n::text(".to_string(),
        context_marker: "i18n::text_ctx(".to_string(),
        ..ScanOptions::default()
    };
    let mut harvest = Harvest::new();
    scan_tree(dir.path(), &options, &mut harvest)?;
    assert!(harvest.keys().contains("Advantages"));
    assert!(harvest.keys().contains("Edit"));
    Ok(())
}
