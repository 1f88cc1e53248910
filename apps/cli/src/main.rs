use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use harvester_catalog::{write_template, Catalog};
use harvester_codec as codec;
use harvester_scan::{scan_tree, Harvest, ScanOptions};
use serde::Deserialize;

#[derive(Parser)]
#[command(
    name = "harvester",
    about = "Extracts translatable strings and maintains catalog templates",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 掃描原始碼並產生翻譯樣板。 / Scan source trees and write a template catalog.
    Extract(ExtractArgs),
    /// 驗證型錄檔案的格式與編碼。 / Validate a catalog file's format and encoding.
    Check(CheckArgs),
    /// 比對參考鍵清單確保覆蓋率。 / Compare a catalog against a reference key list.
    Coverage(CoverageArgs),
}

#[derive(Args)]
struct ExtractArgs {
    /// 要掃描的原始碼根目錄；預設為 src。 / Source roots to scan (defaults to src).
    #[arg(value_name = "DIR", default_value = "src")]
    roots: Vec<PathBuf>,

    /// 輸出的樣板檔案路徑。 / Path of the template catalog to write.
    #[arg(long, short, value_name = "FILE", default_value = "template.i18n")]
    output: PathBuf,

    /// 一般字串的標記。 / Marker introducing a plain translatable literal.
    #[arg(long, value_name = "TEXT", default_value = "tr!(")]
    marker: String,

    /// 帶語境字串的標記。 / Marker introducing a context-qualified literal.
    #[arg(long, value_name = "TEXT", default_value = "trc!(")]
    context_marker: String,

    /// 要掃描的副檔名；可重複指定。 / File extensions to scan; may be repeated.
    #[arg(long = "extension", value_name = "EXT", default_values = ["rs"])]
    extensions: Vec<String>,
}

#[derive(Args)]
struct CheckArgs {
    /// 要檢查的型錄檔案。 / Catalog file to validate.
    #[arg(value_name = "FILE")]
    catalog: PathBuf,

    /// 遇到空白翻譯值時使程序失敗。 / Fail when any translation value is empty.
    #[arg(long)]
    fail_on_empty: bool,
}

#[derive(Args)]
struct CoverageArgs {
    /// 要比對的型錄檔案。 / Catalog file to compare.
    #[arg(value_name = "FILE")]
    catalog: PathBuf,

    /// 參考鍵清單（JSON）。 / Reference key list (JSON).
    #[arg(long, value_name = "FILE")]
    reference: PathBuf,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("harvester error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Extract(args) => run_extract(args),
        Commands::Check(args) => run_check(args),
        Commands::Coverage(args) => run_coverage(args),
    }
}

fn run_extract(args: ExtractArgs) -> Result<()> {
    let options = ScanOptions {
        text_marker: args.marker,
        context_marker: args.context_marker,
        extensions: args.extensions,
        ..ScanOptions::default()
    };
    let mut harvest = Harvest::new();
    for root in &args.roots {
        if !root.exists() {
            bail!("source root {} does not exist", root.display());
        }
        scan_tree(root, &options, &mut harvest)
            .with_context(|| format!("scan source tree {}", root.display()))?;
    }
    println!(
        "Scanned {} file(s); found {} string(s), {} unique",
        harvest.files_scanned(),
        harvest.literals_found(),
        harvest.keys().len()
    );

    let keys = harvest.into_keys();
    let file = File::create(&args.output)
        .with_context(|| format!("create template {}", args.output.display()))?;
    let mut out = BufWriter::new(file);
    write_template(&mut out, &keys)
        .with_context(|| format!("write template {}", args.output.display()))?;
    out.flush()
        .with_context(|| format!("write template {}", args.output.display()))?;
    println!("Wrote {} entries to {}", keys.len(), args.output.display());
    Ok(())
}

fn run_check(args: CheckArgs) -> Result<()> {
    let catalog = load_catalog(&args.catalog)?;
    let mut empty = 0usize;
    for (key, entry) in catalog.entries() {
        verify_round_trip(key)?;
        verify_round_trip(entry.value())?;
        if entry.value().is_empty() {
            empty += 1;
        }
    }
    println!(
        "{}: {} entries ({} variant(s))",
        args.catalog.display(),
        catalog.len(),
        catalog.variant_count()
    );
    if empty > 0 {
        eprintln!("Found {empty} empty translation value(s)");
        if args.fail_on_empty {
            bail!("empty translation values detected");
        }
    }
    Ok(())
}

// Belt-and-braces for hand-edited catalogs: every parsed string must survive
// an encode/decode cycle before we call the file valid.
fn verify_round_trip(text: &str) -> Result<()> {
    let encoded = codec::encode(text);
    match codec::decode(&encoded[1..]) {
        Ok(codec::Decoded::Literal { value, rest }) if value == text && rest.is_empty() => Ok(()),
        other => bail!("string {encoded} failed to round-trip: {other:?}"),
    }
}

#[derive(Debug, Deserialize)]
struct ReferenceSpec {
    #[serde(default)]
    source: Option<String>,
    keys: Vec<String>,
}

fn run_coverage(args: CoverageArgs) -> Result<()> {
    let catalog = load_catalog(&args.catalog)?;
    let contents = fs::read_to_string(&args.reference)
        .with_context(|| format!("read reference {}", args.reference.display()))?;
    let spec: ReferenceSpec = serde_json::from_str(&contents)
        .with_context(|| format!("parse reference {}", args.reference.display()))?;

    let missing: Vec<&String> = spec
        .keys
        .iter()
        .filter(|key| !catalog.contains_key(key))
        .collect();
    if missing.is_empty() {
        match spec.source {
            Some(source) => println!(
                "Reference coverage OK against {} ({} keys)",
                source,
                spec.keys.len()
            ),
            None => println!("Reference coverage OK ({} keys)", spec.keys.len()),
        }
        return Ok(());
    }
    eprintln!(
        "Coverage check failed for {}; missing {} key(s)",
        args.catalog.display(),
        missing.len()
    );
    for key in missing {
        eprintln!("  · {key}");
    }
    bail!("reference coverage mismatch detected");
}

fn load_catalog(path: &Path) -> Result<Catalog> {
    let file = File::open(path).with_context(|| format!("open catalog {}", path.display()))?;
    Catalog::parse(BufReader::new(file))
        .with_context(|| format!("parse catalog {}", path.display()))
}
