use std::fs;

use encoding_rs::{Encoding, WINDOWS_1252};
use tempfile::TempDir;

use super::*;
use crate::pipeline::build_worker_pool;

struct FixedDetector(&'static Encoding);

impl CharsetDetector for FixedDetector {
    fn detect(&self, _raw: &[u8]) -> &'static Encoding {
        self.0
    }
}

fn normalize(html: &str) -> String {
    Normalizer::new()
        .unwrap()
        .normalize_markup(html.as_bytes())
        .unwrap()
}

#[test]
fn asset_references_are_reduced_to_bare_filenames() {
    let output = normalize(
        r#"<html><head>
<link rel="stylesheet" href="../css/site.css">
<link rel="Alternate StyleSheet" href="css\print.css">
<link rel="icon" href="img/fav.ico">
<script src="js/lib/app.js"></script>
</head><body>
<img src="subdir/images/pic.png">
<img src="data:image/png;base64,iVBO/Rw0KGgo=">
<a href="other/page.htm">next</a>
</body></html>"#,
    );

    assert!(output.contains(r#"src="pic.png""#));
    assert!(!output.contains("subdir/images"));
    assert!(output.contains(r#"href="site.css""#));
    assert!(output.contains(r#"href="print.css""#));
    assert!(output.contains(r#"src="app.js""#));
    assert!(output.contains(r#"href="img/fav.ico""#));
    assert!(output.contains("data:image/png;base64,iVBO/Rw0KGgo="));
    assert!(output.contains(r#"href="other/page.htm""#));
}

#[test]
fn show_framing_scripts_are_removed() {
    let output = normalize(
        r#"<html><head>
<script type="text/javascript">if (top == self) { show framing(); }</script>
<script>var keep = 1;</script>
</head><body><p>text</p>
<script>/* show framing */ load();</script>
</body></html>"#,
    );

    assert!(!output.contains(SHOW_FRAMING_MARKER));
    assert!(output.contains("var keep = 1;"));
    assert!(output.contains("<p>text</p>"));
}

#[test]
fn legacy_encoding_is_transcoded_and_declared_as_utf8() {
    let normalizer = Normalizer::with_detector(Box::new(FixedDetector(WINDOWS_1252))).unwrap();
    let raw = b"<html><head><meta http-equiv=\"Content-Type\" content=\"text/html; charset=windows-1252\">\
<meta charset=\"iso-8859-1\"></head><body><p>Caf\xe9 cr\xe8me</p></body></html>";

    let output = normalizer.normalize_markup(raw).unwrap();

    assert!(output.contains("Caf\u{e9} cr\u{e8}me"));
    assert!(output.contains(r#"content="text/html; charset=utf-8""#));
    assert!(output.contains(r#"charset="utf-8""#));
    assert!(!output.contains("windows-1252"));
}

#[test]
fn known_mojibake_is_repaired() {
    let output = normalize("<p>a\u{a0}b \u{ef}\u{bf}\u{bd}c dxe2e</p>");

    assert!(output.contains("<p>a b  c de</p>"));
    assert!(!output.contains("&nbsp;"));
}

#[test]
fn normalize_directory_flattens_assets_and_rewrites_documents() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("images")).unwrap();
    fs::write(dir.path().join("images/pic.png"), "png").unwrap();
    fs::write(
        dir.path().join("0002_ch1.htm"),
        r#"<img src="images/pic.png">"#,
    )
    .unwrap();
    fs::write(
        dir.path().join("0001_intro.html"),
        r#"<link rel="stylesheet" href="css/a.css">"#,
    )
    .unwrap();

    let normalizer = Normalizer::new().unwrap();
    let resolver = RankResolver::new().unwrap();
    let pool = build_worker_pool(2).unwrap();
    let report = normalize_directory(dir.path(), &normalizer, &resolver, &pool).unwrap();

    assert_eq!(report.normalized, 2);
    assert!(report.failed.is_empty());
    assert_eq!(report.flattened.copied, 1);
    assert!(dir.path().join("pic.png").is_file());

    let chapter = fs::read_to_string(dir.path().join("0002_ch1.htm")).unwrap();
    assert!(chapter.contains(r#"src="pic.png""#));
    let intro = fs::read_to_string(dir.path().join("0001_intro.html")).unwrap();
    assert!(intro.contains(r#"href="a.css""#));
}

#[test]
fn list_documents_orders_by_rank_prefix() {
    let dir = TempDir::new().unwrap();
    for name in ["0010_z.htm", "0002_x.htm", "0001_y.HTML", "notes.txt"] {
        fs::write(dir.path().join(name), "").unwrap();
    }

    let documents = list_documents(dir.path(), &RankResolver::new().unwrap()).unwrap();
    let names: Vec<String> = documents
        .iter()
        .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["0001_y.HTML", "0002_x.htm", "0010_z.htm"]);
}

#[test]
fn failing_document_does_not_abort_the_batch() {
    let dir = TempDir::new().unwrap();
    let good = dir.path().join("0001_ok.htm");
    fs::write(&good, "<img src=\"a/b.png\">").unwrap();
    let missing = dir.path().join("0002_missing.htm");

    let normalizer = Normalizer::new().unwrap();
    let pool = build_worker_pool(1).unwrap();
    let report = normalize_documents(
        &[good.clone(), missing.clone()],
        &normalizer,
        &pool,
        AssetCopyReport::default(),
    )
    .unwrap();

    assert_eq!(report.normalized, 1);
    assert_eq!(report.failed, vec![missing.display().to_string()]);
    assert!(fs::read_to_string(good).unwrap().contains(r#"src="b.png""#));
}
