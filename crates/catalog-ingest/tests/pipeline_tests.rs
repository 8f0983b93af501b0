//! End-to-end pipeline tests against a mock image host

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use catalog_common::row::ERROR_COLUMN;
use catalog_ingest::pipeline::process_dir;
use common::*;
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::Ordering;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn write_input(dir: &Path, name: &str, header: &[&str], rows: &[Vec<String>]) {
    std::fs::create_dir_all(dir).unwrap();
    let mut writer = csv::Writer::from_path(dir.join(name)).unwrap();
    writer.write_record(header).unwrap();
    for row in rows {
        writer.write_record(row).unwrap();
    }
    writer.flush().unwrap();
}

async fn image_host() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/img/a.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(png_bytes(40, 20)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/img/ok.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(png_bytes(10, 10)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/img/b.jpg"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/img/missing.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_partial_image_failure_keeps_row() {
    let server = image_host().await;
    let root = tempfile::tempdir().unwrap();
    let config = test_config(root.path());
    let h = harness(&config);

    let a = format!("{}/img/a.jpg", server.uri());
    let b = format!("{}/img/b.jpg", server.uri());
    write_input(
        &config.paths.input_dir,
        "catalog.csv",
        &["Title", "Images", "Description", "SKU"],
        &[vec![
            "Red Mug".to_string(),
            format!("{}, {}", a, b),
            format!(r#"<p>Front</p><img src="{}">"#, a),
            "SKU-1".to_string(),
        ]],
    );

    let summaries = process_dir(&config, h.stage.clone()).await.unwrap();

    assert_eq!(summaries.len(), 1);
    let summary = &summaries[0];
    assert_eq!((summary.rows, summary.success, summary.failed, summary.windows), (1, 1, 0, 1));

    let uploaded = format!("{}/red_mug_1-shop.example.jpg", CDN);
    assert_eq!(h.uploader.names(), vec!["red_mug_1-shop.example.jpg"]);

    assert_eq!(file_names(&config.paths.output_dir), vec!["catalog_1-1_output-sho.csv"]);
    let (header, rows) = read_csv(&config.paths.output_dir.join("catalog_1-1_output-sho.csv"));
    assert_eq!(header, vec!["Title", "Images", "Description", "SKU"]);
    assert_eq!(rows[0][1], uploaded);
    assert_eq!(rows[0][2], format!(r#"<p>Front</p><img src="{}">"#, uploaded));
    assert_eq!(rows[0][3], "SKU-1");

    let tagged = h.tagger.written.lock().unwrap().clone();
    assert_eq!(tagged.len(), 1);
    assert_eq!(tagged[0].1, "Red Mug");

    // Scratch files are removed once each image is done
    assert!(file_names(&config.paths.work_dir).is_empty());
}

#[tokio::test]
async fn test_every_row_lands_in_exactly_one_window() {
    let server = image_host().await;
    let root = tempfile::tempdir().unwrap();
    let mut config = test_config(root.path());
    config.export.batch_size = 3;
    let h = harness(&config);

    let ok = format!("{}/img/ok.png", server.uri());
    let missing = format!("{}/img/missing.png", server.uri());
    let rows: Vec<Vec<String>> = (1..=7)
        .map(|n| {
            let images = match n {
                2 | 5 => missing.clone(),
                6 => "no pictures here".to_string(),
                _ => format!("{} | {}", ok, missing),
            };
            vec![format!("Product {}", n), images]
        })
        .collect();
    write_input(&config.paths.input_dir, "batch.csv", &["Name", "Images"], &rows);

    let summaries = process_dir(&config, h.stage.clone()).await.unwrap();
    let summary = &summaries[0];
    assert_eq!((summary.rows, summary.success, summary.failed), (7, 4, 3));
    assert_eq!(summary.windows, 3);

    assert_eq!(
        file_names(&config.paths.output_dir),
        vec![
            "batch_1-3_failed-sho.csv",
            "batch_1-3_output-sho.csv",
            "batch_4-4_output-sho.csv",
        ]
    );

    let mut seen = HashSet::new();
    for name in file_names(&config.paths.output_dir) {
        let (header, rows) = read_csv(&config.paths.output_dir.join(&name));
        let failed = name.contains("_failed-");
        assert_eq!(header.iter().any(|h| h == ERROR_COLUMN), failed, "{}", name);
        for row in rows {
            assert!(seen.insert(row[0].clone()), "{} exported twice", row[0]);
            if failed {
                assert_eq!(row[1], "", "failed rows have their images cleared");
            } else {
                assert!(row[1].starts_with(CDN));
            }
        }
    }
    assert_eq!(seen.len(), 7);

    assert_eq!(h.tagger.peak.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_row_range_labels_windows_from_one() {
    let server = image_host().await;
    let root = tempfile::tempdir().unwrap();
    let mut config = test_config(root.path());
    config.export.row_start = Some(2);
    config.export.row_end = Some(3);
    let h = harness(&config);

    let ok = format!("{}/img/ok.png", server.uri());
    let rows: Vec<Vec<String>> = (1..=4).map(|n| vec![format!("Item {}", n), ok.clone()]).collect();
    write_input(&config.paths.input_dir, "range.csv", &["Title", "Images"], &rows);

    let summaries = process_dir(&config, h.stage.clone()).await.unwrap();
    assert_eq!(summaries[0].rows, 2);

    assert_eq!(file_names(&config.paths.output_dir), vec!["range_1-2_output-sho.csv"]);
    let (_, rows) = read_csv(&config.paths.output_dir.join("range_1-2_output-sho.csv"));
    let titles: HashSet<String> = rows.into_iter().map(|r| r[0].clone()).collect();
    assert_eq!(titles, HashSet::from(["Item 2".to_string(), "Item 3".to_string()]));
}

#[tokio::test]
async fn test_file_without_required_columns_is_skipped() {
    let server = image_host().await;
    let root = tempfile::tempdir().unwrap();
    let config = test_config(root.path());
    let h = harness(&config);

    let ok = format!("{}/img/ok.png", server.uri());
    write_input(
        &config.paths.input_dir,
        "a_broken.csv",
        &["Title", "Pictures"],
        &[vec!["Mug".to_string(), ok.clone()]],
    );
    write_input(
        &config.paths.input_dir,
        "b_good.csv",
        &["Title", "Images"],
        &[vec!["Mug".to_string(), ok]],
    );

    let summaries = process_dir(&config, h.stage.clone()).await.unwrap();

    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].file, "b_good.csv");
    assert_eq!(file_names(&config.paths.output_dir), vec!["b_good_1-1_output-sho.csv"]);
}

#[tokio::test]
async fn test_unreadable_file_does_not_stop_the_run() {
    let server = image_host().await;
    let root = tempfile::tempdir().unwrap();
    let config = test_config(root.path());
    let h = harness(&config);

    let ok = format!("{}/img/ok.png", server.uri());
    std::fs::create_dir_all(&config.paths.input_dir).unwrap();
    // Latin-1 encoded "Café" is not valid UTF-8
    let mut latin1 = b"Title,Images\nCaf\xe9 Mug,".to_vec();
    latin1.extend_from_slice(ok.as_bytes());
    latin1.push(b'\n');
    std::fs::write(config.paths.input_dir.join("a_latin1.csv"), latin1).unwrap();
    write_input(
        &config.paths.input_dir,
        "b_good.csv",
        &["Title", "Images"],
        &[vec!["Mug".to_string(), ok]],
    );

    let summaries = process_dir(&config, h.stage.clone()).await.unwrap();

    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].file, "b_good.csv");
    assert_eq!(file_names(&config.paths.output_dir), vec!["b_good_1-1_output-sho.csv"]);
}

#[tokio::test]
async fn test_random_sku_is_synthesized() {
    let server = image_host().await;
    let root = tempfile::tempdir().unwrap();
    let mut config = test_config(root.path());
    config.export.random_sku = true;
    let h = harness(&config);

    let ok = format!("{}/img/ok.png", server.uri());
    write_input(
        &config.paths.input_dir,
        "sku.csv",
        &["Title", "Images"],
        &[vec!["Mug".to_string(), ok]],
    );

    process_dir(&config, h.stage.clone()).await.unwrap();

    let (header, rows) = read_csv(&config.paths.output_dir.join("sku_1-1_output-sho.csv"));
    assert_eq!(header, vec!["Title", "Images", "SKU"]);
    assert!(rows[0][2].starts_with("SKU-0001-"), "{}", rows[0][2]);
}
