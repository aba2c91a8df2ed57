#![allow(clippy::cast_precision_loss)]
use std::path::{Path, PathBuf};
use std::sync::Arc;

use approx::assert_relative_eq;
use hompix_core::{ImportSettings, NullProgress, PixelAddr, PIXEL_SIZE, TICK_SECONDS};
use hompix_io::{
    reconstruct, run_import, settings_from_json, Error, ExportWriter, ImportEvent, ImportOutcome,
    ImportPool,
};
use hompix_tpx::{ChunkHeader, PixelPacket};

fn words(hits: &[(u8, u8, i64, u16)]) -> Vec<u64> {
    hits.iter()
        .map(|&(x, y, toa, tot)| PixelPacket::from_fields(PixelAddr::new(x, y), toa, tot).0)
        .collect()
}

fn write_capture(dir: &Path, name: &str, chunks: &[&[(u8, u8, i64, u16)]]) -> PathBuf {
    let mut data = Vec::new();
    for chunk in chunks {
        data.extend(ChunkHeader::encode_chunk(&words(chunk)));
    }
    let path = dir.join(name);
    std::fs::write(&path, data).unwrap();
    path
}

/// Three-hit cluster along x whose middle hit carries the largest ToT.
fn triplet(x: u8, y: u8, toa: i64) -> Vec<(u8, u8, i64, u16)> {
    vec![(x, y, toa - 1, 5), (x + 1, y, toa, 20), (x + 2, y, toa + 1, 5)]
}

fn completed(outcome: ImportOutcome) -> Arc<hompix_core::ReconstructedImage> {
    match outcome {
        ImportOutcome::Completed(image) => image,
        other => panic!("import did not complete: {other:?}"),
    }
}

#[test]
fn test_five_hits_in_two_chunks() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_capture(
        dir.path(),
        "five.tpx3",
        &[
            &[(100, 100, 1000, 5), (101, 100, 1002, 10), (100, 101, 1004, 5)],
            &[(101, 101, 1006, 20), (102, 101, 1008, 10)],
        ],
    );

    let image = completed(run_import(&path, &ImportSettings::default(), &NullProgress));
    assert_eq!(image.file_name(), "five.tpx3");
    assert_eq!(image.num_hits(), 5);
    assert_eq!(image.num_clusters(), 1);
    assert_eq!(image.clusters().ids(), &[1, 1, 1, 1, 1]);

    let c = image.centroids()[0];
    let x = (100.0 * 5.0 + 101.0 * 10.0 + 100.0 * 5.0 + 101.0 * 20.0 + 102.0 * 10.0) / 50.0;
    assert_relative_eq!(c.x, x * PIXEL_SIZE, epsilon = 1e-12);
    assert_relative_eq!(c.time, 1006.0 * TICK_SECONDS);

    assert!(image.coincidences().is_empty());
    assert!(image.spectral_events().is_empty());
    assert!(image.line_fit().is_none());
}

#[test]
fn test_five_hits_on_one_pixel_form_one_cluster() {
    let dir = tempfile::tempdir().unwrap();
    let chunks: [&[(u8, u8, i64, u16)]; 2] = [
        &[(100, 100, 1000, 5), (100, 100, 1002, 10), (100, 100, 1004, 5)],
        &[(100, 100, 1006, 20), (100, 100, 1008, 10)],
    ];
    let path = write_capture(dir.path(), "same_pixel.tpx3", &chunks);
    let settings = ImportSettings::default();

    let imported = completed(run_import(&path, &settings, &NullProgress));
    let data = std::fs::read(&path).unwrap();
    let rebuilt = reconstruct(&data, &path, &settings, &NullProgress)
        .unwrap()
        .unwrap();

    for image in [imported.as_ref(), &rebuilt] {
        assert_eq!(image.num_hits(), 5);
        assert_eq!(image.num_clusters(), 1);
        assert_eq!(image.clusters().cluster_sizes(), vec![0, 5]);

        assert_eq!(image.centroids().len(), 1);
        let c = image.centroids()[0];
        assert_relative_eq!(c.x, 100.0 * PIXEL_SIZE, epsilon = 1e-12);
        assert_relative_eq!(c.y, 100.0 * PIXEL_SIZE, epsilon = 1e-12);
        assert_relative_eq!(c.time, 1006.0 * TICK_SECONDS);

        assert!(image.coincidences().is_empty());
        assert_eq!(image.coincidences().groups().count(), 0);
    }
}

#[test]
fn test_coincidence_window_boundary_is_inclusive() {
    let dir = tempfile::tempdir().unwrap();
    let gap = 40;
    let mut hits = triplet(10, 10, 1);
    hits.extend(triplet(200, 200, 1 + gap));
    let path = write_capture(dir.path(), "pair.tpx3", &[&hits]);

    let first = 1.0 * TICK_SECONDS;
    let second = (1 + gap) as f64 * TICK_SECONDS;
    let at_boundary = ImportSettings::default().with_coincidence_window(second - first);
    let image = completed(run_import(&path, &at_boundary, &NullProgress));
    assert_eq!(image.num_clusters(), 2);
    assert_eq!(image.pairs().len(), 1);

    let tighter = ImportSettings::default().with_coincidence_window((second - first) * 0.99);
    let image = completed(run_import(&path, &tighter, &NullProgress));
    assert!(image.pairs().is_empty());
}

#[test]
fn test_wrong_magic_fails() {
    let dir = tempfile::tempdir().unwrap();
    let mut data = ChunkHeader::encode_chunk(&words(&triplet(10, 10, 100)));
    data[..4].copy_from_slice(b"TPX4");
    let path = dir.path().join("bad.tpx3");
    std::fs::write(&path, data).unwrap();

    let outcome = run_import(&path, &ImportSettings::default(), &NullProgress);
    assert!(matches!(
        outcome,
        ImportOutcome::Failed(Error::Decode(hompix_tpx::Error::CorruptHeader { offset: 0, .. }))
    ));
}

#[test]
fn test_masked_out_capture_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_capture(dir.path(), "masked.tpx3", &[&triplet(10, 10, 100)]);
    let settings = settings_from_json(
        r#"{ "spatial_mask": { "vertical": false, "band1": [50, 60], "band2": [70, 80] } }"#,
    )
    .unwrap();
    assert!(matches!(
        run_import(&path, &settings, &NullProgress),
        ImportOutcome::Empty
    ));
}

#[test]
fn test_zero_delay_bin_is_doubled() {
    let dir = tempfile::tempdir().unwrap();
    let mut hits = Vec::new();
    for x in [10, 50, 90, 130] {
        hits.extend(triplet(x, 100, 500));
    }
    let path = write_capture(dir.path(), "zero.tpx3", &[&hits]);

    let image = completed(run_import(&path, &ImportSettings::default(), &NullProgress));
    assert_eq!(image.centroids().len(), 4);
    let histogram = image.interval_histogram(1e-9, 128).unwrap();
    assert_relative_eq!(histogram.y[0], 6.0);
    assert_relative_eq!(histogram.y[1..].iter().sum::<f64>(), 0.0);
    assert_eq!(image.nfolds().len(), 1);
}

#[test]
fn test_import_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let mut hits = Vec::new();
    for (i, x) in [5u8, 40, 80, 120, 160, 200].into_iter().enumerate() {
        hits.extend(triplet(x, x, 100 + 30 * i as i64));
    }
    let path = write_capture(dir.path(), "det.tpx3", &[&hits[..9], &hits[9..]]);

    let a = completed(run_import(&path, &ImportSettings::default(), &NullProgress));
    let b = completed(run_import(&path, &ImportSettings::default(), &NullProgress));
    assert_eq!(a.clusters(), b.clusters());
    assert_eq!(a.centroids(), b.centroids());
    assert_eq!(a.coincidences(), b.coincidences());
}

#[test]
fn test_pool_isolates_failures() {
    let dir = tempfile::tempdir().unwrap();
    let good = write_capture(dir.path(), "good.tpx3", &[&triplet(10, 10, 100)]);
    let bad = dir.path().join("bad.tpx3");
    std::fs::write(&bad, b"TPX3\0\0\x07\0").unwrap();

    let settings = Arc::new(ImportSettings::default().with_max_threads(2));
    let pool = ImportPool::from_settings(&settings).unwrap();
    let handles = vec![
        pool.submit(&bad, Arc::clone(&settings)),
        pool.submit(&good, Arc::clone(&settings)),
    ];

    let mut outcomes = Vec::new();
    for handle in handles {
        let mut statuses = Vec::new();
        let outcome = handle.wait_with(|event| {
            if let ImportEvent::Status(s) = event {
                statuses.push(s.clone());
            }
        });
        outcomes.push((outcome, statuses));
    }
    assert!(matches!(outcomes[0].0, ImportOutcome::Failed(_)));
    assert!(matches!(outcomes[1].0, ImportOutcome::Completed(_)));
    assert!(outcomes[1].1.iter().any(|s| s == "Clustering hits"));
}

#[test]
fn test_export_pairs_and_events() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_capture(dir.path(), "export.tpx3", &[&triplet(10, 10, 100)]);
    let image = completed(run_import(&path, &ImportSettings::default(), &NullProgress));

    let events_path = dir.path().join("events.csv");
    ExportWriter::create(&events_path)
        .unwrap()
        .write_events_csv(image.centroids())
        .unwrap();
    let content = std::fs::read_to_string(&events_path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines[0], "x,y,time");
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[1].split(',').count(), 3);
}
