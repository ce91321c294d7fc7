//! Integration tests for the survey runner over a photometry directory.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use gfcat_rust::config::PipelineConfig;
use gfcat_rust::core::domain::{ObjectId, RejectionReason, VisitId};
use gfcat_rust::parsing::photometry_parser::{column_f64, parse_photometry_csv};
use gfcat_rust::services::{
    screening_digest, DirectoryVisitSource, LocalVisitSource, SurveyScreener, VisitSource,
};

// ==================== Helper Functions ====================

const EXPT: f64 = 29.0;

fn exposure_csv(n_bins: usize) -> String {
    let mut csv = String::from("t0,t1,expt\n");
    for i in 0..n_bins {
        let t0 = 1_000_000.0 + 30.0 * i as f64;
        csv.push_str(&format!("{},{},{}\n", t0, t0 + 30.0, EXPT));
    }
    csv
}

/// Photometry with one flaring object (id 7) and one dim object (id 8).
fn photometry_csv(n_bins: usize) -> String {
    let mut header = String::from("obj_id,xcenter,ycenter,ra,dec");
    for i in 0..n_bins {
        header.push_str(&format!(",aperture_sum_{}_n_12_8", i));
    }
    let flare: Vec<String> = (0..n_bins)
        .map(|i| if (20..=22).contains(&i) { 5.0 * EXPT } else { EXPT })
        .map(|c| c.to_string())
        .collect();
    let dim: Vec<String> = (0..n_bins).map(|_| "3".to_string()).collect();
    format!(
        "{}\n7,400.0,400.0,10.0,20.0,{}\n8,700.0,700.0,10.1,20.1,{}\n",
        header,
        flare.join(","),
        dim.join(",")
    )
}

fn write_visit(root: &Path, visit: &str, band: char, n_bins: usize) {
    let dir = root.join(visit);
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join(format!("{}-{}d-30s-photom-12_8.csv", visit, band)),
        photometry_csv(n_bins),
    )
    .unwrap();
    fs::write(
        dir.join(format!("{}-{}d-30s-exptime.csv", visit, band)),
        exposure_csv(n_bins),
    )
    .unwrap();
}

fn survey_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_visit(dir.path(), "e00001", 'n', 40);
    // FUV only: no NUV data for this visit
    write_visit(dir.path(), "e00002", 'f', 40);
    // 10 bins of 29 s: below the exposure minimum
    write_visit(dir.path(), "e00003", 'n', 10);
    write_visit(dir.path(), "e00004", 'n', 40);
    fs::write(dir.path().join("README.txt"), "not a visit").unwrap();
    dir
}

// ==================== Directory source ====================

#[tokio::test]
async fn test_directory_source_lists_visits() {
    let dir = survey_dir();
    let source = DirectoryVisitSource::new(dir.path());
    let visits = source.list_visits().await.unwrap();
    assert_eq!(visits, vec![VisitId(1), VisitId(2), VisitId(3), VisitId(4)]);
}

#[tokio::test]
async fn test_directory_source_loads_visit() {
    let dir = survey_dir();
    let source = DirectoryVisitSource::new(dir.path());
    let data = source
        .load_visit(VisitId(1), &PipelineConfig::default())
        .await
        .unwrap();
    assert_eq!(data.exposure.len(), 40);
    assert_eq!(data.light_curves.len(), 2);
    assert_eq!(data.light_curves[0].object_id, ObjectId(7));
    assert!((data.light_curves[0].cps()[21] - 5.0).abs() < 1e-12);
}

#[tokio::test]
async fn test_survey_run() {
    let dir = survey_dir();
    let mut config = PipelineConfig::default();
    config.survey.excluded_visits = vec![4];
    config.survey.max_concurrent_visits = 2;

    let source = Arc::new(DirectoryVisitSource::new(dir.path()));
    let report = SurveyScreener::new(source, config).run().await.unwrap();

    assert_eq!(report.excluded, vec![VisitId(4)]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].visit, VisitId(2));
    assert!(report.failures[0].missing_data);

    let catalog = &report.catalog;
    assert_eq!(catalog.len(), 2);
    assert_eq!(catalog.skipped_visits(), vec![VisitId(3)]);

    let visit = catalog.get(VisitId(1)).unwrap();
    assert_eq!(visit.candidates.len(), 1);
    assert_eq!(visit.candidates[0].object_id, ObjectId(7));
    assert_eq!(visit.rejections.get(&ObjectId(8)), Some(&RejectionReason::TooDim));

    let out = dir.path().join("candidates.csv");
    catalog.write_csv(&out).unwrap();
    let df = parse_photometry_csv(&out).unwrap();
    assert_eq!(df.height(), 1);
    assert_eq!(column_f64(&df, "obj_id").unwrap(), vec![7.0]);
}

#[tokio::test]
async fn test_rerun_is_identical() {
    let dir = survey_dir();
    let source = Arc::new(DirectoryVisitSource::new(dir.path()));
    let first = SurveyScreener::new(source.clone(), PipelineConfig::default())
        .run()
        .await
        .unwrap();
    let second = SurveyScreener::new(source, PipelineConfig::default())
        .run()
        .await
        .unwrap();

    assert_eq!(first.catalog, second.catalog);
    for visit in first.catalog.visits() {
        let again = second.catalog.get(visit.visit).unwrap();
        assert_eq!(screening_digest(visit).unwrap(), screening_digest(again).unwrap());
    }
}

// ==================== Local source ====================

#[tokio::test]
async fn test_local_source_round_trip() {
    let dir = survey_dir();
    let directory = DirectoryVisitSource::new(dir.path());
    let config = PipelineConfig::default();

    let local = LocalVisitSource::new();
    local
        .insert(directory.load_visit(VisitId(1), &config).await.unwrap())
        .await;
    assert_eq!(local.len().await, 1);

    let report = SurveyScreener::new(Arc::new(local), config).run().await.unwrap();
    assert_eq!(report.catalog.candidate_count(), 1);
}
