//! Predictions over the bundled sample dataset and model artifacts

use stability_core::predictor::model_ids;
use stability_core::schema::columns::*;
use stability_core::{
    ComponentStatus, ErrorKind, ParameterSet, PipelineConfig, RunOptions, StabilityPipeline,
};
use std::io::Write;
use std::path::PathBuf;

fn repo_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..")
}

fn config() -> PipelineConfig {
    PipelineConfig {
        dataset_path: repo_root().join("data/sample_devices.csv"),
        models_dir: repo_root().join("models"),
        ..PipelineConfig::default()
    }
}

fn good_device() -> ParameterSet {
    ParameterSet::new()
        .with(ENCAPSULATION, "Glass")
        .with(COMPOSITION, "CsPbI3")
        .with(TEMPERATURE, 25.0)
        .with(HUMIDITY, 0.0)
}

fn bad_device() -> ParameterSet {
    ParameterSet::new()
        .with(ENCAPSULATION, "None")
        .with(COMPOSITION, "MAPbI3")
        .with(TEMPERATURE, 85.0)
        .with(HUMIDITY, 85.0)
}

#[tokio::test]
async fn test_sample_schema_is_clean() {
    let pipeline = StabilityPipeline::from_config(&config()).unwrap();
    assert_eq!(pipeline.schema().len(), 10);
    assert!(pipeline.warnings().is_empty());
    assert_eq!(pipeline.health().status, ComponentStatus::Healthy);
}

#[tokio::test]
async fn test_shipped_models_rank_devices() {
    let pipeline = StabilityPipeline::from_config(&config()).unwrap();
    let ids: Vec<String> = pipeline.registry().model_ids().map(str::to_string).collect();
    assert_eq!(ids.len(), 5);

    for id in &ids {
        let good = pipeline.run(&good_device(), id, RunOptions::default()).await.unwrap();
        let bad = pipeline.run(&bad_device(), id, RunOptions::default()).await.unwrap();
        assert!(
            good.stability_score > bad.stability_score,
            "{}: {} <= {}",
            id,
            good.stability_score,
            bad.stability_score
        );
        assert!(
            good.estimated_lifetime_t80_hours > bad.estimated_lifetime_t80_hours,
            "{}",
            id
        );
    }

    let health = pipeline.health();
    assert_eq!(health.status, ComponentStatus::Healthy);
}

#[tokio::test]
async fn test_forest_scores_on_sample_data() {
    let pipeline = StabilityPipeline::from_config(&config()).unwrap();
    let good = pipeline
        .run(&good_device(), model_ids::RANDOM_FOREST, RunOptions::default())
        .await
        .unwrap();
    let bad = pipeline
        .run(&bad_device(), model_ids::RANDOM_FOREST, RunOptions::default())
        .await
        .unwrap();

    assert!(good.stability_score > 0.6);
    assert!(bad.stability_score < 0.3);
    assert!(good.uncertainty.is_some());
    assert_eq!(good.notices.len(), 6);
}

#[tokio::test]
async fn test_out_of_range_rejected_against_sample_domain() {
    let pipeline = StabilityPipeline::from_config(&config()).unwrap();
    let params = good_device().with(THICKNESS, 2000.0);
    let err = pipeline
        .run(&params, model_ids::XGBOOST, RunOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OutOfRange);
    assert_eq!(err.field(), Some(THICKNESS));
}

#[tokio::test]
async fn test_missing_models_dir_degrades_per_model() {
    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("devices.csv");
    let mut file = std::fs::File::create(&csv_path).unwrap();
    writeln!(file, "{},{},{}", COMPOSITION, ENCAPSULATION, THICKNESS).unwrap();
    writeln!(file, "MAPbI3,Glass,300").unwrap();
    writeln!(file, "FAPbI3,None,600").unwrap();

    let config = PipelineConfig {
        dataset_path: csv_path,
        models_dir: dir.path().join("no-models"),
        ..PipelineConfig::default()
    };
    let pipeline = StabilityPipeline::from_config(&config).unwrap();
    assert!(!pipeline.warnings().is_empty());

    let err = pipeline
        .run(&ParameterSet::new(), model_ids::RANDOM_FOREST, RunOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
    assert_eq!(pipeline.health().status, ComponentStatus::Unhealthy);
}

fn full_device(composition: &str) -> ParameterSet {
    good_device()
        .with(COMPOSITION, composition)
        .with(ETL, "SnO2")
        .with(HTL, "PTAA")
        .with(THICKNESS, 400.0)
        .with(BAND_GAP, 1.6)
        .with(LIGHT_INTENSITY, 500.0)
        .with(EXPOSURE_TIME, 1000.0)
}

#[tokio::test]
async fn test_many_compositions_keep_indicator_inputs() {
    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("devices.csv");
    let mut csv = std::fs::read_to_string(repo_root().join("data/sample_devices.csv")).unwrap();
    // 4 stock compositions plus 14 more exceed the one-hot size policy
    for i in 0..14 {
        csv.push_str(&format!(
            "{},Blend{:02},SnO2,PTAA,400,1.6,Glass,50,50,500,1000,15.0\n",
            2000 + i,
            i
        ));
    }
    std::fs::write(&csv_path, csv).unwrap();

    let large = StabilityPipeline::from_config(&PipelineConfig {
        dataset_path: csv_path,
        ..config()
    })
    .unwrap();
    let sample = StabilityPipeline::from_config(&config()).unwrap();

    for id in [model_ids::RANDOM_FOREST, model_ids::KERNEL_RIDGE, model_ids::CNN] {
        let cs = large.run(&full_device("CsPbI3"), id, RunOptions::default()).await.unwrap();
        let ma = large.run(&full_device("MAPbI3"), id, RunOptions::default()).await.unwrap();
        assert_ne!(cs.stability_score, ma.stability_score, "{}", id);
        assert!(ma.warnings.is_empty(), "{}: {:?}", id, ma.warnings);

        let reference = sample.run(&full_device("MAPbI3"), id, RunOptions::default()).await.unwrap();
        assert_eq!(ma.stability_score, reference.stability_score, "{}", id);
    }

    let blend = large
        .run(&full_device("Blend03"), model_ids::RANDOM_FOREST, RunOptions::default())
        .await
        .unwrap();
    assert_eq!(blend.warnings.len(), 1);
    assert!(blend.warnings[0].contains("Blend03"));
}
