//! End-to-end tests: model record on disk, analysis with heatmap, history.

use burn::backend::Autodiff;
use burn::module::Module;
use burn::record::CompactRecorder;
use burn_ndarray::NdArray;
use image::{DynamicImage, Rgb, RgbImage};
use tempfile::tempdir;

use mango_classifier::history::{HistoryStore, DEFAULT_MIN_LIKELIHOOD};
use mango_classifier::inference::{
    decode_data_url, encode_data_url, AnalysisConfig, Analyzer,
};
use mango_classifier::model::{ClassifierLoader, LeafClassifier, LeafClassifierConfig, RecordLoader};
use mango_classifier::testing::{solid_image, FixedLogits, LinearScorer};
use mango_classifier::{MangoError, NUM_CLASSES};

type TestBackend = Autodiff<NdArray>;

fn small_config() -> LeafClassifierConfig {
    LeafClassifierConfig::mango()
        .with_input_size(32)
        .with_base_filters(4)
}

#[test]
fn cnn_loaded_from_record_classifies_photo() {
    let device = Default::default();
    let dir = tempdir().unwrap();
    let record = dir.path().join("leaf_model");

    LeafClassifier::<TestBackend>::new(&small_config(), &device)
        .save_file(record.clone(), &CompactRecorder::new())
        .unwrap();

    let loader = RecordLoader::new(record.with_extension("mpk")).with_config(small_config());
    let model: LeafClassifier<TestBackend> = loader.load(&device).unwrap();

    // Textured photo so the untrained network sees varying pixels
    let photo = DynamicImage::ImageRgb8(RgbImage::from_fn(120, 80, |x, y| {
        Rgb([(x * 2) as u8, (y * 3) as u8, ((x + y) % 256) as u8])
    }));
    let analyzer = Analyzer::new(model, device);
    let first = analyzer.analyze(&photo).unwrap();
    let second = analyzer.analyze(&photo).unwrap();

    assert_eq!(first.probabilities.len(), NUM_CLASSES);
    let total: f32 = first.probabilities.iter().sum();
    assert!((total - 1.0).abs() < 1e-4);
    assert_eq!(first.probabilities, second.probabilities);
    assert_eq!(first.predicted_class, second.predicted_class);

    let url = first
        .heatmap_url
        .as_deref()
        .expect("CNN analysis should attach a heatmap");
    let overlay = decode_data_url(url).unwrap();
    assert_eq!((overlay.width(), overlay.height()), (120, 80));
}

#[test]
fn heatmap_overlay_matches_photo_dimensions() {
    let device = Default::default();
    let size = 4;
    let features = size * size * 3;

    // Class 3 reads the whole image with increasing weight
    let mut weights = vec![0.0f32; features * NUM_CLASSES];
    for feature in 0..features {
        weights[feature * NUM_CLASSES + 3] = (feature + 1) as f32 / features as f32;
    }
    let scorer = LinearScorer::<TestBackend>::new(weights, size, 3, NUM_CLASSES, &device);
    let analyzer = Analyzer::new(scorer, device).with_config(AnalysisConfig {
        heatmap: true,
        alpha: 0.5,
    });

    let photo = solid_image(300, 450, [200, 200, 200]);
    let result = analyzer.analyze(&photo).unwrap();

    assert_eq!(result.predicted_class, 3);
    assert_eq!(result.class_name, "Die Back");

    let overlay = decode_data_url(result.heatmap_url.as_deref().unwrap())
        .unwrap()
        .to_rgba8();
    assert_eq!(overlay.dimensions(), (300, 450));
    assert!(overlay.pixels().all(|p| p[3] == 255));
    // Bottom-right cell carries the largest weight: full red blended over grey
    assert_eq!(overlay.get_pixel(299, 449).0, [228, 100, 100, 255]);
}

#[test]
fn analysis_saved_listed_and_deleted() {
    let device = Default::default();
    let dir = tempdir().unwrap();
    let history_path = dir.path().join("history.json");

    let mut logits = vec![0.0f32; NUM_CLASSES];
    logits[6] = 5.0;
    let analyzer = Analyzer::new(FixedLogits::<TestBackend>::new(logits, 8, &device), device);

    let photo = solid_image(16, 16, [30, 30, 30]);
    let result = analyzer.analyze(&photo).unwrap();
    assert_eq!(result.class_name, "Powdery Mildew");
    // Constant logits give a flat saliency map, so no overlay
    assert!(result.heatmap_url.is_none());

    let pred_id = {
        let mut store = HistoryStore::open(&history_path).unwrap();
        store
            .save(&encode_data_url(&photo).unwrap(), &result.ranked)
            .unwrap()
    };

    let mut store = HistoryStore::open(&history_path).unwrap();
    let listed = store.results(DEFAULT_MIN_LIKELIHOOD);
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].prediction.pred_id, pred_id);
    assert_eq!(listed[0].diseases.len(), 1);
    assert_eq!(listed[0].diseases[0].disease_name, "Powdery Mildew");

    let stored = decode_data_url(&listed[0].prediction.image_data).unwrap();
    assert_eq!(stored.to_rgb8(), photo.to_rgb8());

    store.delete(pred_id).unwrap();
    assert!(HistoryStore::open(&history_path)
        .unwrap()
        .results(DEFAULT_MIN_LIKELIHOOD)
        .is_empty());

    assert!(matches!(store.delete(uuid::Uuid::new_v4()), Err(MangoError::NotFound(_))));
}
