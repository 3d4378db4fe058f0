use std::sync::Arc;

use ndarray::{Array2, Array3, Axis, s};
use ssd_postprocess::{
    Anchor, AnchorConfig, AnchorGenerator, AnchorSet, BoxDecoder, Detector, DetectorConfig,
    RawPredictions, SsdConfig, Variance, nms, ssd::iou_matrix,
};

#[test]
fn test_overlapping_anchors_end_to_end() {
    let anchors = AnchorSet::from_anchors(&[
        Anchor::new(0.5, 0.5, 0.2, 0.2),
        Anchor::new(0.52, 0.5, 0.2, 0.2),
    ]);
    let config = DetectorConfig {
        class_num: 2,
        score_threshold: 0.5,
        iou_threshold: 0.45,
        top_k: 5,
        clip_boxes: false,
    };
    let detector = Detector::with_anchors(Arc::new(anchors), BoxDecoder::default(), config).unwrap();

    let loc = Array3::zeros((1, 2, 4));
    let mut conf = Array3::zeros((1, 2, 2));
    conf[[0, 0, 1]] = 0.9;
    conf[[0, 1, 1]] = 0.8;
    let batch = detector.detect(&RawPredictions::new(loc, conf).unwrap()).unwrap();

    assert_eq!(batch.as_array().dim(), (1, 2, 5, 5));
    let dets = batch.detections(0);
    assert_eq!(dets.len(), 1);
    assert_eq!(dets[0].score, 0.9);
    assert_eq!(dets[0].class_id, 1);
    // The only survivor is the first anchor, decoded unchanged.
    let (cx, cy) = dets[0].bbox.center();
    assert!((cx - 0.5).abs() < 1e-6);
    assert!((cy - 0.5).abs() < 1e-6);
}

#[test]
fn test_ssd300_batch_output_shape() {
    let config = SsdConfig {
        detector: DetectorConfig {
            class_num: 4,
            score_threshold: 0.3,
            top_k: 10,
            ..DetectorConfig::default()
        },
        ..SsdConfig::default()
    };
    let detector = Detector::from_config(&config).unwrap();
    let anchors = detector.anchors().len();
    assert_eq!(anchors, 8732);

    // Three images: nothing above threshold, a few candidates, every anchor hot.
    let batch_size = 3;
    let mut loc = Array3::zeros((batch_size, anchors, 4));
    let mut conf = Array3::zeros((batch_size, anchors, 4));
    for a in (0..anchors).step_by(97) {
        conf[[1, a, 2]] = 0.35 + (a % 50) as f32 / 100.0;
        loc[[1, a, 0]] = 0.5;
    }
    conf.index_axis_mut(Axis(0), 2).fill(0.6);

    let out = detector
        .detect(&RawPredictions::new(loc, conf).unwrap())
        .unwrap();
    assert_eq!(out.as_array().dim(), (batch_size, 4, 10, 5));

    assert!(out.detections(0).is_empty());
    assert!(!out.detections(1).is_empty());
    assert!(out.detections(1).iter().all(|d| d.class_id == 2));

    for image in 0..batch_size {
        assert!(out.slot(image, 0).iter().all(|&v| v == 0.0));
        assert!(out.detections(image).iter().all(|d| d.class_id != 0));
    }

    // Each non-empty slot is ranked and contains no over-threshold overlaps.
    for image in 0..batch_size {
        for class_id in 1..4 {
            let slot = out.slot(image, class_id);
            let filled = slot.rows().into_iter().take_while(|r| r[0] > 0.0).count();
            let scores: Vec<f32> = slot.column(0).iter().take(filled).copied().collect();
            assert!(scores.windows(2).all(|w| w[0] >= w[1]));

            let kept = slot.slice(s![..filled, 1..]);
            let ious = iou_matrix(kept, kept);
            for i in 0..filled {
                for j in 0..filled {
                    if i != j {
                        assert!(ious[[i, j]] <= 0.45);
                    }
                }
            }
        }
    }
}

#[test]
fn test_detector_is_shareable_across_threads() {
    let detector = Arc::new(Detector::from_config(&SsdConfig {
        detector: DetectorConfig {
            class_num: 2,
            ..DetectorConfig::default()
        },
        ..SsdConfig::default()
    })
    .unwrap());

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let detector = Arc::clone(&detector);
            std::thread::spawn(move || {
                let n = detector.anchors().len();
                let mut conf = Array2::zeros((n, 2));
                conf[[t * 100, 1]] = 0.9;
                let out = detector
                    .detect_image(Array2::zeros((n, 4)).view(), conf.view())
                    .unwrap();
                out.detections(0).len()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), 1);
    }
}

#[test]
fn test_anchor_generation_matches_reference_layout() {
    let generator = AnchorGenerator::new(AnchorConfig::ssd300()).unwrap();
    let anchors = generator.generate();
    assert_eq!(anchors.len(), 8732);

    // Last anchor belongs to the 1x1 map: centered, 4 anchors per cell.
    let last = anchors.get(8731).unwrap();
    assert!((last.cx - 0.5).abs() < 1e-6);
    assert!((last.cy - 0.5).abs() < 1e-6);
    assert!(last.w > last.h);

    assert_eq!(anchors, generator.generate());
}

#[test]
fn test_zero_offsets_reproduce_anchors() {
    let anchors = AnchorGenerator::new(AnchorConfig::ssd300())
        .unwrap()
        .generate();
    let loc = Array2::zeros((anchors.len(), 4));
    let decoder = BoxDecoder::new(Variance::new(0.3, 0.7)).unwrap();
    let centers = decoder.decode_center_form(anchors.view(), loc.view()).unwrap();
    assert_eq!(centers, anchors.view());
}

#[test]
fn test_nms_threshold_one_returns_everything() {
    let boxes = ndarray::array![
        [0.0, 0.0, 0.5, 0.5],
        [0.0, 0.0, 0.5, 0.5],
        [0.1, 0.1, 0.6, 0.6],
    ];
    let scores = ndarray::array![0.2, 0.7, 0.5];
    assert_eq!(nms(boxes.view(), scores.view(), 1.0, usize::MAX).unwrap(), vec![1, 2, 0]);
}
