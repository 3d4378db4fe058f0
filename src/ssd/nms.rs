//! Greedy non-maximum suppression.

use ndarray::{ArrayView1, ArrayView2};

use crate::error::{Error, Result};
use crate::ssd::rect::BoundingBox;

/// Run greedy NMS over one class's candidates.
///
/// `boxes` is (N, 4) in corner form and `scores` has length N. Returns the
/// indices of the kept candidates, highest score first, at most `top_k` of
/// them (`usize::MAX` for no cap).
///
/// A candidate is suppressed when its IoU with an already kept box is
/// strictly greater than `iou_threshold`; an IoU exactly equal to the
/// threshold survives. Candidates with equal scores keep their input order,
/// so the lower index wins a tie.
///
/// Fails with [`Error::ShapeMismatch`] unless `boxes` has four columns and
/// exactly one row per score.
pub fn nms(
    boxes: ArrayView2<'_, f32>,
    scores: ArrayView1<'_, f32>,
    iou_threshold: f32,
    top_k: usize,
) -> Result<Vec<usize>> {
    let n = scores.len();
    if boxes.dim() != (n, 4) {
        return Err(Error::ShapeMismatch {
            what: "nms boxes",
            expected: vec![n, 4],
            got: boxes.shape().to_vec(),
        });
    }
    if n == 0 || top_k == 0 {
        return Ok(Vec::new());
    }

    let rects: Vec<BoundingBox> = (0..n).map(|i| BoundingBox::from_row(boxes.row(i))).collect();

    // Stable sort, descending by score.
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut keep = Vec::with_capacity(top_k.min(n));
    let mut suppressed = vec![false; n];

    for (pos, &idx) in order.iter().enumerate() {
        if suppressed[idx] {
            continue;
        }
        keep.push(idx);
        if keep.len() == top_k {
            break;
        }

        let kept = &rects[idx];
        for &other in &order[pos + 1..] {
            if !suppressed[other] && kept.iou(&rects[other]) > iou_threshold {
                suppressed[other] = true;
            }
        }
    }

    Ok(keep)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssd::rect::iou_matrix;
    use ndarray::{Array1, Array2, Axis, array};

    fn grid_boxes() -> (Array2<f32>, Array1<f32>) {
        let boxes = array![
            [0.10, 0.10, 0.40, 0.40],
            [0.12, 0.11, 0.41, 0.42],
            [0.50, 0.50, 0.90, 0.90],
            [0.55, 0.52, 0.88, 0.91],
            [0.11, 0.60, 0.30, 0.80],
            [0.00, 0.00, 1.00, 1.00],
        ];
        let scores = array![0.9, 0.85, 0.7, 0.95, 0.3, 0.5];
        (boxes, scores)
    }

    #[test]
    fn test_empty() {
        let boxes = Array2::<f32>::zeros((0, 4));
        let scores = Array1::<f32>::zeros(0);
        assert!(nms(boxes.view(), scores.view(), 0.5, 10).unwrap().is_empty());
    }

    #[test]
    fn test_mismatched_lengths_fail() {
        let boxes = array![
            [0.0, 0.0, 0.2, 0.2],
            [0.5, 0.5, 0.7, 0.7],
            [0.1, 0.1, 0.3, 0.3],
        ];
        let scores = array![0.9, 0.8];
        let err = nms(boxes.view(), scores.view(), 0.5, 10).unwrap_err();
        assert!(err.is_precondition());

        let narrow = array![[0.0, 0.0, 0.2], [0.5, 0.5, 0.7]];
        assert!(matches!(
            nms(narrow.view(), scores.view(), 0.5, 10),
            Err(Error::ShapeMismatch { what: "nms boxes", .. })
        ));
    }

    #[test]
    fn test_single_box() {
        let boxes = array![[0.1, 0.1, 0.5, 0.5]];
        let scores = array![0.9];
        assert_eq!(nms(boxes.view(), scores.view(), 0.45, 200).unwrap(), vec![0]);
    }

    #[test]
    fn test_suppresses_overlapping() {
        let (boxes, scores) = grid_boxes();
        let keep = nms(boxes.view(), scores.view(), 0.5, usize::MAX).unwrap();
        assert_eq!(keep, vec![3, 0, 5, 4]);
    }

    #[test]
    fn test_kept_pairs_respect_threshold() {
        let (boxes, scores) = grid_boxes();
        for threshold in [0.0, 0.1, 0.3, 0.5, 0.8] {
            let keep = nms(boxes.view(), scores.view(), threshold, usize::MAX).unwrap();
            let kept = boxes.select(Axis(0), &keep);
            let ious = iou_matrix(kept.view(), kept.view());
            for i in 0..keep.len() {
                for j in 0..keep.len() {
                    if i != j {
                        assert!(ious[[i, j]] <= threshold);
                    }
                }
            }
        }
    }

    #[test]
    fn test_threshold_one_keeps_everything_sorted() {
        let (boxes, scores) = grid_boxes();
        let keep = nms(boxes.view(), scores.view(), 1.0, usize::MAX).unwrap();
        assert_eq!(keep, vec![3, 0, 1, 2, 5, 4]);
    }

    #[test]
    fn test_idempotent() {
        let (boxes, scores) = grid_boxes();
        let keep = nms(boxes.view(), scores.view(), 0.5, usize::MAX).unwrap();
        let kept_boxes = boxes.select(Axis(0), &keep);
        let kept_scores = scores.select(Axis(0), &keep);

        for threshold in [0.5, 0.7] {
            let again = nms(kept_boxes.view(), kept_scores.view(), threshold, usize::MAX).unwrap();
            let again: Vec<usize> = again.into_iter().map(|i| keep[i]).collect();
            assert_eq!(again, keep);
        }
    }

    #[test]
    fn test_top_k() {
        let (boxes, scores) = grid_boxes();
        assert_eq!(nms(boxes.view(), scores.view(), 1.0, 2).unwrap(), vec![3, 0]);
        assert!(nms(boxes.view(), scores.view(), 1.0, 0).unwrap().is_empty());
    }

    #[test]
    fn test_iou_equal_to_threshold_is_kept() {
        // Second box covers exactly half of the first: IoU = 0.5.
        let boxes = array![[0.0, 0.0, 1.0, 1.0], [0.0, 0.0, 1.0, 0.5]];
        let scores = array![0.9, 0.8];
        assert_eq!(nms(boxes.view(), scores.view(), 0.5, 10).unwrap(), vec![0, 1]);
        assert_eq!(nms(boxes.view(), scores.view(), 0.49, 10).unwrap(), vec![0]);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let boxes = array![
            [0.0, 0.0, 0.2, 0.2],
            [0.5, 0.5, 0.7, 0.7],
            [0.0, 0.0, 0.2, 0.2],
        ];
        let scores = array![0.6, 0.6, 0.6];
        assert_eq!(nms(boxes.view(), scores.view(), 0.5, 10).unwrap(), vec![0, 1]);
    }

    #[test]
    fn test_nan_box_is_kept_and_does_not_suppress() {
        let boxes = array![
            [f32::NAN, 0.0, 0.2, 0.2],
            [0.0, 0.0, 0.2, 0.2],
            [0.0, 0.0, 0.2, 0.2],
        ];
        let scores = array![0.9, 0.8, 0.7];
        assert_eq!(nms(boxes.view(), scores.view(), 0.5, 10).unwrap(), vec![0, 1]);
    }
}
