//! Mask-aware mean pooling of per-token vectors.
//!
//! This is the arithmetic heart of the pipeline: variable-length token
//! output collapses into one fixed-width vector per text, and padding
//! positions must contribute exactly nothing. Averaging over all L
//! positions unconditionally would dilute short texts in a padded batch,
//! which is why the sum is divided by the mask total instead.

use ndarray::{Array2, Axis};

use crate::embedding::backend::TokenEmbeddingTensor;
use crate::error::{PipelineError, PipelineResult};

/// Floor applied to the mask sum before division, so a row with zero real
/// tokens pools to a finite (zero) vector instead of dividing by zero.
const MASK_SUM_FLOOR: f32 = 1e-9;

/// Collapses `[N, L, D]` token vectors into `[N, D]` pooled vectors by
/// averaging over real (non-padding) tokens only.
///
/// Per text: the `[N, L]` mask is broadcast across all D dimensions and
/// multiplied in, zeroing padding-token contributions; the masked vectors
/// are summed over the token axis and divided by the clamped mask sum.
/// No unit-length normalization is applied here; the similarity metric
/// downstream owns that.
pub fn mean_pool(
    token_embeddings: &TokenEmbeddingTensor,
    attention_mask: &Array2<i64>,
) -> PipelineResult<Array2<f32>> {
    let (batch, seq_len, _) = token_embeddings.dim();
    if attention_mask.dim() != (batch, seq_len) {
        return Err(PipelineError::InvalidInput {
            reason: format!(
                "attention mask shape {:?} does not match token embeddings shape {:?}",
                attention_mask.dim(),
                token_embeddings.dim()
            ),
        });
    }

    let mask = attention_mask.mapv(|m| m as f32);
    let counts = mask
        .sum_axis(Axis(1))
        .mapv(|count| count.max(MASK_SUM_FLOOR));

    let expanded = mask.insert_axis(Axis(2));
    let masked = token_embeddings * &expanded;
    let summed = masked.sum_axis(Axis(1));

    Ok(summed / &counts.insert_axis(Axis(1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array3, array};

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn averages_real_tokens_only() {
        // Two real tokens and one padding position carrying garbage.
        let embeddings: Array3<f32> = array![[
            [1.0, 2.0],
            [3.0, 4.0],
            [500.0, -500.0],
        ]];
        let mask = array![[1_i64, 1, 0]];

        let pooled = mean_pool(&embeddings, &mask).unwrap();
        assert!(close(pooled[[0, 0]], 2.0));
        assert!(close(pooled[[0, 1]], 3.0));
    }

    #[test]
    fn padding_values_never_influence_the_output() {
        let mask = array![[1_i64, 1, 0, 0]];
        let real = [[1.0_f32, -2.0], [5.0, 8.0]];

        let mut quiet = Array3::zeros((1, 4, 2));
        let mut noisy = Array3::zeros((1, 4, 2));
        for (position, token) in real.iter().enumerate() {
            for (d, &value) in token.iter().enumerate() {
                quiet[[0, position, d]] = value;
                noisy[[0, position, d]] = value;
            }
        }
        // Arbitrary values at masked positions.
        noisy[[0, 2, 0]] = f32::MAX / 4.0;
        noisy[[0, 3, 1]] = -12345.0;

        let pooled_quiet = mean_pool(&quiet, &mask).unwrap();
        let pooled_noisy = mean_pool(&noisy, &mask).unwrap();
        for d in 0..2 {
            assert_eq!(pooled_quiet[[0, d]], pooled_noisy[[0, d]]);
        }
    }

    #[test]
    fn zero_real_tokens_pool_to_a_finite_vector() {
        let embeddings: Array3<f32> = array![[[3.0, 9.0], [7.0, -1.0]]];
        let mask = array![[0_i64, 0]];

        let pooled = mean_pool(&embeddings, &mask).unwrap();
        for d in 0..2 {
            assert!(pooled[[0, d]].is_finite());
            assert!(close(pooled[[0, d]], 0.0));
        }
    }

    #[test]
    fn each_row_pools_independently() {
        let embeddings: Array3<f32> = array![
            [[2.0, 4.0], [6.0, 8.0]],
            [[10.0, 20.0], [999.0, 999.0]],
        ];
        let mask = array![[1_i64, 1], [1, 0]];

        let batch = mean_pool(&embeddings, &mask).unwrap();

        let first_alone = mean_pool(
            &array![[[2.0_f32, 4.0], [6.0, 8.0]]],
            &array![[1_i64, 1]],
        )
        .unwrap();
        let second_alone = mean_pool(
            &array![[[10.0_f32, 20.0], [999.0, 999.0]]],
            &array![[1_i64, 0]],
        )
        .unwrap();

        for d in 0..2 {
            assert!(close(batch[[0, d]], first_alone[[0, d]]));
            assert!(close(batch[[1, d]], second_alone[[0, d]]));
        }
        assert!(close(batch[[1, 0]], 10.0));
    }

    #[test]
    fn output_width_matches_input_width() {
        let embeddings = Array3::<f32>::zeros((3, 5, 16));
        let mask = Array2::<i64>::ones((3, 5));
        let pooled = mean_pool(&embeddings, &mask).unwrap();
        assert_eq!(pooled.dim(), (3, 16));
    }

    #[test]
    fn mismatched_mask_shape_is_rejected() {
        let embeddings = Array3::<f32>::zeros((2, 4, 8));
        let mask = Array2::<i64>::ones((2, 3));
        assert!(mean_pool(&embeddings, &mask).is_err());
    }
}
