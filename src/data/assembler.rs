// ============================================================
// Layer 4 — Batch Assembler
// ============================================================
// Collapses per-sample images and positive maps of differing
// shapes into two dense buffers.
//
// Images → one zero-padded (N, C, H', W') buffer
//
//   H' = max H_i, W' = max W_i, rounded up to `stride` when
//   stride > 0. Each image is copied into the top-left corner
//   of its slot; everything else stays exactly 0. The
//   pre-padding (H_i, W_i) of every sample is kept so the
//   model can unpad its predictions.
//
// Positive maps → one (Σ rows_i, max cols_i) matrix
//
//   Maps are stacked, not padded per sample, because every
//   sample has a different number of entities:
//
//     sample 0 (2 rows) ┐ rows 0..2
//     sample 1 (0 rows) │ rows 2..2
//     sample 2 (3 rows) ┘ rows 2..5
//
//   row_offsets = [0, 2, 2, 5] recovers each sample's range.
//   Narrower maps are right-padded with zero columns.
//
// This module is tensor-library free; batcher.rs turns the
// buffers into burn tensors.

use crate::data::image::ImageTensor;
use crate::domain::positive_map::PositiveMap;
use crate::error::{GroundingError, Result};

// ─── Images ───────────────────────────────────────────────────────────────────
/// Zero-padded image batch, row-major (N, C, H, W).
#[derive(Debug, Clone, PartialEq)]
pub struct PaddedImages {
    pub shape:       [usize; 4],
    pub data:        Vec<f32>,
    /// (H_i, W_i) of every sample before padding
    pub image_sizes: Vec<[usize; 2]>,
}

fn round_up(value: usize, stride: usize) -> usize {
    if stride == 0 { value } else { value.div_ceil(stride) * stride }
}

/// Pad every image to the batch-wide maximum shape.
pub fn pad_images(images: &[ImageTensor], size_divisible: usize) -> Result<PaddedImages> {
    if images.is_empty() {
        return Err(GroundingError::EmptyBatch);
    }

    let channels = images.iter().map(ImageTensor::channels).max().unwrap_or(0);
    let height   = round_up(images.iter().map(ImageTensor::height).max().unwrap_or(0), size_divisible);
    let width    = round_up(images.iter().map(ImageTensor::width).max().unwrap_or(0), size_divisible);

    let slot     = channels * height * width;
    let mut data = vec![0.0f32; images.len() * slot];

    for (i, img) in images.iter().enumerate() {
        for c in 0..img.channels() {
            for y in 0..img.height() {
                let dst = i * slot + (c * height + y) * width;
                data[dst..dst + img.width()].copy_from_slice(img.row(c, y));
            }
        }
    }

    Ok(PaddedImages {
        shape:       [images.len(), channels, height, width],
        data,
        image_sizes: images.iter().map(|img| [img.height(), img.width()]).collect(),
    })
}

// ─── Positive maps ────────────────────────────────────────────────────────────
/// Positive maps of a batch stacked along the row axis.
#[derive(Debug, Clone, PartialEq)]
pub struct ConcatenatedMap {
    pub map:         PositiveMap,
    /// Cumulative row counts, length N + 1, starting at 0
    pub row_offsets: Vec<usize>,
}

/// Stack per-sample positive maps into one matrix.
pub fn concat_positive_maps(maps: &[&PositiveMap]) -> Result<ConcatenatedMap> {
    if maps.is_empty() {
        return Err(GroundingError::EmptyBatch);
    }

    let max_len    = maps.iter().map(|m| m.cols()).max().unwrap_or(0);
    let total_rows = maps.iter().map(|m| m.rows()).sum::<usize>();

    let mut data        = vec![0.0f32; total_rows * max_len];
    let mut row_offsets = Vec::with_capacity(maps.len() + 1);
    let mut cursor      = 0usize;
    row_offsets.push(0);

    for map in maps {
        for r in 0..map.rows() {
            let dst = (cursor + r) * max_len;
            data[dst..dst + map.cols()].copy_from_slice(map.row(r));
        }
        cursor += map.rows();
        row_offsets.push(cursor);
    }

    let allocated = if max_len == 0 { total_rows } else { data.len() / max_len };
    if cursor != allocated {
        return Err(GroundingError::BatchAssembly { consumed: cursor, allocated });
    }

    Ok(ConcatenatedMap {
        map: PositiveMap::from_rows(total_rows, max_len, data)?,
        row_offsets,
    })
}

// ─── Combined ─────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq)]
pub struct Assembled {
    pub images:       PaddedImages,
    pub positive_map: ConcatenatedMap,
}

/// Pad images and stack positive maps of one batch.
pub fn assemble(images: &[ImageTensor], positive_maps: &[&PositiveMap], stride: usize) -> Result<Assembled> {
    if images.len() != positive_maps.len() {
        return Err(GroundingError::invariant(format!(
            "{} images but {} positive maps in one batch",
            images.len(),
            positive_maps.len()
        )));
    }
    Ok(Assembled {
        images:       pad_images(images, stride)?,
        positive_map: concat_positive_maps(positive_maps)?,
    })
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn image(c: usize, h: usize, w: usize, seed: f32) -> ImageTensor {
        let data = (0..c * h * w).map(|i| seed + i as f32 + 1.0).collect();
        ImageTensor::new(c, h, w, data).unwrap()
    }

    fn map(rows: usize, cols: usize, fill: f32) -> PositiveMap {
        PositiveMap::from_rows(rows, cols, vec![fill; rows * cols]).unwrap()
    }

    #[test]
    fn test_pad_to_max_shape() {
        let padded = pad_images(&[image(3, 2, 5, 0.0), image(3, 4, 3, 100.0)], 0).unwrap();
        assert_eq!(padded.shape, [2, 3, 4, 5]);
        assert_eq!(padded.image_sizes, vec![[2, 5], [4, 3]]);
    }

    #[test]
    fn test_stride_rounds_up_height_and_width() {
        let padded = pad_images(&[image(3, 30, 33, 0.0), image(3, 31, 20, 0.0)], 32).unwrap();
        assert_eq!(padded.shape, [2, 3, 32, 64]);
    }

    #[test]
    fn test_stride_keeps_exact_multiples() {
        let padded = pad_images(&[image(1, 64, 32, 0.0)], 32).unwrap();
        assert_eq!(padded.shape, [1, 1, 64, 32]);
    }

    #[test]
    fn test_padding_preserves_pixels_and_zero_fills() {
        let images = [image(2, 3, 2, 0.0), image(2, 2, 4, 500.0)];
        let padded = pad_images(&images, 8).unwrap();
        let [_, c_max, h_max, w_max] = padded.shape;

        for (i, img) in images.iter().enumerate() {
            for c in 0..c_max {
                for y in 0..h_max {
                    for x in 0..w_max {
                        let v = padded.data[((i * c_max + c) * h_max + y) * w_max + x];
                        if c < img.channels() && y < img.height() && x < img.width() {
                            assert_eq!(v, img.row(c, y)[x]);
                        } else {
                            assert_eq!(v, 0.0);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_empty_image_batch_is_error() {
        assert_eq!(pad_images(&[], 0).unwrap_err(), GroundingError::EmptyBatch);
    }

    #[test]
    fn test_concat_tracks_row_offsets() {
        let (a, b, c) = (map(2, 4, 0.5), map(0, 4, 0.0), map(3, 6, 0.25));
        let out = concat_positive_maps(&[&a, &b, &c]).unwrap();

        assert_eq!(out.map.shape(), [5, 6]);
        assert_eq!(out.row_offsets, vec![0, 2, 2, 5]);
        assert_eq!(out.map.row(0), &[0.5, 0.5, 0.5, 0.5, 0.0, 0.0]);
        assert_eq!(out.map.row(4), &[0.25; 6]);
    }

    #[test]
    fn test_random_row_accounting() {
        let mut rng = StdRng::seed_from_u64(11);

        for _ in 0..50 {
            let n    = rng.gen_range(1..6);
            let maps: Vec<PositiveMap> = (0..n)
                .map(|_| {
                    let rows = rng.gen_range(0..5);
                    let cols = rng.gen_range(1..10);
                    let data = (0..rows * cols).map(|_| rng.gen::<f32>()).collect();
                    PositiveMap::from_rows(rows, cols, data).unwrap()
                })
                .collect();
            let refs: Vec<&PositiveMap> = maps.iter().collect();
            let out = concat_positive_maps(&refs).unwrap();

            let total: usize = maps.iter().map(|m| m.rows()).sum();
            let width        = maps.iter().map(|m| m.cols()).max().unwrap();
            assert_eq!(out.map.shape(), [total, width]);

            for (i, m) in maps.iter().enumerate() {
                let rows = out.row_offsets[i]..out.row_offsets[i + 1];
                assert_eq!(rows.len(), m.rows());
                for (r, stacked) in rows.enumerate() {
                    let row = out.map.row(stacked);
                    assert_eq!(&row[..m.cols()], m.row(r));
                    assert!(row[m.cols()..].iter().all(|&v| v == 0.0));
                }
            }
        }
    }

    #[test]
    fn test_assemble_rejects_length_mismatch() {
        let a   = map(1, 4, 1.0);
        let err = assemble(&[image(3, 2, 2, 0.0), image(3, 2, 2, 0.0)], &[&a], 0).unwrap_err();
        assert!(matches!(err, GroundingError::InvariantViolation(_)));
    }
}
