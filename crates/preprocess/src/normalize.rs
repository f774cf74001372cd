use crate::PreprocessError;
use crate::config::{ColorOrder, Normalization};
use common::span;
use schema::TensorBuffer;

/// Pack an RGB HWC image into a `[1, 3, height, width]` float32 tensor.
///
/// Each value is `pixel / 255`, followed by `(v - mean[c]) / std[c]` when a
/// normalization is given.
pub fn pack_chw(
    pixels: &[u8],
    width: u32,
    height: u32,
    normalization: Option<&Normalization>,
    color_order: ColorOrder,
) -> Result<TensorBuffer, PreprocessError> {
    let _s = span!("normalize");

    let width = width as usize;
    let height = height as usize;
    let spatial = width * height;

    if pixels.len() != spatial * 3 {
        return Err(PreprocessError::SizeMismatch {
            expected: spatial * 3,
            actual: pixels.len(),
        });
    }

    let (mean, std) = match normalization {
        Some(n) => (n.mean, n.std),
        None => ([0.0; 3], [1.0; 3]),
    };

    let mut output = vec![0.0f32; 3 * spatial];

    for (i, px) in pixels.chunks_exact(3).enumerate() {
        for c in 0..3 {
            let src = color_order.source_channel(c);
            let v = px[src] as f32 / 255.0;
            output[i + c * spatial] = (v - mean[c]) / std[c];
        }
    }

    Ok(TensorBuffer::from_f32(vec![1, 3, height, width], &output)?)
}
