/// Normalization divisor for 16-bit PCM. Kept at 32768 so `i16::MIN` maps to
/// exactly -1.0; positive full scale lands just below 1.0.
const PCM_SCALE: f32 = 32768.0;

/// De-interleave a stereo PCM buffer into two normalized float channels.
///
/// `left[i] = buf[2i] / 32768`, `right[i] = buf[2i+1] / 32768` for
/// `i < len/2`. A trailing unpaired sample is ignored.
#[must_use]
pub fn split_channels(interleaved: &[i16]) -> (Vec<f32>, Vec<f32>) {
    let frames = interleaved.len() / 2;
    let mut left = Vec::with_capacity(frames);
    let mut right = Vec::with_capacity(frames);

    for i in 0..frames {
        left.push(f32::from(interleaved[2 * i]) / PCM_SCALE);
        right.push(f32::from(interleaved[2 * i + 1]) / PCM_SCALE);
    }

    (left, right)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_interleaved_pairs() {
        let buf = [100i16, -200, 300, -400, 500, -600];
        let (left, right) = split_channels(&buf);

        assert_eq!(left.len(), 3);
        assert_eq!(right.len(), 3);
        for (i, (l, r)) in left.iter().zip(right.iter()).enumerate() {
            assert!((l - f32::from(buf[2 * i]) / 32768.0).abs() < f32::EPSILON);
            assert!((r - f32::from(buf[2 * i + 1]) / 32768.0).abs() < f32::EPSILON);
        }
    }

    #[test]
    fn full_scale_maps_inside_unit_range() {
        let buf = [i16::MIN, i16::MAX];
        let (left, right) = split_channels(&buf);
        assert!((left[0] - (-1.0)).abs() < f32::EPSILON);
        assert!((right[0] - 32767.0 / 32768.0).abs() < f32::EPSILON);
    }

    #[test]
    fn odd_trailing_sample_is_ignored() {
        let buf = [1i16, 2, 3];
        let (left, right) = split_channels(&buf);
        assert_eq!(left.len(), 1);
        assert_eq!(right.len(), 1);
    }

    #[test]
    fn empty_buffer_yields_empty_channels() {
        let (left, right) = split_channels(&[]);
        assert!(left.is_empty());
        assert!(right.is_empty());
    }
}
