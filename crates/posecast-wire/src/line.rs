//! Line encoding for landmark vectors

use std::fmt::Write;

use bytes::Bytes;

use posecast_core::{is_decimal, LandmarkVector, PosecastError, PosecastResult, SCALAR_COUNT};

/// Separator between scalars
pub const FIELD_SEPARATOR: char = ',';

/// Line terminator
pub const LINE_TERMINATOR: char = '\n';

/// Upper bound for an encoded line (MTU-friendly for realistic poses)
pub const MAX_LINE_SIZE: usize = 1400;

/// Typical encoded width of one scalar, used to size buffers
const SCALAR_WIDTH_HINT: usize = 8;

/// Encode a landmark vector as one `v0,...,v98\n` line
pub fn encode_line(vector: &LandmarkVector) -> Bytes {
    let mut line = String::with_capacity(SCALAR_COUNT * SCALAR_WIDTH_HINT);
    for (i, scalar) in vector.scalars().iter().enumerate() {
        if i > 0 {
            line.push(FIELD_SEPARATOR);
        }
        // Writing to a String cannot fail
        let _ = write!(line, "{}", scalar);
    }
    line.push(LINE_TERMINATOR);
    Bytes::from(line)
}

/// Split a published line into its scalar fields
///
/// Rejects anything that is not exactly 99 plain decimals followed by a newline.
pub fn decode_line(buf: &[u8]) -> PosecastResult<Vec<&str>> {
    let text = std::str::from_utf8(buf)
        .map_err(|_| PosecastError::InvalidLine("not ASCII text".into()))?;

    let body = text
        .strip_suffix(LINE_TERMINATOR)
        .ok_or_else(|| PosecastError::InvalidLine("missing line terminator".into()))?;

    let fields: Vec<&str> = body.split(FIELD_SEPARATOR).collect();
    if fields.len() != SCALAR_COUNT {
        return Err(PosecastError::ScalarCount {
            expected: SCALAR_COUNT,
            actual: fields.len(),
        });
    }

    if let Some((i, field)) = fields.iter().enumerate().find(|(_, f)| !is_decimal(f)) {
        return Err(PosecastError::InvalidLine(format!(
            "field {} is not a decimal: {:?}",
            i, field
        )));
    }

    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use posecast_core::{Scalar, SeedPose};
    use proptest::prelude::*;
    use std::sync::Arc;

    #[test]
    fn test_encode_seed() {
        let seed = SeedPose::builtin().unwrap();
        let line = encode_line(seed.vector());
        let text = std::str::from_utf8(&line).unwrap();

        assert!(text.starts_with("449.35,714.5,-559.89,446.04,725.5,"));
        assert!(text.ends_with(",536.1,135.17,354.19\n"));
        assert!(!text.contains(' '));
        assert!(!text.contains(",\n"));
        assert_eq!(text.matches(',').count(), SCALAR_COUNT - 1);
        assert_eq!(text.matches('\n').count(), 1);
    }

    #[test]
    fn test_encode_mixed_formatting() {
        let mut scalars = vec![Scalar::Seeded(Arc::from("714.5")); SCALAR_COUNT];
        scalars[0] = Scalar::Measured(500.0);
        scalars[1] = Scalar::Measured(-0.004);
        let vector = LandmarkVector::from_scalars(scalars).unwrap();

        let line = encode_line(&vector);
        assert!(line.starts_with(b"500.00,-0.00,714.5,714.5,"));
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(decode_line(b"1.0,2.0\n").is_err());

        let seed = SeedPose::builtin().unwrap();
        let line = encode_line(seed.vector());
        assert!(decode_line(&line[..line.len() - 1]).is_err());

        let mut trailing = line[..line.len() - 1].to_vec();
        trailing.extend_from_slice(b",\n");
        assert!(decode_line(&trailing).is_err());

        let spaced = String::from_utf8(line.to_vec()).unwrap().replacen(',', ", ", 1);
        assert!(decode_line(spaced.as_bytes()).is_err());
    }

    #[test]
    fn test_decode_seed_line() {
        let seed = SeedPose::builtin().unwrap();
        let line = encode_line(seed.vector());
        let fields = decode_line(&line).unwrap();
        assert_eq!(fields.len(), SCALAR_COUNT);
        assert_eq!(fields[1], "714.5");
    }

    proptest! {
        #[test]
        fn prop_encoded_line_is_well_formed(
            values in proptest::collection::vec(-5000.0f64..5000.0, SCALAR_COUNT)
        ) {
            let scalars = values.into_iter().map(Scalar::Measured).collect();
            let vector = LandmarkVector::from_scalars(scalars).unwrap();
            let line = encode_line(&vector);

            prop_assert!(line.len() <= MAX_LINE_SIZE);
            let fields = decode_line(&line).unwrap();
            prop_assert_eq!(fields.len(), SCALAR_COUNT);
            for field in fields {
                let (_, frac) = field.split_once('.').unwrap();
                prop_assert_eq!(frac.len(), 2);
            }
        }
    }
}
