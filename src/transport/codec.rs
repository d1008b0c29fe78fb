//! Wire encodings for labelled point sets
//!
//! A message is a sequence of frames. The structured encoding is a single
//! JSON frame; the binary encoding is four frames: label, record count,
//! record width and the raw little-endian `f64` coordinates.

use crate::pipeline::{Point, PointSet};
use crate::service::LabeledScan;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub type Frame = Vec<u8>;
pub type MultipartMessage = Vec<Frame>;

const RECORD_WIDTH: usize = 2;
const BINARY_FRAMES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireEncoding {
    Structured,
    Binary,
}

impl WireEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            WireEncoding::Structured => "structured",
            WireEncoding::Binary => "binary",
        }
    }
}

impl fmt::Display for WireEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WireEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "structured" | "json" => Ok(WireEncoding::Structured),
            "binary" | "raw" => Ok(WireEncoding::Binary),
            other => Err(format!("unknown wire encoding '{}' (expected structured or binary)", other)),
        }
    }
}

#[derive(Debug, Error)]
pub enum WireError {
    #[error("malformed structured message: {0}")]
    Structured(#[from] serde_json::Error),

    #[error("record {index} has {found} values, expected 2")]
    RecordWidth { index: usize, found: usize },

    #[error("unsupported record width {0}, expected 2")]
    UnsupportedWidth(i32),

    #[error("unexpected frame count {0}, expected 1 or 4")]
    FrameCount(usize),

    #[error("{frame} frame must be 4 bytes, got {len}")]
    IntegerFrame { frame: &'static str, len: usize },

    #[error("negative record count {0}")]
    NegativeCount(i32),

    #[error("data frame holds {found} bytes, expected {expected}")]
    DataLength { expected: usize, found: usize },

    #[error("coordinate {index} is not finite")]
    NonFinite { index: usize },

    #[error("label is not valid UTF-8")]
    Label(#[from] std::string::FromUtf8Error),

    #[error("message has {found} frames, limit is {limit}")]
    TooManyFrames { found: u32, limit: u32 },

    #[error("frame of {size} bytes exceeds limit of {limit}")]
    FrameTooLarge { size: usize, limit: usize },

    #[error("connection closed in the middle of a message")]
    Incomplete,

    #[error("transport I/O: {0}")]
    Io(#[from] std::io::Error),
}

/// Structured payload: `{"unit":[{"values":[x,y]},...],"laser_type":"Flange"}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatesMessage {
    pub unit: Vec<Coordinate>,
    pub laser_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coordinate {
    pub values: Vec<f64>,
}

fn check_finite(points: &[Point]) -> Result<(), WireError> {
    match points.iter().position(|p| !p.is_finite()) {
        Some(index) => Err(WireError::NonFinite { index }),
        None => Ok(()),
    }
}

pub fn encode_structured(scan: &LabeledScan) -> Result<MultipartMessage, WireError> {
    check_finite(scan.points.as_slice())?;
    let message = CoordinatesMessage {
        unit: scan
            .points
            .iter()
            .map(|p| Coordinate { values: vec![p.x, p.y] })
            .collect(),
        laser_type: scan.label.clone(),
    };
    Ok(vec![serde_json::to_vec(&message)?])
}

pub fn decode_structured(frame: &[u8]) -> Result<LabeledScan, WireError> {
    let message: CoordinatesMessage = serde_json::from_slice(frame)?;

    let mut points = Vec::with_capacity(message.unit.len());
    for (index, record) in message.unit.iter().enumerate() {
        match record.values.as_slice() {
            [x, y] => points.push(Point::new(*x, *y)),
            other => {
                return Err(WireError::RecordWidth {
                    index,
                    found: other.len(),
                })
            }
        }
    }
    check_finite(&points)?;

    Ok(LabeledScan::new(message.laser_type, PointSet::new(points)))
}

pub fn encode_binary(scan: &LabeledScan) -> Result<MultipartMessage, WireError> {
    check_finite(scan.points.as_slice())?;
    let count = i32::try_from(scan.points.len()).map_err(|_| WireError::FrameTooLarge {
        size: scan.points.len(),
        limit: i32::MAX as usize,
    })?;

    let mut data = Vec::with_capacity(scan.points.len() * RECORD_WIDTH * 8);
    for p in &scan.points {
        data.extend_from_slice(&p.x.to_le_bytes());
        data.extend_from_slice(&p.y.to_le_bytes());
    }

    Ok(vec![
        scan.label.as_bytes().to_vec(),
        count.to_le_bytes().to_vec(),
        (RECORD_WIDTH as i32).to_le_bytes().to_vec(),
        data,
    ])
}

fn read_i32(frame: &[u8], name: &'static str) -> Result<i32, WireError> {
    let bytes: [u8; 4] = frame.try_into().map_err(|_| WireError::IntegerFrame {
        frame: name,
        len: frame.len(),
    })?;
    Ok(i32::from_le_bytes(bytes))
}

pub fn decode_binary(frames: &[Frame]) -> Result<LabeledScan, WireError> {
    let [label, count, width, data] = frames else {
        return Err(WireError::FrameCount(frames.len()));
    };

    let label = String::from_utf8(label.clone())?;
    let count = read_i32(count, "count")?;
    let width = read_i32(width, "width")?;

    if count < 0 {
        return Err(WireError::NegativeCount(count));
    }
    if width != RECORD_WIDTH as i32 {
        return Err(WireError::UnsupportedWidth(width));
    }

    let expected = count as usize * RECORD_WIDTH * 8;
    if data.len() != expected {
        return Err(WireError::DataLength {
            expected,
            found: data.len(),
        });
    }

    let mut points = Vec::with_capacity(count as usize);
    let mut buf = [0u8; 8];
    for record in data.chunks_exact(RECORD_WIDTH * 8) {
        buf.copy_from_slice(&record[..8]);
        let x = f64::from_le_bytes(buf);
        buf.copy_from_slice(&record[8..]);
        let y = f64::from_le_bytes(buf);
        points.push(Point::new(x, y));
    }
    check_finite(&points)?;

    Ok(LabeledScan::new(label, PointSet::new(points)))
}

pub fn encode_scan(scan: &LabeledScan, encoding: WireEncoding) -> Result<MultipartMessage, WireError> {
    match encoding {
        WireEncoding::Structured => encode_structured(scan),
        WireEncoding::Binary => encode_binary(scan),
    }
}

/// Decode a message, telling the encoding apart by its frame count
pub fn decode_scan(frames: &[Frame]) -> Result<(LabeledScan, WireEncoding), WireError> {
    match frames.len() {
        1 => Ok((decode_structured(&frames[0])?, WireEncoding::Structured)),
        BINARY_FRAMES => Ok((decode_binary(frames)?, WireEncoding::Binary)),
        n => Err(WireError::FrameCount(n)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan() -> LabeledScan {
        LabeledScan::new("Tread", PointSet::from_pairs(&[(1.0, 2.0), (-3.5, 0.25)]))
    }

    #[test]
    fn test_structured_layout() {
        let frames = encode_structured(&scan()).unwrap();
        assert_eq!(frames.len(), 1);
        let text = String::from_utf8(frames[0].clone()).unwrap();
        assert_eq!(
            text,
            r#"{"unit":[{"values":[1.0,2.0]},{"values":[-3.5,0.25]}],"laser_type":"Tread"}"#
        );
    }

    #[test]
    fn test_binary_layout() {
        let frames = encode_binary(&scan()).unwrap();
        assert_eq!(frames.len(), 4);
        assert_eq!(frames[0], b"Tread".to_vec());
        assert_eq!(frames[1], 2i32.to_le_bytes().to_vec());
        assert_eq!(frames[2], 2i32.to_le_bytes().to_vec());
        assert_eq!(frames[3].len(), 32);
        assert_eq!(&frames[3][..8], &1.0f64.to_le_bytes());
    }

    #[test]
    fn test_decode_detects_encoding() {
        let (decoded, encoding) = decode_scan(&encode_binary(&scan()).unwrap()).unwrap();
        assert_eq!(encoding, WireEncoding::Binary);
        assert_eq!(decoded, scan());

        let (_, encoding) = decode_scan(&encode_structured(&scan()).unwrap()).unwrap();
        assert_eq!(encoding, WireEncoding::Structured);
    }

    #[test]
    fn test_bad_width_is_rejected() {
        let mut frames = encode_binary(&scan()).unwrap();
        frames[2] = 3i32.to_le_bytes().to_vec();
        assert!(matches!(decode_binary(&frames), Err(WireError::UnsupportedWidth(3))));
    }

    #[test]
    fn test_truncated_data_is_rejected() {
        let mut frames = encode_binary(&scan()).unwrap();
        frames[3].truncate(24);
        assert!(matches!(
            decode_binary(&frames),
            Err(WireError::DataLength { expected: 32, found: 24 })
        ));
    }

    #[test]
    fn test_three_value_record_is_rejected() {
        let frame = br#"{"unit":[{"values":[1.0,2.0,3.0]}],"laser_type":"Flange"}"#;
        assert!(matches!(
            decode_structured(frame),
            Err(WireError::RecordWidth { index: 0, found: 3 })
        ));
    }

    #[test]
    fn test_unexpected_frame_count() {
        let frames = vec![b"Tread".to_vec(), vec![0; 4]];
        assert!(matches!(decode_scan(&frames), Err(WireError::FrameCount(2))));
    }

    #[test]
    fn test_non_finite_is_rejected() {
        let bad = LabeledScan::new("Flange", PointSet::from_pairs(&[(0.0, f64::NAN)]));
        assert!(matches!(encode_binary(&bad), Err(WireError::NonFinite { index: 0 })));
    }

    #[test]
    fn test_encoding_names() {
        assert_eq!("json".parse::<WireEncoding>(), Ok(WireEncoding::Structured));
        assert_eq!("Binary".parse::<WireEncoding>(), Ok(WireEncoding::Binary));
        assert!("protobuf".parse::<WireEncoding>().is_err());
    }
}
