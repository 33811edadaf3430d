//! Binary record layout for moving a [`Detector2DResult`] across a process
//! or language boundary.
//!
//! ```text
//! f64  confidence
//! f64  timestamp
//! i32  image_width
//! i32  image_height
//! f64  ellipse.center.x
//! f64  ellipse.center.y
//! f64  ellipse.major_radius
//! f64  ellipse.minor_radius
//! f64  ellipse.angle
//! i32  roi.x, roi.y, roi.width, roi.height
//! u64  final_edges.count, then count × { i32 x, i32 y }
//! u64  raw_edges.count,   then count × { i32 x, i32 y }
//! ```
//!
//! All values are native-endian with no padding. The layout carries no
//! version tag or overall length prefix, so both ends must agree on it out of
//! band; any change to field order or width breaks existing peers.

use bytemuck::{Pod, Zeroable};
use eye_math::Ellipse;
use nalgebra::Vector2;
use thiserror::Error;

use crate::detector_2d::{Detector2DResult, EdgePoint};
use crate::roi::Roi;

/// Errors from decoding a wire-format record
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("buffer truncated in {section}: need {needed} bytes, {available} available")]
    Truncated {
        section: &'static str,
        needed: usize,
        available: usize,
    },

    #[error("{0} trailing bytes after record")]
    TrailingBytes(usize),

    #[error("{section} count {count} exceeds the remaining buffer")]
    EdgeCountOverflow { section: &'static str, count: u64 },
}

/// Fixed-size head of the record, everything before the edge lists
///
/// Total size: 80 bytes
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C, packed)]
pub struct RecordHeader {
    pub confidence: f64,
    pub timestamp: f64,
    pub image_width: i32,
    pub image_height: i32,
    pub center_x: f64,
    pub center_y: f64,
    pub major_radius: f64,
    pub minor_radius: f64,
    pub angle: f64,
    pub roi_x: i32,
    pub roi_y: i32,
    pub roi_width: i32,
    pub roi_height: i32,
}

impl RecordHeader {
    /// Header size in bytes
    pub const SIZE: usize = 80;

    fn from_result(result: &Detector2DResult) -> Self {
        Self {
            confidence: result.confidence,
            timestamp: result.timestamp,
            image_width: result.image_width,
            image_height: result.image_height,
            center_x: result.ellipse.center.x,
            center_y: result.ellipse.center.y,
            major_radius: result.ellipse.major_radius,
            minor_radius: result.ellipse.minor_radius,
            angle: result.ellipse.angle,
            roi_x: result.current_roi.x,
            roi_y: result.current_roi.y,
            roi_width: result.current_roi.width,
            roi_height: result.current_roi.height,
        }
    }
}

// SAFETY: RecordHeader is repr(C, packed) and all fields are Pod
unsafe impl Pod for RecordHeader {}
// SAFETY: RecordHeader is repr(C, packed) and all fields are Zeroable
unsafe impl Zeroable for RecordHeader {}

const COUNT_SIZE: usize = std::mem::size_of::<u64>();
const EDGE_SIZE: usize = std::mem::size_of::<EdgePoint>();

/// Number of bytes `result` occupies on the wire
pub fn encoded_len(result: &Detector2DResult) -> usize {
    RecordHeader::SIZE
        + 2 * COUNT_SIZE
        + EDGE_SIZE * (result.final_edges.len() + result.raw_edges.len())
}

/// Encode a result into a fresh buffer
pub fn encode(result: &Detector2DResult) -> Vec<u8> {
    let mut buf = Vec::with_capacity(encoded_len(result));
    encode_into(result, &mut buf);
    buf
}

/// Append the encoding of `result` to `buf`
pub fn encode_into(result: &Detector2DResult, buf: &mut Vec<u8>) {
    let header = RecordHeader::from_result(result);
    buf.extend_from_slice(bytemuck::bytes_of(&header));
    for edges in [&result.final_edges, &result.raw_edges] {
        buf.extend_from_slice(&(edges.len() as u64).to_ne_bytes());
        buf.extend_from_slice(bytemuck::cast_slice(edges.as_slice()));
    }
}

/// Decode a buffer holding exactly one record
///
/// # Errors
/// * `WireError::Truncated` - the buffer ends inside the record
/// * `WireError::EdgeCountOverflow` - an edge count cannot fit in the buffer
/// * `WireError::TrailingBytes` - bytes remain after the record
pub fn decode(bytes: &[u8]) -> Result<Detector2DResult, WireError> {
    let (result, consumed) = decode_prefix(bytes)?;
    if consumed != bytes.len() {
        return Err(WireError::TrailingBytes(bytes.len() - consumed));
    }
    Ok(result)
}

/// Decode one record from the front of `bytes`
///
/// Returns the record and the number of bytes it occupied, so concatenated
/// records can be walked.
pub fn decode_prefix(bytes: &[u8]) -> Result<(Detector2DResult, usize), WireError> {
    let mut reader = Reader::new(bytes);

    let header: RecordHeader =
        bytemuck::pod_read_unaligned(reader.take(RecordHeader::SIZE, "header")?);
    let final_edges = reader.edges("final_edges")?;
    let raw_edges = reader.edges("raw_edges")?;

    let result = Detector2DResult {
        confidence: header.confidence,
        ellipse: Ellipse {
            center: Vector2::new(header.center_x, header.center_y),
            major_radius: header.major_radius,
            minor_radius: header.minor_radius,
            angle: header.angle,
        },
        final_edges,
        raw_edges,
        current_roi: Roi::new(
            header.roi_x,
            header.roi_y,
            header.roi_width,
            header.roi_height,
        ),
        timestamp: header.timestamp,
        image_width: header.image_width,
        image_height: header.image_height,
    };
    Ok((result, reader.pos))
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, len: usize, section: &'static str) -> Result<&'a [u8], WireError> {
        if len > self.remaining() {
            return Err(WireError::Truncated {
                section,
                needed: len,
                available: self.remaining(),
            });
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn edges(&mut self, section: &'static str) -> Result<Vec<EdgePoint>, WireError> {
        let mut count_bytes = [0u8; COUNT_SIZE];
        count_bytes.copy_from_slice(self.take(COUNT_SIZE, section)?);
        let count = u64::from_ne_bytes(count_bytes);

        // Reject absurd counts before multiplying so a corrupt length cannot overflow
        let max_edges = (self.remaining() / EDGE_SIZE) as u64;
        if count > max_edges {
            return Err(WireError::EdgeCountOverflow { section, count });
        }
        let payload = self.take(count as usize * EDGE_SIZE, section)?;
        Ok(payload
            .chunks_exact(EDGE_SIZE)
            .map(bytemuck::pod_read_unaligned::<EdgePoint>)
            .collect())
    }
}
