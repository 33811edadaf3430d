//! Wire-format round trips and corrupt-buffer handling for 2D results

use eye_math::Ellipse;
use nalgebra::Vector2;
use pupil_shared::wire::{decode, decode_prefix, encode, encode_into};
use pupil_shared::{Detector2DResult, EdgePoint, Roi, WireError};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn random_edges(rng: &mut ChaCha8Rng, count: usize) -> Vec<EdgePoint> {
    (0..count)
        .map(|_| EdgePoint::new(rng.random_range(-500..500), rng.random_range(-500..500)))
        .collect()
}

fn random_result(rng: &mut ChaCha8Rng, n_final: usize, n_raw: usize) -> Detector2DResult {
    Detector2DResult {
        confidence: rng.random_range(0.0..1.0),
        ellipse: Ellipse::new(
            Vector2::new(rng.random_range(0.0..400.0), rng.random_range(0.0..400.0)),
            rng.random_range(10.0..40.0),
            rng.random_range(5.0..10.0),
            rng.random_range(-3.0..3.0),
        ),
        final_edges: random_edges(rng, n_final),
        raw_edges: random_edges(rng, n_raw),
        current_roi: Roi::new(
            rng.random_range(0..100),
            rng.random_range(0..100),
            rng.random_range(1..300),
            rng.random_range(1..300),
        ),
        timestamp: rng.random_range(0.0..1e6),
        image_width: 400,
        image_height: 400,
    }
}

#[test]
fn test_roundtrip_is_bit_exact_for_edge_list_lengths() {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    for (n_final, n_raw) in [(0, 0), (1, 0), (0, 1), (1, 1), (17, 243)] {
        let result = random_result(&mut rng, n_final, n_raw);
        let decoded = decode(&encode(&result)).unwrap();

        assert_eq!(decoded.confidence.to_bits(), result.confidence.to_bits());
        assert_eq!(decoded.timestamp.to_bits(), result.timestamp.to_bits());
        assert_eq!(
            decoded.ellipse.angle.to_bits(),
            result.ellipse.angle.to_bits()
        );
        assert_eq!(decoded.final_edges, result.final_edges);
        assert_eq!(decoded.raw_edges, result.raw_edges);
        assert_eq!(decoded, result);
    }
}

#[test]
fn test_roundtrip_through_record_methods() {
    let mut rng = ChaCha8Rng::seed_from_u64(99);
    let result = random_result(&mut rng, 3, 9);
    assert_eq!(Detector2DResult::from_bytes(&result.to_bytes()).unwrap(), result);
}

#[test]
fn test_every_truncation_is_rejected() {
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    let bytes = encode(&random_result(&mut rng, 2, 3));
    for len in 0..bytes.len() {
        match decode(&bytes[..len]) {
            Err(WireError::Truncated { .. }) | Err(WireError::EdgeCountOverflow { .. }) => {}
            other => panic!("length {len} decoded to {other:?}"),
        }
    }
}

#[test]
fn test_concatenated_records_walk() {
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    let records: Vec<_> = (0..5)
        .map(|i| random_result(&mut rng, i, 2 * i))
        .collect();

    let mut stream = Vec::new();
    for record in &records {
        encode_into(record, &mut stream);
    }

    let mut offset = 0;
    let mut decoded = Vec::new();
    while offset < stream.len() {
        let (record, consumed) = decode_prefix(&stream[offset..]).unwrap();
        decoded.push(record);
        offset += consumed;
    }
    assert_eq!(decoded, records);
}
