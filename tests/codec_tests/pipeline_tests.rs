//! Tests for the Codec Pipeline
//!
//! These tests verify:
//! - decode(encode(v)) == v for every serializer/compressor pairing
//! - Compression is skipped below the size threshold without breaking decode
//! - Integers travel as ASCII decimal
//! - Codec failures map to the right error kind

use std::collections::BTreeMap;

use shardcache::codec::{
    Codec, Compressor, CompressorKind, GzipCompressor, JsonSerializer, Serializer, SerializerKind,
    Value,
};
use shardcache::config::ClientConfig;
use shardcache::CacheError;

// =============================================================================
// Helper Functions
// =============================================================================

const ALL_SERIALIZERS: [SerializerKind; 2] = [SerializerKind::Bincode, SerializerKind::Json];
const ALL_COMPRESSORS: [CompressorKind; 4] = [
    CompressorKind::None,
    CompressorKind::Gzip,
    CompressorKind::Lz4,
    CompressorKind::Zstd,
];

fn codec(serializer: SerializerKind, compressor: CompressorKind, min_size: usize) -> Codec {
    Codec::new(serializer.build(), compressor.build(), min_size)
}

fn sample_values() -> Vec<Value> {
    let mut map = BTreeMap::new();
    map.insert("id".to_string(), Value::Int(7));
    map.insert("name".to_string(), Value::from("widget"));
    map.insert("price".to_string(), Value::Float(9.75));

    vec![
        Value::Nil,
        Value::Bool(true),
        Value::Int(0),
        Value::Int(i64::MIN),
        Value::Float(-0.5),
        Value::Float(f64::INFINITY),
        Value::Float(f64::NEG_INFINITY),
        Value::from(""),
        Value::from("héllo wörld"),
        Value::bytes(vec![0u8, 1, 2, 255]),
        Value::List(vec![Value::Int(1), Value::from("two"), Value::Nil]),
        Value::List(vec![Value::Float(f64::INFINITY), Value::Float(1.5)]),
        Value::Map(map),
        Value::from("x".repeat(4096)),
    ]
}

// =============================================================================
// Round-trip Tests
// =============================================================================

#[test]
fn test_round_trip_without_compression_triggered() {
    for serializer in ALL_SERIALIZERS {
        for compressor in ALL_COMPRESSORS {
            let codec = codec(serializer, compressor, usize::MAX);
            for value in sample_values() {
                let encoded = codec.encode(&value).unwrap();
                assert_eq!(
                    codec.decode(&encoded).unwrap(),
                    value,
                    "{:?}/{:?}",
                    serializer,
                    compressor
                );
            }
        }
    }
}

#[test]
fn test_round_trip_with_compression_triggered() {
    for serializer in ALL_SERIALIZERS {
        for compressor in ALL_COMPRESSORS {
            let codec = codec(serializer, compressor, 0);
            for value in sample_values() {
                let encoded = codec.encode(&value).unwrap();
                assert_eq!(
                    codec.decode(&encoded).unwrap(),
                    value,
                    "{:?}/{:?}",
                    serializer,
                    compressor
                );
            }
        }
    }
}

#[test]
fn test_large_payload_is_compressed_and_smaller() {
    let codec = codec(SerializerKind::Bincode, CompressorKind::Zstd, 15);
    let value = Value::from("abc".repeat(1000));

    let encoded = codec.encode(&value).unwrap();
    assert_eq!(encoded[0], 0x01);
    assert!(encoded.len() < 3000);
}

#[test]
fn test_payload_below_threshold_is_raw() {
    let codec = codec(SerializerKind::Json, CompressorKind::Gzip, 1024);
    let encoded = codec.encode(&Value::from("short")).unwrap();

    assert_eq!(encoded[0], 0x00);
    assert_eq!(&encoded[1..], br#"{"Str":"short"}"#);
}

#[test]
fn test_noop_compressor_never_tags_compressed() {
    let codec = codec(SerializerKind::Bincode, CompressorKind::None, 0);
    let encoded = codec.encode(&Value::from("y".repeat(100))).unwrap();
    assert_eq!(encoded[0], 0x00);
}

// =============================================================================
// Float Tests
// =============================================================================

#[test]
fn test_nan_round_trips_under_every_serializer() {
    for serializer in ALL_SERIALIZERS {
        let codec = codec(serializer, CompressorKind::None, usize::MAX);
        let mut map = BTreeMap::new();
        map.insert("score".to_string(), Value::Float(f64::NAN));

        let decoded = codec.decode(&codec.encode(&Value::Float(f64::NAN)).unwrap()).unwrap();
        assert!(decoded.as_float().unwrap().is_nan(), "{:?}", serializer);

        match codec.decode(&codec.encode(&Value::Map(map)).unwrap()).unwrap() {
            Value::Map(decoded) => assert!(decoded["score"].as_float().unwrap().is_nan()),
            other => panic!("Expected map, got {:?}", other),
        }
    }
}

#[test]
fn test_json_writes_non_finite_floats_as_text() {
    let codec = codec(SerializerKind::Json, CompressorKind::None, usize::MAX);

    let encoded = codec.encode(&Value::Float(f64::NEG_INFINITY)).unwrap();
    assert_eq!(&encoded[1..], br#"{"Float":"-inf"}"#);

    let encoded = codec.encode(&Value::Float(2.5)).unwrap();
    assert_eq!(&encoded[1..], br#"{"Float":2.5}"#);
}

#[test]
fn test_json_rejects_unknown_float_text() {
    let codec = codec(SerializerKind::Json, CompressorKind::None, 0);
    let mut payload = vec![0x00];
    payload.extend_from_slice(br#"{"Float":"lots"}"#);
    assert!(matches!(codec.decode(&payload), Err(CacheError::Serialization(_))));
}

// =============================================================================
// Integer Tests
// =============================================================================

#[test]
fn test_integers_are_ascii_regardless_of_codec() {
    for compressor in ALL_COMPRESSORS {
        let codec = codec(SerializerKind::Json, compressor, 0);
        assert_eq!(codec.encode(&Value::Int(12345)).unwrap(), b"12345".to_vec());
        assert_eq!(codec.decode(b"-9").unwrap(), Value::Int(-9));
    }
}

#[test]
fn test_numeric_looking_string_stays_string() {
    let codec = codec(SerializerKind::Bincode, CompressorKind::None, 0);
    let value = Value::from("12345");
    assert_eq!(codec.decode(&codec.encode(&value).unwrap()).unwrap(), value);
}

// =============================================================================
// Error Tests
// =============================================================================

#[test]
fn test_corrupt_serialized_body_is_serialization_error() {
    let codec = codec(SerializerKind::Json, CompressorKind::None, 0);
    let result = codec.decode(&[0x00, b'{', b'{']);
    assert!(matches!(result, Err(CacheError::Serialization(_))));
}

#[test]
fn test_corrupt_compressed_body_is_compression_error() {
    for compressor in [CompressorKind::Gzip, CompressorKind::Lz4, CompressorKind::Zstd] {
        let codec = codec(SerializerKind::Bincode, compressor, 0);
        // compressed tag, then a body no compressor accepts
        let result = codec.decode(&[0x01, 0x05, 0x00, 0x00, 0x00, 0xff, 0xff]);
        assert!(
            matches!(result, Err(CacheError::Compression(_))),
            "{:?}: {:?}",
            compressor,
            result
        );
    }
}

#[test]
fn test_empty_payload_is_serialization_error() {
    let codec = codec(SerializerKind::Bincode, CompressorKind::None, 0);
    assert!(matches!(codec.decode(&[]), Err(CacheError::Serialization(_))));
}

// =============================================================================
// Configuration Tests
// =============================================================================

#[test]
fn test_kinds_parse_from_config_ids() {
    assert_eq!("JSON".parse::<SerializerKind>().unwrap(), SerializerKind::Json);
    assert_eq!("lz4".parse::<CompressorKind>().unwrap(), CompressorKind::Lz4);
    assert!(matches!(
        "pickle".parse::<SerializerKind>(),
        Err(CacheError::Config(_))
    ));
}

#[test]
fn test_codec_from_config() {
    let config = ClientConfig::builder()
        .serializer(SerializerKind::Json)
        .compressor(CompressorKind::Gzip)
        .compression_min_size(0)
        .build();
    let codec = Codec::from_config(&config);

    let value = Value::from("configured");
    let encoded = codec.encode(&value).unwrap();
    assert_eq!(encoded[0], 0x01);
    assert_eq!(codec.decode(&encoded).unwrap(), value);
}

#[test]
fn test_custom_strategies_plug_in() {
    let gzip = GzipCompressor::default();
    let json = JsonSerializer;
    let raw = json.serialize(&Value::Bool(false)).unwrap();
    assert_eq!(json.deserialize(&gzip.decompress(&gzip.compress(&raw).unwrap()).unwrap()).unwrap(), Value::Bool(false));

    let codec = Codec::new(Box::new(json), Box::new(gzip), 0);
    assert_eq!(codec.decode(&codec.encode(&Value::Bool(false)).unwrap()).unwrap(), Value::Bool(false));
}
