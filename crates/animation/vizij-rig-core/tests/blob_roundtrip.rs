use vizij_rig_core::{
    decode_clip, decode_rig, encode_clip, encode_rig, parse_clip_json, parse_rig_json, reverse,
    BlobError, RigError,
};

fn fixture_rig(name: &str) -> vizij_rig_core::RigDefinition {
    let json = vizij_test_fixtures::rigs::json(name).expect("rig fixture");
    parse_rig_json(&json).expect("parse rig")
}

fn fixture_clip(name: &str) -> vizij_rig_core::Clip {
    let json = vizij_test_fixtures::clips::json(name).expect("clip fixture");
    parse_clip_json(&json).expect("parse clip")
}

/// it should decode every fixture rig back to an identical definition
#[test]
fn rigs_survive_encode_decode() {
    for name in vizij_test_fixtures::rigs::keys() {
        let rig = fixture_rig(&name);
        let decoded = decode_rig(&encode_rig(&rig)).expect("decode rig");
        assert_eq!(decoded, rig, "rig {name}");
    }
}

/// it should decode every fixture clip, including partial-duration ones and reversed copies
#[test]
fn clips_survive_encode_decode() {
    for name in vizij_test_fixtures::clips::keys() {
        let clip = fixture_clip(&name);
        let decoded = decode_clip(&encode_clip(&clip)).expect("decode clip");
        assert_eq!(decoded, clip, "clip {name}");
        let rev = reverse(&clip).expect("reverse");
        assert_eq!(decode_clip(&encode_clip(&rev)).expect("decode reversed"), rev);
    }
}

/// it should detect a flipped sample through the embedded content hash
#[test]
fn corrupted_sample_is_rejected() {
    let clip = fixture_clip("head-sway");
    let mut bytes = encode_clip(&clip);
    // Last byte of the final sample's mantissa, just before the sync tags and name.
    let tail = clip.sync_tags().len() * 12 + clip.name().len();
    let at = bytes.len() - tail - 4;
    bytes[at] ^= 0x01;
    let err = decode_clip(&bytes).unwrap_err();
    assert!(
        matches!(err, RigError::Blob(BlobError::HashMismatch { .. })),
        "{err}"
    );
}

/// it should reject unknown versions and foreign magic
#[test]
fn header_checks() {
    let rig = fixture_rig("three-node");
    let mut bytes = encode_rig(&rig);
    bytes[4] = 99;
    assert!(matches!(
        decode_rig(&bytes),
        Err(RigError::Blob(BlobError::UnsupportedVersion(99)))
    ));
    let clip_bytes = encode_clip(&fixture_clip("child1-slide"));
    assert!(matches!(
        decode_rig(&clip_bytes),
        Err(RigError::Blob(BlobError::BadMagic { .. }))
    ));
}

/// it should reject truncated blobs without panicking
#[test]
fn truncation_is_reported() {
    let bytes = encode_rig(&fixture_rig("face"));
    for cut in [3, 20, 64, bytes.len() - 1] {
        let err = decode_rig(&bytes[..cut]).unwrap_err();
        assert!(matches!(err, RigError::Blob(_)), "cut {cut}: {err}");
    }
}

/// it should re-validate sorted bindings on decode
#[test]
fn unsorted_bindings_are_rejected() {
    let rig = fixture_rig("three-node");
    let mut bytes = encode_rig(&rig);
    // Swap the first two translation hashes (right after the node records).
    let start = 64 + rig.node_count() * 52;
    let (a, b) = (start, start + 4);
    for k in 0..4 {
        bytes.swap(a + k, b + k);
    }
    let err = decode_rig(&bytes).unwrap_err();
    assert!(matches!(err, RigError::UnsortedBindings { .. }), "{err}");
}
