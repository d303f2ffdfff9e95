use vizij_rig_core::{
    parse_clip_json, parse_rig_json, ChannelKind, Config, RotationInterp, StringHash,
};

fn approx(a: f32, b: f32, eps: f32) {
    assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
}

/// it should parse every rig and clip listed in the fixture manifest
#[test]
fn all_fixtures_parse() {
    for name in vizij_test_fixtures::rigs::keys() {
        let json = vizij_test_fixtures::rigs::json(&name).expect("rig fixture");
        parse_rig_json(&json).unwrap_or_else(|e| panic!("rig {name}: {e}"));
    }
    for name in vizij_test_fixtures::clips::keys() {
        let json = vizij_test_fixtures::clips::json(&name).expect("clip fixture");
        parse_clip_json(&json).unwrap_or_else(|e| panic!("clip {name}: {e}"));
    }
}

/// it should lay out the three-node rig by hash with node defaults in place
#[test]
fn three_node_layout() {
    let json = vizij_test_fixtures::rigs::json("three-node").expect("fixture");
    let rig = parse_rig_json(&json).expect("rig");
    assert_eq!(rig.node_count(), 3);
    assert_eq!(rig.channel_count(), 3 * 3 + 2);
    assert_eq!(rig.curve_count(), 3 * 10 + 2);
    let child1 = rig.node_channels(1).expect("Child1");
    assert_eq!(child1.translation, 1);
    let t = &rig.default_values()[child1.translation * 3..child1.translation * 3 + 3];
    assert_eq!(t, &[1.0, 0.0, 0.0]);
    let weight = rig
        .bindings()
        .find(ChannelKind::Float, StringHash::new("weight"))
        .expect("weight");
    approx(
        rig.default_values()[rig.bindings().curve_offset(ChannelKind::Float) + weight],
        1.0,
        0.0,
    );
}

/// it should build duration-based clips with a partial final frame
#[test]
fn partial_duration_clip() {
    let json = vizij_test_fixtures::clips::json("blink-partial").expect("fixture");
    let clip = parse_clip_json(&json).expect("clip");
    assert_eq!(clip.frame_count(), 3);
    assert_eq!(clip.row_count(), 4);
    approx(clip.duration(), 0.25, 1e-7);
    // Tags are sorted on build.
    let times: Vec<f32> = clip.sync_tags().iter().map(|t| t.normalized_time).collect();
    assert_eq!(times, vec![0.2, 0.8]);
    let pos = clip.frame_position(0.225).expect("position");
    assert_eq!((pos.f0, pos.f1), (2, 3));
    approx(pos.t, 0.5, 1e-4);
    let last = clip.channel_sample(ChannelKind::Float, 0, 3).expect("last row");
    approx(last[0], 0.5, 0.0);
}

/// it should load evaluation options from JSON config
#[test]
fn config_from_json() {
    let cfg = Config::from_json_str(
        r#"{ "instanceCacheCapacity": 8, "evaluation": { "rotationInterpolation": "slerp" } }"#,
    )
    .expect("config");
    assert_eq!(cfg.instance_cache_capacity, 8);
    assert_eq!(cfg.evaluation.rotation_interpolation, RotationInterp::Slerp);
}
