use anyhow::Result;
use macecheck_core::dump::{dump_path, load_dump, sanitize_name};
use macecheck_core::NodeSpec;

#[test]
fn missing_dump_is_empty() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let values = load_dump(dir.path().join("nope"))?;
    assert!(values.is_empty());
    Ok(())
}

#[test]
fn directory_is_not_a_dump() -> Result<()> {
    let dir = tempfile::tempdir()?;
    assert!(load_dump(dir.path())?.is_empty());
    Ok(())
}

#[test]
fn dump_of_k_floats_has_k_values() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let prefix = dir.path().join("out").display().to_string();
    let values: Vec<f32> = (0..7).map(|i| i as f32 * 0.5).collect();
    let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_ne_bytes()).collect();

    let path = dump_path(&prefix, "net/softmax:0");
    assert!(path.display().to_string().ends_with("out_net_softmax_0"));
    std::fs::write(&path, bytes)?;

    assert_eq!(load_dump(&path)?, values);
    Ok(())
}

#[test]
fn sanitize_matches_dump_naming() {
    assert_eq!(sanitize_name("a/b::c"), "a_b_c");
    assert_eq!(
        sanitize_name("MobilenetV1/Predictions/Reshape_1"),
        "MobilenetV1_Predictions_Reshape_1"
    );
}

#[test]
fn node_spec_pairs_names_with_shapes() -> Result<()> {
    let spec = NodeSpec::parse("a,b", "1,4,4,3:1,2", "out", None)?;
    assert_eq!(spec.inputs.len(), 2);
    assert_eq!(spec.inputs[0].name.as_str(), "a");
    assert_eq!(spec.inputs[0].shape.dims(), &[1, 4, 4, 3]);
    assert_eq!(spec.inputs[1].shape.dims(), &[1, 2]);
    assert_eq!(spec.outputs.len(), 1);
    assert!(spec.outputs[0].shape.is_none());
    Ok(())
}

#[test]
fn node_spec_rejects_count_mismatch() {
    let err = NodeSpec::parse("a,b", "1,4,4,3", "out", None).unwrap_err();
    assert!(err.to_string().contains("2 input nodes but 1 input shapes"));

    assert!(NodeSpec::parse("a", "1,4,4,3", "x,y", Some("1,2,2,1")).is_err());
    assert!(NodeSpec::parse("a", "1,4,a", "x", None).is_err());
}

#[test]
fn node_spec_keeps_output_shapes() -> Result<()> {
    let spec = NodeSpec::parse("data", "1,8,8,3", "prob,feat", Some("1,1,1,10:1,4,4,16"))?;
    let shapes: Vec<String> = spec
        .outputs
        .iter()
        .map(|o| o.shape.as_ref().map(ToString::to_string).unwrap_or_default())
        .collect();
    assert_eq!(shapes, vec!["1,1,1,10", "1,4,4,16"]);
    Ok(())
}
