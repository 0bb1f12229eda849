use anyhow::Result;
use macecheck_backend_caffe::CaffeBackend;
use macecheck_backend_tf::TfBackend;
use macecheck_core::{
    validate, ModelArtifact, NodeSpec, Platform, ReferenceOptions, Validation, Verdict,
};

use crate::cli::Cli;

/// Builds the validation job for the selected platform.
pub fn job(cli: &Cli) -> Result<Validation> {
    let (artifact, output_shapes) = match cli.platform {
        Platform::Tensorflow => (ModelArtifact::TfGraphDef(cli.model_file.clone()), None),
        Platform::Caffe => (
            ModelArtifact::Caffe {
                topology: cli.model_file.clone(),
                weights: cli.weight_file.clone(),
            },
            Some(cli.output_shape.as_str()),
        ),
    };

    let nodes = NodeSpec::parse(
        &cli.input_node,
        &cli.input_shape,
        &cli.output_node,
        output_shapes,
    )?;

    Ok(Validation {
        artifact,
        options: ReferenceOptions {
            framework_log: cli.framework_log,
        },
        nodes,
        input_prefix: cli.input_file.clone(),
        dut_prefix: cli.mace_out_file.clone(),
        runtime: cli.mace_runtime,
    })
}

/// Runs `job` on the backend matching `cli.platform`.
pub fn run(
    cli: &Cli,
    job: &Validation,
    on_verdict: impl FnMut(&Verdict),
) -> Result<Vec<Verdict>> {
    match cli.platform {
        Platform::Tensorflow => validate(&TfBackend::new(), job, on_verdict),
        Platform::Caffe => {
            let backend = CaffeBackend::new(cli.caffe_bridge_addr.clone());
            validate(&backend, job, on_verdict)
        }
    }
}
