use anyhow::Result;
use tracing::info;

use crate::dump::{dump_path, load_dump};
use crate::{
    compare_output, runner, Backend, ModelArtifact, NodeSpec, ReferenceOptions, Runtime, Tensor,
    Verdict,
};

/// One validation run: a model, its node spec and where the dumps live.
#[derive(Clone, Debug)]
pub struct Validation {
    pub artifact: ModelArtifact,
    pub options: ReferenceOptions,
    pub nodes: NodeSpec,
    /// Prefix of the input dumps fed to both runtimes.
    pub input_prefix: String,
    /// Prefix of the output dumps written by the device under test.
    pub dut_prefix: String,
    pub runtime: Runtime,
}

/// Runs the reference model and compares each output in order.
///
/// `on_verdict` sees every verdict as soon as it is made. Stops after the
/// first verdict that does not pass; the returned list ends with it.
pub fn validate<B: Backend>(
    backend: &B,
    job: &Validation,
    mut on_verdict: impl FnMut(&Verdict),
) -> Result<Vec<Verdict>> {
    let executed = runner::load(backend, &job.artifact, &job.options)?
        .bind(&job.input_prefix, &job.nodes.inputs)?
        .execute(&job.nodes.outputs)?;

    let mut verdicts = Vec::with_capacity(executed.outputs.len());
    for (name, reference) in &executed.outputs {
        let dut = Tensor::from_flat(load_dump(dump_path(&job.dut_prefix, name.as_str()))?);
        let verdict = compare_output(
            executed.platform,
            job.runtime,
            name.as_str(),
            reference,
            &dut,
        )?;
        info!(output = %name, outcome = ?verdict.outcome, similarity = ?verdict.similarity, "compared");
        on_verdict(&verdict);

        let passed = verdict.passed();
        verdicts.push(verdict);
        if !passed {
            break;
        }
    }
    Ok(verdicts)
}
