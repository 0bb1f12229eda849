//! TensorFlow reference backend, running frozen `GraphDef`s in-process with
//! tract.
//!
//! Tensors are addressed the TensorFlow way, `<node>:0`: always the first
//! output of the named node.

use anyhow::{bail, ensure, Context, Result};
use macecheck_core::{
    Backend, BackendCapabilities, BackendModel, Layout, ModelArtifact, Platform,
    ReferenceOptions, Shape, Tensor,
};
use tract_tensorflow::prelude::{
    tvec, Datum, Framework, InferenceFact, InferenceModel, InferenceModelExt, OutletId, TValue,
    TVec,
};
use tracing::debug;

/// Output slot every bound or fetched tensor refers to.
const TENSOR_INDEX: usize = 0;

pub struct TfBackend;

impl TfBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TfBackend {
    fn default() -> Self {
        Self::new()
    }
}

pub struct TfModel {
    graph: InferenceModel,
    inputs: TVec<TValue>,
}

impl Backend for TfBackend {
    type Model = TfModel;

    fn platform(&self) -> Platform {
        Platform::Tensorflow
    }

    fn load(&self, artifact: &ModelArtifact, options: &ReferenceOptions) -> Result<Self::Model> {
        let ModelArtifact::TfGraphDef(path) = artifact else {
            bail!("tensorflow backend expects a frozen GraphDef file");
        };
        artifact.ensure_present()?;
        // tract reports through `log`; nothing to configure per load
        debug!(framework_log = ?options.framework_log, "loading tensorflow graph");

        let graph = tract_tensorflow::tensorflow()
            .model_for_path(path)
            .with_context(|| format!("failed to parse GraphDef {}", path.display()))?;
        debug!(nodes = graph.nodes().len(), "tensorflow graph loaded");

        Ok(TfModel {
            graph,
            inputs: tvec!(),
        })
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            layout: Layout::ChannelLast,
            requires_output_shapes: false,
        }
    }
}

impl TfModel {
    fn outlet(&self, name: &str) -> Result<OutletId> {
        let node = self
            .graph
            .node_by_name(name)
            .with_context(|| format!("graph has no tensor {name}:{TENSOR_INDEX}"))?;
        ensure!(
            TENSOR_INDEX < node.outputs.len(),
            "node {name} has no output {TENSOR_INDEX}"
        );
        Ok(OutletId::new(node.id, TENSOR_INDEX))
    }
}

impl BackendModel for TfModel {
    fn bind_inputs(&mut self, inputs: Vec<(String, Tensor)>) -> Result<()> {
        let mut outlets = Vec::with_capacity(inputs.len());
        let mut facts = Vec::with_capacity(inputs.len());
        let mut values = TVec::with_capacity(inputs.len());

        for (name, tensor) in inputs {
            outlets.push(self.outlet(&name)?);
            let dims = tensor.shape().dims().to_vec();
            facts.push(InferenceFact::dt_shape(f32::datum_type(), dims.clone()));
            let value = tract_tensorflow::prelude::Tensor::from_shape(&dims, tensor.data())
                .with_context(|| format!("input {name}"))?;
            values.push(value.into());
        }

        self.graph.set_input_outlets(&outlets)?;
        for (ix, fact) in facts.into_iter().enumerate() {
            self.graph.set_input_fact(ix, fact)?;
        }
        self.inputs = values;
        Ok(())
    }

    fn execute(&mut self, outputs: &[String]) -> Result<Vec<Tensor>> {
        let outlets = outputs
            .iter()
            .map(|name| self.outlet(name))
            .collect::<Result<Vec<_>>>()?;

        let mut graph = self.graph.clone();
        graph.set_output_outlets(&outlets)?;
        let plan = graph
            .into_optimized()
            .context("failed to optimize tensorflow graph")?
            .into_runnable()?;

        let values = plan
            .run(std::mem::take(&mut self.inputs))
            .context("tensorflow graph execution failed")?;
        ensure!(
            values.len() == outputs.len(),
            "graph produced {} outputs, expected {}",
            values.len(),
            outputs.len()
        );

        values
            .iter()
            .zip(outputs)
            .map(|(value, name)| {
                let view = value
                    .to_array_view::<f32>()
                    .with_context(|| format!("output {name}:{TENSOR_INDEX} is not f32"))?;
                Tensor::new(Shape::from_slice(view.shape()), view.iter().copied().collect())
            })
            .collect()
    }
}
