//! Drives a reference backend through load, bind and execute.
//!
//! Each stage consumes the previous one, so a model can only be executed after
//! its inputs are bound.

use anyhow::{ensure, Context, Result};
use tracing::{debug, info};

use crate::dump::{dump_path, load_dump};
use crate::{
    Backend, BackendCapabilities, BackendModel, IOName, InputSpec, ModelArtifact, OutputSpec,
    Platform, ReferenceOptions, Tensor,
};

pub struct Loaded<M> {
    model: M,
    platform: Platform,
    caps: BackendCapabilities,
}

pub struct Bound<M> {
    model: M,
    platform: Platform,
    caps: BackendCapabilities,
}

/// Reference outputs in canonical layout, in declaration order.
#[derive(Debug)]
pub struct Executed {
    pub platform: Platform,
    pub outputs: Vec<(IOName, Tensor)>,
}

pub fn load<B: Backend>(
    backend: &B,
    artifact: &ModelArtifact,
    options: &ReferenceOptions,
) -> Result<Loaded<B::Model>> {
    let platform = backend.platform();
    info!(%platform, ?artifact, "loading reference model");
    let model = backend.load(artifact, options)?;
    Ok(Loaded {
        model,
        platform,
        caps: backend.capabilities(),
    })
}

impl<M: BackendModel> Loaded<M> {
    /// Loads `<input_prefix>_<name>` for every input and binds it.
    pub fn bind(mut self, input_prefix: &str, inputs: &[InputSpec]) -> Result<Bound<M>> {
        let mut bound = Vec::with_capacity(inputs.len());
        for input in inputs {
            let path = dump_path(input_prefix, input.name.as_str());
            let canonical = Tensor::from_flat(load_dump(&path)?)
                .reshape(input.shape.clone())
                .with_context(|| {
                    format!("input {} from {}", input.name, path.display())
                })?;
            let tensor = self.caps.layout.to_backend(canonical)?;
            let binding = resolve(&self.model, input.name.as_str())?;
            debug!(input = %input.name, %binding, shape = %tensor.shape(), "binding input");
            bound.push((binding, tensor));
        }

        self.model.bind_inputs(bound)?;
        Ok(Bound {
            model: self.model,
            platform: self.platform,
            caps: self.caps,
        })
    }
}

impl<M: BackendModel> Bound<M> {
    pub fn execute(mut self, outputs: &[OutputSpec]) -> Result<Executed> {
        if self.caps.requires_output_shapes {
            for output in outputs {
                ensure!(
                    output.shape.is_some(),
                    "{} needs a declared shape for output {}",
                    self.platform,
                    output.name
                );
            }
        }

        let bindings = outputs
            .iter()
            .map(|output| resolve(&self.model, output.name.as_str()))
            .collect::<Result<Vec<_>>>()?;

        let raw = self.model.execute(&bindings)?;
        ensure!(
            raw.len() == outputs.len(),
            "{} returned {} outputs, expected {}",
            self.platform,
            raw.len(),
            outputs.len()
        );

        let mut canonical = Vec::with_capacity(raw.len());
        for (output, tensor) in outputs.iter().zip(raw) {
            let tensor = self
                .caps
                .layout
                .from_backend(tensor, output.shape.as_ref())
                .with_context(|| format!("output {}", output.name))?;
            debug!(output = %output.name, shape = %tensor.shape(), "reference output ready");
            canonical.push((output.name.clone(), tensor));
        }

        Ok(Executed {
            platform: self.platform,
            outputs: canonical,
        })
    }
}

fn resolve<M: BackendModel>(model: &M, name: &str) -> Result<String> {
    match model.aliases() {
        Some(aliases) => Ok(aliases.resolve(name)?.into_owned()),
        None => Ok(name.to_string()),
    }
}
