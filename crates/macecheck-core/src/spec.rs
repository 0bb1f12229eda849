use std::fmt;

use anyhow::{ensure, Context, Result};

use crate::Shape;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IOName(pub String);

impl IOName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IOName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputSpec {
    pub name: IOName,
    pub shape: Shape,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputSpec {
    pub name: IOName,
    /// Declared channel-last shape. Only backends that cannot report the
    /// canonical shape themselves need it.
    pub shape: Option<Shape>,
}

/// Inputs and outputs to validate, in declaration order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeSpec {
    pub inputs: Vec<InputSpec>,
    pub outputs: Vec<OutputSpec>,
}

impl NodeSpec {
    /// Builds the spec from the command-line strings.
    ///
    /// `input_nodes` and `output_nodes` are comma separated. Shapes are colon
    /// separated lists of comma separated dims. `output_shapes` is only given
    /// when the backend needs declared output shapes.
    pub fn parse(
        input_nodes: &str,
        input_shapes: &str,
        output_nodes: &str,
        output_shapes: Option<&str>,
    ) -> Result<Self> {
        let input_names = parse_names(input_nodes);
        let input_shapes = parse_shapes(input_shapes).context("invalid input shape")?;
        ensure!(
            input_names.len() == input_shapes.len(),
            "{} input nodes but {} input shapes",
            input_names.len(),
            input_shapes.len()
        );

        let output_names = parse_names(output_nodes);
        let output_shapes = match output_shapes {
            Some(raw) => {
                let shapes = parse_shapes(raw).context("invalid output shape")?;
                ensure!(
                    output_names.len() == shapes.len(),
                    "{} output nodes but {} output shapes",
                    output_names.len(),
                    shapes.len()
                );
                shapes.into_iter().map(Some).collect()
            }
            None => vec![None; output_names.len()],
        };

        let inputs = input_names
            .into_iter()
            .zip(input_shapes)
            .map(|(name, shape)| InputSpec { name, shape })
            .collect();
        let outputs = output_names
            .into_iter()
            .zip(output_shapes)
            .map(|(name, shape)| OutputSpec { name, shape })
            .collect();

        Ok(Self { inputs, outputs })
    }
}

fn parse_names(raw: &str) -> Vec<IOName> {
    raw.split(',').map(|name| IOName(name.to_string())).collect()
}

fn parse_shapes(raw: &str) -> Result<Vec<Shape>> {
    raw.split(':').map(str::parse).collect()
}
