use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Result};

use crate::{AliasTable, Layout, ModelArtifact, Tensor};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Platform {
    Tensorflow,
    Caffe,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Tensorflow => "tensorflow",
            Platform::Caffe => "caffe",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "tensorflow" => Ok(Platform::Tensorflow),
            "caffe" => Ok(Platform::Caffe),
            _ => bail!("unsupported platform: {raw} (expected tensorflow or caffe)"),
        }
    }
}

/// Minimum severity the reference framework itself should print.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum FrameworkLog {
    Info,
    #[default]
    Warn,
    Error,
    Fatal,
}

impl FrameworkLog {
    /// glog `minloglevel` value.
    pub fn glog_level(self) -> i32 {
        self as i32
    }
}

impl FromStr for FrameworkLog {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "info" => Ok(FrameworkLog::Info),
            "warn" | "warning" => Ok(FrameworkLog::Warn),
            "error" => Ok(FrameworkLog::Error),
            "fatal" => Ok(FrameworkLog::Fatal),
            _ => bail!("unknown framework log level: {raw}"),
        }
    }
}

/// Settings handed to a backend when it loads a model.
#[derive(Clone, Debug, Default)]
pub struct ReferenceOptions {
    pub framework_log: FrameworkLog,
}

#[derive(Clone, Copy, Debug)]
pub struct BackendCapabilities {
    pub layout: Layout,
    pub requires_output_shapes: bool,
}

pub trait Backend {
    type Model: BackendModel;

    fn platform(&self) -> Platform;
    fn load(&self, artifact: &ModelArtifact, options: &ReferenceOptions) -> Result<Self::Model>;
    fn capabilities(&self) -> BackendCapabilities;
}

pub trait BackendModel {
    /// Layer-to-blob aliases, for backends that publish tensors under
    /// another name than the node's.
    fn aliases(&self) -> Option<&AliasTable> {
        None
    }

    /// Inputs are already in the backend's layout and keyed by binding name.
    fn bind_inputs(&mut self, inputs: Vec<(String, Tensor)>) -> Result<()>;

    /// Runs the model once and returns one raw tensor per requested output,
    /// in request order.
    fn execute(&mut self, outputs: &[String]) -> Result<Vec<Tensor>>;
}
