use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

#[derive(Clone, Debug)]
pub enum ModelArtifact {
    /// Frozen TensorFlow `GraphDef`.
    TfGraphDef(PathBuf),
    /// Caffe network topology (prototxt) plus trained weights (caffemodel).
    Caffe { topology: PathBuf, weights: PathBuf },
}

impl ModelArtifact {
    /// Fails unless every file the artifact names exists.
    pub fn ensure_present(&self) -> Result<()> {
        match self {
            ModelArtifact::TfGraphDef(graph) => require_file("graph", graph),
            ModelArtifact::Caffe { topology, weights } => {
                require_file("graph", topology)?;
                require_file("weight", weights)
            }
        }
    }
}

fn require_file(kind: &str, path: &Path) -> Result<()> {
    if !path.is_file() {
        bail!("Input {kind} file '{}' does not exist!", path.display());
    }
    Ok(())
}
