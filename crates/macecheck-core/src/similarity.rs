use std::fmt;
use std::str::FromStr;

use anyhow::{bail, ensure, Result};

use crate::{Platform, Tensor};

/// Device class the tensors under test were produced on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Runtime {
    Cpu,
    Gpu,
    Dsp,
}

impl Runtime {
    /// Similarity must be strictly above this to pass.
    pub fn threshold(self) -> f64 {
        match self {
            Runtime::Cpu => 0.999,
            Runtime::Gpu => 0.995,
            Runtime::Dsp => 0.930,
        }
    }

    pub fn accepts(self, similarity: f64) -> bool {
        similarity > self.threshold()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Runtime::Cpu => "cpu",
            Runtime::Gpu => "gpu",
            Runtime::Dsp => "dsp",
        }
    }
}

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Runtime {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "cpu" => Ok(Runtime::Cpu),
            "gpu" => Ok(Runtime::Gpu),
            "dsp" => Ok(Runtime::Dsp),
            _ => bail!("no similarity threshold for runtime {raw:?} (expected cpu, gpu or dsp)"),
        }
    }
}

/// `1 - cosine_distance(a, b)`, accumulated in f64.
///
/// NaN when either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64> {
    ensure!(
        a.len() == b.len(),
        "element count mismatch: {} vs {}",
        a.len(),
        b.len()
    );

    let (mut dot, mut aa, mut bb) = (0.0f64, 0.0f64, 0.0f64);
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        aa += x * x;
        bb += y * y;
    }
    Ok(dot / (aa * bb).sqrt())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    Failed,
    /// The device under test produced no data for the output.
    Empty,
}

#[derive(Clone, Debug)]
pub struct Verdict {
    pub name: String,
    pub platform: Platform,
    pub runtime: Runtime,
    pub similarity: Option<f64>,
    pub outcome: Outcome,
}

impl Verdict {
    pub fn passed(&self) -> bool {
        self.outcome == Outcome::Passed
    }

    /// Report lines as printed on stdout.
    pub fn report(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(2);
        if let Some(similarity) = self.similarity {
            lines.push(format!(
                "{} MACE VS {} similarity: {:?}",
                self.name,
                self.platform.as_str().to_uppercase(),
                similarity
            ));
        }
        lines.push(self.outcome.banner().to_string());
        lines
    }
}

impl Outcome {
    fn banner(self) -> &'static str {
        match self {
            Outcome::Passed => "===================Similarity Test Passed==================",
            Outcome::Failed => "===================Similarity Test Failed==================",
            Outcome::Empty => "=======================Skip empty node===================",
        }
    }
}

/// Scores the device-under-test output against the reference output.
///
/// An empty `dut` always fails. Differing element counts are an error rather
/// than a verdict.
pub fn compare_output(
    platform: Platform,
    runtime: Runtime,
    name: &str,
    reference: &Tensor,
    dut: &Tensor,
) -> Result<Verdict> {
    if dut.is_empty() {
        return Ok(Verdict {
            name: name.to_string(),
            platform,
            runtime,
            similarity: None,
            outcome: Outcome::Empty,
        });
    }

    ensure!(
        reference.len() == dut.len(),
        "output {name}: reference has {} elements ([{}]), device output has {}",
        reference.len(),
        reference.shape(),
        dut.len()
    );

    let similarity = cosine_similarity(reference.data(), dut.data())?;
    let outcome = if runtime.accepts(similarity) {
        Outcome::Passed
    } else {
        Outcome::Failed
    };

    Ok(Verdict {
        name: name.to_string(),
        platform,
        runtime,
        similarity: Some(similarity),
        outcome,
    })
}
