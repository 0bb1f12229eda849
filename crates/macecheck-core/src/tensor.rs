use std::fmt;
use std::str::FromStr;

use anyhow::{bail, ensure, Context, Result};
use ndarray::{ArrayD, IxDyn};
use smallvec::SmallVec;

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Shape(pub SmallVec<[usize; 6]>);

impl Shape {
    pub fn from_slice(d: &[usize]) -> Self {
        Self(d.iter().copied().collect())
    }
    pub fn dims(&self) -> &[usize] {
        &self.0
    }
    pub fn rank(&self) -> usize {
        self.0.len()
    }
    pub fn numel(&self) -> usize {
        self.0.iter().product::<usize>()
    }
    /// Element count, or `None` when it does not fit in `usize`.
    pub fn checked_numel(&self) -> Option<usize> {
        self.0.iter().try_fold(1usize, |n, &d| n.checked_mul(d))
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for d in &self.0 {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{d}")?;
            first = false;
        }
        Ok(())
    }
}

/// Parses `d0,d1,...` where every dim is a positive integer.
impl FromStr for Shape {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        ensure!(!raw.is_empty(), "empty shape");

        let mut dims = SmallVec::new();
        let mut numel: usize = 1;
        for part in raw.split(',') {
            let dim: usize = part
                .trim()
                .parse()
                .with_context(|| format!("invalid dimension {part:?} in shape {raw:?}"))?;
            if dim == 0 {
                bail!("dimension must be positive in shape {raw:?}");
            }
            numel = numel
                .checked_mul(dim)
                .with_context(|| format!("shape {raw:?} has too many elements"))?;
            dims.push(dim);
        }
        Ok(Self(dims))
    }
}

/// Dense row-major f32 tensor.
///
/// Reshape and permute always return a new tensor; the source is never touched.
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor {
    shape: Shape,
    data: Vec<f32>,
}

impl Tensor {
    pub fn new(shape: Shape, data: Vec<f32>) -> Result<Self> {
        let numel = shape
            .checked_numel()
            .with_context(|| format!("shape [{shape}] has too many elements"))?;
        ensure!(
            numel == data.len(),
            "shape [{shape}] needs {numel} elements, got {}",
            data.len()
        );
        Ok(Self { shape, data })
    }

    /// One-dimensional tensor over `data`.
    pub fn from_flat(data: Vec<f32>) -> Self {
        Self {
            shape: Shape::from_slice(&[data.len()]),
            data,
        }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn reshape(self, shape: Shape) -> Result<Self> {
        ensure!(
            shape.checked_numel() == Some(self.data.len()),
            "cannot reshape {} elements into [{shape}]",
            self.data.len()
        );
        Ok(Self {
            shape,
            data: self.data,
        })
    }

    pub fn flatten(self) -> Self {
        Self::from_flat(self.data)
    }

    /// Reorders axes so that output axis `i` is input axis `axes[i]`.
    pub fn permute(&self, axes: &[usize]) -> Result<Self> {
        ensure!(
            axes.len() == self.shape.rank(),
            "permutation {axes:?} does not match rank {} of [{}]",
            self.shape.rank(),
            self.shape
        );
        let mut seen = vec![false; axes.len()];
        for &axis in axes {
            ensure!(
                axis < seen.len() && !seen[axis],
                "{axes:?} is not a permutation"
            );
            seen[axis] = true;
        }

        let array = ArrayD::from_shape_vec(IxDyn(self.shape.dims()), self.data.clone())
            .context("tensor buffer does not match its shape")?;
        let permuted = array.permuted_axes(IxDyn(axes));

        Ok(Self {
            shape: Shape::from_slice(permuted.shape()),
            data: permuted.iter().copied().collect(),
        })
    }
}
