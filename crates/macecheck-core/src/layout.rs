use std::borrow::Cow;
use std::collections::HashMap;

use anyhow::{bail, ensure, Result};

use crate::{Shape, Tensor};

const NHWC_TO_NCHW: [usize; 4] = [0, 3, 1, 2];
const NCHW_TO_NHWC: [usize; 4] = [0, 2, 3, 1];

/// Axis order a reference backend reads and writes.
///
/// Dumps from the device under test are always channel-last (N,H,W,C).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Layout {
    ChannelLast,
    ChannelFirst,
}

impl Layout {
    /// Converts a canonical input, already shaped to its declared shape, into
    /// the layout the backend expects.
    pub fn to_backend(self, canonical: Tensor) -> Result<Tensor> {
        match self {
            Layout::ChannelLast => Ok(canonical),
            Layout::ChannelFirst => {
                require_rank4(canonical.shape())?;
                canonical.permute(&NHWC_TO_NCHW)
            }
        }
    }

    /// Converts a raw backend output back to canonical layout.
    ///
    /// Channel-first backends need the declared channel-last `shape`: the raw
    /// buffer is laid out as that shape with its last three dims rotated to
    /// (C,H,W).
    pub fn from_backend(self, raw: Tensor, declared: Option<&Shape>) -> Result<Tensor> {
        match self {
            Layout::ChannelLast => Ok(raw),
            Layout::ChannelFirst => {
                let Some(declared) = declared else {
                    bail!("channel-first outputs need a declared output shape");
                };
                require_rank4(declared)?;
                let d = declared.dims();
                let native = Shape::from_slice(&[d[0], d[3], d[1], d[2]]);
                raw.reshape(native)?.permute(&NCHW_TO_NHWC)
            }
        }
    }
}

fn require_rank4(shape: &Shape) -> Result<()> {
    ensure!(
        shape.rank() == 4,
        "only rank-4 tensors can change channel order, got [{shape}]"
    );
    Ok(())
}

/// Maps a layer name to the blobs it publishes, in registration order.
///
/// Some backends expose a node's data through its first top blob rather than
/// under the node name itself.
#[derive(Clone, Debug, Default)]
pub struct AliasTable {
    tops: HashMap<String, Vec<String>>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, layer: impl Into<String>, tops: Vec<String>) {
        self.tops.insert(layer.into(), tops);
    }

    /// Looks the name up in the table first, then falls back to the raw name.
    ///
    /// A layer that is registered without any top blob is an error.
    pub fn resolve<'a>(&'a self, name: &'a str) -> Result<Cow<'a, str>> {
        match self.tops.get(name) {
            None => Ok(Cow::Borrowed(name)),
            Some(tops) => match tops.first() {
                Some(top) => Ok(Cow::Borrowed(top.as_str())),
                None => bail!("layer {name:?} is registered without any top blob"),
            },
        }
    }
}

impl FromIterator<(String, Vec<String>)> for AliasTable {
    fn from_iter<I: IntoIterator<Item = (String, Vec<String>)>>(iter: I) -> Self {
        Self {
            tops: iter.into_iter().collect(),
        }
    }
}
