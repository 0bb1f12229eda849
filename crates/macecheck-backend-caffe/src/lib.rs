//! Caffe reference backend.
//!
//! Caffe has no native Rust runtime, so networks live in a bridge process
//! hosting pycaffe, reached over gRPC. The backend owns a current-thread Tokio
//! runtime and blocks on every call.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use macecheck_core::{
    AliasTable, Backend, BackendCapabilities, BackendModel, Layout, ModelArtifact, Platform,
    ReferenceOptions, Shape, Tensor,
};
use macecheck_proto::caffe::v1 as pb;
use macecheck_proto::caffe::v1::caffe_bridge_client::CaffeBridgeClient;
use tokio::runtime::Runtime;
use tonic::transport::{Channel, Endpoint};
use tracing::{debug, warn};

pub const DEFAULT_BRIDGE_ADDR: &str = "http://127.0.0.1:50071";

pub struct CaffeBackend {
    addr: String,
    timeout: Duration,
}

impl CaffeBackend {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for CaffeBackend {
    fn default() -> Self {
        Self::new(DEFAULT_BRIDGE_ADDR)
    }
}

pub struct CaffeModel {
    runtime: Runtime,
    client: CaffeBridgeClient<Channel>,
    net_id: String,
    aliases: AliasTable,
}

impl Backend for CaffeBackend {
    type Model = CaffeModel;

    fn platform(&self) -> Platform {
        Platform::Caffe
    }

    fn load(&self, artifact: &ModelArtifact, options: &ReferenceOptions) -> Result<Self::Model> {
        let ModelArtifact::Caffe { topology, weights } = artifact else {
            bail!("caffe backend expects a prototxt and caffemodel pair");
        };
        artifact.ensure_present()?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("failed to start caffe bridge runtime")?;

        let endpoint = Endpoint::from_shared(self.addr.clone())
            .context("invalid caffe bridge address")?
            .timeout(self.timeout);
        let channel = runtime
            .block_on(endpoint.connect())
            .with_context(|| format!("failed to connect to caffe bridge at {}", self.addr))?;
        let mut client = CaffeBridgeClient::new(channel);

        let request = pb::LoadNetRequest {
            topology_path: topology.display().to_string(),
            weights_path: weights.display().to_string(),
            phase: pb::Phase::Test as i32,
            mode: pb::Mode::Cpu as i32,
            glog_min_level: options.framework_log.glog_level(),
        };
        let response = runtime
            .block_on(client.load_net(request))
            .with_context(|| format!("caffe bridge failed to load {}", topology.display()))?
            .into_inner();

        debug!(net_id = %response.net_id, layers = response.layers.len(), "caffe net loaded");
        let aliases = response
            .layers
            .into_iter()
            .map(|layer| (layer.layer, layer.tops))
            .collect();

        Ok(CaffeModel {
            runtime,
            client,
            net_id: response.net_id,
            aliases,
        })
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            layout: Layout::ChannelFirst,
            requires_output_shapes: true,
        }
    }
}

impl BackendModel for CaffeModel {
    fn aliases(&self) -> Option<&AliasTable> {
        Some(&self.aliases)
    }

    fn bind_inputs(&mut self, inputs: Vec<(String, Tensor)>) -> Result<()> {
        for (blob, tensor) in inputs {
            let request = pb::SetBlobRequest {
                net_id: self.net_id.clone(),
                batch_index: 0,
                blob: Some(tensor_to_pb(&blob, tensor)),
            };
            self.runtime
                .block_on(self.client.set_blob(request))
                .with_context(|| format!("failed to set caffe blob {blob}"))?;
        }
        Ok(())
    }

    fn execute(&mut self, outputs: &[String]) -> Result<Vec<Tensor>> {
        let forward = pb::ForwardRequest {
            net_id: self.net_id.clone(),
        };
        self.runtime
            .block_on(self.client.forward(forward))
            .context("caffe forward pass failed")?;

        let mut tensors = Vec::with_capacity(outputs.len());
        for name in outputs {
            let request = pb::GetBlobRequest {
                net_id: self.net_id.clone(),
                name: name.clone(),
            };
            let blob = self
                .runtime
                .block_on(self.client.get_blob(request))
                .with_context(|| format!("failed to read caffe blob {name}"))?
                .into_inner();
            tensors.push(pb_to_tensor(blob)?);
        }
        Ok(tensors)
    }
}

impl Drop for CaffeModel {
    fn drop(&mut self) {
        let request = pb::ReleaseNetRequest {
            net_id: self.net_id.clone(),
        };
        if let Err(err) = self.runtime.block_on(self.client.release_net(request)) {
            warn!(net_id = %self.net_id, error = %err, "failed to release caffe net");
        }
    }
}

fn tensor_to_pb(name: &str, tensor: Tensor) -> pb::Blob {
    pb::Blob {
        name: name.to_string(),
        shape: tensor.shape().dims().iter().map(|d| *d as i64).collect(),
        data: tensor.into_data(),
    }
}

fn pb_to_tensor(blob: pb::Blob) -> Result<Tensor> {
    let dims = blob
        .shape
        .iter()
        .map(|d| usize::try_from(*d).with_context(|| format!("blob {} has dim {d}", blob.name)))
        .collect::<Result<Vec<_>>>()?;
    Tensor::new(Shape::from_slice(&dims), blob.data)
        .with_context(|| format!("caffe blob {}", blob.name))
}
