use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use macecheck_backend_caffe::CaffeBackend;
use macecheck_core::dump::dump_path;
use macecheck_core::{
    validate, Backend, BackendModel, ModelArtifact, NodeSpec, Outcome, ReferenceOptions, Runtime,
    Validation,
};
use macecheck_proto::caffe::v1 as pb;
use macecheck_proto::caffe::v1::caffe_bridge_server::{CaffeBridge, CaffeBridgeServer};
use tokio_stream::wrappers::TcpListenerStream;
use tonic::{Request, Response, Status};

type Blobs = HashMap<String, (Vec<i64>, Vec<f32>)>;

/// Stand-in for the pycaffe bridge: one net whose `scale` layer doubles the
/// `data` blob into `scale_out`.
#[derive(Default, Clone)]
struct FakeBridge {
    blobs: Arc<Mutex<Blobs>>,
    released: Arc<Mutex<Vec<String>>>,
    glog_level: Arc<Mutex<Option<i32>>>,
}

#[tonic::async_trait]
impl CaffeBridge for FakeBridge {
    async fn load_net(
        &self,
        req: Request<pb::LoadNetRequest>,
    ) -> Result<Response<pb::LoadNetResponse>, Status> {
        let req = req.into_inner();
        if req.phase != pb::Phase::Test as i32 || req.mode != pb::Mode::Cpu as i32 {
            return Err(Status::invalid_argument("expected TEST phase on CPU"));
        }
        *self.glog_level.lock().unwrap() = Some(req.glog_min_level);

        let layers = vec![
            pb::LayerTops {
                layer: "input".to_string(),
                tops: vec!["data".to_string()],
            },
            pb::LayerTops {
                layer: "scale".to_string(),
                tops: vec!["scale_out".to_string(), "scale_aux".to_string()],
            },
            pb::LayerTops {
                layer: "sink".to_string(),
                tops: Vec::new(),
            },
        ];
        Ok(Response::new(pb::LoadNetResponse {
            net_id: "net-0".to_string(),
            layers,
        }))
    }

    async fn set_blob(
        &self,
        req: Request<pb::SetBlobRequest>,
    ) -> Result<Response<pb::SetBlobResponse>, Status> {
        let req = req.into_inner();
        let blob = req.blob.ok_or_else(|| Status::invalid_argument("missing blob"))?;
        if req.batch_index != 0 {
            return Err(Status::invalid_argument("only batch element 0 is written"));
        }
        self.blobs
            .lock()
            .unwrap()
            .insert(blob.name, (blob.shape, blob.data));
        Ok(Response::new(pb::SetBlobResponse {}))
    }

    async fn forward(
        &self,
        _req: Request<pb::ForwardRequest>,
    ) -> Result<Response<pb::ForwardResponse>, Status> {
        let mut blobs = self.blobs.lock().unwrap();
        let (shape, data) = blobs
            .get("data")
            .cloned()
            .ok_or_else(|| Status::failed_precondition("data blob not set"))?;
        let doubled = data.iter().map(|v| v * 2.0).collect();
        blobs.insert("scale_out".to_string(), (shape, doubled));
        Ok(Response::new(pb::ForwardResponse {}))
    }

    async fn get_blob(
        &self,
        req: Request<pb::GetBlobRequest>,
    ) -> Result<Response<pb::Blob>, Status> {
        let req = req.into_inner();
        let blobs = self.blobs.lock().unwrap();
        let (shape, data) = blobs
            .get(&req.name)
            .cloned()
            .ok_or_else(|| Status::not_found(req.name.clone()))?;
        Ok(Response::new(pb::Blob {
            name: req.name,
            shape,
            data,
        }))
    }

    async fn release_net(
        &self,
        req: Request<pb::ReleaseNetRequest>,
    ) -> Result<Response<pb::ReleaseNetResponse>, Status> {
        self.released.lock().unwrap().push(req.into_inner().net_id);
        Ok(Response::new(pb::ReleaseNetResponse {}))
    }
}

struct Bridge {
    _rt: tokio::runtime::Runtime,
    addr: String,
    state: FakeBridge,
}

fn spawn_bridge() -> Result<Bridge> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()?;
    let listener = rt.block_on(tokio::net::TcpListener::bind("127.0.0.1:0"))?;
    let addr = format!("http://{}", listener.local_addr()?);

    let state = FakeBridge::default();
    let server = tonic::transport::Server::builder()
        .add_service(CaffeBridgeServer::new(state.clone()))
        .serve_with_incoming(TcpListenerStream::new(listener));
    rt.spawn(server);

    Ok(Bridge {
        _rt: rt,
        addr,
        state,
    })
}

fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    std::fs::write(path, contents).with_context(|| format!("write {}", path.display()))
}

fn write_dump(prefix: &str, name: &str, values: &[f32]) -> Result<()> {
    let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_ne_bytes()).collect();
    write_file(&dump_path(prefix, name), &bytes)
}

fn artifact(dir: &Path) -> Result<ModelArtifact> {
    let topology = dir.join("net.prototxt");
    let weights = dir.join("net.caffemodel");
    write_file(&topology, b"name: \"scale\"")?;
    write_file(&weights, &[0u8; 8])?;
    Ok(ModelArtifact::Caffe { topology, weights })
}

#[test]
fn caffe_bridge_end_to_end() -> Result<()> {
    let bridge = spawn_bridge()?;
    let dir = tempfile::tempdir()?;
    let input_prefix = dir.path().join("in").display().to_string();
    let dut_prefix = dir.path().join("out").display().to_string();

    // NHWC 1x2x2x2 input; the device doubled it, like the reference net does
    let input: Vec<f32> = (1..=8).map(|i| i as f32).collect();
    let expected: Vec<f32> = input.iter().map(|v| v * 2.0).collect();
    write_dump(&input_prefix, "input", &input)?;
    write_dump(&dut_prefix, "scale", &expected)?;

    let job = Validation {
        artifact: artifact(dir.path())?,
        options: ReferenceOptions::default(),
        nodes: NodeSpec::parse("input", "1,2,2,2", "scale", Some("1,2,2,2"))?,
        input_prefix,
        dut_prefix,
        runtime: Runtime::Cpu,
    };

    let backend = CaffeBackend::new(bridge.addr.clone());
    let verdicts = validate(&backend, &job, |_| {})?;
    assert_eq!(verdicts.len(), 1);
    assert_eq!(verdicts[0].outcome, Outcome::Passed);

    // the bridge received channel-first data
    let blobs = bridge.state.blobs.lock().unwrap();
    let (shape, data) = blobs.get("data").context("data blob")?;
    assert_eq!(shape, &vec![1, 2, 2, 2]);
    assert_eq!(&data[..4], &[1.0, 3.0, 5.0, 7.0]);

    assert_eq!(*bridge.state.glog_level.lock().unwrap(), Some(1));
    assert_eq!(*bridge.state.released.lock().unwrap(), vec!["net-0".to_string()]);
    Ok(())
}

#[test]
fn layer_without_tops_is_an_error() -> Result<()> {
    let bridge = spawn_bridge()?;
    let dir = tempfile::tempdir()?;
    let model = CaffeBackend::new(bridge.addr.clone())
        .load(&artifact(dir.path())?, &ReferenceOptions::default())?;

    let aliases = model.aliases().context("caffe exposes aliases")?;
    assert_eq!(aliases.resolve("scale")?, "scale_out");
    assert_eq!(aliases.resolve("unlisted")?, "unlisted");
    assert!(aliases.resolve("sink").is_err());
    Ok(())
}

#[test]
fn missing_weights_fail_before_connecting() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let topology = dir.path().join("net.prototxt");
    write_file(&topology, b"name: \"x\"")?;
    let artifact = ModelArtifact::Caffe {
        topology,
        weights: dir.path().join("missing.caffemodel"),
    };

    // nothing listens on this address; the file check must come first
    let err = CaffeBackend::new("http://127.0.0.1:9")
        .load(&artifact, &ReferenceOptions::default())
        .err()
        .context("load should fail")?;
    assert!(err.to_string().contains("does not exist"));
    Ok(())
}

#[test]
fn rejects_tensorflow_artifacts() {
    let artifact = ModelArtifact::TfGraphDef("model.pb".into());
    assert!(CaffeBackend::default()
        .load(&artifact, &ReferenceOptions::default())
        .is_err());
}
