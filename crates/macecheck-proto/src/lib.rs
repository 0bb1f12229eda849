//! gRPC contract of the Caffe bridge, a sidecar process that hosts pycaffe.

pub mod caffe {
    pub mod v1 {
        tonic::include_proto!("macecheck.caffe.v1");
    }
}
