use std::path::PathBuf;

use clap::builder::TypedValueParser;
use clap::Parser;
use macecheck_backend_caffe::DEFAULT_BRIDGE_ADDR;
use macecheck_core::{FrameworkLog, Platform, Runtime};

/// Compare MACE output dumps against a TensorFlow or Caffe reference run
#[derive(Parser, Debug)]
#[command(name = "macecheck", version, about)]
pub struct Cli {
    /// Reference framework: tensorflow or caffe
    #[arg(long)]
    pub platform: Platform,

    /// TensorFlow GraphDef or Caffe prototxt to load
    #[arg(long = "model_file", default_value = "", value_parser = clap::builder::OsStringValueParser::new().map(PathBuf::from))]
    pub model_file: PathBuf,

    /// Caffe weights (caffemodel)
    #[arg(long = "weight_file", default_value = "", value_parser = clap::builder::OsStringValueParser::new().map(PathBuf::from))]
    pub weight_file: PathBuf,

    /// Prefix of the input dumps
    #[arg(long = "input_file", default_value = "")]
    pub input_file: String,

    /// Prefix of the MACE output dumps
    #[arg(long = "mace_out_file", default_value = "")]
    pub mace_out_file: String,

    /// Device MACE ran on: cpu, gpu or dsp
    #[arg(long = "mace_runtime", default_value = "gpu")]
    pub mace_runtime: Runtime,

    /// Input shapes, colon separated
    #[arg(long = "input_shape", default_value = "1,64,64,3")]
    pub input_shape: String,

    /// Output shapes, colon separated (caffe only)
    #[arg(long = "output_shape", default_value = "1,64,64,2")]
    pub output_shape: String,

    /// Input node names, comma separated
    #[arg(long = "input_node", default_value = "input_node")]
    pub input_node: String,

    /// Output node names, comma separated
    #[arg(long = "output_node", default_value = "output_node")]
    pub output_node: String,

    /// gRPC address of the Caffe bridge
    #[arg(long = "caffe_bridge_addr", default_value = DEFAULT_BRIDGE_ADDR)]
    pub caffe_bridge_addr: String,

    /// Log filter (RUST_LOG syntax)
    #[arg(long, default_value = "warn")]
    pub log: String,

    /// Minimum severity the reference framework prints: info, warn, error or fatal
    #[arg(long = "framework_log", default_value = "warn")]
    pub framework_log: FrameworkLog,
}
