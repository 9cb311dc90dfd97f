pub mod grpc;
pub mod service;

pub use service::GrpcAdapterService;
