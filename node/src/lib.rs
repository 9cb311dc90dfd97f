pub mod cli;
pub mod serve;

pub use serve::GrpcAdapterService;
