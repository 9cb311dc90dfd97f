use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;

use proto::adapter_service_server::AdapterServiceServer;
use tonic::transport::Server;
use tracing::info;

use crate::GrpcAdapterService;

/// Starts and binds the gRPC server to `listen_addr`, serving until
/// `shutdown_signal` resolves (§4.G "Graceful shutdown").
pub async fn start_grpc_server(
	listen_addr: SocketAddr,
	max_message_size_bytes: usize,
	service: Arc<GrpcAdapterService>,
	shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) -> anyhow::Result<()> {
	let adapter_service = AdapterServiceServer::from_arc(service)
		.max_decoding_message_size(max_message_size_bytes)
		.max_encoding_message_size(max_message_size_bytes);

	info!(%listen_addr, "starting gRPC server");
	Server::builder()
		.add_service(adapter_service)
		.serve_with_shutdown(listen_addr, shutdown_signal)
		.await?;
	Ok(())
}
