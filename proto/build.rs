fn main() -> Result<(), Box<dyn std::error::Error>> {
	tonic_build::configure()
		.build_client(false)
		.type_attribute(
			"adapter.v1.AttributeType",
			"#[derive(::serde::Serialize, ::serde::Deserialize)]",
		)
		.compile(&["protos/adapter/v1/adapter.proto"], &["protos"])?;
	Ok(())
}
