fn main() {
    #[cfg(feature = "server")]
    {
        tonic_build::configure()
            .build_server(true)
            .build_client(true)
            .compile(&["proto/auth.proto"], &["proto"])
            .unwrap();
    }
}
