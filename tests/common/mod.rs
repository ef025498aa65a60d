//! Shared test infrastructure for integration tests
//!
//! Provides TestServer (filesystem storage, no Docker needed), reqwest
//! helpers, and deterministic data generators.

#![allow(dead_code)]

use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use std::process::{Child, Command};
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::sleep;

/// Port counter to avoid conflicts between tests.
static PORT_COUNTER: AtomicU16 = AtomicU16::new(18200);

/// Test server wrapper that spawns a real cachegate binary
pub struct TestServer {
    process: Child,
    port: u16,
    data_dir: TempDir,
}

impl TestServer {
    /// Start a test server with filesystem storage, no key prefix, and no
    /// header mapping.
    pub async fn filesystem() -> Self {
        Self::with_config("", "").await
    }

    /// Start a test server with filesystem storage and the given key prefix
    /// and header-mapping string.
    pub async fn with_config(key_prefix: &str, header_mapping: &str) -> Self {
        let port = PORT_COUNTER.fetch_add(1, Ordering::SeqCst);
        let data_dir = TempDir::new().expect("Failed to create temp dir");

        // Objects live in a subdirectory so the config file can't collide
        // with a stored key.
        let object_root = data_dir.path().join("objects");
        let config = format!(
            concat!(
                "listen_addr = \"127.0.0.1:{}\"\n",
                "key_prefix = \"{}\"\n",
                "header_mapping = \"{}\"\n",
                "\n",
                "[storage]\n",
                "type = \"filesystem\"\n",
                "path = \"{}\"\n",
            ),
            port,
            key_prefix,
            header_mapping,
            object_root.display()
        );

        let config_path = data_dir.path().join("test.toml");
        std::fs::write(&config_path, &config).expect("Failed to write test config");

        let process = Command::new(env!("CARGO_BIN_EXE_cachegate"))
            .env("CACHEGATE_CONFIG", &config_path)
            .env("RUST_LOG", "cachegate=warn")
            .spawn()
            .expect("Failed to start server");

        let mut server = Self {
            process,
            port,
            data_dir,
        };
        server.wait_ready().await;
        server
    }

    async fn wait_ready(&mut self) {
        let addr = format!("127.0.0.1:{}", self.port);
        for _ in 0..150 {
            if std::net::TcpStream::connect(&addr).is_ok() {
                sleep(Duration::from_millis(100)).await;
                return;
            }

            if let Ok(Some(status)) = self.process.try_wait() {
                panic!("Server exited before becoming ready: {}", status);
            }

            sleep(Duration::from_millis(100)).await;
        }

        let _ = self.process.kill();
        panic!("Timed out waiting for server on {}", addr);
    }

    /// Get the HTTP endpoint URL
    pub fn endpoint(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Directory where the filesystem backend stores object data files
    pub fn object_root(&self) -> PathBuf {
        self.data_dir.path().join("objects")
    }

    /// Path of the metadata sidecar the filesystem backend writes for a key
    pub fn sidecar_path(&self, key: &str) -> PathBuf {
        let data_path = self.object_root().join(key);
        let name = data_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        data_path.with_file_name(format!(".{}.meta.json", name))
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.process.kill();
    }
}

// === Shared HTTP helpers (reqwest) ===

/// PUT an object and assert success (201).
pub async fn put_object(
    client: &reqwest::Client,
    endpoint: &str,
    path: &str,
    data: Vec<u8>,
    content_type: &str,
) -> reqwest::Response {
    let url = format!("{}/{}", endpoint, path);
    let resp = client
        .put(&url)
        .header("content-type", content_type)
        .body(data)
        .send()
        .await
        .expect("PUT failed");
    assert_eq!(
        resp.status().as_u16(),
        201,
        "PUT {} failed: {}",
        path,
        resp.status()
    );
    resp
}

/// GET an object and return the body bytes.
pub async fn get_bytes(client: &reqwest::Client, endpoint: &str, path: &str) -> Vec<u8> {
    let url = format!("{}/{}", endpoint, path);
    let resp = client.get(&url).send().await.expect("GET failed");
    assert!(
        resp.status().is_success(),
        "GET {} failed: {}",
        path,
        resp.status()
    );
    resp.bytes().await.unwrap().to_vec()
}

/// HEAD an object and return the response status code.
pub async fn head_status(client: &reqwest::Client, endpoint: &str, path: &str) -> u16 {
    let url = format!("{}/{}", endpoint, path);
    let resp = client.head(&url).send().await.expect("HEAD failed");
    resp.status().as_u16()
}

// === Data generators ===

/// Generate deterministic binary data
pub fn generate_binary(size: usize, seed: u64) -> Vec<u8> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let mut data = vec![0u8; size];
    rng.fill(&mut data[..]);
    data
}
