//! Idempotent model artifact store.
//!
//! `ensure_local` resolves whether the model artifact already exists on disk
//! and, if not, fetches it from its remote location. Archived artifacts
//! (tar.gz) are extracted through a staging directory and renamed into place,
//! so an interrupted extraction is invisible to the next startup.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{ArtifactError, ArtifactResult};

/// Where the model artifact lives remotely and where it is cached locally.
#[derive(Debug, Clone)]
pub struct ArtifactSource {
    /// Remote location of the artifact.
    pub url: String,
    /// Local path the artifact is cached at. A file for weights-file
    /// models, a directory for extracted graph archives.
    pub local_path: PathBuf,
}

impl ArtifactSource {
    /// Create a new artifact source.
    pub fn new(url: impl Into<String>, local_path: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            local_path: local_path.into(),
        }
    }

    /// Whether the remote object is a compressed archive that must be
    /// extracted after download.
    pub fn is_archive(&self) -> bool {
        let url = self.url.split(['?', '#']).next().unwrap_or(&self.url);
        url.ends_with(".tar.gz") || url.ends_with(".tgz")
    }
}

/// Make the artifact present at its local path, downloading at most once.
///
/// If the path already exists as a file or a non-empty directory this is a
/// no-op: repeated startups never re-download. An empty directory counts as
/// absent, since a failed extraction must not satisfy the presence check.
pub async fn ensure_local(source: &ArtifactSource) -> ArtifactResult<()> {
    if is_present(&source.local_path) {
        debug!(
            path = %source.local_path.display(),
            "Model artifact already present, skipping download"
        );
        return Ok(());
    }

    if let Some(parent) = source.local_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let staging = staging_path(&source.local_path);
    info!(url = %source.url, "Downloading model artifact");
    download_to(&source.url, &staging).await?;

    if source.is_archive() {
        let result = unpack_archive(&staging, &source.local_path);
        let _ = tokio::fs::remove_file(&staging).await;
        result?;
    } else {
        tokio::fs::rename(&staging, &source.local_path).await?;
    }

    info!(path = %source.local_path.display(), "Model artifact ready");
    Ok(())
}

/// A file counts as present; a directory only when it has entries.
fn is_present(path: &Path) -> bool {
    if path.is_file() {
        return true;
    }
    if path.is_dir() {
        if let Ok(mut entries) = std::fs::read_dir(path) {
            return entries.next().is_some();
        }
    }
    false
}

/// Staging file written next to the destination, same filesystem.
fn staging_path(local_path: &Path) -> PathBuf {
    let mut name = local_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "artifact".into());
    name.push(".download");
    local_path.with_file_name(name)
}

/// Fetch the remote object into the staging file.
async fn download_to(url: &str, dest: &Path) -> ArtifactResult<()> {
    let response = reqwest::get(url).await?;

    if !response.status().is_success() {
        return Err(ArtifactError::HttpStatus {
            url: url.to_string(),
            status: response.status().as_u16(),
        });
    }

    let bytes = response.bytes().await?;
    let mut file = tokio::fs::File::create(dest).await?;
    file.write_all(&bytes).await?;
    file.flush().await?;

    debug!(bytes = bytes.len(), dest = %dest.display(), "Artifact downloaded");
    Ok(())
}

/// Extract a tar.gz archive to `dest`, staging into a sibling directory
/// first so the destination appears atomically.
///
/// If the archive holds a single top-level directory (the common layout for
/// exported model graphs) that directory becomes `dest`; otherwise the
/// archive root itself does.
fn unpack_archive(archive_path: &Path, dest: &Path) -> ArtifactResult<()> {
    let extract_dir = dest.with_extension("extract");
    if extract_dir.exists() {
        std::fs::remove_dir_all(&extract_dir)?;
    }

    let file = std::fs::File::open(archive_path)?;
    let decoder = flate2::read::GzDecoder::new(file);
    let mut archive = tar::Archive::new(decoder);

    if let Err(e) = archive.unpack(&extract_dir) {
        let _ = std::fs::remove_dir_all(&extract_dir);
        return Err(ArtifactError::archive(format!(
            "failed to extract {}: {e}",
            archive_path.display()
        )));
    }

    let root = archive_root(&extract_dir)?;
    std::fs::rename(&root, dest)?;
    if root != extract_dir {
        let _ = std::fs::remove_dir_all(&extract_dir);
    }

    Ok(())
}

/// Resolve the directory that should become the artifact path.
fn archive_root(extract_dir: &Path) -> ArtifactResult<PathBuf> {
    let entries: Vec<_> = std::fs::read_dir(extract_dir)?
        .collect::<Result<Vec<_>, _>>()?;

    if entries.is_empty() {
        let _ = std::fs::remove_dir_all(extract_dir);
        return Err(ArtifactError::archive("archive contained no entries"));
    }

    if entries.len() == 1 && entries[0].path().is_dir() {
        Ok(entries[0].path())
    } else {
        Ok(extract_dir.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn tar_gz_with(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, content) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, *content).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    #[tokio::test]
    async fn test_downloads_weights_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/model.onnx"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"weights".to_vec()))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let source = ArtifactSource::new(
            format!("{}/model.onnx", server.uri()),
            dir.path().join("model/model.onnx"),
        );

        ensure_local(&source).await.unwrap();

        assert_eq!(std::fs::read(&source.local_path).unwrap(), b"weights");
    }

    #[tokio::test]
    async fn test_second_call_makes_no_network_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/model.onnx"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"weights".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let source = ArtifactSource::new(
            format!("{}/model.onnx", server.uri()),
            dir.path().join("model.onnx"),
        );

        ensure_local(&source).await.unwrap();
        ensure_local(&source).await.unwrap();

        // MockServer verifies the expect(1) on drop.
    }

    #[tokio::test]
    async fn test_present_file_skips_network_entirely() {
        let dir = TempDir::new().unwrap();
        let local = dir.path().join("model.onnx");
        std::fs::write(&local, b"cached").unwrap();

        // Unroutable URL: the call must return before any network I/O.
        let source = ArtifactSource::new("http://127.0.0.1:1/model.onnx", &local);
        ensure_local(&source).await.unwrap();

        assert_eq!(std::fs::read(&local).unwrap(), b"cached");
    }

    #[tokio::test]
    async fn test_extracts_archive_with_single_root_dir() {
        let body = tar_gz_with(&[(
            "nutriscan_savedmodel/saved_model.onnx",
            b"graph".as_slice(),
        )]);

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/model.tar.gz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let source = ArtifactSource::new(
            format!("{}/model.tar.gz", server.uri()),
            dir.path().join("nutriscan_savedmodel"),
        );

        ensure_local(&source).await.unwrap();

        assert!(source.local_path.is_dir());
        assert_eq!(
            std::fs::read(source.local_path.join("saved_model.onnx")).unwrap(),
            b"graph"
        );
        assert!(!dir.path().join("nutriscan_savedmodel.download").exists());
    }

    #[tokio::test]
    async fn test_empty_directory_counts_as_absent() {
        let body = tar_gz_with(&[("model/graph.onnx", b"graph".as_slice())]);

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/model.tgz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let local = dir.path().join("model");
        std::fs::create_dir_all(&local).unwrap();

        let source = ArtifactSource::new(format!("{}/model.tgz", server.uri()), &local);
        ensure_local(&source).await.unwrap();

        assert!(local.join("graph.onnx").exists());
    }

    #[tokio::test]
    async fn test_corrupt_archive_leaves_no_artifact() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/model.tar.gz"))
            .respond_with(
                ResponseTemplate::new(200).set_body_bytes(b"not a tarball".to_vec()),
            )
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let local = dir.path().join("model");
        let source = ArtifactSource::new(format!("{}/model.tar.gz", server.uri()), &local);

        let err = ensure_local(&source).await.unwrap_err();
        assert!(matches!(err, ArtifactError::Archive(_)));

        // The next startup must see the artifact as absent.
        assert!(!is_present(&local));
    }

    #[tokio::test]
    async fn test_http_error_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/model.onnx"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let source = ArtifactSource::new(
            format!("{}/model.onnx", server.uri()),
            dir.path().join("model.onnx"),
        );

        let err = ensure_local(&source).await.unwrap_err();
        assert!(matches!(err, ArtifactError::HttpStatus { status: 404, .. }));
        assert!(!source.local_path.exists());
    }

    #[test]
    fn test_archive_url_detection() {
        let archive =
            ArtifactSource::new("https://example.com/m.tar.gz?id=1", "/tmp/m");
        assert!(archive.is_archive());

        let tgz = ArtifactSource::new("https://example.com/m.tgz", "/tmp/m");
        assert!(tgz.is_archive());

        let plain = ArtifactSource::new("https://example.com/m.onnx", "/tmp/m.onnx");
        assert!(!plain.is_archive());
    }

    #[test]
    fn test_staging_path_is_sibling() {
        let staging = staging_path(Path::new("/data/model/weights.onnx"));
        assert_eq!(staging, Path::new("/data/model/weights.onnx.download"));
    }
}
