use crate::error::{CliError, Result};
use cartographer::core::models::kind::{MODEL_DIR_NAME, ModelKind};
use futures_util::StreamExt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadProgress {
    Started { total_size: Option<u64> },
    Downloading { downloaded: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed(PathBuf),
    /// The model was already present and `reinstall` was not requested.
    Skipped(PathBuf),
}

/// Downloads model files into `<root>/cartographer_models/`.
#[derive(Debug)]
pub struct ModelInstaller {
    client: reqwest::Client,
    base_url: String,
    model_dir: PathBuf,
}

impl ModelInstaller {
    pub fn new(base_url: impl Into<String>, root: &Path) -> Self {
        let model_dir = root.join(MODEL_DIR_NAME);
        debug!("ModelInstaller initialized with directory: {:?}", &model_dir);
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            model_dir,
        }
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    pub fn model_path(&self, kind: ModelKind) -> PathBuf {
        self.model_dir.join(kind.file_name())
    }

    pub fn model_url(&self, kind: ModelKind) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), kind.file_name())
    }

    /// Installs one model, streaming it to a temporary file that is moved into place on success.
    ///
    /// Nothing is written at the final path when the download fails or is empty.
    pub async fn install(
        &self,
        kind: ModelKind,
        reinstall: bool,
        mut progress_callback: impl FnMut(DownloadProgress),
    ) -> Result<InstallOutcome> {
        let target = self.model_path(kind);
        if target.exists() && !reinstall {
            info!("{} is already installed at {:?}", kind, &target);
            return Ok(InstallOutcome::Skipped(target));
        }
        fs::create_dir_all(&self.model_dir)?;

        let url = self.model_url(kind);
        info!("Sending request to {}", url);
        let response = self.client.get(&url).send().await?.error_for_status()?;

        let total_size = response.content_length();
        progress_callback(DownloadProgress::Started { total_size });

        let mut temp = NamedTempFile::new_in(&self.model_dir)?;
        let mut downloaded: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(item) = stream.next().await {
            let chunk = item?;
            temp.write_all(&chunk)?;
            downloaded += chunk.len() as u64;
            progress_callback(DownloadProgress::Downloading { downloaded });
        }

        if downloaded == 0 {
            return Err(CliError::Install(format!(
                "Downloaded model '{}' from {} is empty",
                kind, url
            )));
        }
        temp.flush()?;
        temp.persist(&target).map_err(|e| CliError::Io(e.error))?;

        info!("Model {} ({} bytes) installed to {:?}", kind, downloaded, &target);
        Ok(InstallOutcome::Installed(target))
    }
}
