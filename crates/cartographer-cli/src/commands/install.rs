use crate::config::InstallAppConfig;
use crate::error::{CliError, Result};
use crate::install::{InstallOutcome, ModelInstaller};
use crate::locations::{Environment, install_root};
use crate::utils::progress::DownloadBar;
use tracing::{error, info};

pub async fn run(config: InstallAppConfig) -> Result<()> {
    let root = install_root(config.target, &config.locations, &Environment::from_process())?;
    let installer = ModelInstaller::new(config.base_url.as_str(), &root);
    println!("Installing models into {}", installer.model_dir().display());

    let mut failures = Vec::new();
    for kind in &config.models {
        let bar = DownloadBar::new(kind.name());
        match installer
            .install(*kind, config.reinstall, |progress| bar.update(progress))
            .await
        {
            Ok(InstallOutcome::Installed(path)) => {
                bar.finish(format!("✓ {} installed", kind));
                info!("Installed {} to {:?}", kind, path);
            }
            Ok(InstallOutcome::Skipped(path)) => {
                bar.finish(format!(
                    "{} is already installed at {}, use --reinstall to download it again",
                    kind,
                    path.display()
                ));
            }
            Err(e) => {
                bar.abandon();
                error!("Failed to install {}: {}", kind, e);
                eprintln!("✗ {}: {}", kind, e);
                failures.push(kind.name());
            }
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(CliError::Install(format!(
            "{} of {} model(s) could not be installed: {}",
            failures.len(),
            config.models.len(),
            failures.join(", ")
        )))
    }
}
