use crate::cli::InstallTarget;
use crate::config::LocationSettings;
use crate::error::{CliError, Result};
use cartographer::core::models::kind::{MODEL_DIR_NAME, MODEL_EXTENSION};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};

const CCP4_HINT: &str = "\
CCP4 environment variable CLIBD is not found.
You can try sourcing it:
    Ubuntu - source /opt/xtal/ccp4-X.X/bin/ccp4.setup-sh
    MacOS  - source /Applications/ccp4-X.X/bin/ccp4.setup-sh";

const INSTALL_HINT: &str = "\
No models have been found in either site-packages or the CCP4 library data directory ($CLIBD). Use
    cartographer-install -o site_packages -m phos --all
to install all the models or
    cartographer-install -m {phos,sugar,base} -o site_packages
to install a single model (choose either phos, sugar or base).
With CCP4 sourced, models can be installed into $CLIBD instead:
    cartographer-install -m {phos,sugar,base} -o ccp4";

/// Process environment values that affect where models live.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Environment {
    /// The CCP4 library data directory (`$CLIBD`).
    pub clibd: Option<PathBuf>,
}

impl Environment {
    pub fn from_process() -> Self {
        Self {
            clibd: std::env::var_os("CLIBD")
                .filter(|value| !value.is_empty())
                .map(PathBuf::from),
        }
    }
}

/// Returns the site-packages directories, either the configured override or those reported by Python.
///
/// A missing or failing interpreter yields no directories.
pub fn site_packages_dirs(settings: &LocationSettings) -> Vec<PathBuf> {
    if let Some(dir) = &settings.site_packages {
        return vec![dir.clone()];
    }
    let output = Command::new(&settings.python)
        .args(["-c", "import site; print('\\n'.join(site.getsitepackages()))"])
        .output();
    match output {
        Ok(output) if output.status.success() => {
            let dirs: Vec<PathBuf> = String::from_utf8_lossy(&output.stdout)
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(PathBuf::from)
                .collect();
            debug!("{} reported site-packages: {:?}", settings.python, dirs);
            dirs
        }
        Ok(output) => {
            warn!(
                "'{}' could not list site-packages: {}",
                settings.python,
                String::from_utf8_lossy(&output.stderr).trim()
            );
            Vec::new()
        }
        Err(e) => {
            warn!("Could not run '{}': {}", settings.python, e);
            Vec::new()
        }
    }
}

/// Resolves the directory that `target` refers to, before the model subdirectory is appended.
pub fn install_root(target: InstallTarget, settings: &LocationSettings, env: &Environment) -> Result<PathBuf> {
    match target {
        InstallTarget::Ccp4 => match &env.clibd {
            Some(dir) if dir.is_dir() => Ok(dir.clone()),
            Some(dir) => Err(CliError::Install(format!(
                "CLIBD points to '{}', which does not exist.\n{}",
                dir.display(),
                CCP4_HINT
            ))),
            None => Err(CliError::Install(CCP4_HINT.to_string())),
        },
        InstallTarget::SitePackages => site_packages_dirs(settings).into_iter().next().ok_or_else(|| {
            CliError::Install(format!(
                "No site-packages directory could be found with '{}'. Activate a Python virtual \
                 environment, or set install.site-packages in the configuration file.",
                settings.python
            ))
        }),
    }
}

/// Directories searched for installed models.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPaths {
    pub roots: Vec<PathBuf>,
}

impl SearchPaths {
    /// Site-packages roots first, then `$CLIBD`.
    pub fn resolve(settings: &LocationSettings, env: &Environment) -> Self {
        let mut roots = site_packages_dirs(settings);
        match &env.clibd {
            Some(dir) => roots.push(dir.clone()),
            None => debug!("CLIBD is not set; only site-packages will be searched."),
        }
        Self { roots }
    }

    /// Every `*.onnx` file in a `cartographer_models` directory below the roots, in search order.
    pub fn discover_models(&self) -> Vec<PathBuf> {
        let mut models = Vec::new();
        for root in &self.roots {
            let dir = root.join(MODEL_DIR_NAME);
            let Ok(entries) = std::fs::read_dir(&dir) else {
                debug!("No model directory at {}", dir.display());
                continue;
            };
            let mut found: Vec<PathBuf> = entries
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| {
                    path.is_file() && path.extension().is_some_and(|ext| ext == MODEL_EXTENSION)
                })
                .collect();
            found.sort();
            models.extend(found);
        }
        models
    }
}

/// Chooses the model file to run.
///
/// An explicit `model_path` wins. Otherwise installed models are searched: the
/// first whose file name contains `selection` is used, or the only one when a
/// single model is installed. Failing that, `selection` is tried as a path.
pub fn find_model(model_path: Option<&Path>, selection: Option<&str>, search: &SearchPaths) -> Result<PathBuf> {
    if let Some(path) = model_path {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        return Err(CliError::ModelNotFound(format!(
            "Model path could not be found, check the supplied path: {}",
            path.display()
        )));
    }

    let models = search.discover_models();
    debug!("Discovered models: {:?}", models);

    if let Some(selection) = selection {
        let matched = models.iter().find(|model| {
            model
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.contains(selection))
        });
        if let Some(model) = matched {
            return Ok(model.clone());
        }
    }

    if let [only] = models.as_slice() {
        info!("Only found {} - using that!", only.display());
        println!("Only found {} - using that!", only.display());
        return Ok(only.clone());
    }

    if let Some(selection) = selection {
        let path = Path::new(selection);
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
    }

    if models.is_empty() {
        return Err(CliError::ModelNotFound(INSTALL_HINT.to_string()));
    }

    let mut names: Vec<String> = models
        .iter()
        .filter_map(|model| model.file_stem().and_then(|stem| stem.to_str()))
        .map(|stem| format!("    -m {stem}"))
        .collect();
    names.sort();
    names.dedup();
    Err(CliError::ModelNotFound(format!(
        "The specified model type '{}' could not be found, please add one of the following flags\n{}",
        selection.unwrap_or(""),
        names.join("\n")
    )))
}
