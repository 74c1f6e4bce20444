use anyhow::{bail, Result};
use include_dir::{include_dir, Dir};
use std::fs;
use std::path::Path;
use tracing::{error, info};

static SAMPLE_DIR: Dir = include_dir!("sample/azure");

/// Built-in template source for `exporter`.
pub fn template_source(exporter: &str) -> Result<String> {
    match exporter {
        "html" => Ok(crate::export::to_jsgraph::get_template()),
        "dot" => Ok(crate::export::to_dot::get_template()),
        _ => bail!("Unsupported exporter: {} - use html, dot", exporter),
    }
}

pub fn generate_template(exporter: String) {
    info!("Generating exporter template: {}", exporter);
    match template_source(&exporter) {
        Ok(template) => println!("{}", template),
        Err(e) => error!("{}", e),
    }
}

fn write_dir_contents(dir: &Dir, root: &Dir, target_path: &Path) -> Result<()> {
    for file in dir.files() {
        let relative_path = file.path().strip_prefix(root.path())?;
        let target_file_path = target_path.join(relative_path);

        if let Some(parent) = target_file_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target_file_path, file.contents())?;
        info!("Wrote {}", target_file_path.display());
    }

    for sub_dir in dir.dirs() {
        write_dir_contents(sub_dir, root, target_path)?;
    }
    Ok(())
}

/// Writes the embedded sample project (export + plan) into `dir`.
pub fn write_sample(dir: &str) -> Result<()> {
    let target_path = Path::new(dir);
    fs::create_dir_all(target_path)?;
    write_dir_contents(&SAMPLE_DIR, &SAMPLE_DIR, target_path)
}

pub fn generate_sample(dir: String) {
    info!("Generating sample project in {:?}", dir);
    if let Err(e) = write_sample(&dir) {
        error!("Failed to write sample project: {}", e);
    }
}
