//! Solid geometry generation for each part type.
//!
//! The live generator renders OpenSCAD scripts against a parametric part
//! library. Rendering is a subprocess with a hard timeout; a render that
//! hangs is killed and treated as a failure.

use async_trait::async_trait;
use forgebom_config::AssemblyConfig;
use forgebom_core::{GeometryError, PartType};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::extractor::ParameterSet;

const MM_PER_INCH: f64 = 25.4;

/// Minimal one-facet solid substituted when a render fails.
const PLACEHOLDER_STL: &str = "solid placeholder
facet normal 0 0 0
outer loop
vertex 0 0 0
vertex 1 0 0
vertex 0 1 0
endloop
endfacet
endsolid placeholder
";

/// A geometry file handed back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeometryArtifact {
    pub path: PathBuf,
    /// True when the real render failed and this is the stand-in solid.
    pub placeholder: bool,
}

/// Produces one solid per part type.
#[async_trait]
pub trait GeometryGenerator: Send + Sync {
    fn name(&self) -> &str;

    /// Render `part` and return the path of the produced STL.
    async fn generate(
        &self,
        project_id: &str,
        part: PartType,
        params: &ParameterSet,
    ) -> Result<PathBuf, GeometryError>;
}

/// `<project>_<part lowercase>`, the stem shared by every file of one render.
pub fn artifact_stem(project_id: &str, part: PartType) -> String {
    format!("{project_id}_{}", part.canonical_name().to_lowercase())
}

/// Write the placeholder solid next to where the real render would be.
pub async fn write_placeholder(
    output_dir: &Path,
    project_id: &str,
    part: PartType,
) -> Result<PathBuf, GeometryError> {
    let path = output_dir.join(format!("{}_placeholder.stl", artifact_stem(project_id, part)));
    tokio::fs::write(&path, PLACEHOLDER_STL)
        .await
        .map_err(|e| GeometryError::Io {
            path: path.clone(),
            reason: e.to_string(),
        })?;
    Ok(path)
}

/// The OpenSCAD module call that builds `part` from `params`.
pub fn scad_call(part: PartType, params: &ParameterSet) -> String {
    let get = |attribute: &str| params.get(part, attribute);
    match part {
        PartType::FrameKit => format!("pro_frame({});", get("wheelbase_mm")),
        PartType::Motors => format!("pro_motor({});", get("stator_size") as i64),
        PartType::Propellers => format!("pro_prop({});", get("diameter_mm") / MM_PER_INCH),
        PartType::FcStack => format!(
            "pro_stack({}, {});",
            get("mounting_mm"),
            params.is_digital_camera
        ),
        PartType::CameraVtxKit => format!("pro_camera({});", get("width_mm")),
        PartType::Battery => format!(
            "pro_battery({}, {});",
            get("cells") as i64,
            get("capacity_mah") as i64
        ),
        PartType::CompanionComputer => "pro_companion_computer();".to_string(),
    }
}

/// A complete script: library import plus the part's module call.
pub fn scad_script(library_path: &Path, part: PartType, params: &ParameterSet) -> String {
    // OpenSCAD wants forward slashes even on Windows.
    let library = library_path.to_string_lossy().replace('\\', "/");
    format!("use <{library}>; {}\n", scad_call(part, params))
}

/// Renders parts with the `openscad` binary.
pub struct OpenScadGenerator {
    binary: String,
    library_path: PathBuf,
    output_dir: PathBuf,
    timeout: Duration,
}

impl OpenScadGenerator {
    pub fn new(
        binary: impl Into<String>,
        library_path: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            binary: binary.into(),
            library_path: library_path.into(),
            output_dir: output_dir.into(),
            timeout,
        }
    }

    pub fn from_config(config: &AssemblyConfig) -> Self {
        Self::new(
            config.openscad_bin.clone(),
            config.library_path.clone(),
            config.output_dir.clone(),
            Duration::from_secs(config.render_timeout_secs),
        )
    }
}

#[async_trait]
impl GeometryGenerator for OpenScadGenerator {
    fn name(&self) -> &str {
        "openscad"
    }

    async fn generate(
        &self,
        project_id: &str,
        part: PartType,
        params: &ParameterSet,
    ) -> Result<PathBuf, GeometryError> {
        let stem = artifact_stem(project_id, part);
        let scad_path = self.output_dir.join(format!("{stem}.scad"));
        let stl_path = self.output_dir.join(format!("{stem}.stl"));

        let script = scad_script(&self.library_path, part, params);
        tokio::fs::write(&scad_path, &script)
            .await
            .map_err(|e| GeometryError::Io {
                path: scad_path.clone(),
                reason: e.to_string(),
            })?;

        debug!(part = %part, script = %script.trim_end(), "Rendering part");

        let render = Command::new(&self.binary)
            .arg("-o")
            .arg(&stl_path)
            .arg(&scad_path)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, render)
            .await
            .map_err(|_| GeometryError::Timeout {
                part: part.to_string(),
                timeout_secs: self.timeout.as_secs(),
            })?
            .map_err(|e| GeometryError::RenderFailed {
                part: part.to_string(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let code = output.status.code().unwrap_or(-1);
            return Err(GeometryError::RenderFailed {
                part: part.to_string(),
                reason: format!("[exit code: {code}] {}", stderr.trim()),
            });
        }

        if !tokio::fs::try_exists(&stl_path).await.unwrap_or(false) {
            return Err(GeometryError::MissingOutput(stl_path));
        }
        Ok(stl_path)
    }
}
