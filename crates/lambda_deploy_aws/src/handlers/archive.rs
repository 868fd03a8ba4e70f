use std::fs;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use clap::ValueEnum;
use glob::Pattern;
use lambda_deploy_core::naming::artifact_file_name;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::BuildError;

pub const DEFAULT_EXCLUDE_GLOBS: &[&str] = &[
    ".git*",
    "*.swp",
    ".editorconfig",
    ".lambda",
    ".env",
    "deploy.env",
    "*.log",
    "/build/",
];
pub const DEFAULT_DEPENDENCY_DIR: &str = "node_modules";
pub const POST_INSTALL_SCRIPT: &str = "post_install.sh";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum CompressionStrategy {
    /// External `zip` on POSIX hosts that have it, in-process otherwise
    #[default]
    Auto,
    /// Shell out to the `zip` tool
    External,
    /// Deflate with the embedded zip writer
    InProcess,
}

impl CompressionStrategy {
    fn resolve(self) -> Self {
        match self {
            Self::Auto if cfg!(unix) && tool_works("zip", "-v") => Self::External,
            Self::Auto => Self::InProcess,
            other => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for InstallCommand {
    fn default() -> Self {
        Self {
            program: "npm".to_string(),
            args: vec!["install".to_string(), "--production".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveOptions {
    /// Passed to the post-install hook as its only argument.
    pub environment: String,
    pub exclude_globs: Vec<String>,
    /// The source directory already holds installed dependencies.
    pub prebuilt: bool,
    pub dependency_dir: String,
    pub install_command: Option<InstallCommand>,
    pub compression: CompressionStrategy,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            exclude_globs: Vec::new(),
            prebuilt: false,
            dependency_dir: DEFAULT_DEPENDENCY_DIR.to_string(),
            install_command: Some(InstallCommand::default()),
            compression: CompressionStrategy::Auto,
        }
    }
}

/// Deployable zip bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    bytes: Vec<u8>,
}

impl Artifact {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn entry_names(&self) -> Result<Vec<String>, BuildError> {
        let archive = ZipArchive::new(Cursor::new(self.bytes.as_slice()))
            .map_err(compression_error)?;
        Ok(archive.file_names().map(str::to_string).collect())
    }
}

struct ExcludePattern {
    pattern: Pattern,
    directory_only: bool,
    anchored: bool,
}

impl ExcludePattern {
    fn compile(raw: &str) -> Result<Option<Self>, BuildError> {
        let trimmed = raw.trim();
        let body = trimmed.trim_matches('/');
        if body.is_empty() {
            return Ok(None);
        }
        let pattern = Pattern::new(body).map_err(|error| BuildError::InvalidExcludeGlob {
            pattern: raw.to_string(),
            message: error.to_string(),
        })?;
        Ok(Some(Self {
            pattern,
            directory_only: trimmed.ends_with('/'),
            anchored: trimmed.starts_with('/'),
        }))
    }

    fn matches(&self, name: &str, relative: &str, is_dir: bool) -> bool {
        if self.directory_only && !is_dir {
            return false;
        }
        if self.anchored {
            return self.pattern.matches(relative);
        }
        self.pattern.matches(name) || self.pattern.matches(relative)
    }
}

struct ExcludeSet {
    patterns: Vec<ExcludePattern>,
}

impl ExcludeSet {
    fn for_options(options: &ArchiveOptions) -> Result<Self, BuildError> {
        let mut raw: Vec<String> = DEFAULT_EXCLUDE_GLOBS
            .iter()
            .map(|glob| glob.to_string())
            .collect();
        raw.extend(options.exclude_globs.iter().cloned());
        if !options.prebuilt {
            raw.push(format!("/{}/", options.dependency_dir.trim_matches('/')));
        }

        let mut patterns = Vec::with_capacity(raw.len());
        for glob in &raw {
            if let Some(pattern) = ExcludePattern::compile(glob)? {
                patterns.push(pattern);
            }
        }
        Ok(Self { patterns })
    }

    fn excludes(&self, name: &str, relative: &str, is_dir: bool) -> bool {
        self.patterns
            .iter()
            .any(|pattern| pattern.matches(name, relative, is_dir))
    }
}

/// Builds the deployable archive for `source_dir`.
///
/// Steps run in order and the first failure aborts the rest: copy into a
/// scratch directory, install dependencies (raw source only), run the
/// post-install hook if present, compress.
pub fn build(source_dir: &Path, options: &ArchiveOptions) -> Result<Artifact, BuildError> {
    if !source_dir.is_dir() {
        return Err(BuildError::MissingSource(source_dir.to_path_buf()));
    }

    let excludes = ExcludeSet::for_options(options)?;
    let scratch = tempfile::Builder::new()
        .prefix("lambda-deploy-")
        .tempdir()
        .map_err(BuildError::Scratch)?;

    let copied =
        copy_tree(source_dir, scratch.path(), "", &excludes).map_err(BuildError::Scratch)?;
    tracing::debug!(
        component = "archive",
        source = %source_dir.display(),
        files = copied,
        "copied source tree into scratch directory"
    );

    if !options.prebuilt {
        if let Some(command) = &options.install_command {
            install_dependencies(scratch.path(), command)?;
        }
    }

    run_post_install(scratch.path(), &options.environment)?;

    let strategy = options.compression.resolve();
    let bytes = match strategy {
        CompressionStrategy::External => zip_with_external_tool(scratch.path())?,
        _ => zip_in_process(scratch.path())?,
    };

    tracing::info!(
        component = "archive",
        strategy = ?strategy,
        size_bytes = bytes.len(),
        "archive built"
    );
    Ok(Artifact { bytes })
}

/// Writes the artifact as `<function>[-<environment>].zip` under `output_dir`.
pub fn write_artifact(
    output_dir: &Path,
    function_name: &str,
    environment: Option<&str>,
    artifact: &Artifact,
) -> Result<PathBuf, BuildError> {
    let path = output_dir.join(artifact_file_name(function_name, environment));
    fs::create_dir_all(output_dir)
        .and_then(|_| fs::write(&path, artifact.as_bytes()))
        .map_err(|source| BuildError::Persist {
            path: path.clone(),
            source,
        })?;
    Ok(path)
}

fn copy_tree(
    source: &Path,
    target: &Path,
    relative: &str,
    excludes: &ExcludeSet,
) -> io::Result<usize> {
    let mut entries = fs::read_dir(source)?.collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|entry| entry.file_name());

    let mut copied = 0usize;
    for entry in entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        let entry_relative = if relative.is_empty() {
            name.clone()
        } else {
            format!("{relative}/{name}")
        };
        let path = entry.path();
        let file_type = entry.file_type()?;
        let is_dir = if file_type.is_symlink() {
            match fs::metadata(&path) {
                Ok(resolved) if resolved.is_file() => false,
                _ => {
                    tracing::debug!(
                        component = "archive",
                        path = %entry_relative,
                        "skipping directory or dangling symlink"
                    );
                    continue;
                }
            }
        } else {
            file_type.is_dir()
        };
        if excludes.excludes(&name, &entry_relative, is_dir) {
            continue;
        }

        let destination = target.join(&name);
        if is_dir {
            fs::create_dir_all(&destination)?;
            copied += copy_tree(&path, &destination, &entry_relative, excludes)?;
        } else {
            fs::copy(&path, &destination)?;
            copied += 1;
        }
    }
    Ok(copied)
}

fn run_captured(command: &mut Command) -> io::Result<(ExitStatus, String)> {
    let output = command.output()?;
    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    Ok((output.status, combined))
}

fn install_dependencies(dir: &Path, command: &InstallCommand) -> Result<(), BuildError> {
    tracing::info!(
        component = "archive",
        program = %command.program,
        args = ?command.args,
        "installing dependencies"
    );
    let (status, output) = run_captured(
        Command::new(&command.program)
            .args(&command.args)
            .current_dir(dir),
    )
    .map_err(|error| BuildError::DependencyInstall {
        status: "not started".to_string(),
        output: format!("failed to run `{}`: {error}", command.program),
    })?;

    if !status.success() {
        return Err(BuildError::DependencyInstall {
            status: status.to_string(),
            output: output.trim().to_string(),
        });
    }
    Ok(())
}

fn run_post_install(dir: &Path, environment: &str) -> Result<(), BuildError> {
    if !dir.join(POST_INSTALL_SCRIPT).is_file() {
        return Ok(());
    }

    let (status, output) = run_captured(
        Command::new("sh")
            .arg(POST_INSTALL_SCRIPT)
            .arg(environment)
            .current_dir(dir),
    )
    .map_err(|error| BuildError::PostInstall {
        status: "not started".to_string(),
        output: error.to_string(),
    })?;

    if !status.success() {
        return Err(BuildError::PostInstall {
            status: status.to_string(),
            output: output.trim().to_string(),
        });
    }

    tracing::info!(
        component = "archive",
        environment,
        output = %output.trim(),
        "post-install script finished"
    );
    Ok(())
}

fn zip_with_external_tool(dir: &Path) -> Result<Vec<u8>, BuildError> {
    // `zip` refuses to write an archive with no entries.
    let mut files = Vec::new();
    collect_files(dir, "", &mut files).map_err(compression_error)?;
    if files.is_empty() {
        return zip_in_process(dir);
    }

    let out_dir = tempfile::tempdir().map_err(BuildError::Scratch)?;
    let out_path = out_dir.path().join("artifact.zip");

    let (status, output) = run_captured(
        Command::new("zip")
            .args(["-q", "-r", "-D", "-X"])
            .arg(&out_path)
            .arg(".")
            .current_dir(dir),
    )
    .map_err(|error| BuildError::Compression(format!("failed to run zip: {error}")))?;

    if !status.success() {
        return Err(BuildError::Compression(format!(
            "zip exited with {status}: {}",
            output.trim()
        )));
    }

    fs::read(&out_path).map_err(compression_error)
}

fn zip_in_process(dir: &Path) -> Result<Vec<u8>, BuildError> {
    let mut files = Vec::new();
    collect_files(dir, "", &mut files).map_err(compression_error)?;

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for relative in files {
        let path = dir.join(&relative);
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(file_mode(&path).map_err(compression_error)?);
        writer
            .start_file(relative.as_str(), options)
            .map_err(compression_error)?;
        let mut file = fs::File::open(&path).map_err(compression_error)?;
        io::copy(&mut file, &mut writer).map_err(compression_error)?;
    }

    let cursor = writer.finish().map_err(compression_error)?;
    Ok(cursor.into_inner())
}

fn compression_error(error: impl std::fmt::Display) -> BuildError {
    BuildError::Compression(error.to_string())
}

/// Relative file paths under `dir`, POSIX separators, sorted, no directories.
fn collect_files(dir: &Path, relative: &str, files: &mut Vec<String>) -> io::Result<()> {
    let mut entries = fs::read_dir(dir)?.collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        let entry_relative = if relative.is_empty() {
            name
        } else {
            format!("{relative}/{name}")
        };
        if entry.path().is_dir() {
            collect_files(&entry.path(), &entry_relative, files)?;
        } else {
            files.push(entry_relative);
        }
    }
    Ok(())
}

#[cfg(unix)]
fn file_mode(path: &Path) -> io::Result<u32> {
    use std::os::unix::fs::PermissionsExt;
    Ok(fs::metadata(path)?.permissions().mode() & 0o777)
}

#[cfg(not(unix))]
fn file_mode(_path: &Path) -> io::Result<u32> {
    Ok(0o644)
}

fn tool_works(program: &str, probe_arg: &str) -> bool {
    Command::new(program)
        .arg(probe_arg)
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Reads one entry of an archive; used by callers inspecting a built artifact.
pub fn read_entry(artifact: &Artifact, name: &str) -> Result<Vec<u8>, BuildError> {
    let mut archive = ZipArchive::new(Cursor::new(artifact.as_bytes()))
        .map_err(compression_error)?;
    let mut entry = archive
        .by_name(name)
        .map_err(compression_error)?;
    let mut body = Vec::new();
    entry
        .read_to_end(&mut body)
        .map_err(compression_error)?;
    Ok(body)
}
