//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dropship_core::config::{AuthorizedRoots, GatewayConfig};
use dropship_core::gateway::UploadedFile;
use dropship_core::runtime::{CommandOutput, CommandRunner, CommandSpec, RunnerError};
use flate2::Compression;
use flate2::write::GzEncoder;
use tempfile::TempDir;

static STAGED: AtomicUsize = AtomicUsize::new(0);

pub fn keys_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/keys")
}

pub fn private_key_path(identity: &str) -> PathBuf {
    keys_dir().join(format!("{identity}_private_key.pem"))
}

/// Write `bytes` to a fresh staging file, as a transport would.
pub fn stage(staging: &Path, original_name: &str, bytes: &[u8]) -> UploadedFile {
    std::fs::create_dir_all(staging).unwrap();
    let n = STAGED.fetch_add(1, Ordering::SeqCst);
    let path = staging.join(format!("upload-{n}"));
    std::fs::write(&path, bytes).unwrap();
    UploadedFile::new(original_name, path)
}

pub fn stage_private_key(staging: &Path, identity: &str) -> UploadedFile {
    let bytes = std::fs::read(private_key_path(identity)).unwrap();
    stage(staging, "private_key.pem", &bytes)
}

pub fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, contents) in entries {
        writer
            .start_file(*name, zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(contents.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Regular-file entries. Names are written raw, so traversal names survive.
pub fn tar_gz_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (name, contents) in entries {
        let mut header = tar::Header::new_gnu();
        let raw = name.as_bytes();
        header.as_gnu_mut().unwrap().name[..raw.len()].copy_from_slice(raw);
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_entry_type(tar::EntryType::Regular);
        header.set_cksum();
        builder.append(&header, contents.as_bytes()).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// A tar.gz holding one file and one symlink pointing at it.
pub fn tar_gz_with_symlink() -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));

    let mut file = tar::Header::new_gnu();
    file.set_path("index.html").unwrap();
    file.set_size(5);
    file.set_mode(0o644);
    file.set_entry_type(tar::EntryType::Regular);
    file.set_cksum();
    builder.append(&file, &b"hello"[..]).unwrap();

    let mut link = tar::Header::new_gnu();
    link.set_path("alias.html").unwrap();
    link.set_link_name("index.html").unwrap();
    link.set_size(0);
    link.set_mode(0o777);
    link.set_entry_type(tar::EntryType::Symlink);
    link.set_cksum();
    builder.append(&link, std::io::empty()).unwrap();

    builder.into_inner().unwrap().finish().unwrap()
}

/// Temp layout with uploads, staging and the fixture key directory.
pub struct Sandbox {
    pub temp: TempDir,
    pub config: GatewayConfig,
}

impl Sandbox {
    pub fn new(users: &[(&str, &[&str])]) -> Self {
        let temp = TempDir::new().unwrap();
        let mut config = GatewayConfig {
            upload_dir: temp.path().join("uploads"),
            temp_dir: temp.path().join("staging"),
            public_key_dir: Some(keys_dir()),
            ..GatewayConfig::default()
        };
        for (identity, roots) in users {
            config.authorized_users.insert(
                identity.to_string(),
                AuthorizedRoots::Many(roots.iter().map(|r| r.to_string()).collect()),
            );
        }
        let config = config.prepare().unwrap();
        Self { temp, config }
    }

    pub fn uploads(&self) -> &Path {
        &self.config.upload_dir
    }

    pub fn staging(&self) -> &Path {
        &self.config.temp_dir
    }

    pub fn staged_count(&self) -> usize {
        std::fs::read_dir(self.staging()).unwrap().count()
    }
}

/// Command runner with canned replies keyed by the first argument.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    pub calls: Mutex<Vec<CommandSpec>>,
    pub install_exit: i32,
    pub script_exit: i32,
    pub script_stderr: String,
    pub install_times_out: bool,
    pub script_times_out: bool,
    pub panics: bool,
}

impl ScriptedRunner {
    pub fn succeeding() -> Self {
        Self::default()
    }

    pub fn failing_script(stderr: &str) -> Self {
        Self {
            script_exit: 1,
            script_stderr: stderr.to_string(),
            ..Self::default()
        }
    }

    pub fn failing_install() -> Self {
        Self {
            install_exit: 1,
            ..Self::default()
        }
    }

    pub fn timing_out_install() -> Self {
        Self {
            install_times_out: true,
            ..Self::default()
        }
    }

    pub fn timing_out_script() -> Self {
        Self {
            script_times_out: true,
            ..Self::default()
        }
    }

    pub fn panicking() -> Self {
        Self {
            panics: true,
            ..Self::default()
        }
    }

    pub fn commands(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(CommandSpec::display)
            .collect()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, RunnerError> {
        self.calls.lock().unwrap().push(spec.clone());
        if self.panics {
            panic!("runner exploded on {}", spec.display());
        }
        let is_script = spec.args.first().is_some_and(|arg| arg == "run");
        if (is_script && self.script_times_out) || (!is_script && self.install_times_out) {
            return Err(RunnerError::Timeout(spec.timeout.as_secs()));
        }
        let (exit_code, stderr) = if is_script {
            (self.script_exit, self.script_stderr.clone())
        } else {
            (self.install_exit, String::new())
        };
        Ok(CommandOutput {
            stdout: String::new(),
            stderr,
            exit_code,
            duration: Duration::ZERO,
        })
    }
}
