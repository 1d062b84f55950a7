// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Out-of-process sandbox runner.
//!
//! Enforces, in order: input schema validation, permission check, path
//! canonicalization + allowlist check, out-of-process execution with no
//! shell interpretation anywhere, timeout with process-group kill, output
//! schema validation.
//!
//! The wire protocol to the child is a single JSON object written to its
//! stdin (never by string interpolation into argv or a shell command line)
//! and a single JSON object read back from its stdout:
//!   `{"ok": true, "output": <value>}` or `{"ok": false, "error": "<message>"}`.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use aria_types::{AriaError, Permission, ToolManifest};
use serde_json::Value;
use tokio::io::{AsyncWriteExt, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::schema;

/// Context visible to a single tool invocation.
pub struct SandboxContext {
    pub granted_permissions: Vec<Permission>,
}

impl SandboxContext {
    pub fn new(granted_permissions: Vec<Permission>) -> Self {
        Self { granted_permissions }
    }
}

pub struct SandboxRunner;

impl SandboxRunner {
    pub fn new() -> Self {
        Self
    }

    /// Run `manifest` with `input`, enforcing the full pipeline. Returns the
    /// validated output object on success.
    pub async fn run(
        &self,
        manifest: &ToolManifest,
        input: &Value,
        context: &SandboxContext,
    ) -> Result<Value, AriaError> {
        // 1. Input schema validation.
        schema::validate(&manifest.input_schema, input)
            .map_err(AriaError::ToolInputValidationError)?;

        // 2. Permission check: manifest permissions must be a subset of granted.
        for perm in &manifest.permissions {
            if *perm != Permission::None && !context.granted_permissions.contains(perm) {
                return Err(AriaError::PermissionDenied { permission: format!("{perm:?}") });
            }
        }

        // 3. Path resolution for every declared path field.
        for field in &manifest.path_fields {
            if let Some(raw) = input.get(field).and_then(Value::as_str) {
                let resolved = canonicalize_soft(raw)
                    .map_err(|_| AriaError::PathTraversal { path: raw.to_string() })?;
                if !is_allowed(&resolved, &manifest.allowed_paths) {
                    return Err(AriaError::PathTraversal { path: raw.to_string() });
                }
            }
        }

        // 4+5. Out-of-process execution with timeout.
        let output = self.exec_child(manifest, input).await?;

        // 6. Output schema validation.
        schema::validate(&manifest.output_schema, &output)
            .map_err(AriaError::ToolOutputValidationError)?;

        Ok(output)
    }

    async fn exec_child(&self, manifest: &ToolManifest, input: &Value) -> Result<Value, AriaError> {
        let exe = manifest
            .executable
            .as_ref()
            .ok_or_else(|| AriaError::ToolCrashed { tool: manifest.name.clone(), message: "no executable configured".into() })?;

        let mut cmd = Command::new(exe);
        // No shell interpretation, anywhere: argv is a single, fixed
        // executable path; the payload crosses the boundary over stdin only.
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt as _;
            // New process group so the whole tree can be killed on timeout.
            unsafe {
                cmd.pre_exec(|| {
                    libc::setsid();
                    Ok(())
                });
            }
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| AriaError::ToolCrashed { tool: manifest.name.clone(), message: format!("spawn failed: {e}") })?;

        let payload = serde_json::to_vec(input)
            .map_err(|e| AriaError::ToolCrashed { tool: manifest.name.clone(), message: format!("encoding input: {e}") })?;

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(&payload).await {
                warn!(tool = %manifest.name, error = %e, "writing tool stdin failed");
            }
            // Drop closes stdin, signalling EOF to the child.
        }

        let pid = child.id();
        let timeout = Duration::from_secs(manifest.timeout_secs);
        let result = tokio::time::timeout(timeout, read_to_end(&mut child)).await;

        match result {
            Ok(Ok((status, stdout, stderr))) => parse_child_reply(manifest, status.success(), &stdout, &stderr),
            Ok(Err(e)) => Err(AriaError::ToolCrashed { tool: manifest.name.clone(), message: format!("I/O error: {e}") }),
            Err(_) => {
                kill_process_group(pid);
                let _ = child.kill().await;
                Err(AriaError::ToolTimeout { tool: manifest.name.clone(), timeout_secs: manifest.timeout_secs })
            }
        }
    }
}

impl Default for SandboxRunner {
    fn default() -> Self {
        Self::new()
    }
}

async fn read_to_end(child: &mut tokio::process::Child) -> std::io::Result<(std::process::ExitStatus, Vec<u8>, Vec<u8>)> {
    let mut stdout_buf = Vec::new();
    let mut stderr_buf = Vec::new();
    if let Some(mut out) = child.stdout.take() {
        out.read_to_end(&mut stdout_buf).await?;
    }
    if let Some(mut err) = child.stderr.take() {
        err.read_to_end(&mut stderr_buf).await?;
    }
    let status = child.wait().await?;
    Ok((status, stdout_buf, stderr_buf))
}

fn parse_child_reply(manifest: &ToolManifest, success: bool, stdout: &[u8], stderr: &[u8]) -> Result<Value, AriaError> {
    let reply: Option<Value> = serde_json::from_slice(stdout).ok();
    match reply {
        Some(Value::Object(map)) if map.get("ok") == Some(&Value::Bool(true)) => {
            Ok(map.get("output").cloned().unwrap_or(Value::Null))
        }
        Some(Value::Object(map)) if map.get("ok") == Some(&Value::Bool(false)) => {
            let message = map.get("error").and_then(Value::as_str).unwrap_or("tool reported failure").to_string();
            Err(AriaError::ToolCrashed { tool: manifest.name.clone(), message })
        }
        _ => {
            let message = if !stderr.is_empty() {
                String::from_utf8_lossy(stderr).into_owned()
            } else if !stdout.is_empty() {
                String::from_utf8_lossy(stdout).into_owned()
            } else if success {
                "tool produced no structured reply".to_string()
            } else {
                "tool exited non-zero with no output".to_string()
            };
            debug!(tool = %manifest.name, success, "tool crashed");
            Err(AriaError::ToolCrashed { tool: manifest.name.clone(), message })
        }
    }
}

#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    if let Some(pid) = pid {
        unsafe {
            libc::kill(-(pid as i32), libc::SIGKILL);
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}

/// Canonicalize `raw`, falling back to canonicalizing the parent directory
/// when the path itself does not yet exist (e.g. a write target). Symlinks
/// are resolved and `..` segments eliminated either way.
fn canonicalize_soft(raw: &str) -> std::io::Result<PathBuf> {
    let path = Path::new(raw);
    if let Ok(p) = path.canonicalize() {
        return Ok(p);
    }
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("/"));
    let file_name = path.file_name().ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, "no file name"))?;
    let canon_parent = parent.canonicalize()?;
    Ok(canon_parent.join(file_name))
}

fn is_allowed(resolved: &Path, allowed_prefixes: &[String]) -> bool {
    allowed_prefixes.iter().any(|prefix| {
        let prefix_path = Path::new(prefix).canonicalize().unwrap_or_else(|_| PathBuf::from(prefix));
        resolved.starts_with(&prefix_path)
    })
}
