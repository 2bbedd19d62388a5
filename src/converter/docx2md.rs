use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

/// Whether `pandoc_path` can be spawned at all.
pub fn is_pandoc_available(pandoc_path: &str) -> bool {
    Command::new(pandoc_path)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Pipes DOCX bytes through pandoc and returns GitHub-flavoured Markdown.
pub fn run(file_stream: &[u8], pandoc_path: &str, media_dir: Option<&Path>) -> Result<String, String> {
    // 1) Build the command
    let mut cmd = Command::new(pandoc_path);
    cmd.args(["-f", "docx", "-t", "gfm"]);
    if let Some(dir) = media_dir {
        cmd.arg("--extract-media").arg(dir);
    }
    let mut child = cmd
        .args(["-o", "-", "-"]) // write output to stdout, read input from stdin
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| format!("failed to spawn pandoc: {}", e))?;

    // 2) Feed the DOCX bytes into pandoc's stdin
    {
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| "failed to open stdin".to_string())?;
        stdin
            .write_all(file_stream)
            .map_err(|e| format!("failed to write to pandoc stdin: {}", e))?;
    } // stdin closed here so pandoc sees EOF

    // 3) Wait for pandoc to finish and collect its output
    let output = child
        .wait_with_output()
        .map_err(|e| format!("failed to read pandoc output: {}", e))?;

    // 4) Return stdout on success, or stderr on failure
    if output.status.success() {
        String::from_utf8(output.stdout).map_err(|e| format!("output was not valid UTF-8: {}", e))
    } else {
        Err(format!(
            "Pandoc execution failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        ))
    }
}
