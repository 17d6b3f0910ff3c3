use crate::error::NexusError;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Run the external credential helper and return the token it prints.
///
/// The helper authenticates with the ambient machine identity; nothing
/// secret is passed on its command line and stdin is closed.
pub async fn print_access_token(program: &str, args: &[String]) -> Result<String, NexusError> {
    debug!(program, ?args, "invoking credential helper");

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| NexusError::HelperExecution(format!("failed to start `{program}`: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(NexusError::HelperExecution(format!(
            "`{program}` exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    let token = clean_token(&String::from_utf8_lossy(&output.stdout));
    if token.is_empty() {
        return Err(NexusError::HelperExecution(format!(
            "`{program}` printed no token"
        )));
    }
    Ok(token)
}

/// Strip escaped and real line breaks from helper output.
pub fn clean_token(raw: &str) -> String {
    raw.replace("\\n", "")
        .replace(['\r', '\n'], "")
        .trim()
        .to_string()
}
