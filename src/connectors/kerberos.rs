//! Kerberos ticket acquisition.
//!
//! Backends behind Kerberos need a valid ticket before the first connection
//! attempt. The ticket is obtained with the system `kinit`, either from a
//! keytab or by feeding the password on stdin.

use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::{AppError, Result};
use crate::models::{DataSourceDefinition, KerberosDetails};

const KINIT: &str = "kinit";

/// Authenticate when the definition carries Kerberos details.
pub async fn authenticate_if_configured(backend: &str, def: &DataSourceDefinition) -> Result<()> {
    match &def.kerberos {
        Some(details) => authenticate(backend, details).await,
        None => Ok(()),
    }
}

/// Run `kinit` for the configured principal.
pub async fn authenticate(backend: &str, details: &KerberosDetails) -> Result<()> {
    details.validate()?;
    let principal = details.qualified_principal();

    let mut command = Command::new(KINIT);
    if let Some(conf) = &details.krb5conf {
        command.env("KRB5_CONFIG", conf);
    }
    match &details.keytab {
        Some(keytab) => {
            command.arg("-kt").arg(keytab).arg(&principal);
            command.stdin(Stdio::null());
        }
        None => {
            command.arg(&principal);
            command.stdin(Stdio::piped());
        }
    }
    command.stdout(Stdio::null()).stderr(Stdio::piped());

    log::debug!("Requesting Kerberos ticket for {}", principal);
    let mut child = command
        .spawn()
        .map_err(|e| AppError::connection(backend, format!("failed to run {}: {}", KINIT, e)))?;

    if details.keytab.is_none() {
        if let (Some(mut stdin), Some(password)) = (child.stdin.take(), &details.password) {
            stdin
                .write_all(format!("{}\n", password).as_bytes())
                .await
                .map_err(|e| AppError::connection(backend, e))?;
        }
    }

    let output = child
        .wait_with_output()
        .await
        .map_err(|e| AppError::connection(backend, e))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(AppError::connection(
            backend,
            format!("kerberos login for {} failed: {}", principal, stderr.trim()),
        ));
    }

    log::info!("Kerberos ticket acquired for {}", principal);
    Ok(())
}
