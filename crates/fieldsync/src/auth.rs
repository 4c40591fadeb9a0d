// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `fieldsync login`, `logout` and `whoami`.

use std::process::ExitCode;

use fieldsync_core::FieldsyncError;
use secrecy::{ExposeSecret, SecretString};

use crate::app::{App, EXIT_AUTH_REQUIRED};

/// Environment variable read before prompting for the password.
pub const PASSWORD_ENV_VAR: &str = "FIELDSYNC_PASSWORD";

/// Password from `FIELDSYNC_PASSWORD`, or an interactive prompt.
fn read_password() -> Result<SecretString, FieldsyncError> {
    if let Ok(password) = std::env::var(PASSWORD_ENV_VAR)
        && !password.is_empty()
    {
        return Ok(SecretString::from(password));
    }

    if std::io::IsTerminal::is_terminal(&std::io::stdin()) {
        eprint!("Password: ");
        let password = rpassword::read_password()
            .map_err(|e| FieldsyncError::Internal(format!("failed to read password: {e}")))?;
        return Ok(SecretString::from(password));
    }

    Err(FieldsyncError::Validation {
        message: format!("no password provided. Set {PASSWORD_ENV_VAR} or run interactively"),
    })
}

pub async fn run_login(app: &App, id: &str, remember: bool) -> Result<ExitCode, FieldsyncError> {
    let password = read_password()?;
    let user = app
        .engine
        .session
        .login(id, password.expose_secret(), remember)
        .await?;
    println!("logged in as {} ({}, {})", user.display_name, user.id, user.role);
    if !remember {
        println!("session will not be kept after this process exits");
    }
    Ok(ExitCode::SUCCESS)
}

pub async fn run_logout(app: &App) -> Result<ExitCode, FieldsyncError> {
    app.engine.session.logout().await?;
    println!("logged out");
    Ok(ExitCode::SUCCESS)
}

pub async fn run_whoami(app: &App) -> Result<ExitCode, FieldsyncError> {
    match app.engine.session.restore_session().await? {
        Some(user) => {
            println!("{} ({}, {})", user.display_name, user.id, user.role);
            Ok(ExitCode::SUCCESS)
        }
        None => {
            println!("not logged in");
            Ok(ExitCode::from(EXIT_AUTH_REQUIRED))
        }
    }
}
