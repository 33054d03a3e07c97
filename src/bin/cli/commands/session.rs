use std::io::{self, BufRead};

use anyhow::{bail, Context, Result};

use photo_archive::auth::{self, StaticAuthenticator};
use photo_archive::storage::SettingsStore;

pub fn run_login(settings: &mut SettingsStore, username: &str, password: Option<String>) -> Result<()> {
    let authenticator =
        StaticAuthenticator::from_settings(settings).context("Invalid accounts setting")?;
    if !authenticator.has_accounts() {
        bail!("No accounts configured. Set 'accounts' to a list of user:<hash> entries separated by ';'. Hashes come from: photo-archive-cli config hash-password");
    }

    let password = match password {
        Some(password) => password,
        None => {
            let mut line = String::new();
            io::stdin().lock().read_line(&mut line)?;
            line.trim_end_matches(['\r', '\n']).to_string()
        }
    };

    let Some(session) = authenticator.login(username, &password) else {
        bail!("Invalid username or password");
    };
    auth::save_session(settings, &session)?;
    println!("Logged in as {}", session.username);
    Ok(())
}

pub fn run_logout(settings: &mut SettingsStore) -> Result<()> {
    auth::clear_session(settings)?;
    println!("Logged out");
    Ok(())
}
