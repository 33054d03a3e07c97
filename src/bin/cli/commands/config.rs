use anyhow::Result;

use photo_archive::auth::{KEY_ACCOUNTS, KEY_SESSION, KEY_SESSION_DIGEST};
use photo_archive::storage::SettingsStore;
use photo_archive::sync::config::KEY_TOKEN;

use crate::OutputFormat;

const SECRET_KEYS: &[&str] = &[KEY_TOKEN, KEY_SESSION, KEY_SESSION_DIGEST, KEY_ACCOUNTS];

fn mask(key: &str, value: &str) -> String {
    if SECRET_KEYS.contains(&key) && !value.is_empty() {
        "********".to_string()
    } else {
        value.to_string()
    }
}

pub fn run_set(settings: &mut SettingsStore, key: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        settings.remove(key)?;
        println!("Cleared {}", key);
    } else {
        settings.set(key, value.trim())?;
        println!("Set {} = {}", key, mask(key, value.trim()));
    }
    Ok(())
}

pub fn run_show(settings: &SettingsStore, format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let output: serde_json::Map<String, serde_json::Value> = settings
                .iter()
                .map(|(k, v)| (k.to_string(), serde_json::Value::String(mask(k, v))))
                .collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            println!("# {}", settings.path().display());
            for (key, value) in settings.iter() {
                println!("{} = {}", key, mask(key, value));
            }
        }
    }
    Ok(())
}
