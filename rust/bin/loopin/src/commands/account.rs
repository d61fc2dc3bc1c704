//! `loopin login --token`, `loopin logout`, `loopin whoami`.

use std::path::Path;

use anyhow::Result;

use super::{connect, finish};
use crate::config::ClientConfig;

pub fn save_token(token: &str, server: Option<&str>, config_path: &Path) -> Result<()> {
    if token.trim().is_empty() {
        anyhow::bail!("Token cannot be empty.");
    }
    let mut config = ClientConfig::load(config_path)?;
    config.token = token.trim().to_string();
    if let Some(server) = server {
        config.server = server.to_string();
    }
    config.save(config_path)?;
    println!("Token saved to {}.", config_path.display());
    Ok(())
}

pub fn logout(config_path: &Path) -> Result<()> {
    let mut config = ClientConfig::load(config_path)?;
    config.token.clear();
    config.save(config_path)?;
    println!("Logged out.");
    Ok(())
}

pub async fn whoami(config_path: &Path, server: Option<&str>) -> Result<()> {
    let feed = connect(config_path, server)?;
    let me = finish(feed.load_identity().await)?;
    let email = me.email.as_deref().unwrap_or("-");
    match me.enrollment_number.as_deref() {
        Some(enrollment) => println!("#{} {} ({})", me.id, email, enrollment),
        None => println!("#{} {}", me.id, email),
    }
    Ok(())
}
