use anyhow::Result;

use crate::config::Config;

pub fn list_services(config: &Config) -> Result<()> {
    println!("{:<16} {:<12} CREDENTIAL", "COLLABORATOR", "STATUS");

    // Local detector needs no configuration or credential
    println!("{:<16} {:<12} -", "fingerprint", "OK");

    let github = if !config.search.github.enabled {
        ("DISABLED", "-")
    } else if std::env::var("GITHUB_TOKEN").is_ok() {
        ("OK", "present")
    } else {
        ("NO CREDENTIAL", "GITHUB_TOKEN missing")
    };
    println!("{:<16} {:<12} {}", "github", github.0, github.1);

    let stackexchange = if !config.search.stackexchange.enabled {
        ("DISABLED", "-")
    } else if std::env::var("STACKEXCHANGE_KEY").is_ok() {
        ("OK", "present")
    } else {
        // The Q&A search works unauthenticated at a reduced quota
        ("OK", "STACKEXCHANGE_KEY missing (reduced quota)")
    };
    println!(
        "{:<16} {:<12} {}",
        "stackexchange", stackexchange.0, stackexchange.1
    );

    let ai = if !config.ai.is_enabled() {
        ("DISABLED", "-")
    } else if std::env::var("GPTZERO_API_KEY").is_ok() {
        ("OK", "present")
    } else {
        ("NO CREDENTIAL", "GPTZERO_API_KEY missing")
    };
    println!("{:<16} {:<12} {}", &config.ai.provider, ai.0, ai.1);

    Ok(())
}
