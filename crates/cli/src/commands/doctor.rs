//! `ronnyx doctor` — Check configuration, credentials and the model endpoint.

use ronnyx_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("Ronnyx Doctor — System Diagnostics");
    println!("==================================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("  [ok]   Config file found at {}", config_path.display());
    } else {
        println!("  [info] No config file, using defaults and environment");
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  [ok]   Configuration valid");
            config
        }
        Err(e) => {
            println!("  [fail] Configuration invalid: {e}");
            println!("\n  1 issue found. Fix the configuration and run again.");
            return Ok(());
        }
    };

    match ronnyx_providers::build_from_config(&config) {
        Ok(provider) => match provider.health_check().await {
            Ok(true) => println!("  [ok]   Model endpoint reachable ({})", config.llm.provider),
            Ok(false) => {
                println!("  [warn] Model endpoint answered but reported unhealthy");
                issues += 1;
            }
            Err(e) => {
                println!("  [fail] Model endpoint check failed: {e}");
                issues += 1;
            }
        },
        Err(e) => {
            println!("  [fail] {e}");
            issues += 1;
        }
    }

    if config.notion.token.is_some() && config.notion.database_id.is_some() {
        println!("  [ok]   Notion token and database id set");
    } else {
        println!("  [warn] NOTION_TOKEN or DATABASE_ID missing — Notion tools will fail");
        issues += 1;
    }

    if config.github.token.is_some() {
        println!("  [ok]   GitHub token set");
    } else {
        println!("  [warn] GITHUB_TOKEN missing — GitHub tools will fail");
        issues += 1;
    }
    if config.github.default_owner.is_none() {
        println!("  [info] No GitHub default owner; repos must be given as owner/name");
    }

    match ronnyx_memory::open_store(&config.sessions).await {
        Ok(store) => match store.count().await {
            Ok(n) => println!("  [ok]   Session store '{}' open ({n} sessions)", store.name()),
            Err(e) => {
                println!("  [fail] Session store unreadable: {e}");
                issues += 1;
            }
        },
        Err(e) => {
            println!("  [fail] Session store could not be opened: {e}");
            issues += 1;
        }
    }

    println!();
    if issues == 0 {
        println!("  All checks passed!");
    } else {
        println!("  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
