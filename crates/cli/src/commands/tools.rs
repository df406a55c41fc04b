//! `ronnyx tools` — List the registered tools.

use ronnyx_config::AppConfig;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let registry = ronnyx_tools::default_registry(&config)?;

    println!("{} tools registered:\n", registry.len());
    for def in registry.definitions() {
        let required = def.parameters["required"]
            .as_array()
            .map(|r| {
                r.iter()
                    .filter_map(|v| v.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default();
        println!("  {:<28} {}", def.name, def.description);
        if !required.is_empty() {
            println!("  {:<28} requires: {required}", "");
        }
    }

    Ok(())
}
