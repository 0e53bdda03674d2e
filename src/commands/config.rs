//! Config command handler.

use csv_importer::ImporterConfig;

/// Config command.
pub fn cmd_config(config: &ImporterConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("Current Configuration");
    println!("=====================");
    println!();

    println!("Cache:");
    println!("  Driver: {}", config.cache.driver.as_str());
    println!("  Path: {}", config.cache.path.display());
    println!(
        "  Redis URL: {}",
        config.cache.redis_url.as_deref().unwrap_or("(not set)")
    );
    println!(
        "  Memcached URL: {}",
        config.cache.memcached_url.as_deref().unwrap_or("(not set)")
    );
    println!(
        "  Prefix: {}",
        if config.cache.prefix.is_empty() {
            "(none)"
        } else {
            &config.cache.prefix
        }
    );
    println!();

    println!("Mutex:");
    println!("  Lock Time: {} minutes", config.mutex_lock_time);
    println!(
        "  Lock Key: {}",
        config.mutex_lock_key.as_deref().unwrap_or("(importer name)")
    );
    println!();

    println!("CSV:");
    println!("  Delimiter: {:?}", config.delimiter);
    println!("  Enclosure: {:?}", config.enclosure);
    println!("  Escape: {:?}", config.escape);
    println!("  Newline: {:?}", config.newline);
    println!("  Input Encoding: {}", config.input_encoding);
    println!("  Output Encoding: {}", config.output_encoding);
    println!(
        "  Date Format: {}",
        config.csv_date_format.as_deref().unwrap_or("(free form)")
    );
    if !config.artifacts.is_empty() {
        println!("  Artifacts: {:?}", config.artifacts);
    }
    println!();

    println!("Storage Root: {}", config.storage_root.display());
    Ok(())
}
