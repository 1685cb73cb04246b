//! `forgebom config`: configuration management commands.

use forgebom_config::{AppConfig, EvaluationStrategy};

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let mut warnings = Vec::new();

            if config.fusion.strategy == EvaluationStrategy::Vision && !config.has_vision_key() {
                warnings.push("Vision strategy without an API key (set FORGEBOM_API_KEY)");
            }

            if config.search.api_key.is_none() || config.search.engine_id.is_none() {
                warnings.push("Search API key or engine id missing");
            }

            if config.fusion.search_limit > 10 {
                warnings.push("search_limit above 10 is capped by the search API");
            }

            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            let weights = config.fusion.weights;
            println!();
            println!("   Strategy:    {:?}", config.fusion.strategy);
            println!("   Model:       {}", config.vision.model);
            println!(
                "   Gates:       price > {:.2}, confidence >= {:.2}",
                config.fusion.min_price, config.fusion.min_confidence
            );
            println!(
                "   Weights:     vision={}, image={}, per_attribute={}",
                weights.vision, weights.image, weights.per_attribute
            );
            println!("   Output:      {}", config.assembly.output_dir.display());
            println!("   Library:     {}", config.assembly.library_path.display());
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let toml_str = toml::to_string_pretty(&redacted(config))?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}

/// Mask secrets before printing.
fn redacted(mut config: AppConfig) -> AppConfig {
    let mask = |key: &mut Option<String>| {
        if key.is_some() {
            *key = Some("[REDACTED]".into());
        }
    };
    mask(&mut config.vision.api_key);
    mask(&mut config.search.api_key);
    config
}
