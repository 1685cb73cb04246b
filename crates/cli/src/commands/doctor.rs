//! `forgebom doctor`: diagnose setup.

use forgebom_config::{AppConfig, EvaluationStrategy};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 ForgeBOM Doctor: System Diagnostics");
    println!("======================================\n");

    let mut issues = 0;

    // Check config
    let config_path = AppConfig::config_dir().join("config.toml");
    if !config_path.exists() {
        println!("  ⚠️  No config file, using defaults (run `forgebom onboard`)");
        issues += 1;
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Configuration valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  Fix the config file and run doctor again.");
            return Ok(());
        }
    };

    // Search credentials
    if config.search.api_key.is_some() && config.search.engine_id.is_some() {
        println!("  ✅ Search API configured");
    } else {
        println!("  ❌ Search API incomplete: set FORGEBOM_SEARCH_KEY and FORGEBOM_SEARCH_ENGINE");
        issues += 1;
    }

    // Vision credentials
    match config.fusion.strategy {
        EvaluationStrategy::Vision if config.has_vision_key() => {
            println!("  ✅ Vision API key configured ({})", config.vision.model);
        }
        EvaluationStrategy::Vision => {
            println!("  ⚠️  No vision API key: set FORGEBOM_API_KEY or use --safe-mode");
            issues += 1;
        }
        EvaluationStrategy::Defaults => {
            println!("  ✅ Safe mode: registry defaults, no vision service needed");
        }
    }

    // CAD toolchain
    let assembly = &config.assembly;
    if assembly.library_path.exists() {
        println!("  ✅ CAD library found: {}", assembly.library_path.display());
    } else {
        println!(
            "  ⚠️  CAD library missing at {} (renders fall back to placeholders)",
            assembly.library_path.display()
        );
        issues += 1;
    }

    match tokio::process::Command::new(&assembly.openscad_bin)
        .arg("--version")
        .output()
        .await
    {
        Ok(output) if output.status.success() => {
            // OpenSCAD prints its version on stderr.
            let version = String::from_utf8_lossy(&output.stderr).trim().to_string();
            println!("  ✅ OpenSCAD available: {version}");
        }
        _ => {
            println!(
                "  ⚠️  `{}` not runnable (renders fall back to placeholders)",
                assembly.openscad_bin
            );
            issues += 1;
        }
    }

    // Summary
    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
