//! `forgebom onboard`: first-time setup.

use forgebom_config::AppConfig;

/// Simple primitive solids for every part module the geometry generator
/// calls. Replace with detailed models as they become available.
pub const STARTER_LIBRARY: &str = r#"// ForgeBOM starter part library.
// Each module is a coarse envelope of the real part, centered on its mount.

module pro_frame(wheelbase) {
    cube([60, 60, 4], center = true);
    for (a = [45, 135]) rotate([0, 0, a]) cube([wheelbase + 20, 12, 4], center = true);
}

module pro_motor(stator) {
    diameter = floor(stator / 100) + 6;
    height = stator % 100 + 8;
    cylinder(h = height, d = diameter, $fn = 32);
}

module pro_prop(inches) {
    cylinder(h = 2, d = inches * 25.4, $fn = 48);
}

module pro_stack(mount, digital) {
    side = mount + 6;
    cube([side, side, digital ? 14 : 10], center = true);
}

module pro_camera(width) {
    cube([width, width, width], center = true);
}

module pro_battery(cells, capacity) {
    cube([max(cells * 12, 30), 35, 20 + capacity / 200], center = true);
}

module pro_companion_computer() {
    cube([65, 30, 10], center = true);
}
"#;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");
    let defaults = AppConfig::default();

    println!("🛠️  ForgeBOM: First-Time Setup");
    println!("==============================\n");

    // Create directories
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("✅ Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    let output_dir = &defaults.assembly.output_dir;
    if !output_dir.exists() {
        std::fs::create_dir_all(output_dir)?;
        println!("✅ Created output directory: {}", output_dir.display());
    }

    // Starter CAD library
    let library_path = &defaults.assembly.library_path;
    if library_path.exists() {
        println!("  CAD library exists: {}", library_path.display());
    } else {
        if let Some(parent) = library_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(library_path, STARTER_LIBRARY)?;
        println!("✅ Created starter CAD library: {}", library_path.display());
    }

    // Create config file
    if config_path.exists() {
        println!("\n⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
    } else {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("✅ Created config.toml at: {}", config_path.display());
        println!("\n📝 Next steps:");
        println!("   1. Set FORGEBOM_SEARCH_KEY and FORGEBOM_SEARCH_ENGINE (Google Custom Search)");
        println!("   2. Set FORGEBOM_API_KEY for vision extraction, or use --safe-mode");
        println!("   3. Run: forgebom fuse Propellers \"5 inch fpv propeller\" --bom bom.json\n");
    }

    println!("🎉 Setup complete! Run `forgebom doctor` to check your environment.\n");

    Ok(())
}
