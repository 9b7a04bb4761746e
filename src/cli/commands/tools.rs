//! External tool checks.

use tokio::runtime::Runtime;

use crate::config::Config;
use crate::enrichment::{FfmpegTranscoder, find_codegen};

/// Print installation instructions for echoprint-codegen
fn print_codegen_install_instructions() {
    eprintln!("  Install echoprint-codegen:");
    eprintln!("    macOS:   brew install echoprint-codegen");
    eprintln!("    Linux:   build from https://github.com/echonest/echoprint-codegen");
    eprintln!("  Or point [fetch] codegen at the binary in the config file.");
}

/// Check if codegen, ffmpeg and the API key are available
pub fn cmd_check_tools(rt: &Runtime, config: &Config) -> anyhow::Result<()> {
    println!("Checking fetch tools...\n");

    match find_codegen(config.fetch.codegen.as_deref()) {
        Some(path) => println!("✓ echoprint-codegen: {}", path.display()),
        None => {
            println!("✗ echoprint-codegen: NOT FOUND (fingerprint identification disabled)");
            print_codegen_install_instructions();
        }
    }

    if rt.block_on(FfmpegTranscoder::default().is_available()) {
        println!("✓ ffmpeg: available");
    } else if config.fetch.convert {
        println!("✗ ffmpeg: NOT FOUND (unsupported formats will not be uploaded)");
    } else {
        println!("- ffmpeg: not found (conversion disabled)");
    }

    println!();
    println!("API Keys:");
    if config.credentials.api_key.is_some() {
        println!("✓ Echo Nest API key: set");
    } else if std::env::var("ECHONEST_API_KEY").is_ok() {
        println!("✓ ECHONEST_API_KEY: set");
    } else {
        println!("✗ Echo Nest API key: not set");
        println!("  Use --api-key, set ECHONEST_API_KEY, or add it to the config file");
    }

    Ok(())
}
