//! The `config` command.

use std::path::Path;

use anyhow::Result;
use clap::Args;

use reviewscribe_config::{KeywordsConfig, Settings};

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Show the effective configuration.
    #[arg(long)]
    pub show: bool,

    /// Write a default config file to the user config directory.
    #[arg(long)]
    pub init: bool,

    /// Write the default keywords to ./keywords.yaml for customization.
    #[arg(long)]
    pub init_keywords: bool,

    /// Store an API key in the config file.
    #[arg(long, value_name = "KEY")]
    pub set_key: Option<String>,
}

pub fn run(args: ConfigArgs) -> Result<i32> {
    if let Some(key) = args.set_key {
        let mut settings = Settings::load();
        settings.api_key = key;
        let path = settings.save_default_config()?;
        println!("API key saved to {}", path.display());
        return Ok(0);
    }

    if args.init {
        let path = Settings::load().save_default_config()?;
        println!("Config written to {}", path.display());
        return Ok(0);
    }

    if args.init_keywords {
        let path = Path::new("keywords.yaml");
        KeywordsConfig::save_defaults(path)?;
        println!("Default keywords saved to {}", path.display());
        return Ok(0);
    }

    if args.show {
        let settings = Settings::load();
        println!("api_base:        {}", settings.api_base);
        println!("api_key:         {}", mask(&settings.api_key));
        println!("stt_endpoint:    {}", settings.stt_endpoint);
        println!("llm_endpoint:    {}", settings.llm_endpoint);
        println!("vision_endpoint: {}", settings.vision_endpoint);
        println!("stt_model:       {}", settings.stt_model);
        println!("llm_model:       {}", settings.llm_model);
        println!("vision_model:    {}", settings.vision_model);
        println!("language:        {}", settings.language);
        println!("semantic:        {}", settings.use_semantic);
        println!("vision:          {}", settings.use_vision);
        println!(
            "keywords:        {}",
            KeywordsConfig::load(None).summary()
        );
        return Ok(0);
    }

    println!("Use --show, --init, --init-keywords, or --set-key KEY");
    Ok(0)
}

fn mask(key: &str) -> String {
    if key.is_empty() {
        return "(not set)".to_string();
    }
    let prefix: String = key.chars().take(8).collect();
    format!("{prefix}…")
}
