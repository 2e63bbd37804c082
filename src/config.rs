use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    // Site
    pub site_manifest: String,
    pub locales_dir: String,

    // Build
    pub build_concurrency: usize,

    // Server
    pub serve: bool,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            site_manifest: std::env::var("SITE_MANIFEST")
                .unwrap_or_else(|_| "site.json".to_string()),
            locales_dir: std::env::var("LOCALES_DIR")
                .unwrap_or_else(|_| "public/locales".to_string()),

            build_concurrency: std::env::var("BUILD_CONCURRENCY")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(8),

            serve: std::env::var("SERVE")
                .map(|v| parse_bool(&v))
                .unwrap_or(Ok(true))?,
            port: std::env::var("PORT")
                .ok()
                .map(|v| v.parse::<u16>().context("PORT must be a valid port number"))
                .transpose()?
                .unwrap_or(3000),
        })
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("SERVE must be a boolean, got '{}'", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("true").unwrap());
        assert!(parse_bool(" YES ").unwrap());
        assert!(parse_bool("1").unwrap());
        assert!(!parse_bool("off").unwrap());
        assert!(!parse_bool("0").unwrap());
        assert!(parse_bool("maybe").is_err());
    }
}
