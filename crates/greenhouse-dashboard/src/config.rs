use anyhow::{Context, Result};
use clap::Parser;
use greenhouse_core::wire::new_client_id;
use std::path::PathBuf;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub log_dir: Option<PathBuf>,
    pub debug: bool,
}

impl Config {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Parser, Debug, Default)]
#[command(name = "greenhouse-dashboard", about = "Live terminal dashboard for greenhouse groups")]
pub struct Args {
    #[arg(long, default_value = "")]
    pub host: String,
    #[arg(long)]
    pub port: Option<u16>,
    #[arg(long, default_value = "")]
    pub client_id: String,
    #[arg(long, default_value = "")]
    pub log_dir: String,
    #[arg(long, default_value_t = false)]
    pub debug: bool,
}

pub fn load_config() -> Result<Config> {
    resolve_config(Args::parse(), |key| std::env::var(key).ok())
}

/// Flags win over `GREENHOUSE_*` variables, which win over defaults.
pub fn resolve_config(args: Args, env: impl Fn(&str) -> Option<String>) -> Result<Config> {
    let non_empty = |key: &str| env(key).filter(|value| !value.trim().is_empty());

    let host = Some(args.host)
        .filter(|value| !value.trim().is_empty())
        .or_else(|| non_empty("GREENHOUSE_HOST"))
        .unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = match args.port {
        Some(port) => port,
        None => match non_empty("GREENHOUSE_PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .with_context(|| format!("invalid GREENHOUSE_PORT value {raw:?}"))?,
            None => DEFAULT_PORT,
        },
    };

    let client_id = Some(args.client_id)
        .filter(|value| !value.trim().is_empty())
        .or_else(|| non_empty("GREENHOUSE_CLIENT_ID"))
        .unwrap_or_else(new_client_id);

    let log_dir = Some(args.log_dir)
        .filter(|value| !value.trim().is_empty())
        .or_else(|| non_empty("GREENHOUSE_LOG_DIR"))
        .map(PathBuf::from);

    let debug = args.debug
        || env("GREENHOUSE_DEBUG")
            .and_then(|value| parse_bool_flag(&value))
            .unwrap_or(false);

    Ok(Config {
        host,
        port,
        client_id,
        log_dir,
        debug,
    })
}

pub fn parse_bool_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn parse_bool_flag_accepts_common_values() {
        assert_eq!(parse_bool_flag("1"), Some(true));
        assert_eq!(parse_bool_flag(" ON "), Some(true));
        assert_eq!(parse_bool_flag("no"), Some(false));
        assert_eq!(parse_bool_flag("off"), Some(false));
        assert_eq!(parse_bool_flag("maybe"), None);
    }

    #[test]
    fn defaults_apply_without_flags_or_env() {
        let config = resolve_config(Args::default(), env_from(&[])).expect("config");
        assert_eq!(config.addr(), "127.0.0.1:5000");
        assert!(config.client_id.starts_with("greenhouse-dashboard-"));
        assert_eq!(config.log_dir, None);
        assert!(!config.debug);
    }

    #[test]
    fn env_fills_in_missing_flags() {
        let config = resolve_config(
            Args::default(),
            env_from(&[
                ("GREENHOUSE_HOST", "greenhouse.local"),
                ("GREENHOUSE_PORT", "7000"),
                ("GREENHOUSE_CLIENT_ID", "wall-display"),
                ("GREENHOUSE_LOG_DIR", "/var/log/greenhouse"),
                ("GREENHOUSE_DEBUG", "yes"),
            ]),
        )
        .expect("config");

        assert_eq!(config.addr(), "greenhouse.local:7000");
        assert_eq!(config.client_id, "wall-display");
        assert_eq!(config.log_dir, Some(PathBuf::from("/var/log/greenhouse")));
        assert!(config.debug);
    }

    #[test]
    fn flags_take_precedence_over_env() {
        let args = Args {
            host: "10.0.0.4".to_string(),
            port: Some(5050),
            ..Args::default()
        };
        let config = resolve_config(
            args,
            env_from(&[("GREENHOUSE_HOST", "ignored"), ("GREENHOUSE_PORT", "1")]),
        )
        .expect("config");
        assert_eq!(config.addr(), "10.0.0.4:5050");
    }

    #[test]
    fn invalid_port_env_is_an_error() {
        let err = resolve_config(Args::default(), env_from(&[("GREENHOUSE_PORT", "http")]))
            .expect_err("port must be numeric");
        assert!(err.to_string().contains("GREENHOUSE_PORT"));
    }
}
