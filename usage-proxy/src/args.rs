use std::{
    borrow::Cow,
    fmt,
    io::IsTerminal,
    net::{Ipv4Addr, SocketAddr, SocketAddrV4},
    path::PathBuf,
    str::FromStr,
};

use clap::{Parser, ValueEnum};
use config::Config;
use logforth::filter::EnvFilter;
use url::Url;

const DEFAULT_LISTEN_ADDRESS: SocketAddr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 8000));

#[derive(Debug, Parser)]
#[command(name = "Usage Proxy", version, long_about = concat!("Usage Proxy v", env!("CARGO_PKG_VERSION")))]
pub struct Args {
    /// IP address on which the server will listen for incomming connections.
    /// Default: 127.0.0.1:8000
    #[arg(short, long, env = "USAGE_PROXY_LISTEN_ADDRESS")]
    pub listen_address: Option<SocketAddr>,
    /// Base URL of the model server requests are forwarded to. Overrides `upstream.url`.
    #[arg(short, long, env = "USAGE_PROXY_UPSTREAM_URL")]
    pub upstream_url: Option<Url>,
    /// Path to the TOML configuration file
    #[arg(long, short, env = "USAGE_PROXY_CONFIG_PATH", default_value = "./usage-proxy.toml")]
    pub config: PathBuf,
    /// Set the logging level, this applies to all logs.
    #[arg(long = "log", env = "USAGE_PROXY_LOG", default_value_t = LogLevel::default())]
    pub log_level: LogLevel,
    /// Set the style of log output
    #[arg(long, env = "USAGE_PROXY_LOG_STYLE", default_value_t = LogStyle::default())]
    pub log_style: LogStyle,
}

impl Args {
    pub fn config(&self) -> anyhow::Result<Config> {
        let mut config = if self.config.exists() {
            Config::load(&self.config)?
        } else {
            log::debug!("No configuration file at {}, using defaults", self.config.display());
            Config::default()
        };

        if let Some(url) = &self.upstream_url {
            config.upstream.url = Some(url.clone());
        }

        Ok(config)
    }

    /// The command line wins over the configuration file.
    pub fn listen_address(&self, config: &Config) -> SocketAddr {
        self.listen_address
            .or(config.server.listen_address)
            .unwrap_or(DEFAULT_LISTEN_ADDRESS)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub(crate) enum LogStyle {
    /// Colorized text, used as the default with TTY output
    Color,
    /// Standard text, used as the default with non-TTY output
    Text,
    /// JSON objects
    Json,
}

impl Default for LogStyle {
    fn default() -> Self {
        if std::io::stdout().is_terminal() {
            LogStyle::Color
        } else {
            LogStyle::Text
        }
    }
}

impl AsRef<str> for LogStyle {
    fn as_ref(&self) -> &str {
        match self {
            LogStyle::Color => "color",
            LogStyle::Text => "text",
            LogStyle::Json => "json",
        }
    }
}

impl fmt::Display for LogStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub(crate) enum LogLevel {
    /// Disable logging
    Off,
    /// Only log errors
    Error,
    /// Log errors, and warnings
    Warn,
    /// Log errors, warnings, and info messages
    #[default]
    Info,
    /// Log errors, warnings, info, and debug messages
    Debug,
    /// Log errors, warnings, info, debug, and trace messages
    Trace,
}

impl LogLevel {
    pub fn env_filter(self) -> EnvFilter {
        let filter_str = match self {
            LogLevel::Off => Cow::Borrowed("off"),
            // Dependencies stay at warn, the selected level applies to workspace crates.
            level => Cow::Owned(format!(
                "warn,usage_proxy={level},server={level},config={level},token_usage={level}"
            )),
        };

        EnvFilter::from_str(&filter_str).expect("These all are valid env filters.")
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_ref().fmt(f)
    }
}

impl AsRef<str> for LogLevel {
    fn as_ref(&self) -> &str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn defaults() {
        let args = Args::try_parse_from(["usage-proxy"]).unwrap();

        assert_eq!(args.config, PathBuf::from("./usage-proxy.toml"));
        assert_eq!(args.listen_address, None);
        assert_eq!(args.log_level, LogLevel::Info);
    }

    #[test]
    fn upstream_url_overrides_config() {
        let args = Args::try_parse_from([
            "usage-proxy",
            "--config",
            "/nonexistent/usage-proxy.toml",
            "--upstream-url",
            "http://127.0.0.1:9000",
        ])
        .unwrap();

        let config = args.config().unwrap();

        assert_eq!(config.upstream.url.unwrap().as_str(), "http://127.0.0.1:9000/");
        assert!(config.server.health.enabled);
    }

    #[test]
    fn listen_address_precedence() {
        let mut config = Config::default();
        let args = Args::try_parse_from(["usage-proxy"]).unwrap();
        assert_eq!(args.listen_address(&config), DEFAULT_LISTEN_ADDRESS);

        config.server.listen_address = Some("0.0.0.0:7000".parse().unwrap());
        assert_eq!(args.listen_address(&config).port(), 7000);

        let args = Args::try_parse_from(["usage-proxy", "--listen-address", "127.0.0.1:7001"]).unwrap();
        assert_eq!(args.listen_address(&config).port(), 7001);
    }

    #[test]
    fn invalid_upstream_url_is_rejected() {
        assert!(Args::try_parse_from(["usage-proxy", "--upstream-url", "not a url"]).is_err());
    }

    #[test]
    fn log_levels() {
        let args = Args::try_parse_from(["usage-proxy", "--log", "debug", "--log-style", "json"]).unwrap();

        assert_eq!(args.log_level, LogLevel::Debug);
        assert_eq!(args.log_style, LogStyle::Json);
        assert_eq!(args.log_level.to_string(), "debug");
    }
}
