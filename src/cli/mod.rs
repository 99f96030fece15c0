use clap::Parser;
use std::net::{ Ipv4Addr, SocketAddr };

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Gemini Args ---
    /// API key for the Gemini API.
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Model name used for every chat session (e.g., gemini-1.5-flash, gemini-1.5-pro)
    #[arg(long, env = "GEMINI_MODEL", default_value = "gemini-1.5-flash")]
    pub model: String,

    /// Base URL of the Generative Language API, without the model path.
    #[arg(
        long,
        env = "GEMINI_BASE_URL",
        default_value = "https://generativelanguage.googleapis.com/v1beta"
    )]
    pub base_url: String,

    // --- Server Args ---
    /// Port for the HTTP server. The server always binds to the loopback interface.
    #[arg(long, env = "PORT", default_value = "9000")]
    pub port: u16,
}

impl Args {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::LOCALHOST, self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listen_addr_is_loopback() {
        let args = Args::try_parse_from([
            "chat-relay",
            "--api-key",
            "secret",
            "--port",
            "9123",
        ]).unwrap();

        assert_eq!(args.listen_addr(), "127.0.0.1:9123".parse::<SocketAddr>().unwrap());
        assert_eq!(args.api_key, "secret");
    }

    #[test]
    fn port_must_be_numeric() {
        let parsed = Args::try_parse_from(["chat-relay", "--api-key", "k", "--port", "http"]);
        assert!(parsed.is_err());
    }
}
