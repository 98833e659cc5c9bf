use std::time::Duration;

use clap::Parser;
use ollama_core::config::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_TIMEOUT};
use ollama_core::{ServerConfig, TransportConfig};

#[derive(Debug, Parser)]
#[command(name = "ollama-generate")]
#[command(about = "Generate text with a model served by Ollama", version)]
#[command(after_help = "Ensure the Ollama server is running and the model is available on the server.")]
pub struct Cli {
    /// Model name.
    #[arg(long, env = "OLLAMA_MODEL", default_value = "llama3.2")]
    pub model: String,

    /// Text prompt.
    #[arg(long, env = "OLLAMA_PROMPT")]
    pub prompt: Option<String>,

    #[arg(long, env = "OLLAMA_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    #[arg(long, env = "OLLAMA_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Total request timeout in seconds.
    #[arg(long, env = "OLLAMA_TIMEOUT", default_value_t = DEFAULT_TIMEOUT.as_secs())]
    pub timeout: u64,

    /// Connection timeout in seconds.
    #[arg(long, default_value_t = DEFAULT_CONNECT_TIMEOUT.as_secs())]
    pub connect_timeout: u64,

    /// Print model and created_at metadata when available.
    #[arg(long)]
    pub show_meta: bool,
}

impl Cli {
    /// The prompt, if one was given and is not empty.
    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref().filter(|p| !p.is_empty())
    }

    pub fn server(&self) -> ServerConfig {
        ServerConfig::new(self.host.clone(), self.port)
    }

    pub fn transport(&self) -> TransportConfig {
        TransportConfig::default()
            .with_timeout(Duration::from_secs(self.timeout))
            .with_connect_timeout(Duration::from_secs(self.connect_timeout))
    }
}
