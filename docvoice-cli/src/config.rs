use anyhow::Result;
use std::path::PathBuf;

pub struct Config {
    api_key: Option<String>,
    pub data_dir: PathBuf,
}

impl Config {
    /// Settings from the environment, after loading `.env` if present.
    pub fn from_env(data_dir: Option<PathBuf>) -> Result<Self> {
        let _ = dotenvy::dotenv();
        let api_key =
            std::env::var("GOOGLE_API_KEY").or_else(|_| std::env::var("GEMINI_API_KEY")).ok();

        let data_dir = match data_dir {
            Some(dir) => dir,
            None => dirs::data_dir()
                .ok_or_else(|| anyhow::anyhow!("no data directory; pass --data-dir"))?
                .join("docvoice"),
        };

        Ok(Self { api_key, data_dir })
    }

    pub fn api_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            anyhow::anyhow!("GOOGLE_API_KEY or GEMINI_API_KEY environment variable not set")
        })
    }
}
