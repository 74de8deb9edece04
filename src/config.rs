use std::env;

use anyhow::{Result, anyhow};

pub const DEFAULT_WIDTH: u32 = 800;
pub const DEFAULT_HEIGHT: u32 = 600;
const DEFAULT_TITLE: &str = "Ferris Quad VK";
const VALIDATION_ENV: &str = "FERRIS_VALIDATION";

/// Start-up options, read from the command line and `FERRIS_VALIDATION`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub validation: bool,
    pub width: u32,
    pub height: u32,
    pub title: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            validation: false,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            title: DEFAULT_TITLE.to_owned(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let validation_env = env::var(VALIDATION_ENV).is_ok_and(|v| v == "1");
        let mut config = Self::from_args(env::args().skip(1))?;
        config.validation |= validation_env;
        Ok(config)
    }

    pub fn from_args<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut config = Self::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            match arg.as_ref() {
                "--validation" => config.validation = true,
                "--size" => {
                    let value = args.next().ok_or_else(|| anyhow!("--size needs WxH"))?;
                    let (width, height) = parse_size(value.as_ref())?;
                    config.width = width;
                    config.height = height;
                }
                "--title" => {
                    let value = args.next().ok_or_else(|| anyhow!("--title needs a value"))?;
                    config.title = value.as_ref().to_owned();
                }
                other => return Err(anyhow!("unknown argument `{other}`")),
            }
        }

        Ok(config)
    }
}

fn parse_size(value: &str) -> Result<(u32, u32)> {
    let (width, height) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| anyhow!("expected WxH, got `{value}`"))?;
    let width = width.trim().parse::<u32>()?;
    let height = height.trim().parse::<u32>()?;
    if width == 0 || height == 0 {
        return Err(anyhow!("window size must be non-zero, got `{value}`"));
    }
    Ok((width, height))
}
