//! Command-line and environment configuration
//!
//! Every option resolves as flag, then environment variable, then default.

use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;
use toolbridge_core::provider::DEFAULT_MODEL;
use toolbridge_core::{BridgeError, GenerationOptions, OrchestratorConfig, Result};
use toolbridge_runtime::openai::{DEFAULT_API_KEY, DEFAULT_BASE_URL, OpenAiConfig};

/// Chat with a language model that can call the tools of an MCP server
#[derive(Debug, Parser)]
#[command(name = "toolbridge", version, about)]
pub struct Cli {
    /// Tool server script to launch (.py or .js)
    pub server_script: PathBuf,

    /// Model identifier [env: TOOLBRIDGE_MODEL]
    #[arg(long)]
    pub model: Option<String>,

    /// Chat-completions base URL [env: OPENAI_BASE_URL]
    #[arg(long)]
    pub base_url: Option<String>,

    /// API key sent as a bearer token [env: OPENAI_API_KEY]
    #[arg(long)]
    pub api_key: Option<String>,

    /// Token limit per completion [env: TOOLBRIDGE_MAX_TOKENS]
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Tool rounds per query [env: TOOLBRIDGE_MAX_TOOL_ROUNDS]
    #[arg(long)]
    pub max_tool_rounds: Option<usize>,

    /// System prompt for every query [env: TOOLBRIDGE_SYSTEM_PROMPT]
    #[arg(long)]
    pub system_prompt: Option<String>,

    /// Pass tool arguments through without checking them against the tool schema
    #[arg(long)]
    pub no_validate_arguments: bool,
}

/// Fully resolved settings for one run
#[derive(Clone, Debug)]
pub struct Settings {
    pub server_script: PathBuf,
    pub provider: OpenAiConfig,
    pub orchestrator: OrchestratorConfig,
}

impl Settings {
    /// Resolve against the process environment
    pub fn from_env(cli: Cli) -> Result<Self> {
        Self::resolve(cli, |key| std::env::var(key).ok())
    }

    /// Resolve with `env` as the variable lookup
    pub fn resolve(cli: Cli, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let lookup = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let model = cli
            .model
            .or_else(|| lookup("TOOLBRIDGE_MODEL"))
            .unwrap_or_else(|| DEFAULT_MODEL.into());
        let base_url = cli
            .base_url
            .or_else(|| lookup("OPENAI_BASE_URL"))
            .unwrap_or_else(|| DEFAULT_BASE_URL.into());
        let api_key = cli
            .api_key
            .or_else(|| lookup("OPENAI_API_KEY"))
            .unwrap_or_else(|| DEFAULT_API_KEY.into());

        let max_tokens = match cli.max_tokens {
            Some(value) => value,
            None => parse_env(&lookup, "TOOLBRIDGE_MAX_TOKENS")?.unwrap_or(1000),
        };
        let max_tool_rounds = match cli.max_tool_rounds {
            Some(value) => value,
            None => parse_env(&lookup, "TOOLBRIDGE_MAX_TOOL_ROUNDS")?.unwrap_or(1),
        };
        if max_tool_rounds == 0 {
            return Err(BridgeError::Config("max tool rounds must be at least 1".into()));
        }

        let system_prompt = cli.system_prompt.or_else(|| lookup("TOOLBRIDGE_SYSTEM_PROMPT"));

        Ok(Self {
            server_script: cli.server_script,
            provider: OpenAiConfig {
                base_url,
                api_key,
                ..Default::default()
            },
            orchestrator: OrchestratorConfig {
                generation: GenerationOptions {
                    model,
                    max_tokens: Some(max_tokens),
                    temperature: None,
                },
                max_tool_rounds,
                system_prompt,
                validate_arguments: !cli.no_validate_arguments,
            },
        })
    }
}

fn parse_env<T: FromStr>(lookup: impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| BridgeError::Config(format!("invalid {key} value '{raw}': {e}")))
        })
        .transpose()
}
