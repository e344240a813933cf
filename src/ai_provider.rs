use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    #[default]
    Claude,
    Codex,
    Gemini,
}

impl AiProvider {
    pub fn command_name(&self) -> &'static str {
        match self {
            AiProvider::Claude => "claude",
            AiProvider::Codex => "codex",
            AiProvider::Gemini => "gemini",
        }
    }

    /// プロンプトを渡すための引数（モデル指定があれば付与）
    pub fn prompt_args(&self, prompt: &str, model: Option<&str>) -> Vec<String> {
        let mut args: Vec<String> = match self {
            AiProvider::Claude => vec!["-p".into(), prompt.into(), "--output-format".into(), "text".into()],
            AiProvider::Codex => vec!["exec".into(), prompt.into()],
            AiProvider::Gemini => vec!["-p".into(), prompt.into()],
        };
        if let Some(model) = model.filter(|m| !m.is_empty()) {
            args.push(if matches!(self, AiProvider::Codex) { "-m".into() } else { "--model".into() });
            args.push(model.into());
        }
        args
    }
}

impl std::str::FromStr for AiProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "claude" => Ok(AiProvider::Claude),
            "codex" => Ok(AiProvider::Codex),
            "gemini" => Ok(AiProvider::Gemini),
            _ => Err(format!("Unknown provider: {}. Use claude, codex, or gemini", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_args() {
        let args = AiProvider::Claude.prompt_args("hi", None);
        assert_eq!(args, vec!["-p", "hi", "--output-format", "text"]);

        let args = AiProvider::Codex.prompt_args("hi", Some("o4"));
        assert_eq!(args, vec!["exec", "hi", "-m", "o4"]);
    }

    #[test]
    fn test_provider_from_str() {
        assert_eq!("Gemini".parse::<AiProvider>().unwrap(), AiProvider::Gemini);
        assert!("gpt".parse::<AiProvider>().is_err());
    }
}
