//! Prompt templates for tubedigest.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Prompts {
    pub article: ArticlePrompts,
    pub translation: TranslationPrompts,
}

/// Prompts for rewriting a transcript into an article.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArticlePrompts {
    pub role: String,
    pub goal: String,
    pub backstory: String,
    /// Editorial rules, sent ahead of the transcript.
    pub instructions: String,
    pub user: String,
}

impl Default for ArticlePrompts {
    fn default() -> Self {
        Self {
            role: "Editorial Assistant".to_string(),
            goal: "Rewrite transcripts into accurate, well-structured articles".to_string(),
            backstory: "You're part of a media team focused on transforming raw transcripts into compelling written articles.".to_string(),
            instructions: r#"You are a professional editorial assistant. Your task is to convert a raw transcript into a polished, human-readable article written in {{language}}.

Writing guidelines:
- Write in long, well-structured paragraphs with smooth transitions.
- Use natural, flowing language and complete sentences.
- Maintain a professional tone suitable for news or analysis.
- Include a clear, descriptive title at the top as a Markdown `# H1` heading.

Formatting rules:
- Use GitHub Flavored Markdown following the CommonMark spec.
- Use `#` for headings, blank lines between paragraphs, `**bold**` and `*italic*` for emphasis, `-` for bullet points and `>` for blockquotes.
- Do not use any HTML tags or styling.

Content rules:
- Preserve all factual information.
- Remove all promotional content and sponsorship mentions.
- Do not hallucinate, assume, or fabricate any information.
- Do not summarize; rewrite into full article form.

Output rules:
- Only output the final Markdown-formatted article.
- Do not include system messages, reasoning, or explanations."#
                .to_string(),
            user: "Transcript:\n{{transcript}}".to_string(),
        }
    }
}

/// Prompts for translating a finished article.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationPrompts {
    pub system: String,
    pub user: String,
}

impl Default for TranslationPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are a language expert tasked with translating articles into {{language}}.
Preserve all Markdown formatting exactly as provided.

Return only the translated Markdown text in {{language}} without additional explanations."#
                .to_string(),
            user: "Article:\n{{article}}".to_string(),
        }
    }
}

/// A rendered system/user message pair ready to send to a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatPrompt {
    pub system: String,
    pub user: String,
}

impl Prompts {
    /// Load prompts, applying overrides from an optional custom directory.
    pub fn load(custom_dir: Option<&str>) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let article_path = custom_path.join("article.toml");
            if article_path.exists() {
                let content = std::fs::read_to_string(&article_path)?;
                prompts.article = toml::from_str(&content)?;
            }

            let translation_path = custom_path.join("translation.toml");
            if translation_path.exists() {
                let content = std::fs::read_to_string(&translation_path)?;
                prompts.translation = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    ///
    /// Substituted values are never scanned again, so a transcript quoting
    /// `{{language}}` stays verbatim. Unknown placeholders are left as-is.
    pub fn render(template: &str, vars: &HashMap<&str, &str>) -> String {
        let mut result = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find("{{") {
            result.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            match after.find("}}") {
                Some(end) => {
                    let key = &after[..end];
                    match vars.get(key.trim()) {
                        Some(value) => result.push_str(value),
                        None => {
                            result.push_str("{{");
                            result.push_str(key);
                            result.push_str("}}");
                        }
                    }
                    rest = &after[end + 2..];
                }
                None => {
                    result.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }
        result.push_str(rest);
        result
    }

    /// Build the article-writing prompt for a transcript.
    pub fn article_prompt(&self, transcript: &str, language: &str) -> ChatPrompt {
        let vars = HashMap::from([("transcript", transcript), ("language", language)]);
        let system = format!(
            "Role: {}\nGoal: {}\nBackstory: {}\n\n{}",
            self.article.role,
            self.article.goal,
            self.article.backstory,
            Self::render(&self.article.instructions, &vars),
        );
        ChatPrompt {
            system,
            user: Self::render(&self.article.user, &vars),
        }
    }

    /// Build the translation prompt for an article.
    pub fn translation_prompt(&self, article: &str, language: &str) -> ChatPrompt {
        let vars = HashMap::from([("article", article), ("language", language)]);
        ChatPrompt {
            system: Self::render(&self.translation.system, &vars),
            user: Self::render(&self.translation.user, &vars),
        }
    }
}
