//! Prompt templates for finrag.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub ocr: OcrPrompts,
    pub agent: AgentPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: std::collections::HashMap<String, String>,
}

/// Prompts for page transcription by the vision model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrPrompts {
    pub instruction: String,
}

impl Default for OcrPrompts {
    fn default() -> Self {
        Self {
            instruction: r#"You are an advanced financial document processing OCR system.
Your task is to extract **all textual content from the provided document**, preserving **every single detail**. This includes:

- Section headings, subheadings, and hierarchy
- Paragraphs and lists
- All numeric values (revenues, profits, percentages, ratios, etc.)
- Tables (as text, preserving structure and data)
- Charts or figures (described as text, with all labels and numbers)
- Footnotes, annotations, disclaimers, and captions
- Any other content present in the document

Do not omit, summarize, or interpret any information. Preserve the formatting and hierarchy as much as possible to maintain clarity and readability.

Your output must be in **exact JSON format**:

{
  "text": "<comprehensive extracted text with every detail present, including tables, charts, footnotes and numbers, formatted for readability>",
  "summary": "<extremely concise summary of the document, suitable for vector store metadata, e.g. 'Annual financial report FY2024, balance sheet and profit analysis'>"
}

Guidelines:

1. **Include everything:** Every detail in the document must appear in the `text` field.
2. **Maintain structure:** Keep headings, subheadings, lists, and table formatting clear.
3. **Tables & charts:** Convert them to readable text; include all numbers, labels, and notes.
4. **Footnotes & disclaimers:** Include all notes exactly as in the document.
5. **Summary:** One short sentence or key phrase capturing the main topic for metadata purposes.
6. **Do not skip, compress, or ignore any content.** Only format it cleanly for readability."#
                .to_string(),
        }
    }
}

/// Prompts for the question-answering agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentPrompts {
    pub system: String,
}

impl Default for AgentPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are an assistant for question-answering tasks over {{organization}} financial documents.

Use the `rag_search_tool` tool to retrieve pieces of context from the uploaded reports, then answer the question from that context.
The `rag_search_tool` takes a query string as its only argument. Rephrase the question into a focused search query, and search again with different wording if the first results are not relevant.
{{#web_search}}
If the reports do not cover the question (for example current market data or recent news), use the `web_search` tool and say that the answer comes from the web.
{{/web_search}}
Quote figures exactly as they appear, with their units and reporting periods.
If you don't know the answer, say that you don't know. Keep answers concise."#
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&std::collections::HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        prompts
            .variables
            .insert("organization".to_string(), "Bajaj Finserv".to_string());
        if let Some(vars) = custom_variables {
            prompts.variables.extend(vars.clone());
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let ocr_path = custom_path.join("ocr.toml");
            if ocr_path.exists() {
                let content = std::fs::read_to_string(&ocr_path)?;
                prompts.ocr = toml::from_str(&content)?;
            }

            let agent_path = custom_path.join("agent.toml");
            if agent_path.exists() {
                let content = std::fs::read_to_string(&agent_path)?;
                prompts.agent = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &std::collections::HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(
        &self,
        template: &str,
        vars: &std::collections::HashMap<String, String>,
    ) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }

    /// Keep or drop a `{{#name}} ... {{/name}}` section.
    pub fn toggle_section(template: &str, name: &str, keep: bool) -> String {
        let open = format!("{{{{#{}}}}}", name);
        let close = format!("{{{{/{}}}}}", name);

        let mut result = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(start) = rest.find(&open) {
            result.push_str(&rest[..start]);
            let after_open = &rest[start + open.len()..];
            match after_open.find(&close) {
                Some(end) => {
                    if keep {
                        result.push_str(after_open[..end].trim_matches('\n'));
                    }
                    rest = &after_open[end + close.len()..];
                    if !keep {
                        rest = rest.strip_prefix('\n').unwrap_or(rest);
                    }
                }
                None => {
                    rest = after_open;
                }
            }
        }
        result.push_str(rest);
        result
    }

    /// Render the OCR instruction.
    pub fn ocr_instruction(&self) -> String {
        self.render_with_custom(&self.ocr.instruction, &std::collections::HashMap::new())
    }

    /// Render the agent system prompt.
    pub fn agent_system(&self, web_search: bool) -> String {
        let template = Self::toggle_section(&self.agent.system, "web_search", web_search);
        self.render_with_custom(&template, &std::collections::HashMap::new())
    }
}
